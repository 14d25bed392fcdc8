//! Workspace placeholder crate.
//!
//! This crate exposes shared feature flags that map to the individual
//! workspace crates (`core-service`, `provider-couchdb`, `bridge-desktop`).
//! Host applications can depend on `medialib-workspace` and enable the
//! documented features without wiring each crate individually.

#[cfg(any(feature = "desktop-shims", feature = "couchdb"))]
pub use core_service as service;
