//! # Core Service
//!
//! Façade that wires the library, the sync engine and the change listener
//! into login sessions.
//!
//! ## Overview
//!
//! - [`CoreService`] owns the shared library and the event bus and drives
//!   login and logout
//! - [`SessionHandle`] exposes one session's library and sync status
//! - [`stores`] builds document stores for the enabled providers
//!
//! ## Features
//!
//! - `couchdb`: CouchDB-backed stores over any `HttpClient`
//! - `desktop-shims` (default): adds the reqwest client from `bridge-desktop`
//!
//! ## Usage
//!
//! ```ignore
//! use core_service::{stores, CoreService, LoginContext};
//! use core_runtime::config::CoreConfig;
//! use provider_couchdb::CouchConfig;
//!
//! let service = CoreService::new(CoreConfig::default())?;
//! let store = stores::desktop_couchdb_store(
//!     CouchConfig::for_user("https://db.example.com", "alice").with_credentials("alice", pw),
//! )?;
//! let session = service.login(LoginContext::new("alice", store)).await?;
//! session.wait_until_settled().await;
//! ```

pub mod error;
pub mod service;
pub mod session;
pub mod stores;

pub use error::{CoreError, Result};
pub use service::CoreService;
pub use session::{LoginContext, SessionHandle};
