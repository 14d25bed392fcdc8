//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with rustls
//!
//! Clocks and logger sinks need nothing platform-specific; the defaults in
//! `bridge-traits` are used as-is.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::sync::Arc;
//!
//! let http = Arc::new(ReqwestHttpClient::new()?);
//! let store = provider_couchdb::CouchDocumentStore::new(http, config);
//! ```

mod http;

pub use http::ReqwestHttpClient;
