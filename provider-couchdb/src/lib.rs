//! # CouchDB Provider
//!
//! Implements the `DocumentStore` trait over a CouchDB-compatible HTTP API.
//!
//! ## Overview
//!
//! This module provides:
//! - Document fetch and optimistic writes keyed by `_rev`
//! - Cheap head checks through the `ETag` of a `HEAD` request
//! - A long-poll `_changes` feed filtered to a single document
//! - Optional Basic authentication
//!
//! ## Usage
//!
//! ```ignore
//! use provider_couchdb::{CouchConfig, CouchDocumentStore};
//!
//! let config = CouchConfig::for_user("https://db.example.com", "alice")
//!     .with_credentials("alice", password);
//! let store = CouchDocumentStore::new(http_client, config)?;
//! let document = store.fetch(&DocumentId::new("videos")).await?;
//! ```

pub mod changes;
pub mod config;
pub mod connector;
pub mod error;
pub mod types;

pub use config::{CouchConfig, Credentials};
pub use connector::CouchDocumentStore;
pub use error::{CouchDbError, Result};
