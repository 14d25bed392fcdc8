//! # Host Bridge Traits
//!
//! Contracts between the media-library core and the outside world.
//!
//! ## Overview
//!
//! The core never talks to a network, a clock or a log file directly. Each
//! capability it needs is a trait defined here and implemented by a host or
//! provider crate:
//!
//! ### Remote documents
//! - [`DocumentStore`](document::DocumentStore) - Revision-tracked JSON document store
//!   with a change feed (implemented by `provider-couchdb`)
//! - [`InMemoryDocumentStore`](memory::InMemoryDocumentStore) - Process-local store for
//!   tests and offline development
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations (implemented by `bridge-desktop`)
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! Host capabilities report [`BridgeError`](error::BridgeError). Document stores
//! report [`StoreError`](document::StoreError), which separates the answers the
//! sync engine reacts to (`Conflict`, `NotFound`) from transport failures.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind an `Arc`.

pub mod document;
pub mod error;
pub mod http;
pub mod memory;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use document::{
    DocumentBody, DocumentId, DocumentStore, RemoteDocument, Revision, RevisionStream,
    StoreError, StoreResult,
};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use memory::{InMemoryDocumentStore, WriteRecord};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
