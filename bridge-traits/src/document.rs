//! Revision-tracked document store contract.
//!
//! A store keeps JSON documents addressed by id. Every accepted write yields a
//! new opaque [`Revision`]; a write naming a stale revision is rejected with
//! [`StoreError::Conflict`]. Stores also expose a change feed that yields the
//! new revision whenever any writer updates a document.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::error::BridgeError;

/// JSON object body of a document, without store metadata.
pub type DocumentBody = serde_json::Map<String, serde_json::Value>;

/// Prefix the store reserves for metadata fields (`_id`, `_rev`, ...).
pub const RESERVED_PREFIX: char = '_';

/// Whether a top-level document key belongs to the store rather than to the
/// document content.
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIX)
}

/// Remove store metadata fields from a document body in place.
pub fn strip_reserved_fields(body: &mut DocumentBody) {
    body.retain(|key, _| !is_reserved_key(key));
}

/// Store-level document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque revision token assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision(String);

impl Revision {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fetched document with its current revision.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    pub id: DocumentId,
    pub revision: Revision,
    pub body: DocumentBody,
}

/// Failures reported by a [`DocumentStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The supplied revision is not the document's current revision.
    #[error("Revision conflict")]
    Conflict,

    #[error("Document not found")]
    NotFound,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid store response: {0}")]
    InvalidResponse(String),
}

impl StoreError {
    /// Conflicts and missing documents are answers; everything else means
    /// the store could not be reached or understood.
    pub fn is_transport(&self) -> bool {
        matches!(self, StoreError::Transport(_) | StoreError::InvalidResponse(_))
    }
}

impl From<BridgeError> for StoreError {
    fn from(error: BridgeError) -> Self {
        StoreError::Transport(error.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Change feed for one document. Dropping the stream unsubscribes.
///
/// The stream yields an `Err` when the subscription breaks and ends right
/// after it.
pub type RevisionStream = BoxStream<'static, StoreResult<Revision>>;

/// Remote, revision-tracked document store.
///
/// # Example
///
/// ```ignore
/// let doc = store.fetch(&id).await?;
/// let next = store.write(&id, Some(&doc.revision), &doc.body).await?;
/// ```
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the document body and its current revision.
    async fn fetch(&self, id: &DocumentId) -> StoreResult<RemoteDocument>;

    /// Write `body` if `revision` is still current (or if the document does
    /// not exist and `revision` is `None`). Returns the new revision.
    async fn write(
        &self,
        id: &DocumentId,
        revision: Option<&Revision>,
        body: &DocumentBody,
    ) -> StoreResult<Revision>;

    /// Current revision without transferring the body.
    async fn head_revision(&self, id: &DocumentId) -> StoreResult<Revision>;

    /// Subscribe to revision changes of one document.
    async fn subscribe(&self, id: &DocumentId) -> StoreResult<RevisionStream>;
}
