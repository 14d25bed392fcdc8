//! In-memory [`DocumentStore`] for tests and offline development.
//!
//! Behaves like a revisioned store: every accepted write bumps the revision
//! and is announced on the change feed (including the writer's own writes).
//! Failures can be scripted per operation, and fetches or writes can be
//! paused to hold one in flight.

use async_trait::async_trait;
use futures::stream;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::{broadcast, watch};

use crate::document::{
    strip_reserved_fields, DocumentBody, DocumentId, DocumentStore, RemoteDocument, Revision,
    RevisionStream, StoreError, StoreResult,
};

type FeedItem = (DocumentId, StoreResult<Revision>);

/// A write accepted by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    pub document_id: DocumentId,
    pub base_revision: Option<Revision>,
    pub new_revision: Revision,
    pub body: DocumentBody,
}

#[derive(Debug, Default)]
struct ScriptedFailures {
    fetch: u32,
    write: u32,
    conflict: u32,
    head: u32,
    subscribe: u32,
}

impl ScriptedFailures {
    fn take(counter: &mut u32) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
struct StoredDocument {
    sequence: u64,
    revision: Revision,
    body: DocumentBody,
}

#[derive(Debug, Default)]
struct MemoryState {
    documents: HashMap<DocumentId, StoredDocument>,
    accepted: Vec<WriteRecord>,
    write_attempts: usize,
    fetch_count: usize,
    head_count: usize,
    subscribe_count: usize,
    failures: ScriptedFailures,
}

/// Revisioned document store kept in process memory.
#[derive(Debug)]
pub struct InMemoryDocumentStore {
    state: Mutex<MemoryState>,
    feed: broadcast::Sender<FeedItem>,
    fetches_paused: watch::Sender<bool>,
    writes_paused: watch::Sender<bool>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(256);
        let (fetches_paused, _) = watch::channel(false);
        let (writes_paused, _) = watch::channel(false);
        Self {
            state: Mutex::new(MemoryState::default()),
            feed,
            fetches_paused,
            writes_paused,
        }
    }

    /// Seed a document at its first revision.
    pub fn with_document(self, id: DocumentId, body: DocumentBody) -> Self {
        {
            let mut state = self.lock();
            Self::store(&mut state, &id, body);
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store(state: &mut MemoryState, id: &DocumentId, mut body: DocumentBody) -> Revision {
        strip_reserved_fields(&mut body);
        let sequence = state
            .documents
            .get(id)
            .map(|doc| doc.sequence + 1)
            .unwrap_or(1);
        let revision = Revision::new(format!("{}-mem", sequence));
        state.documents.insert(
            id.clone(),
            StoredDocument {
                sequence,
                revision: revision.clone(),
                body,
            },
        );
        revision
    }

    fn announce(&self, id: &DocumentId, item: StoreResult<Revision>) {
        // No subscribers is fine.
        self.feed.send((id.clone(), item)).ok();
    }

    /// Simulate another device replacing the document.
    pub fn put_remote(&self, id: &DocumentId, body: DocumentBody) -> Revision {
        let revision = {
            let mut state = self.lock();
            Self::store(&mut state, id, body)
        };
        self.announce(id, Ok(revision.clone()));
        revision
    }

    pub fn document(&self, id: &DocumentId) -> Option<RemoteDocument> {
        self.lock().documents.get(id).map(|doc| RemoteDocument {
            id: id.clone(),
            revision: doc.revision.clone(),
            body: doc.body.clone(),
        })
    }

    pub fn accepted_writes(&self) -> Vec<WriteRecord> {
        self.lock().accepted.clone()
    }

    pub fn write_attempts(&self) -> usize {
        self.lock().write_attempts
    }

    pub fn fetch_count(&self) -> usize {
        self.lock().fetch_count
    }

    pub fn head_count(&self) -> usize {
        self.lock().head_count
    }

    pub fn subscribe_count(&self) -> usize {
        self.lock().subscribe_count
    }

    pub fn fail_next_fetches(&self, count: u32) {
        self.lock().failures.fetch = count;
    }

    pub fn fail_next_writes(&self, count: u32) {
        self.lock().failures.write = count;
    }

    /// Reject the next writes with a conflict regardless of revision.
    pub fn conflict_next_writes(&self, count: u32) {
        self.lock().failures.conflict = count;
    }

    pub fn fail_next_heads(&self, count: u32) {
        self.lock().failures.head = count;
    }

    pub fn fail_next_subscribes(&self, count: u32) {
        self.lock().failures.subscribe = count;
    }

    /// Break every open change feed for `id`.
    pub fn break_feeds(&self, id: &DocumentId) {
        self.announce(id, Err(StoreError::Transport("feed interrupted".into())));
    }

    /// Hold fetches at the door until [`resume_fetches`](Self::resume_fetches).
    pub fn pause_fetches(&self) {
        self.fetches_paused.send_replace(true);
    }

    pub fn resume_fetches(&self) {
        self.fetches_paused.send_replace(false);
    }

    /// Hold writes at the door until [`resume_writes`](Self::resume_writes).
    pub fn pause_writes(&self) {
        self.writes_paused.send_replace(true);
    }

    pub fn resume_writes(&self) {
        self.writes_paused.send_replace(false);
    }

    async fn wait_for_gate(gate: &watch::Sender<bool>) {
        let mut paused = gate.subscribe();
        // The sender lives in `self`, so `wait_for` only fails after drop.
        paused.wait_for(|paused| !*paused).await.ok();
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn fetch(&self, id: &DocumentId) -> StoreResult<RemoteDocument> {
        {
            self.lock().fetch_count += 1;
        }
        Self::wait_for_gate(&self.fetches_paused).await;

        let mut state = self.lock();
        if ScriptedFailures::take(&mut state.failures.fetch) {
            return Err(StoreError::Transport("scripted fetch failure".into()));
        }
        state
            .documents
            .get(id)
            .map(|doc| RemoteDocument {
                id: id.clone(),
                revision: doc.revision.clone(),
                body: doc.body.clone(),
            })
            .ok_or(StoreError::NotFound)
    }

    async fn write(
        &self,
        id: &DocumentId,
        revision: Option<&Revision>,
        body: &DocumentBody,
    ) -> StoreResult<Revision> {
        {
            self.lock().write_attempts += 1;
        }
        Self::wait_for_gate(&self.writes_paused).await;

        let new_revision = {
            let mut state = self.lock();
            if ScriptedFailures::take(&mut state.failures.write) {
                return Err(StoreError::Transport("scripted write failure".into()));
            }
            if ScriptedFailures::take(&mut state.failures.conflict) {
                return Err(StoreError::Conflict);
            }
            let current = state.documents.get(id).map(|doc| doc.revision.clone());
            if current.as_ref() != revision {
                return Err(StoreError::Conflict);
            }
            let new_revision = Self::store(&mut state, id, body.clone());
            state.accepted.push(WriteRecord {
                document_id: id.clone(),
                base_revision: revision.cloned(),
                new_revision: new_revision.clone(),
                body: body.clone(),
            });
            new_revision
        };

        self.announce(id, Ok(new_revision.clone()));
        Ok(new_revision)
    }

    async fn head_revision(&self, id: &DocumentId) -> StoreResult<Revision> {
        let mut state = self.lock();
        state.head_count += 1;
        if ScriptedFailures::take(&mut state.failures.head) {
            return Err(StoreError::Transport("scripted head failure".into()));
        }
        state
            .documents
            .get(id)
            .map(|doc| doc.revision.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn subscribe(&self, id: &DocumentId) -> StoreResult<RevisionStream> {
        {
            let mut state = self.lock();
            state.subscribe_count += 1;
            if ScriptedFailures::take(&mut state.failures.subscribe) {
                return Err(StoreError::Transport("scripted subscribe failure".into()));
            }
        }

        let receiver = self.feed.subscribe();
        let target = id.clone();
        let feed = stream::unfold(Some(receiver), move |receiver| {
            let target = target.clone();
            async move {
                let mut receiver = receiver?;
                loop {
                    match receiver.recv().await {
                        Ok((id, item)) if id == target => {
                            return match item {
                                Ok(revision) => Some((Ok(revision), Some(receiver))),
                                Err(error) => Some((Err(error), None)),
                            };
                        }
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });
        Ok(Box::pin(feed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn body(value: serde_json::Value) -> DocumentBody {
        value.as_object().cloned().unwrap()
    }

    fn doc_id() -> DocumentId {
        DocumentId::new("videos")
    }

    #[tokio::test]
    async fn test_write_requires_current_revision() {
        let store = InMemoryDocumentStore::new().with_document(doc_id(), body(json!({})));
        let current = store.head_revision(&doc_id()).await.unwrap();

        let next = store
            .write(&doc_id(), Some(&current), &body(json!({"Favorites": {}})))
            .await
            .unwrap();
        assert_ne!(next, current);

        let stale = store
            .write(&doc_id(), Some(&current), &body(json!({})))
            .await;
        assert_eq!(stale, Err(StoreError::Conflict));
        assert_eq!(store.accepted_writes().len(), 1);
        assert_eq!(store.write_attempts(), 2);
    }

    #[tokio::test]
    async fn test_missing_document() {
        let store = InMemoryDocumentStore::new();
        assert_eq!(store.fetch(&doc_id()).await, Err(StoreError::NotFound));
        assert_eq!(store.head_revision(&doc_id()).await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_feed_reports_writes_and_ends_after_error() {
        let store = InMemoryDocumentStore::new().with_document(doc_id(), body(json!({})));
        let mut feed = store.subscribe(&doc_id()).await.unwrap();

        let revision = store.put_remote(&doc_id(), body(json!({"a": null})));
        store.put_remote(&DocumentId::new("other"), body(json!({})));
        store.break_feeds(&doc_id());

        assert_eq!(feed.next().await, Some(Ok(revision)));
        assert!(matches!(feed.next().await, Some(Err(StoreError::Transport(_)))));
        assert_eq!(feed.next().await, None);
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed() {
        let store = InMemoryDocumentStore::new().with_document(doc_id(), body(json!({})));
        store.fail_next_fetches(1);

        assert!(store.fetch(&doc_id()).await.unwrap_err().is_transport());
        assert!(store.fetch(&doc_id()).await.is_ok());
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_reserved_fields_are_not_stored() {
        let store = InMemoryDocumentStore::new()
            .with_document(doc_id(), body(json!({"_rev": "9-x", "Favorites": {}})));
        let doc = store.document(&doc_id()).unwrap();
        assert!(!doc.body.contains_key("_rev"));
        assert_eq!(doc.revision.as_str(), "1-mem");
    }
}
