//! Long-poll `_changes` feed for a single document.
//!
//! Each poll asks the server for changes since the last sequence seen,
//! starting at `now`. The server holds the request open until something
//! changes or the long-poll timeout elapses; an empty reply just starts the
//! next poll. The stream yields one `Err` and ends on the first failure.

use bridge_traits::http::HttpMethod;
use bridge_traits::{DocumentId, Revision, RevisionStream, StoreError};
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

use crate::connector::{status_error, CouchDocumentStore};
use crate::error::{CouchDbError, Result};
use crate::types::ChangesResponse;

/// Sequence that starts the feed at the current end of the database.
const SINCE_NOW: &str = "now";

/// Extra time the client waits beyond the server's long-poll timeout.
const LONGPOLL_GRACE: Duration = Duration::from_secs(10);

struct FeedState {
    store: CouchDocumentStore,
    document: DocumentId,
    since: String,
    pending: VecDeque<Revision>,
    finished: bool,
}

impl FeedState {
    fn changes_url(&self) -> String {
        let config = self.store.config();
        let doc_ids = serde_json::Value::from(vec![self.document.as_str()]).to_string();
        format!(
            "{}/_changes?feed=longpoll&since={}&filter=_doc_ids&doc_ids={}&timeout={}",
            config.database_url(),
            urlencoding::encode(&self.since),
            urlencoding::encode(&doc_ids),
            config.longpoll_timeout.as_millis()
        )
    }

    /// Run one long-poll and queue the revisions it reports.
    async fn poll(&mut self) -> Result<()> {
        let timeout = self.store.config().longpoll_timeout + LONGPOLL_GRACE;
        let request = self
            .store
            .request(HttpMethod::Get, self.changes_url())
            .timeout(timeout);
        let response = self.store.http_client().execute(request).await?;
        if response.status != 200 {
            return Err(status_error(&response, "_changes"));
        }

        let changes: ChangesResponse = serde_json::from_slice(&response.body)
            .map_err(|e| CouchDbError::ParseError(e.to_string()))?;
        self.since = changes.resume_token();

        for row in changes.results {
            if row.id != self.document.as_str() {
                continue;
            }
            if let Some(change) = row.changes.into_iter().next() {
                debug!(document = %self.document, revision = %change.rev, deleted = row.deleted, "Change reported");
                self.pending.push_back(Revision::new(change.rev));
            }
        }
        Ok(())
    }
}

/// Change feed for `document`. Dropping the stream abandons the open poll.
pub fn revision_feed(store: CouchDocumentStore, document: DocumentId) -> RevisionStream {
    let state = FeedState {
        store,
        document,
        since: SINCE_NOW.to_string(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }
            if let Some(revision) = state.pending.pop_front() {
                return Some((Ok(revision), state));
            }
            if let Err(error) = state.poll().await {
                warn!(document = %state.document, error = %error, "Change feed failed");
                state.finished = true;
                return Some((Err(StoreError::from(error)), state));
            }
        }
    })
    .boxed()
}
