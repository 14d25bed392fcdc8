//! # Change Listener
//!
//! Subscribes to the store's change feed for one document and forwards each
//! announced revision to the engine.
//!
//! When the feed fails or ends, the listener reports degraded connectivity,
//! waits the configured delay and subscribes again. The first successful
//! resubscription after a failure reports the connection as restored and
//! asks the engine to resume, which re-checks the head revision and flushes
//! any write that was paused.

use bridge_traits::{DocumentId, DocumentStore, RevisionStream};
use core_runtime::events::{ConnectivityEvent, CoreEvent, EventBus, UserNotification};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{EngineHandle, CONNECTION_PROBLEM_MESSAGE};
use crate::session::SessionGuard;

/// Why a subscription stopped delivering.
enum FeedEnd {
    Failed(String),
    Ended,
    Cancelled,
    EngineGone,
}

/// Configures and starts a change listener.
pub struct ChangeListener {
    store: Arc<dyn DocumentStore>,
    document_id: DocumentId,
    engine: EngineHandle,
    events: EventBus,
    resubscribe_delay: Duration,
    session: SessionGuard,
}

impl ChangeListener {
    pub fn new(store: Arc<dyn DocumentStore>, engine: EngineHandle) -> Self {
        Self {
            store,
            document_id: engine.document_id().clone(),
            engine,
            events: EventBus::default(),
            resubscribe_delay: Duration::from_secs(5),
            session: SessionGuard::detached(),
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_resubscribe_delay(mut self, delay: Duration) -> Self {
        self.resubscribe_delay = delay;
        self
    }

    pub fn with_session(mut self, session: SessionGuard) -> Self {
        self.session = session;
        self
    }

    /// Start listening. Must be called from within a Tokio runtime.
    pub fn spawn(self) -> ListenerHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        ListenerHandle { cancel, task }
    }

    async fn run(self, cancel: CancellationToken) {
        // Every subscription after the first follows a failed feed.
        let mut resubscribing = false;

        loop {
            if cancel.is_cancelled() || !self.session.is_current() {
                break;
            }

            let end = match self.store.subscribe(&self.document_id).await {
                Ok(feed) => {
                    info!(document = %self.document_id, "Subscribed to change feed");
                    if resubscribing {
                        self.restored();
                    }
                    self.forward(feed, &cancel).await
                }
                Err(error) => FeedEnd::Failed(error.to_string()),
            };

            match end {
                FeedEnd::Cancelled | FeedEnd::EngineGone => break,
                FeedEnd::Failed(reason) => {
                    warn!(document = %self.document_id, error = %reason, "Change feed failed");
                }
                FeedEnd::Ended => {
                    warn!(document = %self.document_id, "Change feed ended");
                }
            }

            resubscribing = true;
            self.degraded();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.resubscribe_delay) => {}
            }
        }

        debug!(document = %self.document_id, "Change listener stopped");
    }

    async fn forward(
        &self,
        mut feed: RevisionStream,
        cancel: &CancellationToken,
    ) -> FeedEnd {
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return FeedEnd::Cancelled,
                next = feed.next() => next,
            };
            match next {
                Some(Ok(revision)) => {
                    if !self.session.is_current() {
                        return FeedEnd::Cancelled;
                    }
                    debug!(document = %self.document_id, revision = %revision, "Remote change");
                    if self.engine.notify_remote_change(revision).is_err() {
                        return FeedEnd::EngineGone;
                    }
                }
                Some(Err(error)) => return FeedEnd::Failed(error.to_string()),
                None => return FeedEnd::Ended,
            }
        }
    }

    fn degraded(&self) {
        self.events
            .emit(CoreEvent::Connectivity(ConnectivityEvent::Degraded {
                document_id: self.document_id.to_string(),
                retry_in_secs: self.resubscribe_delay.as_secs(),
            }))
            .ok();
        self.events
            .emit(CoreEvent::Notification(UserNotification::new(
                CONNECTION_PROBLEM_MESSAGE,
            )))
            .ok();
    }

    fn restored(&self) {
        info!(document = %self.document_id, "Change feed restored");
        self.events
            .emit(CoreEvent::Connectivity(ConnectivityEvent::Restored {
                document_id: self.document_id.to_string(),
            }))
            .ok();
        if let Err(error) = self.engine.connectivity_restored() {
            debug!(error = %error, "Engine gone before reconnection");
        }
    }
}

/// Running listener.
#[derive(Debug)]
pub struct ListenerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop listening and wait for the task to end.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(error) = self.task.await {
            warn!(error = %error, "Change listener task ended abnormally");
        }
    }
}
