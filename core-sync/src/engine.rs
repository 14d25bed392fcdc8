//! # Document Sync Engine
//!
//! Keeps one remote document in step with the local library under
//! optimistic concurrency.
//!
//! ## Overview
//!
//! The engine runs as a single task that owns all sync state. Hosts talk to
//! it through a cloneable [`EngineHandle`]:
//!
//! - local edits arrive as full [`LibrarySnapshot`]s (the handle is the
//!   library's [`SnapshotSink`]),
//! - the change listener forwards remote revisions,
//! - reconnection and refresh requests trigger a head-revision check.
//!
//! At most one network operation is in flight. Each operation carries the
//! context its continuation needs, and its result is applied by the task
//! that owns the state, so no two continuations ever race.
//!
//! ## Write path
//!
//! Edits are coalesced: while a write is in flight only the newest snapshot
//! is kept and sent once the write completes. No write goes out before the
//! first fetch has been merged into the library. On a conflict the engine
//! backs off, refreshes the head revision and re-sends the same body, up to
//! the configured retry bound. Transport failures keep the snapshot pending
//! and pause writing until the next edit, reconnection or remote change.
//!
//! ## Read path
//!
//! The first successful fetch is materialized into the library; if the
//! merged library differs from the remote document it is written back.
//! Later fetches only refresh the revision and flush pending edits. A
//! notification for the revision the engine already holds is ignored.
//!
//! ## Usage
//!
//! ```no_run
//! use bridge_traits::{DocumentId, InMemoryDocumentStore, SystemClock};
//! use core_library::LibraryIndex;
//! use core_sync::DocumentSyncEngine;
//! use std::sync::Arc;
//! use tokio::sync::Mutex;
//!
//! # async fn example() {
//! let library = Arc::new(Mutex::new(LibraryIndex::new(Arc::new(SystemClock))));
//! let store = Arc::new(InMemoryDocumentStore::new());
//! let engine = DocumentSyncEngine::new(store, DocumentId::new("videos"), library.clone())
//!     .spawn();
//! library.lock().await.connect(Arc::new(engine.clone()));
//!
//! let status = engine.wait_until_settled().await;
//! println!("synced at {:?}", status.revision);
//! # }
//! ```

use bridge_traits::{
    DocumentId, DocumentStore, RemoteDocument, Revision, StoreError, StoreResult,
};
use core_library::{LibraryDocument, LibrarySnapshot, SnapshotSink};
use core_runtime::config::SyncConfig;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent, UserNotification};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::error::{Result, SyncError};
use crate::materializer::DocumentMaterializer;
use crate::session::SessionGuard;
use crate::state::{SyncPhase, SyncState, SyncStatus};

/// Shown to the user whenever the sync server cannot be reached.
pub const CONNECTION_PROBLEM_MESSAGE: &str = "Connection problem to the sync server.";

// ============================================================================
// Commands and operations
// ============================================================================

#[derive(Debug)]
enum Command {
    Submit(LibrarySnapshot),
    RemoteChanged(Revision),
    Refresh,
    ConnectivityRestored,
    Shutdown,
}

/// The in-flight network operation and the context its continuation needs.
#[derive(Debug)]
enum Operation {
    Fetch,
    /// Delay, then head revision, then fetch again.
    FetchRetry,
    HeadCheck,
    Write {
        body: LibrarySnapshot,
        conflicts: u32,
    },
    /// Backoff, then head revision, then re-send `body`.
    ConflictRecovery {
        body: LibrarySnapshot,
        conflicts: u32,
    },
}

impl Operation {
    fn phase(&self) -> SyncPhase {
        match self {
            Operation::Fetch => SyncPhase::Fetching,
            Operation::FetchRetry => SyncPhase::RetryingFetch,
            Operation::HeadCheck => SyncPhase::CheckingHead,
            Operation::Write { .. } => SyncPhase::Writing,
            Operation::ConflictRecovery { .. } => SyncPhase::ConflictRecovering,
        }
    }

    fn into_body(self) -> Option<LibrarySnapshot> {
        match self {
            Operation::Write { body, .. } | Operation::ConflictRecovery { body, .. } => Some(body),
            _ => None,
        }
    }
}

#[derive(Debug)]
enum Outcome {
    Fetched(StoreResult<RemoteDocument>),
    Head(StoreResult<Revision>),
    Written(StoreResult<Revision>),
}

struct InFlight {
    operation: Operation,
    task: JoinHandle<Outcome>,
}

enum Step {
    Completed(std::result::Result<Outcome, JoinError>),
    Command(Option<Command>),
}

// ============================================================================
// Engine
// ============================================================================

/// Configures and starts a sync engine for one document.
pub struct DocumentSyncEngine {
    store: Arc<dyn DocumentStore>,
    document_id: DocumentId,
    materializer: Arc<dyn DocumentMaterializer>,
    config: SyncConfig,
    events: EventBus,
    session: SessionGuard,
}

impl DocumentSyncEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        document_id: DocumentId,
        materializer: Arc<dyn DocumentMaterializer>,
    ) -> Self {
        Self {
            store,
            document_id,
            materializer,
            config: SyncConfig::default(),
            events: EventBus::default(),
            session: SessionGuard::detached(),
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Bind the engine to a login session; it stops once the session ends.
    pub fn with_session(mut self, session: SessionGuard) -> Self {
        self.session = session;
        self
    }

    /// Start the engine task. The first fetch is issued immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self) -> EngineHandle {
        let (commands, inbox) = mpsc::unbounded_channel();
        let (status, status_rx) = watch::channel(SyncStatus::starting(
            self.document_id.clone(),
            self.session.epoch(),
        ));
        let document_id = self.document_id.clone();

        let actor = EngineActor {
            store: self.store,
            document_id: self.document_id,
            materializer: self.materializer,
            config: self.config,
            events: self.events,
            session: self.session,
            state: SyncState::new(),
            in_flight: None,
            status,
            processed: 0,
        };
        let task = tokio::spawn(actor.run(inbox));

        EngineHandle {
            inner: Arc::new(HandleInner {
                document_id,
                commands,
                status: status_rx,
                sent: AtomicU64::new(0),
                task: Mutex::new(Some(task)),
            }),
        }
    }
}

struct EngineActor {
    store: Arc<dyn DocumentStore>,
    document_id: DocumentId,
    materializer: Arc<dyn DocumentMaterializer>,
    config: SyncConfig,
    events: EventBus,
    session: SessionGuard,
    state: SyncState,
    in_flight: Option<InFlight>,
    status: watch::Sender<SyncStatus>,
    processed: u64,
}

impl EngineActor {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Command>) {
        info!(
            document = %self.document_id,
            epoch = self.session.epoch(),
            "Sync engine started"
        );
        self.drive();
        self.publish();

        loop {
            let step = tokio::select! {
                result = Self::next_completion(&mut self.in_flight) => Step::Completed(result),
                command = inbox.recv() => Step::Command(command),
            };

            match step {
                Step::Completed(result) => {
                    let Some(InFlight { operation, .. }) = self.in_flight.take() else {
                        continue;
                    };
                    if !self.session.is_current() {
                        debug!(
                            document = %self.document_id,
                            phase = %operation.phase(),
                            "Dropping result from an ended session"
                        );
                        break;
                    }
                    match result {
                        Ok(outcome) => self.complete(operation, outcome).await,
                        Err(join_error) => self.abandon(operation, join_error.to_string()),
                    }
                }
                Step::Command(None) => break,
                Step::Command(Some(Command::Shutdown)) => {
                    self.processed += 1;
                    break;
                }
                Step::Command(Some(command)) => {
                    self.processed += 1;
                    self.handle(command);
                }
            }

            if !self.session.is_current() {
                break;
            }
            self.drive();
            self.publish();
        }

        // Dropping the in-flight task handle detaches it; its result is never applied.
        self.in_flight = None;
        let processed = self.processed;
        self.status.send_modify(|status| {
            status.phase = SyncPhase::Stopped;
            status.settled = true;
            status.processed_commands = processed;
        });
        info!(document = %self.document_id, "Sync engine stopped");
    }

    async fn next_completion(
        in_flight: &mut Option<InFlight>,
    ) -> std::result::Result<Outcome, JoinError> {
        match in_flight {
            Some(current) => (&mut current.task).await,
            None => std::future::pending().await,
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Submit(snapshot) => {
                if !self.state.record_pending(snapshot) {
                    debug!(document = %self.document_id, "Skipping snapshot rendered before the first load");
                }
            }
            Command::RemoteChanged(revision) => {
                if self.in_flight.is_some() {
                    self.state.queued_remote = Some(revision);
                } else {
                    self.consider_remote(revision);
                }
            }
            Command::Refresh => self.state.refresh_requested = true,
            Command::ConnectivityRestored => {
                self.state.suspended = false;
                self.state.refresh_requested = true;
            }
            Command::Shutdown => {}
        }
    }

    fn consider_remote(&mut self, revision: Revision) {
        if !self.state.remote_changed(revision.clone()) {
            debug!(document = %self.document_id, revision = %revision, "Ignoring echo of current revision");
        }
    }

    /// Start the next operation if none is in flight.
    fn drive(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        if let Some(revision) = self.state.queued_remote.take() {
            self.consider_remote(revision);
        }

        if self.state.needs_fetch {
            self.start_fetch();
        } else if self.state.refresh_requested {
            self.state.refresh_requested = false;
            self.start_head_check();
        } else if self.state.can_write() {
            if let Some(body) = self.state.pending.take() {
                self.start_write(body, 0);
            }
        }
    }

    // ------------------------------------------------------------------
    // Starting operations
    // ------------------------------------------------------------------

    fn begin<F>(&mut self, operation: Operation, work: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        debug!(document = %self.document_id, phase = %operation.phase(), "Starting operation");
        self.in_flight = Some(InFlight {
            operation,
            task: tokio::spawn(work),
        });
    }

    fn start_fetch(&mut self) {
        let store = Arc::clone(&self.store);
        let id = self.document_id.clone();
        self.begin(Operation::Fetch, async move {
            Outcome::Fetched(store.fetch(&id).await)
        });
    }

    fn start_fetch_retry(&mut self) {
        let store = Arc::clone(&self.store);
        let id = self.document_id.clone();
        let delay = self.config.fetch_retry_delay;
        self.begin(Operation::FetchRetry, async move {
            tokio::time::sleep(delay).await;
            Outcome::Head(store.head_revision(&id).await)
        });
    }

    fn start_head_check(&mut self) {
        let store = Arc::clone(&self.store);
        let id = self.document_id.clone();
        self.begin(Operation::HeadCheck, async move {
            Outcome::Head(store.head_revision(&id).await)
        });
    }

    fn start_write(&mut self, body: LibrarySnapshot, conflicts: u32) {
        let store = Arc::clone(&self.store);
        let id = self.document_id.clone();
        let revision = self.state.current_revision.clone();
        let payload = body.as_body().clone();
        self.begin(Operation::Write { body, conflicts }, async move {
            Outcome::Written(store.write(&id, revision.as_ref(), &payload).await)
        });
    }

    fn start_conflict_recovery(&mut self, body: LibrarySnapshot, conflicts: u32) {
        let store = Arc::clone(&self.store);
        let id = self.document_id.clone();
        let delay = self
            .config
            .conflict_retry
            .delay_for(conflicts.saturating_sub(1));
        self.begin(
            Operation::ConflictRecovery { body, conflicts },
            async move {
                tokio::time::sleep(delay).await;
                Outcome::Head(store.head_revision(&id).await)
            },
        );
    }

    // ------------------------------------------------------------------
    // Continuations
    // ------------------------------------------------------------------

    async fn complete(&mut self, operation: Operation, outcome: Outcome) {
        match (operation, outcome) {
            (Operation::Fetch, Outcome::Fetched(result)) => self.on_fetched(result).await,
            (Operation::FetchRetry, Outcome::Head(result)) => self.on_fetch_retry_head(result),
            (Operation::HeadCheck, Outcome::Head(result)) => self.on_head_checked(result),
            (Operation::Write { body, conflicts }, Outcome::Written(result)) => {
                self.on_written(body, conflicts, result)
            }
            (Operation::ConflictRecovery { body, conflicts }, Outcome::Head(result)) => {
                self.on_conflict_head(body, conflicts, result)
            }
            (operation, outcome) => {
                error!(
                    phase = %operation.phase(),
                    outcome = ?outcome,
                    "Operation completed with an unexpected outcome"
                );
                self.abandon(operation, "unexpected outcome".to_string());
            }
        }
    }

    async fn on_fetched(&mut self, result: StoreResult<RemoteDocument>) {
        match result {
            Ok(document) => {
                self.state.needs_fetch = false;
                self.state.fetch_attempts = 0;
                self.state.suspended = false;
                self.state.last_error = None;
                self.state.current_revision = Some(document.revision.clone());

                if !self.state.first_load_done {
                    self.load(&document).await;
                }
                debug!(document = %self.document_id, revision = %document.revision, "Fetched document");
                self.emit(SyncEvent::DocumentUpdated {
                    document_id: self.document_id.to_string(),
                    revision: document.revision.to_string(),
                });
            }
            Err(StoreError::NotFound) => {
                self.state.needs_fetch = false;
                self.state.fetch_attempts = 0;
                self.fail(SyncError::Store(StoreError::NotFound));
            }
            Err(error) => self.on_fetch_failed(error),
        }
    }

    /// Merge the first fetched document into the library.
    async fn load(&mut self, document: &RemoteDocument) {
        let parsed = match LibraryDocument::parse(&document.body) {
            Ok(parsed) => parsed,
            Err(error) => {
                self.fail(SyncError::Library(error));
                return;
            }
        };

        let merged = self.materializer.materialize(&parsed).await;
        let remote = parsed.render();
        self.state.loaded_generation = merged.generation();
        self.state.first_load_done = true;
        // Local edits made before the load are part of the merge.
        self.state.pending = (merged != remote).then_some(merged);

        info!(
            document = %self.document_id,
            revision = %document.revision,
            write_back = self.state.pending.is_some(),
            "Loaded library document"
        );
        self.emit(SyncEvent::DocumentLoaded {
            document_id: self.document_id.to_string(),
            revision: document.revision.to_string(),
        });
    }

    fn on_fetch_failed(&mut self, error: StoreError) {
        self.state.fetch_attempts += 1;
        if self.state.fetch_attempts < self.config.max_fetch_attempts {
            warn!(
                document = %self.document_id,
                attempt = self.state.fetch_attempts,
                retry_in_ms = self.config.fetch_retry_delay.as_millis() as u64,
                error = %error,
                "Fetch failed, retrying"
            );
            self.start_fetch_retry();
        } else {
            warn!(
                document = %self.document_id,
                attempts = self.state.fetch_attempts,
                "Giving up on fetch"
            );
            self.state.needs_fetch = false;
            self.state.fetch_attempts = 0;
            self.fail(SyncError::Store(error));
        }
    }

    fn on_fetch_retry_head(&mut self, result: StoreResult<Revision>) {
        match result {
            Ok(revision) if self.state.is_echo(&revision) => {
                debug!(document = %self.document_id, "Document unchanged, skipping fetch retry");
                self.state.needs_fetch = false;
                self.state.fetch_attempts = 0;
            }
            Ok(_) => self.start_fetch(),
            Err(StoreError::NotFound) => {
                self.state.needs_fetch = false;
                self.state.fetch_attempts = 0;
                self.fail(SyncError::Store(StoreError::NotFound));
            }
            Err(error) => self.on_fetch_failed(error),
        }
    }

    fn on_head_checked(&mut self, result: StoreResult<Revision>) {
        match result {
            Ok(revision) if self.state.is_echo(&revision) => {
                debug!(document = %self.document_id, "Document is up to date");
            }
            Ok(revision) => {
                debug!(document = %self.document_id, revision = %revision, "Document moved on");
                self.state.needs_fetch = true;
                self.state.fetch_attempts = 0;
            }
            Err(error) => {
                // Unsent edits stay paused until the next trigger.
                if self.state.pending.is_some() {
                    self.state.suspended = true;
                }
                self.fail(SyncError::Store(error));
            }
        }
    }

    fn on_written(&mut self, body: LibrarySnapshot, conflicts: u32, result: StoreResult<Revision>) {
        match result {
            Ok(revision) => {
                info!(document = %self.document_id, revision = %revision, "Write accepted");
                self.state.current_revision = Some(revision.clone());
                self.state.last_error = None;
                self.emit(SyncEvent::WriteAccepted {
                    document_id: self.document_id.to_string(),
                    revision: revision.to_string(),
                });
            }
            Err(StoreError::Conflict) => self.on_conflict(body, conflicts + 1),
            Err(error) => self.write_failed(body, SyncError::Store(error)),
        }
    }

    fn on_conflict(&mut self, body: LibrarySnapshot, conflicts: u32) {
        if conflicts > self.config.conflict_retry.max_attempts {
            self.write_failed(body, SyncError::ConflictsExhausted { attempts: conflicts });
            return;
        }

        warn!(document = %self.document_id, attempt = conflicts, "Write conflict, refreshing revision");
        self.emit(SyncEvent::ConflictDetected {
            document_id: self.document_id.to_string(),
            attempt: conflicts,
        });
        self.start_conflict_recovery(body, conflicts);
    }

    fn on_conflict_head(
        &mut self,
        body: LibrarySnapshot,
        conflicts: u32,
        result: StoreResult<Revision>,
    ) {
        match result {
            Ok(revision) => {
                self.state.current_revision = Some(revision);
                self.start_write(body, conflicts);
            }
            Err(error) => self.write_failed(body, SyncError::Store(error)),
        }
    }

    /// Keep the unsent snapshot and pause writing until the next trigger.
    fn write_failed(&mut self, body: LibrarySnapshot, error: SyncError) {
        self.state.restore_pending(body);
        self.state.suspended = true;
        self.fail(error);
    }

    fn abandon(&mut self, operation: Operation, reason: String) {
        self.state.needs_fetch = false;
        match operation.into_body() {
            Some(body) => self.write_failed(body, SyncError::TaskFailed(reason)),
            None => self.fail(SyncError::TaskFailed(reason)),
        }
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    fn fail(&mut self, error: SyncError) {
        let recoverable = error.is_recoverable();
        let message = error.to_string();
        warn!(document = %self.document_id, recoverable, "{}", message);

        self.emit(SyncEvent::Failed {
            document_id: self.document_id.to_string(),
            message: message.clone(),
            recoverable,
        });
        if matches!(&error, SyncError::Store(store) if store.is_transport()) {
            self.events
                .emit(CoreEvent::Notification(UserNotification::new(
                    CONNECTION_PROBLEM_MESSAGE,
                )))
                .ok();
        }
        self.state.last_error = Some(message);
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        self.events.emit(CoreEvent::Sync(event)).ok();
    }

    fn publish(&self) {
        let phase = self
            .in_flight
            .as_ref()
            .map_or(SyncPhase::Idle, |current| current.operation.phase());
        self.status.send_replace(SyncStatus {
            document_id: self.document_id.clone(),
            epoch: self.session.epoch(),
            phase,
            revision: self.state.current_revision.clone(),
            has_pending: self.state.pending.is_some(),
            first_load_done: self.state.first_load_done,
            suspended: self.state.suspended,
            settled: self.in_flight.is_none() && self.state.is_quiet(),
            processed_commands: self.processed,
            last_error: self.state.last_error.clone(),
        });
    }
}

// ============================================================================
// Handle
// ============================================================================

struct HandleInner {
    document_id: DocumentId,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SyncStatus>,
    sent: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Cloneable handle to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<HandleInner>,
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("document_id", &self.inner.document_id)
            .field("running", &self.is_running())
            .finish()
    }
}

impl EngineHandle {
    pub fn document_id(&self) -> &DocumentId {
        &self.inner.document_id
    }

    fn send(&self, command: Command) -> Result<()> {
        self.inner.sent.fetch_add(1, Ordering::SeqCst);
        self.inner.commands.send(command).map_err(|_| {
            self.inner.sent.fetch_sub(1, Ordering::SeqCst);
            SyncError::EngineStopped {
                document_id: self.inner.document_id.to_string(),
            }
        })
    }

    /// Record a local snapshot to be written, replacing any pending one.
    pub fn submit_change(&self, snapshot: LibrarySnapshot) -> Result<()> {
        self.send(Command::Submit(snapshot))
    }

    /// The document changed remotely and is now at `revision`.
    pub fn notify_remote_change(&self, revision: Revision) -> Result<()> {
        self.send(Command::RemoteChanged(revision))
    }

    /// Check the head revision and fetch if the document moved on.
    pub fn refresh(&self) -> Result<()> {
        self.send(Command::Refresh)
    }

    /// The change feed is back: resume paused writes after a head check.
    pub fn connectivity_restored(&self) -> Result<()> {
        self.send(Command::ConnectivityRestored)
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.inner.commands.is_closed()
    }

    /// Wait until every command sent so far is handled and nothing is in
    /// flight or due, or until the engine stops.
    pub async fn wait_until_settled(&self) -> SyncStatus {
        let mut status = self.inner.status.clone();
        loop {
            let target = self.inner.sent.load(Ordering::SeqCst);
            {
                let current = status.borrow_and_update();
                if current.phase == SyncPhase::Stopped
                    || (current.settled && current.processed_commands >= target)
                {
                    return current.clone();
                }
            }
            if status.changed().await.is_err() {
                return status.borrow().clone();
            }
        }
    }

    /// Stop the engine. An in-flight request is left to finish on its own and
    /// its result is discarded.
    pub async fn shutdown(&self) {
        self.send(Command::Shutdown).ok();
        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            if let Err(error) = task.await {
                warn!(document = %self.inner.document_id, error = %error, "Sync engine task ended abnormally");
            }
        }
    }
}

impl SnapshotSink for EngineHandle {
    fn library_changed(&self, snapshot: LibrarySnapshot) {
        if let Err(error) = self.submit_change(snapshot) {
            debug!(error = %error, "Dropping library snapshot");
        }
    }
}
