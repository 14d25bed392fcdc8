//! Login and logout wiring.

use bridge_traits::DocumentId;
use core_library::{LibraryIndex, SharedLibrary};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, SessionEvent};
use core_sync::{ChangeListener, DocumentSyncEngine, ListenerHandle, SessionEpochs};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{CoreError, Result};
use crate::session::{LoginContext, SessionHandle};

struct ActiveSession {
    handle: SessionHandle,
    listener: ListenerHandle,
}

/// Entry point for hosts.
///
/// Owns the library, the event bus and the session counter. Each login
/// starts a sync engine and a change listener bound to a fresh session
/// epoch; logout ends the epoch and tears both down.
pub struct CoreService {
    config: CoreConfig,
    events: EventBus,
    epochs: SessionEpochs,
    library: SharedLibrary,
    active: Mutex<Option<ActiveSession>>,
}

impl CoreService {
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] if `config` does not validate.
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;
        let events = EventBus::new(config.event_buffer_size);
        let library = LibraryIndex::new(Arc::clone(&config.clock)).with_event_bus(events.clone());

        Ok(Self {
            config,
            events,
            epochs: SessionEpochs::new(),
            library: Arc::new(Mutex::new(library)),
            active: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn library(&self) -> SharedLibrary {
        Arc::clone(&self.library)
    }

    /// Start syncing the user's library document.
    ///
    /// An active session is logged out first.
    pub async fn login(&self, context: LoginContext) -> Result<SessionHandle> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            self.teardown(previous).await;
        }

        let guard = self.epochs.begin();
        let document_id = DocumentId::new(self.config.document_name.clone());
        info!(user = %context.user_id, epoch = guard.epoch(), document = %document_id, "Logging in");

        let engine = DocumentSyncEngine::new(
            Arc::clone(&context.store),
            document_id,
            self.library.clone(),
        )
        .with_config(self.config.sync.clone())
        .with_event_bus(self.events.clone())
        .with_session(guard.clone())
        .spawn();
        self.library.lock().await.connect(Arc::new(engine.clone()));

        let listener = ChangeListener::new(context.store, engine.clone())
            .with_event_bus(self.events.clone())
            .with_resubscribe_delay(self.config.sync.resubscribe_delay)
            .with_session(guard.clone())
            .spawn();

        let handle = SessionHandle::new(
            context.user_id.clone(),
            guard.clone(),
            engine,
            self.library.clone(),
        );
        *active = Some(ActiveSession {
            handle: handle.clone(),
            listener,
        });

        self.events
            .emit(CoreEvent::Session(SessionEvent::SignedIn {
                user_id: context.user_id,
                epoch: guard.epoch(),
            }))
            .ok();
        Ok(handle)
    }

    /// End the active session. Returns `false` if nobody was signed in.
    pub async fn logout(&self) -> bool {
        let session = self.active.lock().await.take();
        match session {
            Some(session) => {
                self.teardown(session).await;
                true
            }
            None => false,
        }
    }

    /// Handle of the active session.
    pub async fn session(&self) -> Result<SessionHandle> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|session| session.handle.clone())
            .ok_or(CoreError::NotSignedIn)
    }

    async fn teardown(&self, session: ActiveSession) {
        let ActiveSession { handle, listener } = session;

        // Late results check the epoch, so end it before anything else.
        self.epochs.end();
        listener.stop().await;
        handle.engine().shutdown().await;

        {
            let mut library = self.library.lock().await;
            library.disconnect();
            library.reset();
        }

        info!(user = %handle.user_id(), epoch = handle.epoch(), "Logged out");
        self.events
            .emit(CoreEvent::Session(SessionEvent::SignedOut {
                user_id: handle.user_id().to_string(),
                epoch: handle.epoch(),
            }))
            .ok();
    }
}
