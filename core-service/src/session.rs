//! Per-login handles.

use bridge_traits::DocumentStore;
use core_library::SharedLibrary;
use core_sync::{EngineHandle, SessionGuard, SyncError, SyncStatus};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// What a login needs: who signed in and where their library document lives.
#[derive(Clone)]
pub struct LoginContext {
    pub user_id: String,
    pub store: Arc<dyn DocumentStore>,
}

impl LoginContext {
    pub fn new(user_id: impl Into<String>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            user_id: user_id.into(),
            store,
        }
    }
}

impl fmt::Debug for LoginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginContext")
            .field("user_id", &self.user_id)
            .field("store", &"DocumentStore { ... }")
            .finish()
    }
}

/// Handle to one login session.
///
/// Stays valid after logout, but reports itself inactive and refuses new
/// sync requests.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    user_id: String,
    guard: SessionGuard,
    engine: EngineHandle,
    library: SharedLibrary,
}

impl SessionHandle {
    pub(crate) fn new(
        user_id: String,
        guard: SessionGuard,
        engine: EngineHandle,
        library: SharedLibrary,
    ) -> Self {
        Self {
            user_id,
            guard,
            engine,
            library,
        }
    }

    pub(crate) fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn epoch(&self) -> u64 {
        self.guard.epoch()
    }

    pub fn is_active(&self) -> bool {
        self.guard.is_current()
    }

    /// The live library. Edits made through it are synced while the session
    /// is active.
    pub fn library(&self) -> SharedLibrary {
        Arc::clone(&self.library)
    }

    pub fn status(&self) -> SyncStatus {
        self.engine.status()
    }

    /// Ask the engine to compare the remote head with its revision.
    pub fn refresh(&self) -> Result<()> {
        if !self.is_active() {
            return Err(SyncError::SessionExpired {
                epoch: self.epoch(),
            }
            .into());
        }
        self.engine.refresh()?;
        Ok(())
    }

    pub async fn wait_until_settled(&self) -> SyncStatus {
        self.engine.wait_until_settled().await
    }
}
