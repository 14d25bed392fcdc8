use bridge_traits::StoreError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Sync engine for document {document_id} has stopped")]
    EngineStopped { document_id: String },

    #[error("Session {epoch} is no longer active")]
    SessionExpired { epoch: u64 },

    #[error("Gave up after {attempts} write conflicts")]
    ConflictsExhausted { attempts: u32 },

    #[error("Sync task failed: {0}")]
    TaskFailed(String),
}

impl SyncError {
    /// Whether a later trigger (edit, reconnection, notification) can succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SyncError::Store(StoreError::NotFound) => false,
            SyncError::Store(StoreError::InvalidResponse(_)) => false,
            SyncError::Store(_) => true,
            SyncError::Library(_) => false,
            SyncError::EngineStopped { .. } | SyncError::SessionExpired { .. } => false,
            SyncError::ConflictsExhausted { .. } | SyncError::TaskFailed(_) => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(SyncError::from(StoreError::Transport("reset".into())).is_recoverable());
        assert!(SyncError::ConflictsExhausted { attempts: 8 }.is_recoverable());
        assert!(!SyncError::from(StoreError::NotFound).is_recoverable());
        assert!(!SyncError::from(LibraryError::MalformedDocument {
            path: "Mix".into(),
            reason: "bad".into()
        })
        .is_recoverable());
    }
}
