use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core configuration invalid: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("No library session is active")]
    NotSignedIn,

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Document store error: {0}")]
    Store(#[from] bridge_traits::StoreError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
