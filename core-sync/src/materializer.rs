//! Seam between the engine and the live library.

use async_trait::async_trait;
use core_library::{LibraryDocument, LibraryIndex, LibrarySnapshot};
use tokio::sync::Mutex;

/// Merges a first-loaded document into the live library.
#[async_trait]
pub trait DocumentMaterializer: Send + Sync {
    /// Merge `document` and return the library as it stands afterwards.
    async fn materialize(&self, document: &LibraryDocument) -> LibrarySnapshot;
}

#[async_trait]
impl DocumentMaterializer for Mutex<LibraryIndex> {
    async fn materialize(&self, document: &LibraryDocument) -> LibrarySnapshot {
        let mut index = self.lock().await;
        index.materialize(document);
        index.render()
    }
}
