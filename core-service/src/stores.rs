//! Document store constructors for the enabled providers.

use bridge_traits::DocumentStore;
use std::sync::Arc;

#[cfg(feature = "couchdb")]
use bridge_traits::{HttpClient, StoreError};
#[cfg(feature = "couchdb")]
use provider_couchdb::{CouchConfig, CouchDocumentStore};

#[cfg(feature = "couchdb")]
use crate::error::Result;

/// CouchDB-backed store over a host-provided HTTP client.
#[cfg(feature = "couchdb")]
pub fn couchdb_store(
    http_client: Arc<dyn HttpClient>,
    config: CouchConfig,
) -> Result<Arc<dyn DocumentStore>> {
    let store = CouchDocumentStore::new(http_client, config).map_err(StoreError::from)?;
    Ok(Arc::new(store))
}

/// CouchDB-backed store using the reqwest client from `bridge-desktop`.
#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub fn desktop_couchdb_store(config: CouchConfig) -> Result<Arc<dyn DocumentStore>> {
    let http_client = bridge_desktop::ReqwestHttpClient::new()?;
    couchdb_store(Arc::new(http_client), config)
}

/// Process-local store, for offline use and tests.
pub fn in_memory_store() -> Arc<dyn DocumentStore> {
    Arc::new(bridge_traits::InMemoryDocumentStore::new())
}
