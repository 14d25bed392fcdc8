//! CouchDB document store implementation
//!
//! Implements the `DocumentStore` trait on top of an injected `HttpClient`.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::{
    document::strip_reserved_fields, DocumentBody, DocumentId, DocumentStore, RemoteDocument,
    Revision, RevisionStream, StoreResult,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::changes;
use crate::config::CouchConfig;
use crate::error::{CouchDbError, Result};
use crate::types::{ErrorBody, PutResponse};

/// Revision field inside a CouchDB document
const REVISION_FIELD: &str = "_rev";

/// CouchDB-backed document store
///
/// # Features
///
/// - `GET`/`PUT`/`HEAD` on `{base}/{database}/{doc}`
/// - Optimistic concurrency through `_rev`; HTTP 409 maps to a conflict
/// - Long-poll `_changes` feed restricted to one document id
/// - Optional Basic authentication, never logged
///
/// # Example
///
/// ```ignore
/// use provider_couchdb::{CouchConfig, CouchDocumentStore};
///
/// let store = CouchDocumentStore::new(http_client, CouchConfig::for_user(url, "alice"))?;
/// let head = store.head_revision(&DocumentId::new("videos")).await?;
/// ```
#[derive(Clone)]
pub struct CouchDocumentStore {
    http_client: Arc<dyn HttpClient>,
    config: Arc<CouchConfig>,
    read_retry: RetryPolicy,
}

impl CouchDocumentStore {
    /// Create a store for the configured database.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration does not validate.
    pub fn new(http_client: Arc<dyn HttpClient>, config: CouchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            http_client,
            config: Arc::new(config),
            read_retry: RetryPolicy::default(),
        })
    }

    /// Transport retry policy for idempotent reads (`GET`, `HEAD`).
    pub fn with_read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    pub fn config(&self) -> &CouchConfig {
        &self.config
    }

    /// Request with the common headers and the configured timeout.
    pub(crate) fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        let request = HttpRequest::new(method, url)
            .header("Accept", "application/json")
            .timeout(self.config.request_timeout);
        match &self.config.credentials {
            Some(credentials) => request.header("Authorization", credentials.basic_auth_header()),
            None => request,
        }
    }

    pub(crate) fn http_client(&self) -> &Arc<dyn HttpClient> {
        &self.http_client
    }

    async fn read(&self, request: HttpRequest) -> Result<HttpResponse> {
        Ok(self
            .http_client
            .execute_with_retry(request, self.read_retry.clone())
            .await?)
    }

    #[instrument(skip(self), fields(database = %self.config.database))]
    async fn get_document(&self, id: &DocumentId) -> Result<RemoteDocument> {
        let url = self.config.document_url(id.as_str());
        let response = self.read(self.request(HttpMethod::Get, url)).await?;
        if response.status != 200 {
            return Err(status_error(&response, id.as_str()));
        }

        let mut body: DocumentBody = serde_json::from_slice(&response.body)
            .map_err(|e| CouchDbError::ParseError(format!("Document is not an object: {}", e)))?;
        let revision = body
            .get(REVISION_FIELD)
            .and_then(|value| value.as_str())
            .map(Revision::new)
            .ok_or_else(|| CouchDbError::ParseError("Document has no _rev".to_string()))?;
        strip_reserved_fields(&mut body);

        debug!(revision = %revision, fields = body.len(), "Fetched document");
        Ok(RemoteDocument {
            id: id.clone(),
            revision,
            body,
        })
    }

    #[instrument(skip(self, body), fields(database = %self.config.database))]
    async fn put_document(
        &self,
        id: &DocumentId,
        revision: Option<&Revision>,
        body: &DocumentBody,
    ) -> Result<Revision> {
        let mut document = body.clone();
        strip_reserved_fields(&mut document);
        if let Some(revision) = revision {
            document.insert(
                REVISION_FIELD.to_string(),
                serde_json::Value::String(revision.as_str().to_string()),
            );
        }

        let url = self.config.document_url(id.as_str());
        let request = self.request(HttpMethod::Put, url).json(&document)?;
        let response = self.http_client.execute(request).await?;

        match response.status {
            201 | 202 => {
                let accepted: PutResponse = serde_json::from_slice(&response.body)
                    .map_err(|e| CouchDbError::ParseError(e.to_string()))?;
                info!(revision = %accepted.rev, "Document written");
                Ok(Revision::new(accepted.rev))
            }
            409 => {
                debug!("Write rejected with a revision conflict");
                Err(CouchDbError::Conflict)
            }
            _ => Err(status_error(&response, id.as_str())),
        }
    }

    #[instrument(skip(self), fields(database = %self.config.database))]
    async fn head_document(&self, id: &DocumentId) -> Result<Revision> {
        let url = self.config.document_url(id.as_str());
        let response = self.read(self.request(HttpMethod::Head, url)).await?;
        if response.status != 200 {
            return Err(status_error(&response, id.as_str()));
        }

        let etag = response
            .header("ETag")
            .map(|tag| tag.trim().trim_matches('"'))
            .filter(|tag| !tag.is_empty())
            .ok_or_else(|| CouchDbError::ParseError("HEAD response has no ETag".to_string()))?;
        Ok(Revision::new(etag))
    }
}

/// Map a non-success response to a provider error.
pub(crate) fn status_error(response: &HttpResponse, target: &str) -> CouchDbError {
    match response.status {
        401 | 403 => CouchDbError::Unauthorized {
            status_code: response.status,
        },
        404 => CouchDbError::NotFound(target.to_string()),
        409 => CouchDbError::Conflict,
        status_code => {
            // HEAD responses carry no body
            let message = serde_json::from_slice::<ErrorBody>(&response.body)
                .map(|body| format!("{}: {}", body.error, body.reason))
                .unwrap_or_else(|_| String::from_utf8_lossy(&response.body).to_string());
            warn!(status = status_code, message = %message, "Unexpected CouchDB response");
            CouchDbError::ApiError {
                status_code,
                message,
            }
        }
    }
}

#[async_trait]
impl DocumentStore for CouchDocumentStore {
    async fn fetch(&self, id: &DocumentId) -> StoreResult<RemoteDocument> {
        Ok(self.get_document(id).await?)
    }

    async fn write(
        &self,
        id: &DocumentId,
        revision: Option<&Revision>,
        body: &DocumentBody,
    ) -> StoreResult<Revision> {
        Ok(self.put_document(id, revision, body).await?)
    }

    async fn head_revision(&self, id: &DocumentId) -> StoreResult<Revision> {
        Ok(self.head_document(id).await?)
    }

    async fn subscribe(&self, id: &DocumentId) -> StoreResult<RevisionStream> {
        info!(document = %id, database = %self.config.database, "Opening change feed");
        Ok(changes::revision_feed(self.clone(), id.clone()))
    }
}
