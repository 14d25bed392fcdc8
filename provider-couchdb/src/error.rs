//! Error types for the CouchDB provider

use bridge_traits::error::BridgeError;
use bridge_traits::StoreError;
use thiserror::Error;

/// CouchDB provider errors
#[derive(Error, Debug)]
pub enum CouchDbError {
    /// The supplied `_rev` is not the document's current revision
    #[error("Document update conflict")]
    Conflict,

    /// Document or database does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credentials missing or rejected
    #[error("Unauthorized (status {status_code})")]
    Unauthorized { status_code: u16 },

    /// Server answered with an unexpected status
    #[error("CouchDB error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Response body or headers could not be understood
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Provider configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for CouchDB operations
pub type Result<T> = std::result::Result<T, CouchDbError>;

impl From<CouchDbError> for StoreError {
    fn from(error: CouchDbError) -> Self {
        match error {
            CouchDbError::Conflict => StoreError::Conflict,
            CouchDbError::NotFound(_) => StoreError::NotFound,
            CouchDbError::ParseError(msg) => StoreError::InvalidResponse(msg),
            CouchDbError::BridgeError(err) => StoreError::Transport(err.to_string()),
            other => StoreError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CouchDbError::ApiError {
            status_code: 500,
            message: "boom".to_string(),
        };
        assert_eq!(error.to_string(), "CouchDB error (status 500): boom");

        let error = CouchDbError::Unauthorized { status_code: 401 };
        assert_eq!(error.to_string(), "Unauthorized (status 401)");
    }

    #[test]
    fn test_store_error_conversion() {
        assert_eq!(StoreError::from(CouchDbError::Conflict), StoreError::Conflict);
        assert_eq!(
            StoreError::from(CouchDbError::NotFound("videos".into())),
            StoreError::NotFound
        );
        assert_eq!(
            StoreError::from(CouchDbError::ParseError("no _rev".into())),
            StoreError::InvalidResponse("no _rev".into())
        );

        let converted = StoreError::from(CouchDbError::Unauthorized { status_code: 401 });
        assert!(converted.is_transport());

        let converted = StoreError::from(CouchDbError::from(BridgeError::Timeout(70_000)));
        assert_eq!(
            converted,
            StoreError::Transport("Request timed out after 70000 ms".into())
        );
    }
}
