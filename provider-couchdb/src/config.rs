//! Connection settings for a CouchDB-compatible server.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use core_runtime::logging::redact_if_sensitive;
use std::fmt;
use std::time::Duration;

use crate::error::{CouchDbError, Result};

/// Prefix of per-user databases.
pub const USER_DATABASE_PREFIX: &str = "u_";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_LONGPOLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Basic authentication credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// `Authorization` header value.
    pub fn basic_auth_header(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {}", token)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &redact_if_sensitive("password", &self.password))
            .finish()
    }
}

/// Where the library documents live.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server root, e.g. `https://db.example.com:6984`
    pub base_url: String,
    pub database: String,
    pub credentials: Option<Credentials>,
    pub request_timeout: Duration,
    /// How long the server holds a `_changes` long-poll open.
    pub longpoll_timeout: Duration,
}

impl CouchConfig {
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            database: database.into(),
            credentials: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            longpoll_timeout: DEFAULT_LONGPOLL_TIMEOUT,
        }
    }

    /// Per-user database `u_<username>`.
    pub fn for_user(base_url: impl Into<String>, username: &str) -> Self {
        Self::new(base_url, format!("{}{}", USER_DATABASE_PREFIX, username))
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_longpoll_timeout(mut self, timeout: Duration) -> Self {
        self.longpoll_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(CouchDbError::InvalidConfig(format!(
                "Base URL must use http or https: {}",
                core_runtime::logging::redact_url_credentials(&self.base_url)
            )));
        }
        if self.database.is_empty() {
            return Err(CouchDbError::InvalidConfig(
                "Database name cannot be empty".to_string(),
            ));
        }
        if self.request_timeout.is_zero() || self.longpoll_timeout.is_zero() {
            return Err(CouchDbError::InvalidConfig(
                "Timeouts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// `{base}/{database}`
    pub fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(&self.database))
    }

    /// `{base}/{database}/{document}`
    pub fn document_url(&self, document: &str) -> String {
        format!("{}/{}", self.database_url(), urlencoding::encode(document))
    }
}
