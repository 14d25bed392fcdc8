//! # Core Configuration Module
//!
//! Configuration for the media-library core.
//!
//! ## Overview
//!
//! [`CoreConfig`] is assembled with a builder and validated fail-fast: a
//! config that would make the sync engine spin (zero retry delays, zero
//! attempts) or that names no document is rejected with [`Error::Config`]
//! before any session starts.
//!
//! The sync tunables live in [`SyncConfig`]:
//!
//! | Setting | Default | Meaning |
//! |---------|---------|---------|
//! | `conflict_retry` | 8 attempts, 50 ms → 5 s exponential | bound on write-conflict recovery |
//! | `fetch_retry_delay` | 1 s | fixed pause before re-fetching after a failed fetch |
//! | `max_fetch_attempts` | 5 | fetch attempts per notification before giving up |
//! | `resubscribe_delay` | 5 s | pause before the change listener resubscribes |
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::{CoreConfig, SyncConfig};
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .document_name("videos")
//!     .sync(SyncConfig::default().with_resubscribe_delay(Duration::from_secs(10)))
//!     .build()?;
//! assert_eq!(config.sync.resubscribe_delay, Duration::from_secs(10));
//! # Ok::<(), core_runtime::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, RetryPolicy, SystemClock};
use std::sync::Arc;
use std::time::Duration;

/// Default id of the library document in the user's store.
pub const DEFAULT_DOCUMENT_NAME: &str = "videos";

const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Tunables of the document sync engine and change listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Backoff and bound for write-conflict recovery.
    pub conflict_retry: RetryPolicy,
    /// Fixed pause before re-fetching after a failed fetch.
    pub fetch_retry_delay: Duration,
    /// Fetch attempts per trigger before reporting failure.
    pub max_fetch_attempts: u32,
    /// Pause before the change listener resubscribes after a failure.
    pub resubscribe_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            conflict_retry: RetryPolicy {
                max_attempts: 8,
                base_delay: Duration::from_millis(50),
                max_delay: Duration::from_secs(5),
                use_exponential_backoff: true,
            },
            fetch_retry_delay: Duration::from_secs(1),
            max_fetch_attempts: 5,
            resubscribe_delay: Duration::from_secs(5),
        }
    }
}

impl SyncConfig {
    pub fn with_conflict_retry(mut self, policy: RetryPolicy) -> Self {
        self.conflict_retry = policy;
        self
    }

    pub fn with_fetch_retry_delay(mut self, delay: Duration) -> Self {
        self.fetch_retry_delay = delay;
        self
    }

    pub fn with_max_fetch_attempts(mut self, attempts: u32) -> Self {
        self.max_fetch_attempts = attempts;
        self
    }

    pub fn with_resubscribe_delay(mut self, delay: Duration) -> Self {
        self.resubscribe_delay = delay;
        self
    }

    /// Validates the sync tunables.
    pub fn validate(&self) -> Result<()> {
        if self.conflict_retry.max_attempts == 0 {
            return Err(Error::Config(
                "Conflict retry policy must allow at least one attempt".to_string(),
            ));
        }
        if self.conflict_retry.base_delay > self.conflict_retry.max_delay {
            return Err(Error::Config(
                "Conflict retry base delay exceeds its maximum delay".to_string(),
            ));
        }
        if self.conflict_retry.max_delay > MAX_RETRY_DELAY {
            return Err(Error::Config(format!(
                "Conflict retry max delay exceeds {} seconds",
                MAX_RETRY_DELAY.as_secs()
            )));
        }
        if self.max_fetch_attempts == 0 {
            return Err(Error::Config(
                "max_fetch_attempts must be greater than 0".to_string(),
            ));
        }
        if self.fetch_retry_delay > MAX_RETRY_DELAY || self.resubscribe_delay > MAX_RETRY_DELAY {
            return Err(Error::Config(format!(
                "Retry delays must not exceed {} seconds",
                MAX_RETRY_DELAY.as_secs()
            )));
        }
        if self.resubscribe_delay.is_zero() {
            return Err(Error::Config(
                "resubscribe_delay must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Core configuration for the media-library core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Id of the library document inside the user's store.
    pub document_name: String,
    pub sync: SyncConfig,
    /// Time source for item insertion timestamps.
    pub clock: Arc<dyn Clock>,
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("document_name", &self.document_name)
            .field("sync", &self.sync)
            .field("clock", &"Clock { ... }")
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            document_name: DEFAULT_DOCUMENT_NAME.to_string(),
            sync: SyncConfig::default(),
            clock: Arc::new(SystemClock),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        let name = self.document_name.trim();
        if name.is_empty() {
            return Err(Error::Config("Document name cannot be empty".to_string()));
        }
        if name.starts_with('_') {
            return Err(Error::Config(format!(
                "Document name '{}' uses the store's reserved '_' prefix",
                name
            )));
        }
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }
        self.sync.validate()
    }
}

/// Builder for [`CoreConfig`]. Unset fields fall back to the defaults.
#[derive(Default)]
pub struct CoreConfigBuilder {
    document_name: Option<String>,
    sync: Option<SyncConfig>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = Some(name.into());
        self
    }

    pub fn sync(mut self, sync: SyncConfig) -> Self {
        self.sync = Some(sync);
        self
    }

    /// Inject a time source, e.g. `ManualClock` in tests.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<CoreConfig> {
        let defaults = CoreConfig::default();
        let config = CoreConfig {
            document_name: self.document_name.unwrap_or(defaults.document_name),
            sync: self.sync.unwrap_or(defaults.sync),
            clock: self.clock.unwrap_or(defaults.clock),
            event_buffer_size: self.event_buffer_size.unwrap_or(defaults.event_buffer_size),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::ManualClock;

    #[test]
    fn test_defaults_are_valid() {
        let config = CoreConfig::builder().build().unwrap();
        assert_eq!(config.document_name, "videos");
        assert_eq!(config.sync.resubscribe_delay, Duration::from_secs(5));
        assert_eq!(config.sync.conflict_retry.max_attempts, 8);
    }

    #[test]
    fn test_builder_overrides() {
        let clock = Arc::new(ManualClock::new(42));
        let config = CoreConfig::builder()
            .document_name("library")
            .clock(clock)
            .event_buffer_size(16)
            .sync(SyncConfig::default().with_max_fetch_attempts(2))
            .build()
            .unwrap();

        assert_eq!(config.document_name, "library");
        assert_eq!(config.clock.unix_timestamp_millis(), 42);
        assert_eq!(config.event_buffer_size, 16);
        assert_eq!(config.sync.max_fetch_attempts, 2);
    }

    #[test]
    fn test_rejects_reserved_document_name() {
        let result = CoreConfig::builder().document_name("_design").build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("reserved")));
    }

    #[test]
    fn test_rejects_empty_document_name() {
        assert!(CoreConfig::builder().document_name("  ").build().is_err());
    }

    #[test]
    fn test_rejects_unbounded_conflict_policy() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        let sync = SyncConfig::default().with_conflict_retry(policy);
        assert!(sync.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_backoff() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(1),
            use_exponential_backoff: true,
        };
        assert!(SyncConfig::default()
            .with_conflict_retry(policy)
            .validate()
            .is_err());
    }

    #[test]
    fn test_rejects_zero_fetch_attempts_and_zero_resubscribe_delay() {
        assert!(SyncConfig::default()
            .with_max_fetch_attempts(0)
            .validate()
            .is_err());
        assert!(SyncConfig::default()
            .with_resubscribe_delay(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_debug_hides_clock() {
        let rendered = format!("{:?}", CoreConfig::default());
        assert!(rendered.contains("Clock { ... }"));
    }
}
