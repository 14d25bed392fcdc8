//! # Event Bus System
//!
//! Typed, broadcast-based event bus connecting the library, the sync engine
//! and the host UI.
//!
//! ## Overview
//!
//! - **Event Types**: one enum per domain, wrapped by [`CoreEvent`]
//! - **EventBus**: cloneable handle around a `tokio::sync::broadcast` channel
//! - **EventStream**: receiver wrapper with optional filtering
//!
//! ```text
//! ┌──────────────┐   emit   ┌──────────┐  subscribe  ┌────────────┐
//! │ LibraryIndex ├─────────>│          ├────────────>│  Host UI   │
//! └──────────────┘          │ EventBus │             └────────────┘
//! ┌──────────────┐   emit   │          │  subscribe  ┌────────────┐
//! │  SyncEngine  ├─────────>│          ├────────────>│   Tests    │
//! └──────────────┘          └──────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, UserNotification};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::Notification(UserNotification::new("Playlist Road deleted")))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "User notification");
//! # }
//! ```
//!
//! `emit` fails when nobody is subscribed; publishers that do not care call
//! `.ok()` on the result.
//!
//! ## Event Types
//!
//! ### Session Events
//! - `SignedIn` / `SignedOut`: a library session started or ended
//!
//! ### Sync Events
//! - `DocumentLoaded`: first successful fetch materialized the library
//! - `DocumentUpdated`: a fetch brought in the latest remote revision
//! - `WriteAccepted`: the store accepted a write
//! - `ConflictDetected`: a write hit a stale revision and is being retried
//! - `Failed`: an operation failed; the session keeps running
//!
//! ### Connectivity Events
//! - `Degraded`: the change feed is down, the library may be stale
//! - `Restored`: the change feed is back
//!
//! ### Library Events
//! - Playlist lifecycle and item membership changes
//!
//! ### Notifications
//! - Short user-facing messages, the text a host shows in a toast
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; keep going.
//! - **`RecvError::Closed`**: every sender is gone; stop.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Session(SessionEvent),
    Sync(SyncEvent),
    Connectivity(ConnectivityEvent),
    Library(LibraryEvent),
    Notification(UserNotification),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Session(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Connectivity(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Notification(_) => "User notification",
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed {
                recoverable: false, ..
            }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Warning,
            CoreEvent::Connectivity(ConnectivityEvent::Degraded { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::ConflictDetected { .. }) => EventSeverity::Debug,
            CoreEvent::Sync(SyncEvent::WriteAccepted { .. }) => EventSeverity::Debug,
            CoreEvent::Library(_) => EventSeverity::Debug,
            _ => EventSeverity::Info,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Session Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// A library session started.
    SignedIn {
        user_id: String,
        /// Session epoch; results tagged with an older epoch are discarded.
        epoch: u64,
    },
    /// The session was torn down.
    SignedOut { user_id: String, epoch: u64 },
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::SignedIn { .. } => "Library session started",
            SessionEvent::SignedOut { .. } => "Library session ended",
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events emitted by the document sync engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// The first fetch after login materialized the library.
    DocumentLoaded {
        document_id: String,
        revision: String,
    },
    /// A fetch completed; `revision` is now the known head.
    DocumentUpdated {
        document_id: String,
        revision: String,
    },
    /// The store accepted a write.
    WriteAccepted {
        document_id: String,
        revision: String,
    },
    /// A write was rejected for a stale revision.
    ConflictDetected {
        document_id: String,
        /// 1-based retry number about to be made.
        attempt: u32,
    },
    /// An operation failed.
    Failed {
        document_id: String,
        message: String,
        /// Whether a later edit, notification or reconnect can recover.
        recoverable: bool,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::DocumentLoaded { .. } => "Library document loaded",
            SyncEvent::DocumentUpdated { .. } => "Library document updated",
            SyncEvent::WriteAccepted { .. } => "Library changes saved",
            SyncEvent::ConflictDetected { .. } => "Library write conflict",
            SyncEvent::Failed { .. } => "Library sync failed",
        }
    }
}

// ============================================================================
// Connectivity Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConnectivityEvent {
    /// The change feed failed; the library may be stale.
    Degraded {
        document_id: String,
        /// Seconds until the next subscription attempt.
        retry_in_secs: u64,
    },
    /// The change feed is delivering again.
    Restored { document_id: String },
}

impl ConnectivityEvent {
    fn description(&self) -> &str {
        match self {
            ConnectivityEvent::Degraded { .. } => "Library may be out of date",
            ConnectivityEvent::Restored { .. } => "Library connection restored",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Structural changes in the library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    PlaylistCreated { name: String },
    PlaylistRenamed { from: String, to: String },
    PlaylistDeleted { name: String },
    /// Items added to a collection (`collection` is the favorites key for favorites).
    ItemsAdded {
        collection: String,
        item_ids: Vec<String>,
    },
    ItemsRemoved {
        collection: String,
        item_ids: Vec<String>,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::PlaylistCreated { .. } => "Playlist created",
            LibraryEvent::PlaylistRenamed { .. } => "Playlist renamed",
            LibraryEvent::PlaylistDeleted { .. } => "Playlist deleted",
            LibraryEvent::ItemsAdded { .. } => "Items added",
            LibraryEvent::ItemsRemoved { .. } => "Items removed",
        }
    }
}

// ============================================================================
// User Notifications
// ============================================================================

/// A short message meant for the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserNotification {
    pub message: String,
}

impl UserNotification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning shares the underlying channel. Each [`subscribe`](Self::subscribe)
/// creates an independent receiver that sees events emitted after it was
/// created.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering at most `capacity` events per
    /// subscriber before it lags.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(100);
/// let notifications = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Notification(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Receives a matching event without waiting; `None` if none is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drains every queued matching event.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn updated(revision: &str) -> CoreEvent {
        CoreEvent::Sync(SyncEvent::DocumentUpdated {
            document_id: "videos".to_string(),
            revision: revision.to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(updated("1-a")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        assert_eq!(bus.emit(updated("2-b")).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), updated("2-b"));
        assert_eq!(sub2.recv().await.unwrap(), updated("2-b"));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Notification(_)));

        bus.emit(updated("3-c")).ok();
        let toast = CoreEvent::Notification(UserNotification::new("Created new playlist Road"));
        bus.emit(toast.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), toast);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(updated(&format!("{}-x", i))).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[tokio::test]
    async fn test_drain_skips_lag_and_filters() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Sync(_)));

        bus.emit(updated("1-a")).ok();
        bus.emit(CoreEvent::Library(LibraryEvent::PlaylistDeleted {
            name: "Road".to_string(),
        }))
        .ok();
        bus.emit(updated("2-b")).ok();

        assert_eq!(stream.drain(), vec![updated("1-a"), updated("2-b")]);
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn test_event_severity() {
        let fatal = CoreEvent::Sync(SyncEvent::Failed {
            document_id: "videos".to_string(),
            message: "malformed".to_string(),
            recoverable: false,
        });
        assert_eq!(fatal.severity(), EventSeverity::Error);

        let degraded = CoreEvent::Connectivity(ConnectivityEvent::Degraded {
            document_id: "videos".to_string(),
            retry_in_secs: 5,
        });
        assert_eq!(degraded.severity(), EventSeverity::Warning);
        assert_eq!(updated("1-a").severity(), EventSeverity::Info);
    }

    #[test]
    fn test_event_description() {
        assert_eq!(updated("1-a").description(), "Library document updated");
        let renamed = CoreEvent::Library(LibraryEvent::PlaylistRenamed {
            from: "A".to_string(),
            to: "B".to_string(),
        });
        assert_eq!(renamed.description(), "Playlist renamed");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Sync(SyncEvent::ConflictDetected {
            document_id: "videos".to_string(),
            attempt: 2,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Sync");
        assert_eq!(json["payload"]["event"], "ConflictDetected");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
