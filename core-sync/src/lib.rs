//! # Document Sync Module
//!
//! Keeps the user's library document in step with a remote revisioned store.
//!
//! ## Overview
//!
//! The whole library is one JSON document. Every local change produces a
//! full snapshot; the engine writes the newest one under optimistic
//! concurrency and resolves conflicts by refreshing the revision and
//! re-sending. Remote changes arrive through a change feed.
//!
//! ## Components
//!
//! - **Sync Engine** (`engine`): single-task state machine owning the
//!   revision, the pending snapshot and the one in-flight operation
//! - **Change Listener** (`listener`): change-feed subscription with
//!   resubscribe-on-failure
//! - **Materializer** (`materializer`): merges the first fetched document
//!   into the live library
//! - **Session** (`session`): epochs that retire work from ended logins
//! - **State** (`state`): engine bookkeeping and the published status

pub mod engine;
pub mod error;
pub mod listener;
pub mod materializer;
pub mod session;
pub mod state;

pub use engine::{DocumentSyncEngine, EngineHandle, CONNECTION_PROBLEM_MESSAGE};
pub use error::{Result, SyncError};
pub use listener::{ChangeListener, ListenerHandle};
pub use materializer::DocumentMaterializer;
pub use session::{SessionEpochs, SessionGuard};
pub use state::{SyncPhase, SyncStatus};
