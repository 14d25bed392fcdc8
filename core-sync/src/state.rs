//! Engine state.
//!
//! [`SyncState`] is owned by the engine task and never shared. Observers see
//! a [`SyncStatus`] copy published after every step.

use bridge_traits::{DocumentId, Revision};
use core_library::LibrarySnapshot;
use serde::{Deserialize, Serialize};

/// What the engine is doing right now. At most one network operation is in
/// flight, so the phase names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Fetching,
    /// Waiting out the fetch retry delay, then checking the head revision.
    RetryingFetch,
    CheckingHead,
    Writing,
    /// Backing off after a conflict, then refreshing the revision.
    ConflictRecovering,
    Stopped,
}

impl SyncPhase {
    /// Whether a network operation is in flight.
    pub fn is_busy(&self) -> bool {
        !matches!(self, SyncPhase::Idle | SyncPhase::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Fetching => "fetching",
            SyncPhase::RetryingFetch => "retrying_fetch",
            SyncPhase::CheckingHead => "checking_head",
            SyncPhase::Writing => "writing",
            SyncPhase::ConflictRecovering => "conflict_recovering",
            SyncPhase::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Published view of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub document_id: DocumentId,
    pub epoch: u64,
    pub phase: SyncPhase,
    /// Last revision known to be current.
    pub revision: Option<Revision>,
    /// A snapshot is waiting to be written.
    pub has_pending: bool,
    pub first_load_done: bool,
    /// Writes are halted until the next edit, reconnection or remote change.
    pub suspended: bool,
    /// Nothing is in flight and nothing is due.
    pub settled: bool,
    /// Commands consumed from the inbox so far.
    pub processed_commands: u64,
    pub last_error: Option<String>,
}

impl SyncStatus {
    pub(crate) fn starting(document_id: DocumentId, epoch: u64) -> Self {
        Self {
            document_id,
            epoch,
            phase: SyncPhase::Idle,
            revision: None,
            has_pending: false,
            first_load_done: false,
            suspended: false,
            settled: false,
            processed_commands: 0,
            last_error: None,
        }
    }
}

/// Mutable bookkeeping of one engine.
#[derive(Debug, Clone)]
pub(crate) struct SyncState {
    pub current_revision: Option<Revision>,
    pub pending: Option<LibrarySnapshot>,
    pub first_load_done: bool,
    /// Generation of the merged library produced by the first load.
    pub loaded_generation: u64,
    pub needs_fetch: bool,
    pub fetch_attempts: u32,
    pub refresh_requested: bool,
    /// Latest change notification received while an operation was in flight.
    pub queued_remote: Option<Revision>,
    pub suspended: bool,
    pub last_error: Option<String>,
}

impl SyncState {
    /// A fresh engine fetches before anything else.
    pub fn new() -> Self {
        Self {
            current_revision: None,
            pending: None,
            first_load_done: false,
            loaded_generation: 0,
            needs_fetch: true,
            fetch_attempts: 0,
            refresh_requested: false,
            queued_remote: None,
            suspended: false,
            last_error: None,
        }
    }

    /// Record a local snapshot, replacing any older pending one.
    ///
    /// Returns `false` when the snapshot predates the first-load merge; the
    /// merged library already contains it.
    pub fn record_pending(&mut self, snapshot: LibrarySnapshot) -> bool {
        if self.first_load_done && snapshot.generation() < self.loaded_generation {
            return false;
        }
        self.pending = Some(snapshot);
        self.suspended = false;
        true
    }

    /// Put back a snapshot whose write did not land, unless a newer one
    /// arrived meanwhile.
    pub fn restore_pending(&mut self, snapshot: LibrarySnapshot) {
        if self.pending.is_none() {
            self.pending = Some(snapshot);
        }
    }

    /// Notification for the revision this engine already holds.
    pub fn is_echo(&self, revision: &Revision) -> bool {
        self.first_load_done && self.current_revision.as_ref() == Some(revision)
    }

    /// Evaluate a change notification.
    pub fn remote_changed(&mut self, revision: Revision) -> bool {
        if self.is_echo(&revision) {
            return false;
        }
        self.needs_fetch = true;
        self.fetch_attempts = 0;
        true
    }

    pub fn can_write(&self) -> bool {
        self.pending.is_some()
            && self.first_load_done
            && self.current_revision.is_some()
            && !self.suspended
    }

    /// Nothing is due once the in-flight operation (if any) is done.
    pub fn is_quiet(&self) -> bool {
        !self.needs_fetch
            && !self.refresh_requested
            && self.queued_remote.is_none()
            && !self.can_write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::ManualClock;
    use core_library::{CollectionRef, LibraryIndex, NewMediaItem};
    use std::sync::Arc;

    fn loaded(revision: &str) -> SyncState {
        let mut state = SyncState::new();
        state.first_load_done = true;
        state.needs_fetch = false;
        state.current_revision = Some(Revision::new(revision));
        state
    }

    fn library() -> LibraryIndex {
        LibraryIndex::new(Arc::new(ManualClock::new(0)))
    }

    #[test]
    fn test_fresh_state_wants_a_fetch_and_cannot_write() {
        let mut state = SyncState::new();
        assert!(state.needs_fetch);
        assert!(state.record_pending(LibrarySnapshot::default()));
        assert!(!state.can_write());
    }

    #[test]
    fn test_echo_needs_first_load() {
        let mut state = SyncState::new();
        state.current_revision = Some(Revision::new("3-a"));
        assert!(!state.is_echo(&Revision::new("3-a")));

        let mut state = loaded("3-a");
        assert!(!state.remote_changed(Revision::new("3-a")));
        assert!(!state.needs_fetch);
        assert!(state.remote_changed(Revision::new("4-b")));
        assert!(state.needs_fetch);
    }

    #[test]
    fn test_restore_keeps_newer_snapshot() {
        let mut index = library();
        index
            .add_item(&CollectionRef::Favorites, NewMediaItem::new("a", "A"))
            .unwrap();
        let older = index.render();
        index
            .add_item(&CollectionRef::Favorites, NewMediaItem::new("b", "B"))
            .unwrap();
        let newer = index.render();

        let mut state = loaded("1-a");
        state.record_pending(newer.clone());
        state.restore_pending(older.clone());
        assert_eq!(state.pending, Some(newer));

        state.pending = None;
        state.restore_pending(older.clone());
        assert_eq!(state.pending, Some(older));
    }

    #[test]
    fn test_pre_merge_snapshots_are_superseded() {
        let mut index = library();
        index
            .add_item(&CollectionRef::Favorites, NewMediaItem::new("a", "A"))
            .unwrap();
        let before_merge = index.render();
        index.materialize(&Default::default());

        let mut state = loaded("1-a");
        state.loaded_generation = index.generation();
        assert!(!state.record_pending(before_merge));
        assert!(state.pending.is_none());

        index
            .add_item(&CollectionRef::Favorites, NewMediaItem::new("b", "B"))
            .unwrap();
        assert!(state.record_pending(index.render()));
        assert!(state.can_write());
    }

    #[test]
    fn test_suspension_blocks_writes_until_next_edit() {
        let mut state = loaded("1-a");
        state.record_pending(LibrarySnapshot::default());
        state.suspended = true;
        assert!(!state.can_write());
        assert!(state.is_quiet());

        state.record_pending(LibrarySnapshot::default());
        assert!(!state.suspended);
        assert!(state.can_write());
        assert!(!state.is_quiet());
    }

    #[test]
    fn test_phase_strings() {
        assert_eq!(SyncPhase::ConflictRecovering.to_string(), "conflict_recovering");
        assert!(SyncPhase::Writing.is_busy());
        assert!(!SyncPhase::Stopped.is_busy());
    }
}
