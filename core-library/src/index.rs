//! # Library Index
//!
//! Owns the favorites collection and every playlist, enforces name
//! uniqueness, and announces each structural change.
//!
//! ## Change propagation
//!
//! Every successful mutation:
//! 1. emits a [`LibraryEvent`] on the event bus (if one is attached),
//! 2. emits a [`UserNotification`] unless notifications are suppressed,
//! 3. hands the full rendered [`LibrarySnapshot`] to the connected
//!    [`SnapshotSink`] (the sync engine).
//!
//! Mutations that change nothing (adding an existing id, removing a missing
//! one, renaming to the current name) announce nothing.
//!
//! Materializing a fetched document merges it into the index quietly: the
//! structural events still go out, but no notifications and no snapshot.
//!
//! The index counts generations: each announced mutation and each
//! materialization bumps it, and every rendered snapshot is stamped with it.

use bridge_traits::Clock;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, UserNotification};
use std::sync::Arc;
use tracing::debug;

use crate::collection::{Collection, CollectionChange};
use crate::error::{LibraryError, Result};
use crate::models::{
    validate_playlist_name, CollectionRef, MediaItem, NewMediaItem, DEFAULT_PLAYLIST_NAME,
    FAVORITES_KEY,
};
use crate::schema::{render_collections, LibraryDocument, LibrarySnapshot};

/// Receives the full library serialization after every local change.
pub trait SnapshotSink: Send + Sync {
    fn library_changed(&self, snapshot: LibrarySnapshot);
}

/// What a materialization merged in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub playlists_created: usize,
    pub items_added: usize,
}

/// The user's favorites plus named playlists.
pub struct LibraryIndex {
    favorites: Collection,
    playlists: Vec<Collection>,
    clock: Arc<dyn Clock>,
    events: Option<EventBus>,
    sink: Option<Arc<dyn SnapshotSink>>,
    notifications_enabled: bool,
    importing: bool,
    generation: u64,
}

impl std::fmt::Debug for LibraryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryIndex")
            .field("favorites", &self.favorites.len())
            .field("playlists", &self.playlist_names())
            .field("connected", &self.sink.is_some())
            .field("generation", &self.generation)
            .finish()
    }
}

impl LibraryIndex {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            favorites: Collection::new(FAVORITES_KEY),
            playlists: Vec::new(),
            clock,
            events: None,
            sink: None,
            notifications_enabled: true,
            importing: false,
            generation: 0,
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Route library-changed snapshots to `sink`, replacing any previous one.
    pub fn connect(&mut self, sink: Arc<dyn SnapshotSink>) {
        self.sink = Some(sink);
    }

    pub fn disconnect(&mut self) {
        self.sink = None;
    }

    pub fn is_connected(&self) -> bool {
        self.sink.is_some()
    }

    /// Toggle user-facing notifications; structural events are unaffected.
    pub fn set_notifications_enabled(&mut self, enabled: bool) {
        self.notifications_enabled = enabled;
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn favorites(&self) -> &Collection {
        &self.favorites
    }

    pub fn playlist(&self, name: &str) -> Option<&Collection> {
        self.playlists.iter().find(|p| p.name() == name)
    }

    pub fn playlists(&self) -> &[Collection] {
        &self.playlists
    }

    pub fn playlist_names(&self) -> Vec<String> {
        self.playlists.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn collection(&self, target: &CollectionRef) -> Option<&Collection> {
        match target {
            CollectionRef::Favorites => Some(&self.favorites),
            CollectionRef::Playlist(name) => self.playlist(name),
        }
    }

    pub fn is_favorited(&self, id: &str) -> bool {
        self.favorites.contains_item(id)
    }

    /// Names of the playlists containing item `id`, skipping `excluding`.
    pub fn item_playlists(&self, id: &str, excluding: Option<&str>) -> Vec<String> {
        self.playlists
            .iter()
            .filter(|p| Some(p.name()) != excluding && p.contains_item(id))
            .map(|p| p.name().to_string())
            .collect()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Full serialization of the library.
    pub fn render(&self) -> LibrarySnapshot {
        render_collections(&self.favorites, &self.playlists, self.generation)
    }

    // ------------------------------------------------------------------
    // Item mutations
    // ------------------------------------------------------------------

    /// Add one item. Returns `false` if the collection already holds its id.
    pub fn add_item(&mut self, target: &CollectionRef, item: NewMediaItem) -> Result<bool> {
        let item = item.build(self.clock.unix_timestamp_millis())?;
        let change = self.collection_mut(target)?.add_item(item);
        Ok(self.announce_items(target, change))
    }

    /// Add several items sharing one insertion time. Returns how many were new.
    pub fn add_items(
        &mut self,
        target: &CollectionRef,
        items: impl IntoIterator<Item = NewMediaItem>,
    ) -> Result<usize> {
        let now = self.clock.unix_timestamp_millis();
        let items = items
            .into_iter()
            .map(|item| item.build(now))
            .collect::<Result<Vec<MediaItem>>>()?;
        let change = self.collection_mut(target)?.add_items(items);
        let added = change.as_ref().map_or(0, |c| c.items().len());
        self.announce_items(target, change);
        Ok(added)
    }

    /// Remove one item. Returns `false` if it was not there.
    pub fn remove_item(&mut self, target: &CollectionRef, id: &str) -> Result<bool> {
        let change = self.collection_mut(target)?.remove_item(id);
        Ok(self.announce_items(target, change))
    }

    /// Remove several items. Returns how many were removed.
    pub fn remove_items(&mut self, target: &CollectionRef, ids: &[&str]) -> Result<usize> {
        let change = self
            .collection_mut(target)?
            .remove_items(ids.iter().copied());
        let removed = change.as_ref().map_or(0, |c| c.items().len());
        self.announce_items(target, change);
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Playlist mutations
    // ------------------------------------------------------------------

    /// Create a playlist. Without a name, or when the name is taken, a
    /// numeric suffix (`" 2"`, `" 3"`, ...) makes it unique. Returns the name
    /// actually used.
    pub fn create_playlist(&mut self, name: Option<&str>) -> Result<String> {
        let base = name.unwrap_or(DEFAULT_PLAYLIST_NAME);
        validate_playlist_name(base)?;

        let mut candidate = base.to_string();
        let mut suffix = 2;
        while self.playlist(&candidate).is_some() {
            candidate = format!("{} {}", base, suffix);
            suffix += 1;
        }

        self.playlists.push(Collection::new(candidate.clone()));
        self.publish(
            LibraryEvent::PlaylistCreated {
                name: candidate.clone(),
            },
            format!("Created new playlist {}", candidate),
        );
        Ok(candidate)
    }

    /// Rename a playlist.
    ///
    /// Renaming to the current name is a no-op. A name held by another
    /// playlist (or the favorites key) fails with
    /// [`LibraryError::NameConflict`] and leaves both collections untouched.
    pub fn rename_playlist(&mut self, from: &str, to: &str) -> Result<()> {
        let position = self.position(from)?;
        if from == to {
            return Ok(());
        }
        validate_playlist_name(to)?;
        if self.playlist(to).is_some() {
            return Err(LibraryError::NameConflict {
                name: to.to_string(),
            });
        }

        self.playlists[position].set_name(to);
        self.publish(
            LibraryEvent::PlaylistRenamed {
                from: from.to_string(),
                to: to.to_string(),
            },
            format!("Playlist {} renamed to {}", from, to),
        );
        Ok(())
    }

    /// Delete a playlist. Returns `false` if no playlist has that name.
    pub fn delete_playlist(&mut self, name: &str) -> bool {
        let Ok(position) = self.position(name) else {
            return false;
        };
        self.playlists.remove(position);
        self.publish(
            LibraryEvent::PlaylistDeleted {
                name: name.to_string(),
            },
            format!("Playlist {} deleted", name),
        );
        true
    }

    // ------------------------------------------------------------------
    // Document import
    // ------------------------------------------------------------------

    /// Merge a fetched document: missing playlists are created, existing
    /// collections gain the items they lack. Local items are kept.
    pub fn materialize(&mut self, document: &LibraryDocument) -> MaterializeReport {
        let mut report = MaterializeReport::default();
        self.generation += 1;
        let notifications = self.notifications_enabled;
        self.notifications_enabled = false;
        self.importing = true;

        let change = self.favorites.add_items(document.favorites.iter().cloned());
        report.items_added += change.as_ref().map_or(0, |c| c.items().len());
        self.announce_items(&CollectionRef::Favorites, change);

        for (name, items) in &document.playlists {
            if self.playlist(name).is_none() {
                self.playlists.push(Collection::new(name.clone()));
                report.playlists_created += 1;
                self.publish(
                    LibraryEvent::PlaylistCreated { name: name.clone() },
                    String::new(),
                );
            }
            let target = CollectionRef::Playlist(name.clone());
            let change = match self.collection_mut(&target) {
                Ok(playlist) => playlist.add_items(items.iter().cloned()),
                Err(_) => None,
            };
            report.items_added += change.as_ref().map_or(0, |c| c.items().len());
            self.announce_items(&target, change);
        }

        self.importing = false;
        self.notifications_enabled = notifications;
        debug!(
            playlists_created = report.playlists_created,
            items_added = report.items_added,
            "Materialized library document"
        );
        report
    }

    /// Drop every item and playlist. Nothing is announced.
    pub fn reset(&mut self) {
        self.favorites.clear();
        self.playlists.clear();
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn position(&self, name: &str) -> Result<usize> {
        self.playlists
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| LibraryError::CollectionNotFound {
                name: name.to_string(),
            })
    }

    fn collection_mut(&mut self, target: &CollectionRef) -> Result<&mut Collection> {
        match target {
            CollectionRef::Favorites => Ok(&mut self.favorites),
            CollectionRef::Playlist(name) => {
                let position = self.position(name)?;
                Ok(&mut self.playlists[position])
            }
        }
    }

    /// Announce an item change; returns whether anything changed.
    fn announce_items(&mut self, target: &CollectionRef, change: Option<CollectionChange>) -> bool {
        let Some(change) = change else {
            return false;
        };
        let message = item_message(target, &change);
        let collection = target.key().to_string();
        let item_ids = change.item_ids();
        let event = match change {
            CollectionChange::Added(_) => LibraryEvent::ItemsAdded {
                collection,
                item_ids,
            },
            CollectionChange::Removed(_) => LibraryEvent::ItemsRemoved {
                collection,
                item_ids,
            },
        };
        self.publish(event, message);
        true
    }

    fn publish(&mut self, event: LibraryEvent, message: String) {
        if !self.importing {
            self.generation += 1;
        }
        if let Some(events) = &self.events {
            events.emit(CoreEvent::Library(event)).ok();
            if self.notifications_enabled && !message.is_empty() {
                events
                    .emit(CoreEvent::Notification(UserNotification::new(message)))
                    .ok();
            }
        }

        if self.importing {
            return;
        }
        if let Some(sink) = &self.sink {
            sink.library_changed(self.render());
        }
    }
}

fn item_message(target: &CollectionRef, change: &CollectionChange) -> String {
    let items = change.items();
    let subject = match items {
        [single] => single.label(),
        _ => format!("{} items", items.len()),
    };
    match (target, change) {
        (CollectionRef::Favorites, CollectionChange::Added(_)) if items.len() == 1 => {
            format!("Added item to favorites: {}", subject)
        }
        (CollectionRef::Favorites, CollectionChange::Removed(_)) if items.len() == 1 => {
            format!("Removed item from favorites: {}", subject)
        }
        (CollectionRef::Favorites, CollectionChange::Added(_)) => {
            format!("Added {} to favorites", subject)
        }
        (CollectionRef::Favorites, CollectionChange::Removed(_)) => {
            format!("Removed {} from favorites", subject)
        }
        (CollectionRef::Playlist(name), CollectionChange::Added(_)) => {
            format!("Added {} to playlist {}", subject, name)
        }
        (CollectionRef::Playlist(name), CollectionChange::Removed(_)) => {
            format!("Removed {} from playlist {}", subject, name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::ManualClock;
    use core_runtime::events::EventStream;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        snapshots: Mutex<Vec<LibrarySnapshot>>,
    }

    impl RecordingSink {
        fn count(&self) -> usize {
            self.snapshots.lock().unwrap().len()
        }

        fn last(&self) -> Value {
            Value::Object(
                self.snapshots
                    .lock()
                    .unwrap()
                    .last()
                    .cloned()
                    .unwrap()
                    .into_body(),
            )
        }
    }

    impl SnapshotSink for RecordingSink {
        fn library_changed(&self, snapshot: LibrarySnapshot) {
            self.snapshots.lock().unwrap().push(snapshot);
        }
    }

    fn setup() -> (LibraryIndex, Arc<RecordingSink>, EventBus) {
        let bus = EventBus::new(64);
        let mut index =
            LibraryIndex::new(Arc::new(ManualClock::new(1_000))).with_event_bus(bus.clone());
        let sink = Arc::new(RecordingSink::default());
        index.connect(sink.clone());
        (index, sink, bus)
    }

    fn notifications(stream: &mut EventStream) -> Vec<String> {
        stream
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                CoreEvent::Notification(n) => Some(n.message),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_add_item_publishes_full_snapshot() {
        let (mut index, sink, _bus) = setup();

        let added = index
            .add_item(
                &CollectionRef::Favorites,
                NewMediaItem::new("v1", "Song").subtitle("Artist"),
            )
            .unwrap();

        assert!(added);
        assert!(index.is_favorited("v1"));
        assert_eq!(sink.count(), 1);
        assert_eq!(
            sink.last(),
            json!({"Favorites": {"v1": {"title": "Song", "subtitle": "Artist",
                                        "thumbnail": "", "duration": "", "timestamp": "1000"}}})
        );
    }

    #[test]
    fn test_noop_mutations_publish_nothing() {
        let (mut index, sink, bus) = setup();
        let mut stream = EventStream::new(bus.subscribe());
        let name = index.create_playlist(Some("Mix")).unwrap();
        let target = CollectionRef::Playlist(name);
        index.add_item(&target, NewMediaItem::new("v1", "Song")).unwrap();
        stream.drain();
        let before = sink.count();

        assert!(!index.add_item(&target, NewMediaItem::new("v1", "Song")).unwrap());
        assert_eq!(index.add_items(&target, vec![NewMediaItem::new("v1", "Song")]).unwrap(), 0);
        assert!(!index.remove_item(&target, "nope").unwrap());
        assert_eq!(index.remove_items(&target, &["x", "y"]).unwrap(), 0);
        index.rename_playlist("Mix", "Mix").unwrap();

        assert_eq!(sink.count(), before);
        assert!(stream.drain().is_empty());
    }

    #[test]
    fn test_batch_add_aggregates_into_one_change() {
        let (mut index, sink, bus) = setup();
        let mut stream = EventStream::new(bus.subscribe());
        index.create_playlist(Some("Mix")).unwrap();
        stream.drain();
        let before = sink.count();

        let added = index
            .add_items(
                &CollectionRef::playlist("Mix"),
                vec![
                    NewMediaItem::new("a", "A"),
                    NewMediaItem::new("b", "B"),
                    NewMediaItem::new("c", "C"),
                ],
            )
            .unwrap();

        assert_eq!(added, 3);
        assert_eq!(sink.count(), before + 1);
        assert_eq!(notifications(&mut stream), vec!["Added 3 items to playlist Mix"]);
    }

    #[test]
    fn test_notification_texts() {
        let (mut index, _sink, bus) = setup();
        let mut stream = EventStream::new(bus.subscribe());

        index.create_playlist(Some("Mix")).unwrap();
        index
            .add_item(
                &CollectionRef::playlist("Mix"),
                NewMediaItem::new("v1", "Song").subtitle("Artist"),
            )
            .unwrap();
        index
            .add_item(&CollectionRef::Favorites, NewMediaItem::new("v2", "Tune"))
            .unwrap();
        index.remove_item(&CollectionRef::Favorites, "v2").unwrap();
        index.rename_playlist("Mix", "Drive").unwrap();
        index.delete_playlist("Drive");

        assert_eq!(
            notifications(&mut stream),
            vec![
                "Created new playlist Mix",
                "Added Song - Artist to playlist Mix",
                "Added item to favorites: Tune",
                "Removed item from favorites: Tune",
                "Playlist Mix renamed to Drive",
                "Playlist Drive deleted",
            ]
        );
    }

    #[test]
    fn test_muted_notifications_keep_library_events() {
        let (mut index, sink, bus) = setup();
        let mut toasts = EventStream::new(bus.subscribe());
        let mut library_events = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Library(_)));

        index.set_notifications_enabled(false);
        index
            .add_item(&CollectionRef::Favorites, NewMediaItem::new("v1", "Song"))
            .unwrap();

        assert!(notifications(&mut toasts).is_empty());
        assert_eq!(library_events.drain().len(), 1);
        assert_eq!(sink.count(), 1);

        index.set_notifications_enabled(true);
        index.remove_item(&CollectionRef::Favorites, "v1").unwrap();
        assert_eq!(
            notifications(&mut toasts),
            vec!["Removed item from favorites: Song"]
        );
    }

    #[test]
    fn test_create_playlist_picks_unique_names() {
        let (mut index, _sink, _bus) = setup();

        assert_eq!(index.create_playlist(None).unwrap(), "Unnamed Playlist");
        assert_eq!(index.create_playlist(None).unwrap(), "Unnamed Playlist 2");
        assert_eq!(index.create_playlist(None).unwrap(), "Unnamed Playlist 3");
        assert_eq!(index.create_playlist(Some("Mix")).unwrap(), "Mix");
        assert_eq!(index.create_playlist(Some("Mix")).unwrap(), "Mix 2");
        assert!(index.create_playlist(Some("Favorites")).is_err());
    }

    #[test]
    fn test_rename_conflict_leaves_both_unchanged() {
        let (mut index, sink, _bus) = setup();
        index.create_playlist(Some("A")).unwrap();
        index.create_playlist(Some("B")).unwrap();
        index
            .add_item(&CollectionRef::playlist("A"), NewMediaItem::new("a1", "One"))
            .unwrap();
        index
            .add_item(&CollectionRef::playlist("B"), NewMediaItem::new("b1", "Two"))
            .unwrap();
        let before = sink.count();

        let result = index.rename_playlist("A", "B");

        assert_eq!(
            result,
            Err(LibraryError::NameConflict {
                name: "B".to_string()
            })
        );
        assert!(index.playlist("A").unwrap().contains_item("a1"));
        assert!(index.playlist("B").unwrap().contains_item("b1"));
        assert_eq!(index.playlist_names(), vec!["A", "B"]);
        assert_eq!(sink.count(), before);

        assert!(matches!(
            index.rename_playlist("A", FAVORITES_KEY),
            Err(LibraryError::NameConflict { .. })
        ));
        assert!(matches!(
            index.rename_playlist("nope", "C"),
            Err(LibraryError::CollectionNotFound { .. })
        ));
    }

    #[test]
    fn test_rename_moves_items_under_new_key() {
        let (mut index, sink, _bus) = setup();
        index.create_playlist(Some("A")).unwrap();
        index
            .add_item(&CollectionRef::playlist("A"), NewMediaItem::new("a1", "One"))
            .unwrap();

        index.rename_playlist("A", "Z").unwrap();

        let snapshot = sink.last();
        assert!(snapshot.get("A").is_none());
        assert_eq!(snapshot["Z"]["a1"]["title"], "One");
    }

    #[test]
    fn test_empty_playlist_renders_as_null() {
        let (mut index, sink, _bus) = setup();
        index.create_playlist(Some("Empty")).unwrap();
        assert_eq!(sink.last()["Empty"], Value::Null);
    }

    #[test]
    fn test_item_playlists_and_delete() {
        let (mut index, _sink, _bus) = setup();
        for name in ["A", "B", "C"] {
            index.create_playlist(Some(name)).unwrap();
        }
        for name in ["A", "C"] {
            index
                .add_item(&CollectionRef::playlist(name), NewMediaItem::new("v", "V"))
                .unwrap();
        }

        assert_eq!(index.item_playlists("v", None), vec!["A", "C"]);
        assert_eq!(index.item_playlists("v", Some("A")), vec!["C"]);

        assert!(index.delete_playlist("A"));
        assert!(!index.delete_playlist("A"));
        assert_eq!(index.item_playlists("v", None), vec!["C"]);
    }

    #[test]
    fn test_unknown_playlist_is_an_error() {
        let (mut index, _sink, _bus) = setup();
        assert_eq!(
            index.add_item(&CollectionRef::playlist("Ghost"), NewMediaItem::new("v", "V")),
            Err(LibraryError::CollectionNotFound {
                name: "Ghost".to_string()
            })
        );
    }

    #[test]
    fn test_materialize_merges_quietly() {
        let (mut index, sink, bus) = setup();
        index.create_playlist(Some("Local")).unwrap();
        index
            .add_item(&CollectionRef::Favorites, NewMediaItem::new("mine", "Mine"))
            .unwrap();
        let mut stream = EventStream::new(bus.subscribe());
        let before = sink.count();

        let document = LibraryDocument::parse(
            json!({
                "Favorites": {"remote": {"title": "Remote", "timestamp": "5"},
                              "mine": {"title": "Mine", "timestamp": "1000"}},
                "Local": {"x": {"title": "X", "timestamp": "6"}},
                "Shared": null
            })
            .as_object()
            .unwrap(),
        )
        .unwrap();

        let report = index.materialize(&document);

        assert_eq!(
            report,
            MaterializeReport {
                playlists_created: 1,
                items_added: 2
            }
        );
        assert!(index.is_favorited("mine"));
        assert!(index.is_favorited("remote"));
        assert!(index.playlist("Local").unwrap().contains_item("x"));
        assert!(index.playlist("Shared").unwrap().is_empty());
        assert_eq!(sink.count(), before);
        assert!(notifications(&mut stream).is_empty());

        // Notifications come back after the import.
        index.create_playlist(Some("After")).unwrap();
        assert_eq!(notifications(&mut stream), vec!["Created new playlist After"]);
    }

    #[test]
    fn test_generation_orders_renders_around_a_merge() {
        let (mut index, sink, _bus) = setup();
        index
            .add_item(&CollectionRef::Favorites, NewMediaItem::new("a", "A"))
            .unwrap();
        let before_merge = sink.snapshots.lock().unwrap()[0].generation();

        index.materialize(&LibraryDocument::default());
        let merged = index.render();
        index
            .add_item(&CollectionRef::Favorites, NewMediaItem::new("b", "B"))
            .unwrap();
        let after_merge = sink.snapshots.lock().unwrap()[1].generation();

        assert!(before_merge < merged.generation());
        assert!(merged.generation() < after_merge);
        assert_eq!(index.generation(), after_merge);
    }

    #[test]
    fn test_render_materialize_round_trip() {
        let (mut index, _sink, _bus) = setup();
        index.create_playlist(Some("P")).unwrap();
        index
            .add_items(
                &CollectionRef::playlist("P"),
                vec![NewMediaItem::new("a", "A"), NewMediaItem::new("b", "B").inserted_at(7)],
            )
            .unwrap();
        index
            .add_item(&CollectionRef::Favorites, NewMediaItem::new("f", "F"))
            .unwrap();
        let rendered = index.render();

        let mut fresh = LibraryIndex::new(Arc::new(ManualClock::new(0)));
        fresh.materialize(&LibraryDocument::parse(rendered.as_body()).unwrap());

        assert_eq!(fresh.render(), rendered);
    }

    #[test]
    fn test_disconnect_and_reset() {
        let (mut index, sink, _bus) = setup();
        index.disconnect();
        index.create_playlist(Some("Quiet")).unwrap();
        assert_eq!(sink.count(), 0);

        index.reset();
        assert!(index.playlists().is_empty());
        assert!(index.favorites().is_empty());
    }
}
