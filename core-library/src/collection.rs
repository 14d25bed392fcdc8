//! Named, insertion-ordered set of media items.

use std::collections::HashMap;

use crate::models::MediaItem;

/// What a mutation changed. Batch operations report every affected item in
/// one change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionChange {
    Added(Vec<MediaItem>),
    Removed(Vec<MediaItem>),
}

impl CollectionChange {
    pub fn items(&self) -> &[MediaItem] {
        match self {
            CollectionChange::Added(items) | CollectionChange::Removed(items) => items,
        }
    }

    pub fn item_ids(&self) -> Vec<String> {
        self.items().iter().map(|item| item.id().to_string()).collect()
    }
}

/// A playlist or the favorites collection.
///
/// Items keep insertion order and ids are unique: adding an id that is
/// already present is a silent no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    name: String,
    items: Vec<MediaItem>,
    positions: HashMap<String, usize>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&MediaItem> {
        self.positions.get(id).map(|&index| &self.items[index])
    }

    pub fn contains_item(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn insert(&mut self, item: MediaItem) -> bool {
        if self.positions.contains_key(item.id()) {
            return false;
        }
        self.positions.insert(item.id().to_string(), self.items.len());
        self.items.push(item);
        true
    }

    fn reindex(&mut self) {
        self.positions = self
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| (item.id().to_string(), index))
            .collect();
    }

    /// Add one item; `None` if its id is already present.
    pub fn add_item(&mut self, item: MediaItem) -> Option<CollectionChange> {
        let added = item.clone();
        self.insert(item)
            .then(|| CollectionChange::Added(vec![added]))
    }

    /// Add several items; ids already present (or repeated within the batch)
    /// are skipped. `None` if nothing was added.
    pub fn add_items(&mut self, items: impl IntoIterator<Item = MediaItem>) -> Option<CollectionChange> {
        let mut added = Vec::new();
        for item in items {
            let candidate = item.clone();
            if self.insert(item) {
                added.push(candidate);
            }
        }
        (!added.is_empty()).then_some(CollectionChange::Added(added))
    }

    /// Remove one item; `None` if the id is not present.
    pub fn remove_item(&mut self, id: &str) -> Option<CollectionChange> {
        self.remove_items(std::iter::once(id))
    }

    /// Remove several items; unknown ids are ignored. `None` if nothing was
    /// removed.
    pub fn remove_items<'a>(
        &mut self,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> Option<CollectionChange> {
        let mut removed = Vec::new();
        for id in ids {
            if let Some(index) = self.positions.remove(id) {
                removed.push(index);
            }
        }
        if removed.is_empty() {
            return None;
        }

        removed.sort_unstable();
        let mut taken = Vec::with_capacity(removed.len());
        for index in removed.into_iter().rev() {
            taken.push(self.items.remove(index));
        }
        taken.reverse();
        self.reindex();
        Some(CollectionChange::Removed(taken))
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.positions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMediaItem;

    fn item(id: &str, at: i64) -> MediaItem {
        NewMediaItem::new(id, format!("Title {}", id))
            .build(at)
            .unwrap()
    }

    fn ids(collection: &Collection) -> Vec<&str> {
        collection.items().iter().map(|i| i.id()).collect()
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut playlist = Collection::new("Mix");
        assert!(playlist.add_item(item("a", 1)).is_some());
        assert!(playlist.add_item(item("a", 2)).is_none());

        assert_eq!(playlist.len(), 1);
        assert_eq!(playlist.get("a").unwrap().inserted_at_millis(), 1);
    }

    #[test]
    fn test_batch_add_reports_only_new_items() {
        let mut playlist = Collection::new("Mix");
        playlist.add_item(item("a", 1));

        let change = playlist
            .add_items(vec![item("a", 2), item("b", 2), item("b", 3), item("c", 2)])
            .unwrap();

        assert_eq!(change.item_ids(), vec!["b", "c"]);
        assert_eq!(ids(&playlist), vec!["a", "b", "c"]);
        assert!(playlist.add_items(vec![item("c", 9)]).is_none());
    }

    #[test]
    fn test_remove_missing_is_reported() {
        let mut playlist = Collection::new("Mix");
        playlist.add_item(item("a", 1));

        assert!(playlist.remove_item("zzz").is_none());
        assert!(playlist.remove_items(["x", "y"]).is_none());
        assert_eq!(playlist.len(), 1);
    }

    #[test]
    fn test_remove_keeps_order_and_index() {
        let mut playlist = Collection::new("Mix");
        playlist.add_items((0..5).map(|i| item(&format!("v{}", i), i)));

        let change = playlist.remove_items(["v3", "v1", "nope"]).unwrap();
        assert_eq!(change.item_ids(), vec!["v1", "v3"]);
        assert_eq!(ids(&playlist), vec!["v0", "v2", "v4"]);
        assert_eq!(playlist.get("v4").unwrap().id(), "v4");
        assert!(!playlist.contains_item("v1"));

        // Positions stay consistent after removal.
        assert!(playlist.add_item(item("v1", 10)).is_some());
        assert_eq!(ids(&playlist), vec!["v0", "v2", "v4", "v1"]);
    }
}
