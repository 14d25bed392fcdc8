//! Domain models for the media library
//!
//! A [`MediaItem`] is immutable once built. Callers describe new items with
//! [`NewMediaItem`]; the library stamps the insertion time when the draft
//! carries none.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LibraryError, Result};

/// Reserved document key holding the favorites collection.
pub const FAVORITES_KEY: &str = "Favorites";

/// Name given to playlists created without one.
pub const DEFAULT_PLAYLIST_NAME: &str = "Unnamed Playlist";

// =============================================================================
// Collection names
// =============================================================================

/// Addresses one collection of the library.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionRef {
    Favorites,
    Playlist(String),
}

impl CollectionRef {
    pub fn playlist(name: impl Into<String>) -> Self {
        CollectionRef::Playlist(name.into())
    }

    /// Key of this collection in the library document.
    pub fn key(&self) -> &str {
        match self {
            CollectionRef::Favorites => FAVORITES_KEY,
            CollectionRef::Playlist(name) => name,
        }
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Check that `name` can be used as a playlist name.
///
/// Names are non-empty, not the favorites key and do not start with the
/// store's `_` metadata prefix.
pub fn validate_playlist_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| LibraryError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("name cannot be empty"));
    }
    if name == FAVORITES_KEY {
        return Err(LibraryError::NameConflict {
            name: name.to_string(),
        });
    }
    if bridge_traits::document::is_reserved_key(name) {
        return Err(invalid("names starting with '_' are reserved"));
    }
    Ok(())
}

// =============================================================================
// Media items
// =============================================================================

/// A media item stored in a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    id: String,
    title: String,
    subtitle: String,
    thumbnail: String,
    duration: String,
    inserted_at_millis: i64,
}

impl MediaItem {
    /// Build an item; `id` and `title` must be non-empty.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        subtitle: impl Into<String>,
        thumbnail: impl Into<String>,
        duration: impl Into<String>,
        inserted_at_millis: i64,
    ) -> Result<Self> {
        let item = Self {
            id: id.into(),
            title: title.into(),
            subtitle: subtitle.into(),
            thumbnail: thumbnail.into(),
            duration: duration.into(),
            inserted_at_millis,
        };
        item.validate()?;
        Ok(item)
    }

    /// Rebuild an item read back from the library document.
    ///
    /// Stored entries only need an id; an empty title is kept as-is.
    pub(crate) fn from_stored(
        id: impl Into<String>,
        title: String,
        subtitle: String,
        thumbnail: String,
        duration: String,
        inserted_at_millis: i64,
    ) -> Result<Self> {
        let item = Self {
            id: id.into(),
            title,
            subtitle,
            thumbnail,
            duration,
            inserted_at_millis,
        };
        item.validate_id()?;
        Ok(item)
    }

    fn validate_id(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(LibraryError::InvalidItem {
                id: self.id.clone(),
                reason: "item id cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.validate_id()?;
        if self.title.trim().is_empty() {
            return Err(LibraryError::InvalidItem {
                id: self.id.clone(),
                reason: "item title cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> &str {
        &self.subtitle
    }

    pub fn thumbnail(&self) -> &str {
        &self.thumbnail
    }

    /// Display duration as provided by the media source (e.g. `"3:45"`).
    pub fn duration(&self) -> &str {
        &self.duration
    }

    pub fn inserted_at_millis(&self) -> i64 {
        self.inserted_at_millis
    }

    /// `"Title - Subtitle"`, or just the title when there is no subtitle.
    pub fn label(&self) -> String {
        if self.subtitle.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.subtitle)
        }
    }
}

/// Draft of an item to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMediaItem {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub thumbnail: String,
    pub duration: String,
    /// Insertion time; the library clock is used when absent.
    pub inserted_at_millis: Option<i64>,
}

impl NewMediaItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subtitle: String::new(),
            thumbnail: String::new(),
            duration: String::new(),
            inserted_at_millis: None,
        }
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    pub fn thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = thumbnail.into();
        self
    }

    pub fn duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = duration.into();
        self
    }

    pub fn inserted_at(mut self, millis: i64) -> Self {
        self.inserted_at_millis = Some(millis);
        self
    }

    /// Finish the draft, stamping `now_millis` if no time was given.
    pub fn build(self, now_millis: i64) -> Result<MediaItem> {
        MediaItem::new(
            self.id,
            self.title,
            self.subtitle,
            self.thumbnail,
            self.duration,
            self.inserted_at_millis.unwrap_or(now_millis),
        )
    }
}
