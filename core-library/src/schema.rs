//! Library document schema.
//!
//! The library is persisted as one flat JSON object:
//!
//! ```json
//! {
//!   "Favorites": { "<item id>": { "title": "...", "subtitle": "...", "thumbnail": "...",
//!                                 "duration": "...", "timestamp": "1700000000000" } },
//!   "Road trip": { "<item id>": { ... } },
//!   "Empty one": null
//! }
//! ```
//!
//! Keys starting with `_` belong to the store and are skipped. An empty
//! playlist is written as `null`; older clients also wrote the string
//! `"null"`, which is still accepted. Timestamps are written as strings of
//! epoch milliseconds and read from either strings or numbers.
//!
//! Parsing validates the whole document before anything is materialized, so
//! a malformed document never half-populates the library.

use bridge_traits::document::{is_reserved_key, DocumentBody};
use serde_json::{Map, Value};

use crate::collection::Collection;
use crate::error::{LibraryError, Result};
use crate::models::{MediaItem, FAVORITES_KEY};

const LEGACY_EMPTY_PLAYLIST: &str = "null";

/// Serialized form of the whole library: the JSON body tracked by the sync
/// engine.
///
/// Each snapshot carries the generation of the index that rendered it, so a
/// consumer can tell a render taken before a merge from one taken after.
/// Equality compares bodies only.
#[derive(Debug, Clone, Default)]
pub struct LibrarySnapshot {
    body: DocumentBody,
    generation: u64,
}

impl LibrarySnapshot {
    pub(crate) fn new(body: DocumentBody, generation: u64) -> Self {
        Self { body, generation }
    }

    pub fn as_body(&self) -> &DocumentBody {
        &self.body
    }

    pub fn into_body(self) -> DocumentBody {
        self.body
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl PartialEq for LibrarySnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.body == other.body
    }
}

impl From<LibrarySnapshot> for DocumentBody {
    fn from(snapshot: LibrarySnapshot) -> Self {
        snapshot.body
    }
}

/// A validated library document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LibraryDocument {
    pub favorites: Vec<MediaItem>,
    /// Playlists in key order, items ordered by insertion time.
    pub playlists: Vec<(String, Vec<MediaItem>)>,
}

impl LibraryDocument {
    /// Validate and decode a fetched document body.
    pub fn parse(body: &DocumentBody) -> Result<Self> {
        let mut document = LibraryDocument::default();

        for (key, value) in body {
            if is_reserved_key(key) {
                continue;
            }
            if key.trim().is_empty() {
                return Err(malformed(key, "collection name cannot be empty"));
            }
            let items = parse_collection(key, value)?;
            if key == FAVORITES_KEY {
                document.favorites = items;
            } else {
                document.playlists.push((key.clone(), items));
            }
        }

        Ok(document)
    }

    /// Canonical body for this document, at generation zero.
    pub fn render(&self) -> LibrarySnapshot {
        let mut body = Map::new();
        body.insert(FAVORITES_KEY.to_string(), render_items(&self.favorites));
        for (name, items) in &self.playlists {
            body.insert(name.clone(), render_playlist(items));
        }
        LibrarySnapshot::new(body, 0)
    }
}

/// Render live collections into a snapshot.
pub(crate) fn render_collections<'a>(
    favorites: &Collection,
    playlists: impl IntoIterator<Item = &'a Collection>,
    generation: u64,
) -> LibrarySnapshot {
    let mut body = Map::new();
    body.insert(FAVORITES_KEY.to_string(), render_items(favorites.items()));
    for playlist in playlists {
        body.insert(playlist.name().to_string(), render_playlist(playlist.items()));
    }
    LibrarySnapshot::new(body, generation)
}

fn render_playlist(items: &[MediaItem]) -> Value {
    if items.is_empty() {
        Value::Null
    } else {
        render_items(items)
    }
}

fn render_items(items: &[MediaItem]) -> Value {
    let entries = items
        .iter()
        .map(|item| {
            let mut fields = Map::new();
            fields.insert("title".into(), Value::String(item.title().to_string()));
            fields.insert("subtitle".into(), Value::String(item.subtitle().to_string()));
            fields.insert("thumbnail".into(), Value::String(item.thumbnail().to_string()));
            fields.insert("duration".into(), Value::String(item.duration().to_string()));
            fields.insert(
                "timestamp".into(),
                Value::String(item.inserted_at_millis().to_string()),
            );
            (item.id().to_string(), Value::Object(fields))
        })
        .collect();
    Value::Object(entries)
}

fn malformed(path: &str, reason: impl Into<String>) -> LibraryError {
    LibraryError::MalformedDocument {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn parse_collection(key: &str, value: &Value) -> Result<Vec<MediaItem>> {
    let entries = match value {
        Value::Null => return Ok(Vec::new()),
        Value::String(s) if s == LEGACY_EMPTY_PLAYLIST => return Ok(Vec::new()),
        Value::Object(entries) => entries,
        other => {
            return Err(malformed(
                key,
                format!("expected an object or null, found {}", kind(other)),
            ))
        }
    };

    let mut items = entries
        .iter()
        .map(|(id, fields)| parse_item(&format!("{}.{}", key, id), id, fields))
        .collect::<Result<Vec<_>>>()?;
    items.sort_by(|a, b| {
        a.inserted_at_millis()
            .cmp(&b.inserted_at_millis())
            .then_with(|| a.id().cmp(b.id()))
    });
    Ok(items)
}

fn parse_item(path: &str, id: &str, value: &Value) -> Result<MediaItem> {
    let fields = value
        .as_object()
        .ok_or_else(|| malformed(path, format!("expected an object, found {}", kind(value))))?;

    let title = required_text(path, fields, "title")?;
    let subtitle = optional_text(path, fields, "subtitle")?;
    let thumbnail = optional_text(path, fields, "thumbnail")?;
    let duration = optional_text(path, fields, "duration")?;
    let timestamp = parse_timestamp(path, fields)?;

    MediaItem::from_stored(id, title, subtitle, thumbnail, duration, timestamp)
        .map_err(|e| malformed(path, e.to_string()))
}

fn required_text(path: &str, fields: &Map<String, Value>, name: &str) -> Result<String> {
    match fields.get(name) {
        Some(_) => optional_text(path, fields, name),
        None => Err(malformed(&format!("{}.{}", path, name), "missing field")),
    }
}

/// Strings as-is, numbers as their decimal form, missing or null as empty.
fn optional_text(path: &str, fields: &Map<String, Value>, name: &str) -> Result<String> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(malformed(
            &format!("{}.{}", path, name),
            format!("expected a string, found {}", kind(other)),
        )),
    }
}

fn parse_timestamp(path: &str, fields: &Map<String, Value>) -> Result<i64> {
    let field_path = format!("{}.timestamp", path);
    match fields.get("timestamp") {
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| malformed(&field_path, format!("'{}' is not epoch milliseconds", s))),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| malformed(&field_path, format!("{} is not epoch milliseconds", n))),
        Some(other) => Err(malformed(
            &field_path,
            format!("expected a string or number, found {}", kind(other)),
        )),
        None => Err(malformed(&field_path, "missing field")),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
