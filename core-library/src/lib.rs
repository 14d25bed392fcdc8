//! # Library Management Module
//!
//! In-memory model of the user's media library: a favorites collection and
//! any number of named playlists, each an insertion-ordered set of media
//! items.
//!
//! ## Overview
//!
//! - [`models`]: `MediaItem`, item drafts, collection addressing and naming rules
//! - [`collection`]: the ordered, id-unique `Collection`
//! - [`index`]: `LibraryIndex`, the owner of all collections and source of
//!   library-changed snapshots
//! - [`schema`]: validated translation between the index and the flat JSON
//!   document stored remotely
//!
//! ## Usage
//!
//! ```
//! use bridge_traits::SystemClock;
//! use core_library::{CollectionRef, LibraryIndex, NewMediaItem};
//! use std::sync::Arc;
//!
//! let mut library = LibraryIndex::new(Arc::new(SystemClock));
//! let name = library.create_playlist(Some("Road trip"))?;
//! library.add_item(
//!     &CollectionRef::Playlist(name),
//!     NewMediaItem::new("dQw4w9WgXcQ", "Never Gonna Give You Up").subtitle("Rick Astley"),
//! )?;
//! assert_eq!(library.item_playlists("dQw4w9WgXcQ", None), vec!["Road trip"]);
//! # Ok::<(), core_library::LibraryError>(())
//! ```

pub mod collection;
pub mod error;
pub mod index;
pub mod models;
pub mod schema;

pub use collection::{Collection, CollectionChange};
pub use error::{LibraryError, Result};
pub use index::{LibraryIndex, MaterializeReport, SnapshotSink};
pub use models::{CollectionRef, MediaItem, NewMediaItem, DEFAULT_PLAYLIST_NAME, FAVORITES_KEY};
pub use schema::{LibraryDocument, LibrarySnapshot};

/// Library shared between the host and the sync engine.
pub type SharedLibrary = std::sync::Arc<tokio::sync::Mutex<LibraryIndex>>;
