use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    #[error("A collection named '{name}' already exists")]
    NameConflict { name: String },

    #[error("Invalid collection name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Collection not found: {name}")]
    CollectionNotFound { name: String },

    #[error("Invalid item '{id}': {reason}")]
    InvalidItem { id: String, reason: String },

    #[error("Malformed library document at '{path}': {reason}")]
    MalformedDocument { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, LibraryError>;
