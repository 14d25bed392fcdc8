//! CouchDB wire types

use serde::{Deserialize, Serialize};

/// Response to a successful `PUT /{db}/{doc}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PutResponse {
    #[serde(default)]
    pub ok: bool,
    pub id: String,
    /// Revision assigned to the stored document
    pub rev: String,
}

/// Error body CouchDB attaches to non-2xx responses
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub reason: String,
}

/// Response of `GET /{db}/_changes`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChangesResponse {
    #[serde(default)]
    pub results: Vec<ChangeRow>,

    /// Sequence to resume from. A string on CouchDB 2.x and later, a number
    /// on 1.x.
    pub last_seq: serde_json::Value,
}

impl ChangesResponse {
    /// `last_seq` in the form the `since` parameter expects.
    pub fn resume_token(&self) -> String {
        match &self.last_seq {
            serde_json::Value::String(seq) => seq.clone(),
            other => other.to_string(),
        }
    }
}

/// One changed document
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChangeRow {
    pub id: String,

    /// Leaf revisions; the first one is the winner with the default style
    #[serde(default)]
    pub changes: Vec<ChangeRevision>,

    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChangeRevision {
    pub rev: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_token_accepts_strings_and_numbers() {
        let modern: ChangesResponse =
            serde_json::from_str(r#"{"results": [], "last_seq": "12-g1AAAA"}"#).unwrap();
        assert_eq!(modern.resume_token(), "12-g1AAAA");

        let legacy: ChangesResponse =
            serde_json::from_str(r#"{"results": [], "last_seq": 42}"#).unwrap();
        assert_eq!(legacy.resume_token(), "42");
    }

    #[test]
    fn test_change_row_defaults() {
        let row: ChangeRow = serde_json::from_str(r#"{"id": "videos", "seq": 3}"#).unwrap();
        assert!(row.changes.is_empty());
        assert!(!row.deleted);
    }
}
