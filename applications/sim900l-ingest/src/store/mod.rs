pub mod auth;
pub mod firestore;

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

pub use firestore::FirestoreClient;

/// Field map handed to the store for a single document.
pub type Document = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Array(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
    /// Filled in by the store with its own commit time.
    ServerTimestamp,
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FieldValue::String(s),
            Value::Array(items) => FieldValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                FieldValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Store rejected write ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("No answer within {0:?}")]
    Timeout(std::time::Duration),
}

/// Create-only access to a document store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document in `collection` and return its generated id.
    async fn create_document(&self, collection: &str, fields: Document)
        -> Result<String, StoreError>;

    /// Whether the last interaction with the backend succeeded.
    fn is_connected(&self) -> bool;

    fn backend(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_field_value_from_json() {
        let value: FieldValue = json!({
            "lat": 59.33,
            "cell": 4021,
            "name": "tower",
            "fix": true,
            "tags": ["gsm", null]
        })
        .into();

        let mut expected = BTreeMap::new();
        expected.insert("lat".to_string(), FieldValue::Double(59.33));
        expected.insert("cell".to_string(), FieldValue::Integer(4021));
        expected.insert("name".to_string(), FieldValue::String("tower".into()));
        expected.insert("fix".to_string(), FieldValue::Bool(true));
        expected.insert(
            "tags".to_string(),
            FieldValue::Array(vec![FieldValue::String("gsm".into()), FieldValue::Null]),
        );

        assert_eq!(value, FieldValue::Map(expected));
    }
}
