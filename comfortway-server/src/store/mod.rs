//! Document storage abstractions
//!
//! The backing database is a schemaless document store: named collections
//! of JSON objects keyed by an opaque id, with equality filtering and
//! descending ordering on a single field.

pub mod memory;
pub mod models;
pub mod sqlite;
pub mod timestamp;

pub use memory::InMemoryDocumentStore;
pub use models::*;
pub use sqlite::SqliteDocumentStore;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::error::ApiError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, ApiError>;

/// Body of a stored document
pub type Fields = serde_json::Map<String, Value>;

/// A stored document and its id
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Flatten into `{ "id": ..., ...fields }`
    pub fn into_json(self) -> Value {
        let mut object = Fields::new();
        object.insert("id".to_string(), Value::String(self.id));
        object.extend(self.fields);
        Value::Object(object)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("id", &self.id)?;
        for (key, value) in &self.fields {
            if key != "id" {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

/// Selection over one collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filter: Option<(String, Value)>,
    order_by_desc: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only documents whose `field` equals `value`
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some((field.into(), value.into()));
        self
    }

    /// Newest (largest) values of `field` first
    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.order_by_desc = Some(field.into());
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match &self.filter {
            Some((field, value)) => doc.fields.get(field) == Some(value),
            None => true,
        }
    }

    /// Filter and order documents supplied in insertion order.
    ///
    /// Ties on the ordering field keep the most recently inserted first.
    pub fn apply(&self, docs: Vec<Document>) -> Vec<Document> {
        let mut docs: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();
        if let Some(field) = &self.order_by_desc {
            docs.reverse();
            docs.sort_by(|a, b| compare_values(b.fields.get(field), a.fields.get(field)));
        }
        docs
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over optional JSON values; missing fields sort lowest
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => type_rank(x).cmp(&type_rank(y)),
    }
}

/// Trait for the document database
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document under a freshly generated id
    async fn insert(&self, collection: &str, fields: Fields) -> StoreResult<Document>;

    /// Insert a document under `id`, failing with `AlreadyExists` if taken
    async fn insert_with_id(&self, collection: &str, id: &str, fields: Fields)
        -> StoreResult<Document>;

    /// Create or fully replace the document at `id`
    async fn put(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<Document>;

    /// Get a document by id
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Run a query against one collection
    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>>;

    /// Merge `fields` into an existing document, failing with `NotFound` if absent
    async fn merge(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<Document>;

    /// Delete a document, returning whether it existed
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// Names of all non-empty collections
    async fn collections(&self) -> StoreResult<Vec<String>>;

    /// Number of documents in a collection
    async fn count(&self, collection: &str) -> StoreResult<u64>;
}

/// Allow using Box<dyn DocumentStore> as a DocumentStore
#[async_trait]
impl DocumentStore for Box<dyn DocumentStore> {
    async fn insert(&self, collection: &str, fields: Fields) -> StoreResult<Document> {
        (**self).insert(collection, fields).await
    }

    async fn insert_with_id(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> StoreResult<Document> {
        (**self).insert_with_id(collection, id, fields).await
    }

    async fn put(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<Document> {
        (**self).put(collection, id, fields).await
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        (**self).get(collection, id).await
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        (**self).query(collection, query).await
    }

    async fn merge(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<Document> {
        (**self).merge(collection, id, fields).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        (**self).delete(collection, id).await
    }

    async fn collections(&self) -> StoreResult<Vec<String>> {
        (**self).collections().await
    }

    async fn count(&self, collection: &str) -> StoreResult<u64> {
        (**self).count(collection).await
    }
}
