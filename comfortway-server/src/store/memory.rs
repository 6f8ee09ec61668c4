//! In-memory document store

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{Document, DocumentStore, Fields, Query, StoreResult};
use crate::crypto::generate_id;
use crate::error::ApiError;

struct StoredDocument {
    seq: u64,
    fields: Fields,
}

type Collections = HashMap<String, HashMap<String, StoredDocument>>;

/// In-memory document store
pub struct InMemoryDocumentStore {
    collections: RwLock<Collections>,
    next_seq: AtomicU64,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|_| ApiError::Upstream("document store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|_| ApiError::Upstream("document store lock poisoned".to_string()))
    }

    fn seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, collection: &str, fields: Fields) -> StoreResult<Document> {
        let id = generate_id();
        self.insert_with_id(collection, &id, fields).await
    }

    async fn insert_with_id(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> StoreResult<Document> {
        let seq = self.seq();
        let mut collections = self.write()?;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(id) {
            return Err(ApiError::AlreadyExists("Document".to_string()));
        }
        docs.insert(
            id.to_string(),
            StoredDocument {
                seq,
                fields: fields.clone(),
            },
        );
        Ok(Document::new(id, fields))
    }

    async fn put(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<Document> {
        let seq = self.seq();
        let mut collections = self.write()?;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.get_mut(id) {
            Some(existing) => existing.fields = fields.clone(),
            None => {
                docs.insert(
                    id.to_string(),
                    StoredDocument {
                        seq,
                        fields: fields.clone(),
                    },
                );
            }
        }
        Ok(Document::new(id, fields))
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|stored| Document::new(id, stored.fields.clone())))
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        let collections = self.read()?;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut ordered: Vec<(&String, &StoredDocument)> = docs.iter().collect();
        ordered.sort_by_key(|(_, stored)| stored.seq);

        let docs = ordered
            .into_iter()
            .map(|(id, stored)| Document::new(id.clone(), stored.fields.clone()))
            .collect();
        Ok(query.apply(docs))
    }

    async fn merge(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<Document> {
        let mut collections = self.write()?;
        let stored = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| ApiError::NotFound("Document".to_string()))?;
        stored.fields.extend(fields);
        Ok(Document::new(id, stored.fields.clone()))
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut collections = self.write()?;
        Ok(collections
            .get_mut(collection)
            .map(|docs| docs.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn collections(&self) -> StoreResult<Vec<String>> {
        let collections = self.read()?;
        let mut names: Vec<String> = collections
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn count(&self, collection: &str) -> StoreResult<u64> {
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0))
    }
}
