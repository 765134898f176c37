//! In-memory document store
//!
//! Used by tests in place of a live store. Collections are ordered maps so
//! listing order matches the other backends (document id order).

use super::{field_at, Document, DocumentPage, DocumentStore, Fields};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

type Collection = BTreeMap<String, Fields>;

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, Collection>>,
    /// Document ids whose lookups fail with a store error
    failing_ids: RwLock<HashSet<String>>,
    patches: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document, replacing any existing one
    pub async fn insert(&self, collection: &str, id: &str, fields: Fields) {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
    }

    /// Current fields of a document
    pub async fn fields(&self, collection: &str, id: &str) -> Option<Fields> {
        self.collections
            .read()
            .await
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned()
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Number of merge-patch writes applied so far
    pub fn patch_count(&self) -> usize {
        self.patches.load(Ordering::SeqCst)
    }

    /// Make every `get_by_id` for this document id fail
    pub async fn fail_lookups_of(&self, id: &str) {
        self.failing_ids.write().await.insert(id.to_string());
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        if self.failing_ids.read().await.contains(id) {
            return Err(Error::Store(format!("simulated failure reading {}/{}", collection, id)));
        }
        Ok(self
            .fields(collection, id)
            .await
            .map(|fields| Document::new(id, fields)))
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field_path: &str,
        value: &Value,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|(_, fields)| field_at(fields, field_path) == Some(value))
            .take(limit)
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .collect())
    }

    async fn merge_patch(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .entry(collection.to_string())
            .or_default()
            .entry(id.to_string())
            .or_default();
        for (key, value) in fields {
            doc.insert(key, value);
        }
        self.patches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_page(
        &self,
        collection: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<DocumentPage> {
        if page_size == 0 {
            return Err(Error::InvalidInput("page_size must be positive".to_string()));
        }
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(DocumentPage::default());
        };

        let mut remaining = docs
            .iter()
            .filter(|(id, _)| page_token.map_or(true, |after| id.as_str() > after));
        let documents: Vec<Document> = remaining
            .by_ref()
            .take(page_size)
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .collect();
        let has_more = remaining.next().is_some();

        let next_page_token = if has_more {
            documents.last().map(|d| d.id.clone())
        } else {
            None
        };
        Ok(DocumentPage {
            documents,
            next_page_token,
            ..Default::default()
        })
    }
}
