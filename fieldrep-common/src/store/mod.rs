//! Document store repository
//!
//! The reconciliation engine only ever talks to a [`DocumentStore`]. It
//! needs four operations: point lookup, single-field equality query,
//! merge-patch and paged listing. Anything richer the real store offers
//! (transactions, batched writes, listeners) is deliberately unused.
//!
//! Backends:
//! - [`MemoryStore`]: in-process fake for tests
//! - [`SqliteStore`]: JSON documents in a local SQLite file
//! - [`FirestoreStore`]: Cloud Firestore over its REST API

use crate::config::{StoreBackend, StoreConfig};
use crate::credentials::Credentials;
use crate::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

pub mod firestore;
pub mod memory;
#[cfg(feature = "sqlx")]
pub mod sqlite;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
#[cfg(feature = "sqlx")]
pub use sqlite::SqliteStore;

/// Top-level fields of a document
pub type Fields = Map<String, Value>;

/// A stored document: its id within the collection plus its fields
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

    /// Look up a possibly nested field by dotted path (`general.projectId`)
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        field_at(&self.fields, path)
    }
}

/// A listed document whose body could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndecodableDocument {
    pub id: String,
    pub reason: String,
}

/// One page of a collection listing
///
/// Documents that fail to decode are reported in `undecodable` instead of
/// failing the page.
#[derive(Debug, Clone, Default)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    pub undecodable: Vec<UndecodableDocument>,
    /// Token for the next page; `None` on the last page
    pub next_page_token: Option<String>,
}

impl DocumentPage {
    /// Split decode results into documents and undecodable entries
    pub(crate) fn collect(
        results: impl IntoIterator<Item = (String, Result<Document>)>,
        next_page_token: Option<String>,
    ) -> Self {
        let mut page = DocumentPage {
            next_page_token,
            ..Default::default()
        };
        for (id, result) in results {
            match result {
                Ok(doc) => page.documents.push(doc),
                Err(e) => page.undecodable.push(UndecodableDocument {
                    id,
                    reason: e.to_string(),
                }),
            }
        }
        page
    }
}

/// Repository interface over a document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Fetch one document; `Ok(None)` when it does not exist
    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Documents whose field at `field_path` equals `value`, at most `limit`
    async fn query_by_field(
        &self,
        collection: &str,
        field_path: &str,
        value: &Value,
        limit: usize,
    ) -> Result<Vec<Document>>;

    /// Replace the named top-level fields, leaving all others untouched.
    /// Creates the document when it does not exist.
    async fn merge_patch(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// List a collection in document-id order, one page at a time
    async fn list_page(
        &self,
        collection: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<DocumentPage>;
}

/// Open the configured backend
pub async fn open(config: &StoreConfig, credentials: &Credentials) -> Result<Arc<dyn DocumentStore>> {
    match config.backend {
        StoreBackend::Firestore => {
            info!(
                project_id = %credentials.account.project_id,
                "Connecting to Firestore"
            );
            Ok(Arc::new(FirestoreStore::from_env(credentials.account.clone())?))
        }
        #[cfg(feature = "sqlx")]
        StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::open(&config.sqlite_path).await?)),
        #[cfg(not(feature = "sqlx"))]
        StoreBackend::Sqlite => Err(crate::Error::Config(
            "sqlite backend requires the sqlx feature".to_string(),
        )),
    }
}

/// Resolve a dotted path inside a field map
pub fn field_at<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = fields.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Non-empty trimmed string at a dotted path
pub fn string_at(fields: &Fields, path: &str) -> Option<String> {
    field_at(fields, path)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
