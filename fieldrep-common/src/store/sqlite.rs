//! SQLite-backed document store
//!
//! Keeps every collection in one `documents` table with the document body
//! stored as JSON text. Field queries go through `json_extract`, so nested
//! paths work the same way they do against the remote store.
//!
//! Schema setup is idempotent (safe to run on every open).

use super::{Document, DocumentPage, DocumentStore, Fields};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the store at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(5000));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        if newly_created {
            info!("Initialized new document store: {}", db_path.display());
        } else {
            info!("Opened existing document store: {}", db_path.display());
        }

        let store = Self { pool };
        store.create_documents_table().await?;
        Ok(store)
    }

    async fn create_documents_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL CHECK (json_valid(body)),
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn parse_body(id: String, body: &str) -> Result<Document> {
    match serde_json::from_str::<Value>(body)? {
        Value::Object(fields) => Ok(Document::new(id, fields)),
        other => Err(Error::Store(format!(
            "document {} has non-object body: {}",
            id, other
        ))),
    }
}

/// `$.a.b` JSON path for a dotted field path
fn json_path(field_path: &str) -> Result<String> {
    if field_path.is_empty()
        || field_path
            .split('.')
            .any(|seg| seg.is_empty() || !seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
    {
        return Err(Error::InvalidInput(format!("unsupported field path '{}'", field_path)));
    }
    Ok(format!("$.{}", field_path))
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let body: Option<String> =
            sqlx::query_scalar("SELECT body FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        body.map(|b| parse_body(id.to_string(), &b)).transpose()
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field_path: &str,
        value: &Value,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let path = json_path(field_path)?;
        let sql = "SELECT id, body FROM documents \
                   WHERE collection = ? AND json_extract(body, ?) = ? \
                   ORDER BY id LIMIT ?";
        let query = sqlx::query_as::<_, (String, String)>(sql)
            .bind(collection)
            .bind(path);

        // json_extract yields SQL scalars, so bind the matching SQL type
        let query = match value {
            Value::String(s) => query.bind(s.clone()),
            Value::Bool(b) => query.bind(i64::from(*b)),
            Value::Number(n) if n.is_i64() => query.bind(n.as_i64()),
            Value::Number(n) => query.bind(n.as_f64()),
            other => {
                return Err(Error::InvalidInput(format!(
                    "cannot query by non-scalar value {}",
                    other
                )))
            }
        };

        let rows = query
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(id, body)| parse_body(id, &body))
            .collect()
    }

    async fn merge_patch(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT body FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let mut doc = match existing {
            Some(body) => parse_body(id.to_string(), &body)?.fields,
            None => Fields::new(),
        };
        for (key, value) in fields {
            doc.insert(key, value);
        }
        let body = serde_json::to_string(&Value::Object(doc))?;

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body, updated_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(collection, id) DO UPDATE SET
                body = excluded.body,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(body)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
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

        // Fetch one extra row to learn whether another page follows
        let fetch = i64::try_from(page_size).unwrap_or(i64::MAX - 1) + 1;
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT id, body FROM documents \
             WHERE collection = ? AND id > ? \
             ORDER BY id LIMIT ?",
        )
        .bind(collection)
        .bind(page_token.unwrap_or(""))
        .bind(fetch)
        .fetch_all(&self.pool)
        .await?;

        let has_more = rows.len() > page_size;
        let rows: Vec<(String, String)> = rows.into_iter().take(page_size).collect();

        // Page from the last row listed, decodable or not
        let next_page_token = if has_more {
            rows.last().map(|(id, _)| id.clone())
        } else {
            None
        };
        Ok(DocumentPage::collect(
            rows.into_iter()
                .map(|(id, body)| (id.clone(), parse_body(id, &body))),
            next_page_token,
        ))
    }
}
