//! Cloud Firestore over its REST API
//!
//! Endpoints used (relative to `.../databases/(default)/documents`):
//! - `GET {collection}/{id}`: point lookup, 404 means absent
//! - `POST :runQuery`: structured query with one EQUAL filter and a limit
//! - `PATCH {collection}/{id}?updateMask.fieldPaths=...`: merge-patch
//! - `GET {collection}?pageSize=&pageToken=&orderBy=__name__`: listing
//!
//! Setting `FIRESTORE_EMULATOR_HOST` points the client at a local emulator.

pub mod auth;
pub mod codec;

use super::{Document, DocumentPage, DocumentStore, Fields};
use crate::credentials::ServiceAccount;
use crate::{Error, Result};
use async_trait::async_trait;
use auth::TokenSource;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const EMULATOR_HOST_VAR: &str = "FIRESTORE_EMULATOR_HOST";
const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    document: Option<RawDocument>,
}

pub struct FirestoreStore {
    http: Client,
    /// `.../projects/{p}/databases/(default)/documents`
    documents_url: String,
    tokens: TokenSource,
}

impl FirestoreStore {
    /// Client for the production service authenticated as `account`
    pub fn new(account: ServiceAccount) -> Result<Self> {
        let documents_url = documents_url(FIRESTORE_BASE_URL, &account.project_id);
        let tokens = TokenSource::service_account(account)?;
        Ok(Self {
            http: build_client()?,
            documents_url,
            tokens,
        })
    }

    /// Client for an emulator at `host` (`localhost:8080`)
    pub fn emulator(host: &str, project_id: &str) -> Result<Self> {
        let base = format!("http://{}/v1", host.trim_end_matches('/'));
        Ok(Self {
            http: build_client()?,
            documents_url: documents_url(&base, project_id),
            tokens: TokenSource::emulator(),
        })
    }

    /// Emulator when `FIRESTORE_EMULATOR_HOST` is set, production otherwise
    pub fn from_env(account: ServiceAccount) -> Result<Self> {
        match std::env::var(EMULATOR_HOST_VAR) {
            Ok(host) if !host.trim().is_empty() => Self::emulator(host.trim(), &account.project_id),
            _ => Self::new(account),
        }
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.tokens.bearer(&self.http).await?;
        Ok(request.bearer_auth(token))
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.documents_url, collection, id)
    }
}

fn build_client() -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?)
}

fn documents_url(base: &str, project_id: &str) -> String {
    format!("{}/projects/{}/databases/(default)/documents", base, project_id)
}

/// Fail with the response body when the status is not 2xx
async fn check(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Store(format!("{} failed with {}: {}", what, status, body)))
}

fn into_document(raw: RawDocument) -> Result<Document> {
    let fields = match raw.fields {
        Some(fields) => codec::decode_fields(&fields)?,
        None => Fields::new(),
    };
    Ok(Document::new(codec::document_id(&raw.name), fields))
}

/// Backtick-quote a field name unless it is a simple identifier
fn quote_segment(segment: &str) -> String {
    let mut chars = segment.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        return segment.to_string();
    }
    let escaped = segment.replace('\\', "\\\\").replace('`', "\\`");
    format!("`{}`", escaped)
}

/// Quote each segment of a dotted path
fn quote_field_path(path: &str) -> String {
    path.split('.').map(quote_segment).collect::<Vec<_>>().join(".")
}

/// `runQuery` body: one equality filter on `field_path`
fn equality_query(collection: &str, field_path: &str, value: &Value, limit: usize) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": quote_field_path(field_path) },
                    "op": "EQUAL",
                    "value": codec::encode_value(value),
                }
            },
            "limit": limit,
        }
    })
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn name(&self) -> &'static str {
        "firestore"
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let request = self.authorized(self.http.get(self.document_url(collection, id))).await?;
        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let raw: RawDocument = check(response, "get").await?.json().await?;
        into_document(raw).map(Some)
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field_path: &str,
        value: &Value,
        limit: usize,
    ) -> Result<Vec<Document>> {
        debug!(collection, field_path, %value, limit, "Firestore query");
        let url = format!("{}:runQuery", self.documents_url);
        let body = equality_query(collection, field_path, value, limit);
        let request = self.authorized(self.http.post(url).json(&body)).await?;

        let results: Vec<QueryResult> = check(request.send().await?, "runQuery").await?.json().await?;
        results
            .into_iter()
            .filter_map(|r| r.document)
            .map(into_document)
            .collect()
    }

    async fn merge_patch(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mask: Vec<(&str, String)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths", quote_segment(k)))
            .collect();
        let body = json!({ "fields": codec::encode_fields(&fields) });

        let request = self
            .http
            .patch(self.document_url(collection, id))
            .query(&mask)
            .json(&body);
        let request = self.authorized(request).await?;
        check(request.send().await?, "patch").await?;
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
        let mut params = vec![
            ("pageSize", page_size.to_string()),
            ("orderBy", "__name__".to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let url = format!("{}/{}", self.documents_url, collection);
        let request = self.authorized(self.http.get(url).query(&params)).await?;
        let listing: ListResponse = check(request.send().await?, "list").await?.json().await?;

        Ok(DocumentPage::collect(
            listing.documents.into_iter().map(|raw| {
                let id = codec::document_id(&raw.name).to_string();
                (id, into_document(raw))
            }),
            listing.next_page_token.filter(|t| !t.is_empty()),
        ))
    }
}
