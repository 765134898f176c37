//! Project identifier resolution
//!
//! Order, first match wins:
//! 1. internal id: direct lookup; a miss ends resolution
//! 2. business id: indexed query, at most one match allowed
//! 3. otherwise not found
//!
//! A stale internal id never falls through to the business id. The two may
//! point at different projects and the internal id is the stable one.

use crate::model::{fields, Project, ProjectRef};
use crate::store::{Document, DocumentStore};
use crate::{Error, Result};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Why a reference resolved to no project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionMiss {
    /// Report carries neither an internal nor a business id
    NoReference,
    /// Internal id lookup returned nothing
    InternalIdNotFound(String),
    /// Business id query returned nothing
    BusinessIdNotFound(String),
}

impl fmt::Display for ResolutionMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionMiss::NoReference => write!(f, "report has no project reference"),
            ResolutionMiss::InternalIdNotFound(id) => write!(f, "no project with internal id '{}'", id),
            ResolutionMiss::BusinessIdNotFound(id) => write!(f, "no project with business id '{}'", id),
        }
    }
}

/// A located project document
#[derive(Debug, Clone)]
pub struct ProjectHandle {
    pub document: Document,
    pub project: Project,
}

impl ProjectHandle {
    fn new(document: Document) -> Self {
        let project = Project::from_document(&document);
        Self { document, project }
    }

    pub fn internal_id(&self) -> &str {
        &self.document.id
    }
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Found(ProjectHandle),
    NotFound(ResolutionMiss),
}

/// Resolve `project_ref` against the projects collection
///
/// # Errors
/// - [`Error::AmbiguousProjectMatch`] when more than one project carries the
///   business id
/// - store errors from the lookup or query
pub async fn resolve(
    store: &dyn DocumentStore,
    projects_collection: &str,
    project_ref: &ProjectRef,
) -> Result<Resolution> {
    if let Some(internal_id) = &project_ref.internal_id {
        return Ok(match store.get_by_id(projects_collection, internal_id).await? {
            Some(doc) => {
                debug!(internal_id = %internal_id, "Resolved project by internal id");
                Resolution::Found(ProjectHandle::new(doc))
            }
            None => Resolution::NotFound(ResolutionMiss::InternalIdNotFound(internal_id.clone())),
        });
    }

    if let Some(business_id) = &project_ref.business_id {
        // Ask for two so a broken uniqueness invariant is visible
        let mut matches = store
            .query_by_field(
                projects_collection,
                fields::PROJECT_BUSINESS_ID,
                &Value::String(business_id.clone()),
                2,
            )
            .await?;

        return match matches.len() {
            0 => Ok(Resolution::NotFound(ResolutionMiss::BusinessIdNotFound(
                business_id.clone(),
            ))),
            1 => {
                let doc = matches.remove(0);
                debug!(business_id = %business_id, internal_id = %doc.id, "Resolved project by business id");
                Ok(Resolution::Found(ProjectHandle::new(doc)))
            }
            n => Err(Error::AmbiguousProjectMatch {
                business_id: business_id.clone(),
                matches: n,
            }),
        };
    }

    Ok(Resolution::NotFound(ResolutionMiss::NoReference))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Fields, MemoryStore};
    use serde_json::json;

    fn fields(v: Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    async fn store_with_projects() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert("projects", "proj1", fields(json!({"businessId": "P-001"}))).await;
        store.insert("projects", "proj2", fields(json!({"businessId": "P-002"}))).await;
        store
    }

    fn found_id(resolution: Resolution) -> String {
        match resolution {
            Resolution::Found(handle) => handle.internal_id().to_string(),
            Resolution::NotFound(miss) => panic!("expected a match, got {}", miss),
        }
    }

    #[tokio::test]
    async fn test_internal_id_wins_over_business_id() {
        let store = store_with_projects().await;
        let project_ref = ProjectRef {
            internal_id: Some("proj1".to_string()),
            business_id: Some("P-002".to_string()),
        };
        let resolution = resolve(&store, "projects", &project_ref).await.unwrap();
        assert_eq!(found_id(resolution), "proj1");
    }

    #[tokio::test]
    async fn test_stale_internal_id_does_not_fall_through() {
        let store = store_with_projects().await;
        let project_ref = ProjectRef {
            internal_id: Some("deleted".to_string()),
            business_id: Some("P-001".to_string()),
        };
        let resolution = resolve(&store, "projects", &project_ref).await.unwrap();
        assert!(matches!(
            resolution,
            Resolution::NotFound(ResolutionMiss::InternalIdNotFound(ref id)) if id == "deleted"
        ));
    }

    #[tokio::test]
    async fn test_business_id_fallback() {
        let store = store_with_projects().await;
        let project_ref = ProjectRef {
            internal_id: None,
            business_id: Some("P-002".to_string()),
        };
        let resolution = resolve(&store, "projects", &project_ref).await.unwrap();
        assert_eq!(found_id(resolution), "proj2");
    }

    #[tokio::test]
    async fn test_unknown_business_id() {
        let store = store_with_projects().await;
        let project_ref = ProjectRef {
            internal_id: None,
            business_id: Some("P-404".to_string()),
        };
        let resolution = resolve(&store, "projects", &project_ref).await.unwrap();
        assert!(matches!(
            resolution,
            Resolution::NotFound(ResolutionMiss::BusinessIdNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_reference() {
        let store = store_with_projects().await;
        let resolution = resolve(&store, "projects", &ProjectRef::default()).await.unwrap();
        assert!(matches!(resolution, Resolution::NotFound(ResolutionMiss::NoReference)));
    }

    #[tokio::test]
    async fn test_duplicate_business_id_is_fatal() {
        let store = store_with_projects().await;
        store.insert("projects", "proj3", fields(json!({"businessId": "P-001"}))).await;
        let project_ref = ProjectRef {
            internal_id: None,
            business_id: Some("P-001".to_string()),
        };
        let err = resolve(&store, "projects", &project_ref).await.unwrap_err();
        assert!(matches!(err, Error::AmbiguousProjectMatch { matches: 2, .. }));
    }
}
