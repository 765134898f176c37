//! Report → project synchronization
//!
//! Merges one report into the project it references:
//! 1. resolve the project (no project → `SkippedNoProject`)
//! 2. compare the project's embedded snapshot with the report
//! 3. skip unless the report orders strictly after the embedded snapshot
//!    by (effective timestamp, source report id) (`SkippedStale`)
//! 4. otherwise merge-patch `report`, `status` and `updatedAt` on the
//!    project, leaving every other project field untouched
//!
//! Equal keys never merge, so a repeated sync of the same report is a no-op
//! and reports stamped alike settle on the same winner in any order. The
//! read-compare-write is not atomic; concurrent writers converge on the
//! greatest snapshot key.

use super::comparator::{supersedes, SnapshotKey};
use super::resolver::{resolve, ProjectHandle, Resolution, ResolutionMiss};
use crate::model::{fields, InspectionReport};
use crate::status::{project_status_for, ProjectStatus};
use crate::store::{DocumentStore, Fields};
use crate::time::{now_timestamp, Timestamp};
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of synchronizing one report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Merged {
        project_id: String,
        status: Option<ProjectStatus>,
    },
    SkippedStale {
        project_id: String,
    },
    SkippedNoProject(ResolutionMiss),
}

impl SyncOutcome {
    pub fn is_merged(&self) -> bool {
        matches!(self, SyncOutcome::Merged { .. })
    }
}

/// Merges reports into their projects through an injected store
#[derive(Clone)]
pub struct Synchronizer {
    store: Arc<dyn DocumentStore>,
    projects_collection: String,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn DocumentStore>, projects_collection: impl Into<String>) -> Self {
        Self {
            store,
            projects_collection: projects_collection.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Synchronize `report` into its project
    ///
    /// # Errors
    /// Ambiguous business-id matches and store failures propagate; a missing
    /// project or a stale report are outcomes, not errors.
    pub async fn sync(&self, report: &InspectionReport) -> Result<SyncOutcome> {
        let handle = match resolve(self.store.as_ref(), &self.projects_collection, &report.project_ref).await? {
            Resolution::Found(handle) => handle,
            Resolution::NotFound(miss) => {
                debug!(report_id = %report.id, reason = %miss, "No project for report");
                return Ok(SyncOutcome::SkippedNoProject(miss));
            }
        };
        let project_id = handle.internal_id().to_string();

        if is_stale(&handle, report) {
            debug!(report_id = %report.id, project_id = %project_id, "Embedded report is current, skipping");
            return Ok(SyncOutcome::SkippedStale { project_id });
        }

        let status = report
            .status
            .map(project_status_for)
            .or(handle.project.status);
        let now = now_timestamp();
        let patch = merge_patch_for(report, status, now);

        self.store
            .merge_patch(&self.projects_collection, &project_id, patch)
            .await?;

        info!(
            report_id = %report.id,
            project_id = %project_id,
            status = status.map(ProjectStatus::as_str).unwrap_or("unset"),
            "Merged report into project"
        );
        Ok(SyncOutcome::Merged { project_id, status })
    }
}

fn is_stale(handle: &ProjectHandle, report: &InspectionReport) -> bool {
    let Some(existing) = &handle.project.embedded_report else {
        return false;
    };
    let existing_key = SnapshotKey::new(&existing.times, existing.source_report_id.as_deref());
    let incoming_key = SnapshotKey::new(&report.times, Some(report.id.as_str()));
    !supersedes(existing_key, incoming_key)
}

/// Project fields written by a merge
fn merge_patch_for(report: &InspectionReport, status: Option<ProjectStatus>, now: Timestamp) -> Fields {
    let mut embedded = report.fields.clone();
    embedded.insert(fields::SOURCE_REPORT_ID.to_string(), Value::String(report.id.clone()));
    embedded.insert(
        fields::SOURCE_COLLECTION.to_string(),
        Value::String(report.collection.clone()),
    );
    embedded.insert(fields::MERGED_AT.to_string(), now.to_value());

    let mut patch = Fields::new();
    patch.insert(fields::PROJECT_REPORT.to_string(), Value::Object(embedded));
    if let Some(status) = status {
        patch.insert(fields::STATUS.to_string(), Value::String(status.as_str().to_string()));
    }
    patch.insert(fields::UPDATED_AT.to_string(), now.to_value());
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Document, MemoryStore};
    use serde_json::json;

    fn fields_of(v: Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    fn report(id: &str, v: Value) -> InspectionReport {
        InspectionReport::from_document("inspection_reports", Document::new(id, fields_of(v)))
    }

    async fn setup(project: Value) -> (Arc<MemoryStore>, Synchronizer) {
        let store = Arc::new(MemoryStore::new());
        store.insert("projects", "proj1", fields_of(project)).await;
        let sync = Synchronizer::new(store.clone(), "projects");
        (store, sync)
    }

    #[tokio::test]
    async fn test_merge_stamps_back_reference() {
        let (store, sync) = setup(json!({"businessId": "P-001", "report": null})).await;
        let r = report(
            "R1",
            json!({"general": {"projectId": "P-001"}, "status": "Draft", "updatedAt": 100}),
        );

        let outcome = sync.sync(&r).await.unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::Merged {
                project_id: "proj1".to_string(),
                status: Some(ProjectStatus::Draft)
            }
        );

        let project = store.fields("projects", "proj1").await.unwrap();
        assert_eq!(project["report"]["sourceReportId"], json!("R1"));
        assert_eq!(project["report"]["sourceCollection"], json!("inspection_reports"));
        assert_eq!(project["report"]["general"]["projectId"], json!("P-001"));
        assert!(project["report"]["mergedAt"].is_i64());
        assert_eq!(project["status"], json!("draft"));
        assert!(project["updatedAt"].is_i64());
    }

    #[tokio::test]
    async fn test_status_falls_back_to_project_status() {
        let (store, sync) = setup(json!({"businessId": "P-001", "status": "approved"})).await;
        let r = report("R1", json!({"general": {"projectDocId": "proj1"}, "updatedAt": 10}));

        let outcome = sync.sync(&r).await.unwrap();
        assert!(matches!(
            outcome,
            SyncOutcome::Merged { status: Some(ProjectStatus::Approved), .. }
        ));
        let project = store.fields("projects", "proj1").await.unwrap();
        assert_eq!(project["status"], json!("approved"));
    }

    #[tokio::test]
    async fn test_authorized_report_completes_project() {
        let (store, sync) = setup(json!({"businessId": "P-001"})).await;
        let r = report(
            "R1",
            json!({"general": {"projectDocId": "proj1"}, "status": "authorized", "updatedAt": 10}),
        );
        sync.sync(&r).await.unwrap();
        let project = store.fields("projects", "proj1").await.unwrap();
        assert_eq!(project["status"], json!("completed"));
    }

    #[tokio::test]
    async fn test_older_report_is_stale() {
        let (store, sync) = setup(json!({
            "businessId": "P-001",
            "report": {"sourceReportId": "R9", "updatedAt": 200}
        }))
        .await;
        let before = store.fields("projects", "proj1").await;

        let r = report("R1", json!({"general": {"projectId": "P-001"}, "updatedAt": 100}));
        let outcome = sync.sync(&r).await.unwrap();

        assert_eq!(outcome, SyncOutcome::SkippedStale { project_id: "proj1".to_string() });
        assert_eq!(store.fields("projects", "proj1").await, before);
        assert_eq!(store.patch_count(), 0);
    }

    #[tokio::test]
    async fn test_equal_timestamp_resolves_by_report_id() {
        let (store, sync) = setup(json!({
            "businessId": "P-001",
            "report": {"sourceReportId": "R5", "updatedAt": 100}
        }))
        .await;

        let lower = report("R1", json!({"general": {"projectId": "P-001"}, "updatedAt": 100}));
        assert!(matches!(sync.sync(&lower).await.unwrap(), SyncOutcome::SkippedStale { .. }));
        assert_eq!(store.patch_count(), 0);

        let higher = report("R7", json!({"general": {"projectId": "P-001"}, "updatedAt": 100}));
        assert!(sync.sync(&higher).await.unwrap().is_merged());
        let project = store.fields("projects", "proj1").await.unwrap();
        assert_eq!(project["report"]["sourceReportId"], json!("R7"));
    }

    #[tokio::test]
    async fn test_unknown_project_is_left_alone() {
        let (store, sync) = setup(json!({"businessId": "P-001"})).await;
        let r = report("R1", json!({"general": {"projectId": "P-404"}, "updatedAt": 1}));

        let outcome = sync.sync(&r).await.unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::SkippedNoProject(ResolutionMiss::BusinessIdNotFound("P-404".to_string()))
        );
        assert_eq!(store.count("projects").await, 1);
        assert_eq!(store.patch_count(), 0);
    }

    #[tokio::test]
    async fn test_merge_preserves_unrelated_project_fields() {
        let (store, sync) = setup(json!({"businessId": "P-001", "client": "Acme", "region": "N"})).await;
        let r = report("R1", json!({"general": {"projectDocId": "proj1"}, "updatedAt": 5}));
        sync.sync(&r).await.unwrap();

        let project = store.fields("projects", "proj1").await.unwrap();
        assert_eq!(project["client"], json!("Acme"));
        assert_eq!(project["region"], json!("N"));
        assert_eq!(project["businessId"], json!("P-001"));
    }
}
