//! Report and project models
//!
//! Both are typed views over stored documents. Parsing is lenient: legacy
//! documents with missing or malformed workflow fields still load, the
//! affected field is simply absent. The raw fields are kept so a report can
//! be embedded into its project verbatim.

use crate::status::{ActorRole, ProjectStatus, ReportStatus};
use crate::store::{field_at, string_at, Document, Fields};
use crate::time::Timestamp;
use serde_json::Value;
use tracing::warn;

/// Document field names
pub mod fields {
    pub const REPORT_PROJECT_DOC_ID: &str = "general.projectDocId";
    pub const REPORT_PROJECT_BUSINESS_ID: &str = "general.projectId";
    pub const STATUS: &str = "status";
    pub const AUTHOR_ROLE: &str = "authorRole";
    pub const UPDATED_AT: &str = "updatedAt";
    pub const CREATED_AT: &str = "createdAt";
    /// Creation time as written by early clients
    pub const LEGACY_TIMESTAMP: &str = "timestamp";

    pub const PROJECT_BUSINESS_ID: &str = "businessId";
    pub const PROJECT_REPORT: &str = "report";

    pub const SOURCE_REPORT_ID: &str = "sourceReportId";
    pub const SOURCE_COLLECTION: &str = "sourceCollection";
    pub const MERGED_AT: &str = "mergedAt";
}

/// A report's pointer to its project. Either id may be absent or stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectRef {
    pub internal_id: Option<String>,
    pub business_id: Option<String>,
}

impl ProjectRef {
    pub fn is_empty(&self) -> bool {
        self.internal_id.is_none() && self.business_id.is_none()
    }
}

/// Created/updated timestamps of a report snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportTimes {
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

impl ReportTimes {
    pub fn from_fields(f: &Fields) -> Self {
        let ts = |name: &str| field_at(f, name).and_then(Timestamp::from_value);
        Self {
            created_at: ts(fields::CREATED_AT).or_else(|| ts(fields::LEGACY_TIMESTAMP)),
            updated_at: ts(fields::UPDATED_AT),
        }
    }
}

/// One inspection submission
#[derive(Debug, Clone, PartialEq)]
pub struct InspectionReport {
    pub id: String,
    /// Collection the report lives in
    pub collection: String,
    pub project_ref: ProjectRef,
    pub status: Option<ReportStatus>,
    pub author_role: Option<ActorRole>,
    pub times: ReportTimes,
    /// Every stored field, including content this crate does not interpret
    pub fields: Fields,
}

impl InspectionReport {
    pub fn from_document(collection: &str, doc: Document) -> Self {
        let f = &doc.fields;
        let project_ref = ProjectRef {
            internal_id: string_at(f, fields::REPORT_PROJECT_DOC_ID),
            business_id: string_at(f, fields::REPORT_PROJECT_BUSINESS_ID),
        };
        let status = parse_status::<ReportStatus>(f, &doc.id);
        let author_role = string_at(f, fields::AUTHOR_ROLE).map(|r| ActorRole::from(r.as_str()));
        let times = ReportTimes::from_fields(f);

        Self {
            id: doc.id,
            collection: collection.to_string(),
            project_ref,
            status,
            author_role,
            times,
            fields: doc.fields,
        }
    }
}

/// The most recent report snapshot merged into a project
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedReport {
    pub source_report_id: Option<String>,
    pub merged_at: Option<Timestamp>,
    pub times: ReportTimes,
}

impl EmbeddedReport {
    pub fn from_fields(f: &Fields) -> Self {
        Self {
            source_report_id: string_at(f, fields::SOURCE_REPORT_ID),
            merged_at: field_at(f, fields::MERGED_AT).and_then(Timestamp::from_value),
            times: ReportTimes::from_fields(f),
        }
    }
}

/// The authoritative work-order record
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub internal_id: String,
    pub business_id: Option<String>,
    pub status: Option<ProjectStatus>,
    pub embedded_report: Option<EmbeddedReport>,
    pub updated_at: Option<Timestamp>,
}

impl Project {
    pub fn from_document(doc: &Document) -> Self {
        let f = &doc.fields;
        let embedded_report = match field_at(f, fields::PROJECT_REPORT) {
            Some(Value::Object(report)) => Some(EmbeddedReport::from_fields(report)),
            _ => None,
        };
        Self {
            internal_id: doc.id.clone(),
            business_id: string_at(f, fields::PROJECT_BUSINESS_ID),
            status: parse_status::<ProjectStatus>(f, &doc.id),
            embedded_report,
            updated_at: field_at(f, fields::UPDATED_AT).and_then(Timestamp::from_value),
        }
    }
}

fn parse_status<S: std::str::FromStr>(f: &Fields, doc_id: &str) -> Option<S> {
    let raw = string_at(f, fields::STATUS)?;
    match raw.parse::<S>() {
        Ok(status) => Some(status),
        Err(_) => {
            warn!(doc_id, status = %raw, "Ignoring unrecognized status");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, v: Value) -> Document {
        Document::new(id, v.as_object().cloned().unwrap())
    }

    #[test]
    fn test_report_from_full_document() {
        let report = InspectionReport::from_document(
            "inspection_reports",
            doc(
                "R1",
                json!({
                    "general": {"projectDocId": "proj1", "projectId": "P-001", "site": "North"},
                    "status": "Pending Confirmation",
                    "authorRole": "inspector",
                    "createdAt": 50,
                    "updatedAt": 100
                }),
            ),
        );
        assert_eq!(report.project_ref.internal_id.as_deref(), Some("proj1"));
        assert_eq!(report.project_ref.business_id.as_deref(), Some("P-001"));
        assert_eq!(report.status, Some(ReportStatus::PendingConfirmation));
        assert_eq!(report.author_role, Some(ActorRole::Inspector));
        assert_eq!(report.times.created_at, Some(Timestamp(50)));
        assert_eq!(report.times.updated_at, Some(Timestamp(100)));
        assert_eq!(report.fields["general"]["site"], json!("North"));
    }

    #[test]
    fn test_legacy_report_uses_timestamp_and_tolerates_gaps() {
        let report = InspectionReport::from_document(
            "ut_reports",
            doc("R2", json!({"timestamp": "1970-01-01T00:00:00.300Z", "status": "archived"})),
        );
        assert!(report.project_ref.is_empty());
        assert_eq!(report.status, None);
        assert_eq!(report.times.created_at, Some(Timestamp(300)));
        assert_eq!(report.times.updated_at, None);
    }

    #[test]
    fn test_blank_ids_count_as_absent() {
        let report = InspectionReport::from_document(
            "inspection_reports",
            doc("R3", json!({"general": {"projectDocId": "", "projectId": "P-9"}})),
        );
        assert_eq!(report.project_ref.internal_id, None);
        assert_eq!(report.project_ref.business_id.as_deref(), Some("P-9"));
    }

    #[test]
    fn test_project_with_embedded_report() {
        let project = Project::from_document(&doc(
            "proj1",
            json!({
                "businessId": "P-001",
                "status": "authorized",
                "report": {"sourceReportId": "R1", "mergedAt": 120, "updatedAt": 100},
                "updatedAt": 120
            }),
        ));
        assert_eq!(project.business_id.as_deref(), Some("P-001"));
        assert_eq!(project.status, Some(ProjectStatus::Completed));
        let embedded = project.embedded_report.unwrap();
        assert_eq!(embedded.source_report_id.as_deref(), Some("R1"));
        assert_eq!(embedded.times.updated_at, Some(Timestamp(100)));
    }

    #[test]
    fn test_project_null_report_is_absent() {
        let project = Project::from_document(&doc("proj1", json!({"report": null})));
        assert!(project.embedded_report.is_none());
        assert!(project.status.is_none());
    }
}
