//! Live report submission
//!
//! A draft save or finalize from a user:
//! 1. load the current report (if any) to learn its status
//! 2. compute the next status for the actor's role and action
//! 3. merge-patch the report with the submitted content and workflow fields
//! 4. synchronize the stored report into its project
//!
//! Every failure propagates to the caller; user-facing messaging is the
//! caller's job.

use crate::model::{fields, InspectionReport};
use crate::reconcile::{SyncOutcome, Synchronizer};
use crate::status::{next_report_status, ActorRole, ReportStatus, SubmitAction};
use crate::store::{Document, Fields};
use crate::time::now_timestamp;
use crate::{Error, Result};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

/// One user action on a report
#[derive(Debug, Clone)]
pub struct ReportSubmission {
    /// Report collection (per inspection technique)
    pub collection: String,
    /// `None` on first save
    pub report_id: Option<String>,
    /// Report content; workflow fields in here are overwritten
    pub content: Fields,
    pub role: ActorRole,
    pub action: SubmitAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub report_id: String,
    pub status: ReportStatus,
    pub sync: SyncOutcome,
}

pub struct ReportWorkflow {
    synchronizer: Synchronizer,
}

impl ReportWorkflow {
    pub fn new(synchronizer: Synchronizer) -> Self {
        Self { synchronizer }
    }

    /// Save or finalize a report and bring its project up to date
    ///
    /// # Errors
    /// - [`Error::UnknownRoleTransition`] when finalizing with a role that
    ///   has no transition; nothing is written
    /// - [`Error::AmbiguousProjectMatch`] and store errors from the sync
    pub async fn submit(&self, submission: ReportSubmission) -> Result<SubmitReceipt> {
        if submission.collection.trim().is_empty() {
            return Err(Error::InvalidInput("report collection is empty".to_string()));
        }
        let store = self.synchronizer.store();

        let existing = match &submission.report_id {
            Some(id) => store
                .get_by_id(&submission.collection, id)
                .await?
                .map(|doc| InspectionReport::from_document(&submission.collection, doc)),
            None => None,
        };
        let current_status = existing.as_ref().and_then(|r| r.status);
        let status = next_report_status(current_status, &submission.role, submission.action)?;

        let report_id = submission
            .report_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        // Each save must order strictly after the previous one, even within
        // the same millisecond or under clock skew
        let now = match existing.as_ref().and_then(|r| r.times.updated_at) {
            Some(previous) if previous >= now_timestamp() => previous.successor().ok_or_else(|| {
                Error::InvalidInput(format!("report {} has an out-of-range updatedAt", report_id))
            })?,
            _ => now_timestamp(),
        };

        let mut patch = submission.content;
        patch.insert(fields::STATUS.to_string(), Value::String(status.as_str().to_string()));
        patch.insert(
            fields::AUTHOR_ROLE.to_string(),
            Value::String(submission.role.as_str().to_string()),
        );
        patch.insert(fields::UPDATED_AT.to_string(), now.to_value());
        if existing.is_none() {
            patch.insert(fields::CREATED_AT.to_string(), now.to_value());
        }

        store
            .merge_patch(&submission.collection, &report_id, patch.clone())
            .await?;
        info!(
            report_id = %report_id,
            collection = %submission.collection,
            status = %status,
            role = %submission.role,
            "Report saved"
        );

        // Sync what is now stored: the previous fields overlaid with the patch
        let mut stored = existing.map(|r| r.fields).unwrap_or_default();
        for (key, value) in patch {
            stored.insert(key, value);
        }
        let report = InspectionReport::from_document(
            &submission.collection,
            Document::new(report_id.clone(), stored),
        );
        let sync = self.synchronizer.sync(&report).await?;

        Ok(SubmitReceipt {
            report_id,
            status,
            sync,
        })
    }
}
