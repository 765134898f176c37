//! Bulk reconciliation (migration mode)
//!
//! Walks every report in every configured report collection once, page by
//! page, and runs the synchronizer on each. Reports are independent: a
//! failure on one is logged and counted, then the walk continues. Safe to
//! re-run: once the store is reconciled a full pass merges nothing.

use super::resolver::ResolutionMiss;
use super::sync::{SyncOutcome, Synchronizer};
use crate::model::InspectionReport;
use crate::{Error, Result};
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: usize = 200;

/// Counts from one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub migrated: usize,
    pub skipped_stale: usize,
    pub skipped_no_project: usize,
    /// Reports that hit a store error or an ambiguous project match
    pub failed: usize,
}

impl ReconcileSummary {
    pub fn skipped(&self) -> usize {
        self.skipped_stale + self.skipped_no_project + self.failed
    }

    pub fn total(&self) -> usize {
        self.migrated + self.skipped()
    }

    fn record(&mut self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Merged { .. } => self.migrated += 1,
            SyncOutcome::SkippedStale { .. } => self.skipped_stale += 1,
            SyncOutcome::SkippedNoProject(_) => self.skipped_no_project += 1,
        }
    }

    fn absorb(&mut self, other: ReconcileSummary) {
        self.migrated += other.migrated;
        self.skipped_stale += other.skipped_stale;
        self.skipped_no_project += other.skipped_no_project;
        self.failed += other.failed;
    }
}

pub struct BulkReconciler {
    synchronizer: Synchronizer,
    report_collections: Vec<String>,
    page_size: usize,
}

impl BulkReconciler {
    pub fn new(synchronizer: Synchronizer, report_collections: Vec<String>) -> Self {
        Self {
            synchronizer,
            report_collections,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Reconcile every report in every configured collection
    ///
    /// # Errors
    /// Only listing failures abort the pass; per-report failures are counted
    /// in [`ReconcileSummary::failed`].
    pub async fn reconcile_all(&self) -> Result<ReconcileSummary> {
        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            collections = ?self.report_collections,
            page_size = self.page_size,
            store = self.synchronizer.store().name(),
            "Starting reconciliation pass"
        );

        let mut summary = ReconcileSummary::default();
        for collection in &self.report_collections {
            let collection_summary = self.reconcile_collection(collection).await?;
            info!(
                %run_id,
                collection = %collection,
                migrated = collection_summary.migrated,
                skipped = collection_summary.skipped(),
                "Collection reconciled"
            );
            summary.absorb(collection_summary);
        }

        info!(
            %run_id,
            migrated = summary.migrated,
            skipped_stale = summary.skipped_stale,
            skipped_no_project = summary.skipped_no_project,
            failed = summary.failed,
            "Reconciliation pass complete"
        );
        Ok(summary)
    }

    async fn reconcile_collection(&self, collection: &str) -> Result<ReconcileSummary> {
        let store = self.synchronizer.store();
        let mut summary = ReconcileSummary::default();
        let mut page_token: Option<String> = None;
        let mut page_number = 0usize;

        loop {
            let page = store
                .list_page(collection, page_token.as_deref(), self.page_size)
                .await?;
            page_number += 1;
            info!(
                collection,
                page = page_number,
                reports = page.documents.len() + page.undecodable.len(),
                "Processing page"
            );

            for bad in &page.undecodable {
                warn!(
                    report_id = %bad.id,
                    collection,
                    step = "decode",
                    "Skipped unreadable report: {}",
                    bad.reason
                );
                summary.failed += 1;
            }

            for doc in page.documents {
                let report = InspectionReport::from_document(collection, doc);
                self.reconcile_one(&report, &mut summary).await;
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(summary)
    }

    async fn reconcile_one(&self, report: &InspectionReport, summary: &mut ReconcileSummary) {
        match self.synchronizer.sync(report).await {
            Ok(outcome) => {
                if let SyncOutcome::SkippedNoProject(miss) = &outcome {
                    let step = match miss {
                        ResolutionMiss::NoReference => "reference",
                        ResolutionMiss::InternalIdNotFound(_) => "internal_id",
                        ResolutionMiss::BusinessIdNotFound(_) => "business_id",
                    };
                    warn!(
                        report_id = %report.id,
                        collection = %report.collection,
                        step,
                        "Skipped report: {}",
                        miss
                    );
                }
                summary.record(&outcome);
            }
            Err(e @ Error::AmbiguousProjectMatch { .. }) => {
                error!(
                    report_id = %report.id,
                    collection = %report.collection,
                    "Data integrity violation, report skipped: {}",
                    e
                );
                summary.failed += 1;
            }
            Err(e) => {
                warn!(
                    report_id = %report.id,
                    collection = %report.collection,
                    "Failed to reconcile report: {}",
                    e
                );
                summary.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_totals() {
        let summary = ReconcileSummary {
            migrated: 3,
            skipped_stale: 2,
            skipped_no_project: 1,
            failed: 1,
        };
        assert_eq!(summary.skipped(), 4);
        assert_eq!(summary.total(), 7);
    }

    #[test]
    fn test_summary_record() {
        let mut summary = ReconcileSummary::default();
        summary.record(&SyncOutcome::Merged {
            project_id: "p".to_string(),
            status: None,
        });
        summary.record(&SyncOutcome::SkippedStale {
            project_id: "p".to_string(),
        });
        summary.record(&SyncOutcome::SkippedNoProject(ResolutionMiss::NoReference));
        assert_eq!(summary.migrated, 1);
        assert_eq!(summary.skipped_stale, 1);
        assert_eq!(summary.skipped_no_project, 1);
        assert_eq!(summary.failed, 0);
    }
}
