//! Report snapshot ordering
//!
//! Effective timestamp of a snapshot: `updatedAt`, else `createdAt`, else
//! the epoch. Snapshots are totally ordered by effective timestamp, then by
//! source report id, so two reports stamped alike always resolve the same
//! way no matter which is seen first. Shared by the live synchronizer and
//! the bulk reconciler.

use crate::model::ReportTimes;
use crate::time::Timestamp;

pub fn effective_timestamp(times: &ReportTimes) -> Timestamp {
    times
        .updated_at
        .or(times.created_at)
        .unwrap_or(Timestamp::EPOCH)
}

/// Ordering key of a snapshot taken from report `report_id`
///
/// A snapshot with no recorded source report sorts below any named one at
/// the same timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotKey<'a> {
    pub timestamp: Timestamp,
    pub report_id: &'a str,
}

impl<'a> SnapshotKey<'a> {
    pub fn new(times: &ReportTimes, report_id: Option<&'a str>) -> Self {
        Self {
            timestamp: effective_timestamp(times),
            report_id: report_id.unwrap_or(""),
        }
    }
}

/// True when `incoming` must replace `existing`; equal keys never do
pub fn supersedes(existing: SnapshotKey<'_>, incoming: SnapshotKey<'_>) -> bool {
    incoming > existing
}
