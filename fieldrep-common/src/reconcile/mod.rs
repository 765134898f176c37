//! Report/project reconciliation
//!
//! Data flow for a single report:
//!
//! ```text
//! report ─► Synchronizer ─► resolver (locate project)
//!                        ─► comparator (staleness check)
//!                        ─► merge-patch project
//! ```
//!
//! The bulk reconciler drives the same pipeline over every stored report.

pub mod bulk;
pub mod comparator;
pub mod resolver;
pub mod sync;

pub use bulk::{BulkReconciler, ReconcileSummary};
pub use comparator::{effective_timestamp, supersedes, SnapshotKey};
pub use resolver::{resolve, ProjectHandle, Resolution, ResolutionMiss};
pub use sync::{SyncOutcome, Synchronizer};
