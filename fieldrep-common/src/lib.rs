//! # fieldrep common library
//!
//! Report/project reconciliation for the inspection-reporting dashboard:
//! - Workflow status vocabularies and the transition function
//! - Project resolution, snapshot ordering and report → project merge
//! - Bulk reconciliation over all stored reports (migration mode)
//! - Live report submission
//! - Document store repository with memory, SQLite and Firestore backends
//! - Configuration and credential loading

pub mod config;
pub mod credentials;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod status;
pub mod store;
pub mod time;
pub mod workflow;

pub use error::{Error, Result};
pub use reconcile::{BulkReconciler, ReconcileSummary, SyncOutcome, Synchronizer};
pub use status::{ActorRole, ProjectStatus, ReportStatus, SubmitAction};
