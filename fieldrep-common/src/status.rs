//! Workflow status vocabularies and the status transition function
//!
//! Reports and projects use two different status vocabularies. Reports may
//! be `Authorized`; projects never are, the project-facing view collapses
//! it to `Completed`. [`project_status_for`] is the single place that
//! translation happens.
//!
//! Transition table (finalize):
//!
//! | Actor role                   | Next report status    |
//! |------------------------------|-----------------------|
//! | Inspector                    | PendingConfirmation   |
//! | LeadInspector / Supervisor   | Completed             |
//! | Admin                        | Completed             |
//! | anything else                | `UnknownRoleTransition` |
//!
//! Draft saves never advance the workflow.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a report as seen from the report itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Draft,
    ForwardedToInspector,
    PendingConfirmation,
    Authorized,
    Approved,
    Completed,
}

/// Status of a project (work order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    ForwardedToInspector,
    PendingConfirmation,
    Approved,
    Completed,
}

/// Role of the actor submitting a report
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActorRole {
    Inspector,
    LeadInspector,
    Supervisor,
    Admin,
    /// Role text with no defined meaning in the workflow
    Unrecognized(String),
}

/// What the actor asked for when submitting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitAction {
    SaveDraft,
    Finalize,
}

impl SubmitAction {
    pub fn is_finalizing(self) -> bool {
        matches!(self, SubmitAction::Finalize)
    }
}

/// Lowercase and fold separators so "Pending Confirmation",
/// "pending-confirmation" and "PENDING_CONFIRMATION" compare equal
fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .filter_map(|c| match c {
            ' ' | '-' | '_' => None,
            c => Some(c.to_ascii_lowercase()),
        })
        .collect()
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Draft => "draft",
            ReportStatus::ForwardedToInspector => "forwarded_to_inspector",
            ReportStatus::PendingConfirmation => "pending_confirmation",
            ReportStatus::Authorized => "authorized",
            ReportStatus::Approved => "approved",
            ReportStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ReportStatus::Approved | ReportStatus::Completed)
    }
}

impl FromStr for ReportStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match normalize(s).as_str() {
            "draft" => Ok(ReportStatus::Draft),
            "forwardedtoinspector" => Ok(ReportStatus::ForwardedToInspector),
            "pendingconfirmation" => Ok(ReportStatus::PendingConfirmation),
            "authorized" | "authorised" => Ok(ReportStatus::Authorized),
            "approved" => Ok(ReportStatus::Approved),
            "completed" => Ok(ReportStatus::Completed),
            _ => Err(Error::InvalidInput(format!("unknown report status '{}'", s))),
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::ForwardedToInspector => "forwarded_to_inspector",
            ProjectStatus::PendingConfirmation => "pending_confirmation",
            ProjectStatus::Approved => "approved",
            ProjectStatus::Completed => "completed",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // Projects written by older clients may carry "authorized"
        s.parse::<ReportStatus>().map(project_status_for)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ActorRole {
    pub fn as_str(&self) -> &str {
        match self {
            ActorRole::Inspector => "inspector",
            ActorRole::LeadInspector => "lead_inspector",
            ActorRole::Supervisor => "supervisor",
            ActorRole::Admin => "admin",
            ActorRole::Unrecognized(role) => role,
        }
    }
}

impl FromStr for ActorRole {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match normalize(s).as_str() {
            "inspector" => ActorRole::Inspector,
            "leadinspector" => ActorRole::LeadInspector,
            "supervisor" => ActorRole::Supervisor,
            "admin" | "administrator" => ActorRole::Admin,
            _ => ActorRole::Unrecognized(s.to_string()),
        })
    }
}

impl From<&str> for ActorRole {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(role) => role,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the next report status
///
/// A draft save leaves the status where it is, defaulting to
/// `ForwardedToInspector` when the report has none yet. A finalize advances
/// according to the actor's role; roles outside the table are rejected
/// with [`Error::UnknownRoleTransition`] rather than silently keeping the
/// previous status.
pub fn next_report_status(
    current: Option<ReportStatus>,
    role: &ActorRole,
    action: SubmitAction,
) -> Result<ReportStatus> {
    if !action.is_finalizing() {
        return Ok(current.unwrap_or(ReportStatus::ForwardedToInspector));
    }

    match role {
        ActorRole::Inspector => Ok(ReportStatus::PendingConfirmation),
        ActorRole::LeadInspector | ActorRole::Supervisor => Ok(ReportStatus::Completed),
        ActorRole::Admin => Ok(ReportStatus::Completed),
        ActorRole::Unrecognized(role) => Err(Error::UnknownRoleTransition(role.clone())),
    }
}

/// Translate a report status into the project vocabulary
pub fn project_status_for(status: ReportStatus) -> ProjectStatus {
    match status {
        ReportStatus::Draft => ProjectStatus::Draft,
        ReportStatus::ForwardedToInspector => ProjectStatus::ForwardedToInspector,
        ReportStatus::PendingConfirmation => ProjectStatus::PendingConfirmation,
        ReportStatus::Authorized | ReportStatus::Completed => ProjectStatus::Completed,
        ReportStatus::Approved => ProjectStatus::Approved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_save_keeps_status() {
        let next = next_report_status(
            Some(ReportStatus::PendingConfirmation),
            &ActorRole::Inspector,
            SubmitAction::SaveDraft,
        )
        .unwrap();
        assert_eq!(next, ReportStatus::PendingConfirmation);
    }

    #[test]
    fn test_draft_save_defaults_to_forwarded() {
        let next = next_report_status(None, &ActorRole::Supervisor, SubmitAction::SaveDraft).unwrap();
        assert_eq!(next, ReportStatus::ForwardedToInspector);
    }

    #[test]
    fn test_draft_save_ignores_unknown_role() {
        let role = ActorRole::from("visitor");
        let next = next_report_status(Some(ReportStatus::Draft), &role, SubmitAction::SaveDraft).unwrap();
        assert_eq!(next, ReportStatus::Draft);
    }

    #[test]
    fn test_finalize_by_role() {
        let cases = [
            (ActorRole::Inspector, ReportStatus::PendingConfirmation),
            (ActorRole::LeadInspector, ReportStatus::Completed),
            (ActorRole::Supervisor, ReportStatus::Completed),
            (ActorRole::Admin, ReportStatus::Completed),
        ];
        for (role, expected) in cases {
            let next = next_report_status(Some(ReportStatus::Draft), &role, SubmitAction::Finalize).unwrap();
            assert_eq!(next, expected, "role {}", role);
        }
    }

    #[test]
    fn test_finalize_unknown_role_is_rejected() {
        let role = ActorRole::from("Contractor");
        let err = next_report_status(Some(ReportStatus::Draft), &role, SubmitAction::Finalize).unwrap_err();
        match err {
            Error::UnknownRoleTransition(r) => assert_eq!(r, "Contractor"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_authorized_collapses_to_completed() {
        assert_eq!(project_status_for(ReportStatus::Authorized), ProjectStatus::Completed);
        assert_eq!(project_status_for(ReportStatus::Draft), ProjectStatus::Draft);
        assert_eq!(project_status_for(ReportStatus::Approved), ProjectStatus::Approved);
    }

    #[test]
    fn test_status_parsing_is_lenient() {
        assert_eq!("Pending Confirmation".parse::<ReportStatus>().unwrap(), ReportStatus::PendingConfirmation);
        assert_eq!("FORWARDED-TO-INSPECTOR".parse::<ReportStatus>().unwrap(), ReportStatus::ForwardedToInspector);
        assert_eq!("authorized".parse::<ProjectStatus>().unwrap(), ProjectStatus::Completed);
        assert!("archived".parse::<ReportStatus>().is_err());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(ActorRole::from("Lead Inspector"), ActorRole::LeadInspector);
        assert_eq!(ActorRole::from("lead_inspector"), ActorRole::LeadInspector);
        assert_eq!(ActorRole::from("ADMIN"), ActorRole::Admin);
        assert_eq!(ActorRole::from("guest"), ActorRole::Unrecognized("guest".to_string()));
    }

    #[test]
    fn test_status_round_trips_through_display() {
        for status in [
            ReportStatus::Draft,
            ReportStatus::ForwardedToInspector,
            ReportStatus::PendingConfirmation,
            ReportStatus::Authorized,
            ReportStatus::Approved,
            ReportStatus::Completed,
        ] {
            assert_eq!(status.to_string().parse::<ReportStatus>().unwrap(), status);
        }
    }
}
