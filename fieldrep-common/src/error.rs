//! Common error types for fieldrep

use thiserror::Error;

/// Common result type for fieldrep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the reconciliation engine, the store backends
/// and the migration binary
#[derive(Error, Debug)]
pub enum Error {
    /// Neither credential environment variable is set
    #[error("Missing credentials: set GOOGLE_APPLICATION_CREDENTIALS or FIREBASE_SERVICE_ACCOUNT")]
    MissingCredentials,

    /// Credentials were found but could not be read or parsed
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// More than one project carries the same business id
    #[error("Ambiguous project match: business id '{business_id}' matches {matches} projects")]
    AmbiguousProjectMatch { business_id: String, matches: usize },

    /// Finalize requested by a role with no defined transition
    #[error("No status transition defined for role '{0}'")]
    UnknownRoleTransition(String),

    /// Document store rejected or failed a request
    #[error("Store error: {0}")]
    Store(String),

    /// Transport-level failure talking to a remote store
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token exchange with the identity provider failed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
