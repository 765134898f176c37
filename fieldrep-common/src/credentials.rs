//! Service-account credential resolution
//!
//! Resolution order:
//! 1. `GOOGLE_APPLICATION_CREDENTIALS`: path to a service-account JSON file
//! 2. `FIREBASE_SERVICE_ACCOUNT`: the JSON document itself, or a path to it
//!
//! Neither set is [`Error::MissingCredentials`], which callers treat as
//! fatal before touching the store.

use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const GOOGLE_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const FIREBASE_SERVICE_ACCOUNT: &str = "FIREBASE_SERVICE_ACCOUNT";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Where the credentials came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    File { var: &'static str, path: PathBuf },
    Inline { var: &'static str },
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::File { var, path } => write!(f, "{} ({})", var, path.display()),
            CredentialSource::Inline { var } => write!(f, "{} (inline)", var),
        }
    }
}

/// Fields of a Google service-account key file used by the store client
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

// Keep the private key out of logs
impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// Resolved credentials plus their origin
#[derive(Debug, Clone)]
pub struct Credentials {
    pub source: CredentialSource,
    pub account: ServiceAccount,
}

/// Find which variable holds the credentials without reading anything.
///
/// Empty values count as unset.
pub fn locate(lookup: impl Fn(&str) -> Option<String>) -> Result<(&'static str, String)> {
    for var in [GOOGLE_APPLICATION_CREDENTIALS, FIREBASE_SERVICE_ACCOUNT] {
        if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
            return Ok((var, value));
        }
    }
    Err(Error::MissingCredentials)
}

/// Resolve credentials from the process environment
pub fn from_env() -> Result<Credentials> {
    let (var, value) = locate(|name| std::env::var(name).ok())?;
    load(var, &value)
}

/// Load credentials from the value of one of the credential variables
pub fn load(var: &'static str, value: &str) -> Result<Credentials> {
    let trimmed = value.trim();

    if var == FIREBASE_SERVICE_ACCOUNT && trimmed.starts_with('{') {
        let account = parse_account(trimmed)
            .map_err(|e| Error::InvalidCredentials(format!("{}: {}", var, e)))?;
        return Ok(Credentials {
            source: CredentialSource::Inline { var },
            account,
        });
    }

    let path = Path::new(trimmed);
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::InvalidCredentials(format!("{}: cannot read {}: {}", var, path.display(), e))
    })?;
    let account = parse_account(&text)
        .map_err(|e| Error::InvalidCredentials(format!("{}: {}: {}", var, path.display(), e)))?;

    Ok(Credentials {
        source: CredentialSource::File {
            var,
            path: path.to_path_buf(),
        },
        account,
    })
}

fn parse_account(text: &str) -> std::result::Result<ServiceAccount, String> {
    let account: ServiceAccount = serde_json::from_str(text).map_err(|e| e.to_string())?;
    if account.project_id.trim().is_empty() {
        return Err("project_id is empty".to_string());
    }
    if !account.private_key.contains("PRIVATE KEY") {
        return Err("private_key is not a PEM key".to_string());
    }
    Ok(account)
}
