//! OAuth2 access tokens for the Firestore REST API
//!
//! Service accounts authenticate with the JWT-bearer grant: sign a short
//! claim set with the account's private key, post it to the token endpoint
//! and receive an access token valid for about an hour. Tokens are cached
//! and refreshed a minute before they expire.

use crate::credentials::ServiceAccount;
use crate::{Error, Result};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Source of bearer tokens for store requests
pub enum TokenSource {
    /// Local emulator; accepts a fixed token
    Emulator,
    ServiceAccount {
        account: ServiceAccount,
        key: EncodingKey,
        cached: Mutex<Option<CachedToken>>,
    },
}

impl TokenSource {
    pub fn emulator() -> Self {
        TokenSource::Emulator
    }

    pub fn service_account(account: ServiceAccount) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| Error::InvalidCredentials(format!("private_key: {}", e)))?;
        Ok(TokenSource::ServiceAccount {
            account,
            key,
            cached: Mutex::new(None),
        })
    }

    /// Current bearer token, exchanging a new one when the cache is stale
    pub async fn bearer(&self, http: &Client) -> Result<String> {
        let TokenSource::ServiceAccount {
            account,
            key,
            cached,
        } = self
        else {
            return Ok("owner".to_string());
        };

        // Held across the exchange: single-flight refresh, concurrent callers
        // wait for the one new token instead of each requesting their own
        let mut cached = cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.token.clone());
            }
        }

        let fresh = exchange(http, account, key).await?;
        let lifetime = Duration::from_secs(fresh.expires_in);
        let token = fresh.access_token;
        *cached = Some(CachedToken {
            token: token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        });
        Ok(token)
    }
}

fn sign_assertion(account: &ServiceAccount, key: &EncodingKey, now: i64) -> Result<String> {
    let claims = Claims {
        iss: &account.client_email,
        scope: DATASTORE_SCOPE,
        aud: &account.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = account.private_key_id.clone();
    jsonwebtoken::encode(&header, &claims, key)
        .map_err(|e| Error::Auth(format!("failed to sign token request: {}", e)))
}

async fn exchange(http: &Client, account: &ServiceAccount, key: &EncodingKey) -> Result<TokenResponse> {
    let assertion = sign_assertion(account, key, crate::time::now().timestamp())?;
    debug!(client_email = %account.client_email, "Requesting access token");

    let response = http
        .post(&account.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Auth(format!("token endpoint returned {}: {}", status, body)));
    }
    Ok(response.json::<TokenResponse>().await?)
}
