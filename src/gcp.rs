//! Google Cloud access tokens.
//!
//! Both cloud clients authenticate with an OAuth access token minted from
//! the service-account key: an RS256-signed JWT assertion is exchanged at
//! the key's `token_uri` and the result is cached until shortly before it
//! expires.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

/// Scopes needed for Firestore documents and Cloud Storage objects.
const CLOUD_SCOPES: &str =
    "https://www.googleapis.com/auth/datastore https://www.googleapis.com/auth/devstorage.read_write";

/// Lifetime requested for each assertion.
const ASSERTION_TTL_SECS: i64 = 3600;

/// Tokens are refreshed this long before the provider says they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid service account key: {0}")]
    InvalidKey(String),

    #[error("failed to sign assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Source of bearer tokens for Google APIs.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, TokenError>;
}

/// The fields of a service-account key file this client needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self, TokenError> {
        serde_json::from_str(raw).map_err(|e| TokenError::InvalidKey(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Mints and caches access tokens for a service account.
pub struct ServiceAccountTokens {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    http: reqwest::Client,
    cached: RwLock<Option<CachedToken>>,
}

impl ServiceAccountTokens {
    pub fn new(key: ServiceAccountKey, http: reqwest::Client) -> Result<Self, TokenError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| TokenError::InvalidKey(e.to_string()))?;

        Ok(Self {
            key,
            signing_key,
            http,
            cached: RwLock::new(None),
        })
    }

    async fn mint(&self) -> Result<TokenResponse, TokenError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: CLOUD_SCOPES,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
        };
        let assertion =
            jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokens {
    async fn access_token(&self) -> Result<String, TokenError> {
        if let Some(token) = self.cached.read().await.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.mint().await?;
        debug!(
            account = %self.key.client_email,
            expires_in = fresh.expires_in,
            "Minted cloud access token"
        );
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(REFRESH_MARGIN);
        *cached = Some(CachedToken {
            value: fresh.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(fresh.access_token)
    }
}

/// A fixed token, for emulators and tests.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, TokenError> {
        Ok(self.0.clone())
    }
}
