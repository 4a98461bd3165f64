//! Auth service for the federated sign-in flow and session tokens.
//!
//! Handles:
//! - building the provider consent URL
//! - exchanging the authorization code and reading the user's email
//! - checking the email against the allow-listed users collection
//! - issuing and verifying HS256 session tokens

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthUrl, AuthorizationCode, ClientId,
    ClientSecret, CsrfToken, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{IdentityConfig, SessionConfig};
use crate::db::{Collection, FilterOp};
use crate::error::{Error, Result};
use crate::models::User;

const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

/// Payload of a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// A verified session.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
}

/// Service for authentication.
#[derive(Clone)]
pub struct AuthService {
    oauth: BasicClient,
    http_client: Client,
    userinfo_url: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    max_age_seconds: u64,
}

impl AuthService {
    pub fn new(identity: &IdentityConfig, session: &SessionConfig, http_client: Client) -> Result<Self> {
        let oauth = BasicClient::new(
            ClientId::new(identity.client_id.clone()),
            Some(ClientSecret::new(identity.client_secret.clone())),
            AuthUrl::new(identity.auth_url.clone())
                .map_err(|e| Error::Internal(format!("Invalid auth URL: {}", e)))?,
            Some(
                TokenUrl::new(identity.token_url.clone())
                    .map_err(|e| Error::Internal(format!("Invalid token URL: {}", e)))?,
            ),
        )
        .set_redirect_uri(
            RedirectUrl::new(identity.redirect_url.clone())
                .map_err(|e| Error::Internal(format!("Invalid redirect URL: {}", e)))?,
        );

        Ok(Self {
            oauth,
            http_client,
            userinfo_url: identity.userinfo_url.clone(),
            encoding_key: EncodingKey::from_secret(session.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(session.secret.as_bytes()),
            max_age_seconds: session.max_age_seconds,
        })
    }

    pub fn max_age_seconds(&self) -> u64 {
        self.max_age_seconds
    }

    /// Consent screen URL carrying `state` for CSRF protection.
    pub fn authorization_url(&self, state: &str) -> String {
        let state = state.to_string();
        let mut request = self
            .oauth
            .authorize_url(|| CsrfToken::new(state))
            .add_extra_param("access_type", "offline")
            .add_extra_param("include_granted_scopes", "true");

        for scope in SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }

        let (url, _) = request.url();
        url.to_string()
    }

    /// Exchange an authorization code for a provider access token.
    pub async fn exchange_code(&self, code: &str) -> Result<String> {
        let token = self
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                warn!(error = %e, "Authorization code exchange failed");
                Error::Upstream {
                    message: "Failed to exchange authorization code".to_string(),
                    source: None,
                }
            })?;

        Ok(token.access_token().secret().clone())
    }

    /// Email address of the signed-in provider account.
    pub async fn fetch_email(&self, access_token: &str) -> Result<String> {
        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::upstream("Failed to fetch user info", e))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "User info request rejected");
            return Err(Error::Upstream {
                message: "Failed to fetch user info".to_string(),
                source: None,
            });
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| Error::upstream("Failed to fetch user info", e))?;

        info.email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| Error::InvalidInput("Identity provider returned no email".to_string()))
    }

    /// Run the callback half of the sign-in flow and issue a session token.
    ///
    /// Only emails present in `users` may sign in.
    pub async fn sign_in(&self, users: &Collection<User>, code: &str) -> Result<String> {
        let access_token = self.exchange_code(code).await?;
        let email = self.fetch_email(&access_token).await?;

        let user = users
            .find_by_field("email", FilterOp::Equal, email.as_str())
            .await?;
        if user.is_none() {
            warn!(email = %email, "Sign-in attempt by unregistered email");
            return Err(Error::NotFound("Email not registered".to_string()));
        }

        info!(email = %email, "User signed in");
        self.issue_token(&email)
    }

    pub fn issue_token(&self, email: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: email.to_string(),
            iat: now,
            exp: now + self.max_age_seconds as i64,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Failed to sign session token: {}", e)))
    }

    /// Verify signature and expiry. Any failure means "no session".
    pub fn verify_token(&self, token: &str) -> Option<Session> {
        let data = jsonwebtoken::decode::<Claims>(
            token,
            &self.decoding_key,
            &Validation::new(Algorithm::HS256),
        )
        .ok()?;

        let expires_at = Utc.timestamp_opt(data.claims.exp, 0).single()?;
        Some(Session {
            email: data.claims.sub,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::db::MemoryDocumentStore;
    use crate::models::USERS;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn identity(base: &str) -> IdentityConfig {
        IdentityConfig {
            client_id: "client-id".into(),
            client_secret: "client-secret".into(),
            redirect_url: "http://localhost:8080/api/auth/google/callback".into(),
            frontend_url: "http://localhost:3000/login".into(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token_url: format!("{}/token", base),
            userinfo_url: format!("{}/userinfo", base),
        }
    }

    fn service(base: &str, max_age_seconds: u64) -> AuthService {
        let session = SessionConfig {
            secret: "test-secret".into(),
            max_age_seconds,
        };
        AuthService::new(&identity(base), &session, Client::new()).unwrap()
    }

    #[test]
    fn test_token_round_trip() {
        let auth = service("http://localhost", 86_400);
        let token = auth.issue_token("me@example.com").unwrap();
        let session = auth.verify_token(&token).unwrap();
        assert_eq!(session.email, "me@example.com");
        assert!(session.expires_at > Utc::now());
    }

    #[test]
    fn test_token_signed_with_other_secret_rejected() {
        let auth = service("http://localhost", 86_400);
        let other = AuthService::new(
            &identity("http://localhost"),
            &SessionConfig {
                secret: "different".into(),
                max_age_seconds: 86_400,
            },
            Client::new(),
        )
        .unwrap();
        let token = other.issue_token("me@example.com").unwrap();
        assert!(auth.verify_token(&token).is_none());
        assert!(auth.verify_token("garbage").is_none());
    }

    #[test]
    fn test_authorization_url_parameters() {
        let auth = service("http://localhost", 60);
        let url = url::Url::parse(&auth.authorization_url("xyz")).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["state"], "xyz");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["response_type"], "code");
        assert!(params["scope"].contains("userinfo.email"));
    }

    #[tokio::test]
    async fn test_sign_in_requires_registered_email() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=auth-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "provider-token",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer provider-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "email": "me@example.com" })),
            )
            .mount(&server)
            .await;

        let auth = service(&server.uri(), 86_400);
        let users: Collection<User> = Collection::new(USERS, Arc::new(MemoryDocumentStore::new()));

        let err = auth.sign_in(&users, "auth-code").await.unwrap_err();
        assert_eq!(err.to_string(), "Email not registered");

        users
            .create(&User {
                id: "u1".into(),
                email: "me@example.com".into(),
                name: None,
            })
            .await
            .unwrap();
        let token = auth.sign_in(&users, "auth-code").await.unwrap();
        assert_eq!(auth.verify_token(&token).unwrap().email, "me@example.com");
    }

    #[tokio::test]
    async fn test_failed_code_exchange_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let auth = service(&server.uri(), 86_400);
        let err = auth.exchange_code("stale").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to exchange authorization code");
    }
}
