//! Session resolution.
//!
//! A session is an HS256 token issued at the end of the sign-in flow. It is
//! accepted from the `portfolio_session` cookie (browser) or from an
//! `Authorization: Bearer` header (scripts, the frontend's token variant).
//! The cookie wins when both are present and valid.

use axum::http::{header, HeaderMap};
use axum_extra::extract::CookieJar;

use crate::services::{AuthService, Session};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "portfolio_session";

/// Cookie carrying the OAuth `state` between redirect and callback.
pub const OAUTH_STATE_COOKIE_NAME: &str = "portfolio_oauth_state";

/// Session context injected into request extensions by the access gate.
#[derive(Clone, Debug)]
pub struct SessionUser(pub Session);

impl SessionUser {
    pub fn email(&self) -> &str {
        &self.0.email
    }
}

/// Find a valid session on the request, if any.
pub fn resolve_session(auth: &AuthService, jar: &CookieJar, headers: &HeaderMap) -> Option<Session> {
    let from_cookie = jar
        .get(SESSION_COOKIE_NAME)
        .and_then(|cookie| auth.verify_token(cookie.value()));

    from_cookie.or_else(|| bearer_token(headers).and_then(|token| auth.verify_token(token)))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;
    use reqwest::Client;

    use crate::config::{IdentityConfig, SessionConfig};

    fn auth() -> AuthService {
        let identity = IdentityConfig {
            client_id: "id".into(),
            client_secret: "secret".into(),
            redirect_url: "http://localhost:8080/api/auth/google/callback".into(),
            frontend_url: "http://localhost:3000".into(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
            userinfo_url: "https://www.googleapis.com/oauth2/v3/userinfo".into(),
        };
        let session = SessionConfig {
            secret: "session-secret".into(),
            max_age_seconds: 3600,
        };
        AuthService::new(&identity, &session, Client::new()).unwrap()
    }

    #[test]
    fn test_no_credentials() {
        let auth = auth();
        assert!(resolve_session(&auth, &CookieJar::new(), &HeaderMap::new()).is_none());
    }

    #[test]
    fn test_session_from_cookie() {
        let auth = auth();
        let token = auth.issue_token("me@example.com").unwrap();
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE_NAME, token));

        let session = resolve_session(&auth, &jar, &HeaderMap::new()).unwrap();
        assert_eq!(session.email, "me@example.com");
    }

    #[test]
    fn test_session_from_bearer_header() {
        let auth = auth();
        let token = auth.issue_token("me@example.com").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );

        let session = resolve_session(&auth, &CookieJar::new(), &headers).unwrap();
        assert_eq!(session.email, "me@example.com");
    }

    #[test]
    fn test_invalid_cookie_falls_back_to_header() {
        let auth = auth();
        let token = auth.issue_token("me@example.com").unwrap();
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE_NAME, "stale"));
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );

        assert!(resolve_session(&auth, &jar, &headers).is_some());
    }

    #[test]
    fn test_non_bearer_scheme_ignored() {
        let auth = auth();
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(resolve_session(&auth, &CookieJar::new(), &headers).is_none());
    }
}
