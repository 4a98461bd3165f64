//! Authentication Routes
//!
//! Federated sign-in with Google, restricted to emails in the `users`
//! collection.
//!
//! Routes:
//! - GET /api/auth/google - Redirect to the consent screen
//! - GET /api/auth/google/callback - Handle the provider callback
//! - GET /api/auth/session - Session presence probe
//! - POST /api/auth/logout - End session

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use tracing::warn;

use super::constant_time_eq;
use super::response::ApiResponse;
use crate::middleware::{resolve_session, OAUTH_STATE_COOKIE_NAME, SESSION_COOKIE_NAME};
use crate::services::Session;
use crate::{AppState, Error, Result};

/// Lifetime of the OAuth state cookie.
const STATE_MAX_AGE_MINUTES: i64 = 10;

/// Build authentication routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/google", get(login_redirect))
        .route("/api/auth/google/callback", get(oauth_callback))
        .route("/api/auth/session", get(session))
        .route("/api/auth/logout", post(logout))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query params for OAuth callback.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Redirect to the provider consent screen.
///
/// GET /api/auth/google
///
/// The random `state` is kept in a short-lived cookie and checked on callback.
#[axum::debug_handler]
async fn login_redirect(State(state): State<AppState>, jar: CookieJar) -> Result<Response> {
    let csrf_state = nanoid::nanoid!(32);
    let auth_url = state.auth.authorization_url(&csrf_state);

    let cookie = Cookie::build((OAUTH_STATE_COOKIE_NAME, csrf_state))
        .path("/api/auth")
        .http_only(true)
        .secure(state.config.server.secure_cookies())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(STATE_MAX_AGE_MINUTES))
        .build();

    Ok((jar.add(cookie), Redirect::temporary(&auth_url)).into_response())
}

/// Handle the provider callback.
///
/// GET /api/auth/google/callback?code=...&state=...
///
/// Always redirects to the frontend, with `success`, `message` and on
/// success the session `token` in the query string.
#[axum::debug_handler]
async fn oauth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Response> {
    let expected_state = jar
        .get(OAUTH_STATE_COOKIE_NAME)
        .map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::build(OAUTH_STATE_COOKIE_NAME).path("/api/auth"));

    match complete_sign_in(&state, expected_state.as_deref(), query).await {
        Ok(token) => {
            let cookie = Cookie::build((SESSION_COOKIE_NAME, token.clone()))
                .path("/")
                .http_only(true)
                .secure(state.config.server.secure_cookies())
                .same_site(SameSite::Lax)
                .max_age(time::Duration::seconds(state.auth.max_age_seconds() as i64))
                .build();

            let target = frontend_redirect(
                &state.config.identity.frontend_url,
                &[
                    ("success", "true"),
                    ("message", "Login successful"),
                    ("token", &token),
                ],
            )?;
            Ok((jar.add(cookie), Redirect::temporary(&target)).into_response())
        }
        Err(e) => {
            warn!(error = %e, "Sign-in failed");
            let message = e.to_string();
            let target = frontend_redirect(
                &state.config.identity.frontend_url,
                &[("success", "false"), ("message", &message)],
            )?;
            Ok((jar, Redirect::temporary(&target)).into_response())
        }
    }
}

async fn complete_sign_in(
    state: &AppState,
    expected_state: Option<&str>,
    query: OAuthCallbackQuery,
) -> Result<String> {
    if let Some(error) = query.error {
        return Err(Error::InvalidInput(format!("Sign-in was cancelled: {}", error)));
    }

    let returned_state = query.state.unwrap_or_default();
    match expected_state {
        Some(expected) if constant_time_eq(expected, &returned_state) => {}
        _ => return Err(Error::InvalidInput("Invalid or expired state".into())),
    }

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::InvalidInput("Missing authorization code".into()))?;

    state.auth.sign_in(&state.users, &code).await
}

fn frontend_redirect(base: &str, params: &[(&str, &str)]) -> Result<String> {
    url::Url::parse_with_params(base, params)
        .map(String::from)
        .map_err(|e| Error::Internal(format!("Invalid frontend redirect URL: {}", e)))
}

/// Session presence probe.
///
/// GET /api/auth/session
#[axum::debug_handler]
async fn session(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<ApiResponse<Session>> {
    let session = resolve_session(&state.auth, &jar, &headers).ok_or(Error::SessionNotFound)?;
    Ok(ApiResponse::ok("Session found", session))
}

/// End the current session.
///
/// POST /api/auth/logout
///
/// Tokens are stateless, so this only clears the cookie.
#[axum::debug_handler]
async fn logout(jar: CookieJar) -> impl IntoResponse {
    let cookie = Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build();

    (jar.add(cookie), ApiResponse::message("Logged out successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontend_redirect_encodes_message() {
        let target = frontend_redirect(
            "http://localhost:3000/login",
            &[("success", "false"), ("message", "Email not registered")],
        )
        .unwrap();
        assert_eq!(
            target,
            "http://localhost:3000/login?success=false&message=Email+not+registered"
        );
    }

    #[test]
    fn test_frontend_redirect_rejects_relative_base() {
        assert!(frontend_redirect("/login", &[("success", "true")]).is_err());
    }
}
