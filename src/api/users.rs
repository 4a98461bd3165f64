//! Internal user lookup.
//!
//! Called by the frontend's server side during sign-in to ask whether an
//! email is on the allow-list. Trusted only with the shared secret header.
//!
//! Routes:
//! - POST /api/user - Look up a user by email

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::HeaderMap,
    routing::post,
    Router,
};
use serde::Deserialize;
use tracing::warn;

use super::constant_time_eq;
use super::response::ApiResponse;
use crate::db::FilterOp;
use crate::models::User;
use crate::{AppState, Error, Result};

/// Header carrying the shared secret.
pub const INTERNAL_SECRET_HEADER: &str = "x-internal-secret";

/// Build internal user routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/user", post(find_user))
}

#[derive(Debug, Deserialize)]
struct FindUserRequest {
    email: Option<String>,
}

/// POST /api/user
///
/// The secret is checked before the body is looked at.
#[axum::debug_handler]
async fn find_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<ApiResponse<User>> {
    let provided = headers
        .get(INTERNAL_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !constant_time_eq(provided, &state.config.internal_secret) {
        warn!("Internal user lookup without a valid secret");
        return Err(Error::Unauthenticated);
    }

    let body = body?;
    let email = serde_json::from_slice::<FindUserRequest>(&body)
        .ok()
        .and_then(|req| req.email)
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty())
        .ok_or_else(|| Error::Validation("Email is required".to_string()))?;

    let user = state
        .users
        .find_by_field("email", FilterOp::Equal, email.as_str())
        .await?
        .ok_or_else(|| Error::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::ok("User found", user))
}
