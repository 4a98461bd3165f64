//! API Routes for the portfolio server
//!
//! This module combines all API routes into a single router.
//! Routes carry their full paths; the access gate decides per request
//! whether a session is needed, so no per-route auth layers are applied.

mod auth;
mod projects;
pub mod response;
mod status;
mod users;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    middleware, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::access_gate;
use crate::{AppState, Error};

pub use response::ApiResponse;
pub use users::INTERNAL_SECRET_HEADER;

/// Build the complete application.
///
/// Route structure:
/// - /api - Liveness check (public)
/// - /api/project/* - Projects (reads public, writes session-protected)
/// - /api/auth/* - Sign-in flow and session probe (public)
/// - /api/user - Internal user lookup (shared secret)
///
/// Layer order, outermost first: CORS, tracing, body limit, access gate.
/// CORS sits outside the gate so rejections and preflights carry its headers.
/// The body limit is enforced by the extractors, so an oversized upload
/// surfaces as an enveloped 413 from the handler.
pub fn app(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .merge(status::routes())
        .merge(projects::routes())
        .merge(auth::routes())
        .merge(users::routes())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), access_gate))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .with_state(state)
}

async fn not_found() -> Error {
    Error::NotFound("Route not found".to_string())
}

/// Compare secrets without short-circuiting on the first differing byte.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
