//! Status Routes
//!
//! Routes:
//! - GET /api - Liveness check with the current server time

use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::response::ApiResponse;
use crate::AppState;

/// Build status routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api", get(status))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub date: String,
}

/// `October 16, 2026 at 3:04:05 PM`
fn readable_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%B %-d, %Y at %-I:%M:%S %p").to_string()
}

/// GET /api
async fn status() -> ApiResponse<StatusResponse> {
    ApiResponse::ok(
        "Server is running",
        StatusResponse {
            date: readable_timestamp(&Utc::now()),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_readable_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 15, 4, 5).unwrap();
        assert_eq!(readable_timestamp(&at), "October 16, 2026 at 3:04:05 PM");
    }

    #[test]
    fn test_readable_timestamp_midnight() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 9).unwrap();
        assert_eq!(readable_timestamp(&at), "January 2, 2024 at 12:00:09 AM");
    }
}
