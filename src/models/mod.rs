//! Data models for the portfolio server.
//!
//! Records stored in the document collections and the partial-update
//! shapes written back to them.

mod project;
mod user;

pub use project::*;
pub use user::*;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new UUID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
