//! Service layer for the portfolio server.
//!
//! Contains business logic on top of the collections and image storage:
//! - Auth (federated sign-in, session tokens)
//! - Project (project CRUD with image handling)

mod auth;
mod project;

pub use auth::{AuthService, Claims, Session};
pub use project::{ProjectService, ProjectUpdate};
