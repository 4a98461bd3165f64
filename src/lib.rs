//! Portfolio - project catalog backend
//!
//! Library exports for testing and external use.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod gcp;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod validation;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
