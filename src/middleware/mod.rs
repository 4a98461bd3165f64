//! Middleware for the portfolio server.
//!
//! - `gate` - classifies every request as public, internal or session-protected
//! - `session_auth` - resolves a session from the cookie or a Bearer header

mod gate;
mod session_auth;

pub use gate::{access_gate, Access, AccessGate, RouteTable};
pub use session_auth::{
    resolve_session, SessionUser, OAUTH_STATE_COOKIE_NAME, SESSION_COOKIE_NAME,
};
