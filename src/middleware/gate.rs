//! Access gate.
//!
//! Every request passes through [`access_gate`] before routing. The path and
//! method are classified, first match wins:
//!
//! 1. static asset prefixes
//! 2. public pages (exact paths)
//! 3. public API routes (exact paths or `[param]` templates, per method)
//! 4. internal API routes (the handler checks the shared secret itself)
//! 5. anything else needs a session, or the request is rejected with 401
//!
//! Route templates are compiled to anchored regexes once, when the gate is
//! built. The gate keeps no per-request state.

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use regex::Regex;
use tracing::debug;

use super::session_auth::{resolve_session, SessionUser};
use crate::{error::Error, AppState};

const STATIC_PREFIXES: &[&str] = &["/_next/", "/static/", "/images/", "/favicon.ico", "/robots.txt"];

const PUBLIC_PAGES: &[&str] = &["/", "/home", "/generate/portfolio"];

type RouteSpec = (&'static str, &'static [&'static str]);

const PUBLIC_API: &[RouteSpec] = &[
    ("/api", &["GET"]),
    ("/api/project", &["GET"]),
    ("/api/project/[id]", &["GET"]),
    ("/api/auth/session", &["GET"]),
    ("/api/auth/google", &["GET"]),
    ("/api/auth/google/callback", &["GET"]),
    ("/api/auth/logout", &["POST"]),
];

const INTERNAL_API: &[RouteSpec] = &[("/api/user", &["POST"])];

/// How a request was let through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Static,
    PublicPage,
    PublicApi,
    InternalApi,
    /// Neither public nor internal: a session is required.
    Session,
}

/// Path-and-method table with exact entries and compiled templates.
#[derive(Debug, Default)]
pub struct RouteTable {
    exact: HashMap<&'static str, Vec<&'static str>>,
    patterns: Vec<(Regex, &'static [&'static str])>,
}

impl RouteTable {
    /// Build a table from route templates.
    ///
    /// A segment written `[name]` matches any single segment, `[...name]`
    /// matches one or more segments.
    pub fn compile(routes: &[RouteSpec]) -> Result<Self, regex::Error> {
        let mut table = Self::default();
        for &(template, methods) in routes {
            let template = normalize(template);
            if template.contains('[') {
                table.patterns.push((template_regex(template)?, methods));
            } else {
                table
                    .exact
                    .entry(template)
                    .or_default()
                    .extend_from_slice(methods);
            }
        }
        Ok(table)
    }

    pub fn allows(&self, path: &str, method: &Method) -> bool {
        let path = normalize(path);
        let method = method.as_str();
        if let Some(methods) = self.exact.get(path) {
            if methods.contains(&method) {
                return true;
            }
        }
        self.patterns
            .iter()
            .any(|(pattern, methods)| methods.contains(&method) && pattern.is_match(path))
    }
}

fn normalize(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

fn template_regex(template: &str) -> Result<Regex, regex::Error> {
    let segments: Vec<String> = template
        .split('/')
        .map(|segment| {
            if segment.starts_with("[...") && segment.ends_with(']') {
                ".+".to_string()
            } else if segment.starts_with('[') && segment.ends_with(']') {
                "[^/]+".to_string()
            } else {
                regex::escape(segment)
            }
        })
        .collect();
    Regex::new(&format!("^{}$", segments.join("/")))
}

/// The compiled classification table.
#[derive(Debug)]
pub struct AccessGate {
    public_api: RouteTable,
    internal_api: RouteTable,
}

impl AccessGate {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            public_api: RouteTable::compile(PUBLIC_API)?,
            internal_api: RouteTable::compile(INTERNAL_API)?,
        })
    }

    pub fn classify(&self, path: &str, method: &Method) -> Access {
        if STATIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
            Access::Static
        } else if PUBLIC_PAGES.contains(&normalize(path)) {
            Access::PublicPage
        } else if self.public_api.allows(path, method) {
            Access::PublicApi
        } else if self.internal_api.allows(path, method) {
            Access::InternalApi
        } else {
            Access::Session
        }
    }
}

/// Middleware applying the access gate to every request.
///
/// Injects [`SessionUser`] into request extensions when a session gated the
/// request through.
pub async fn access_gate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    let access = state.gate.classify(req.uri().path(), req.method());

    if access == Access::Session {
        let session = resolve_session(&state.auth, &jar, req.headers()).ok_or_else(|| {
            debug!(path = %req.uri().path(), method = %req.method(), "Rejected request without session");
            Error::Unauthenticated
        })?;
        req.extensions_mut().insert(SessionUser(session));
    }

    Ok(next.run(req).await)
}
