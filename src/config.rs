//! Configuration management for the portfolio server.
//!
//! Loads configuration from environment variables (with `.env` support).
//! Required variables are checked up front so a misconfigured process
//! fails at startup instead of on the first request that needs them.

use std::env;

/// Default lifetime of a session token and its cookie: one day.
const DEFAULT_SESSION_MAX_AGE: u64 = 86_400;

/// Default request body ceiling: seven 10 MiB images plus form fields.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 80 * 1024 * 1024;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub identity: IdentityConfig,
    pub session: SessionConfig,
    /// Shared secret expected in `x-internal-secret` on internal calls.
    pub internal_secret: String,
    pub backend: BackendConfig,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

impl ServerConfig {
    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https")
    }
}

/// OAuth client registration with the identity provider.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    /// Where the browser lands after the callback, success or not.
    pub frontend_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub max_age_seconds: u64,
}

#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// Firestore documents and Cloud Storage objects.
    Gcp(GcpConfig),
    /// Process-local stores, for development without cloud credentials.
    Memory,
}

#[derive(Debug, Clone)]
pub struct GcpConfig {
    pub project_id: String,
    pub bucket_name: String,
    /// Raw service-account key JSON.
    pub credentials: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        let env_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let backend = match env_or("DATA_BACKEND", "gcp").to_lowercase().as_str() {
            "gcp" => BackendConfig::Gcp(GcpConfig {
                project_id: required("GCP_PROJECT_ID")?,
                bucket_name: required("GCP_BUCKET_NAME")?,
                credentials: required("SERVICE_ACCOUNT_CREDENTIALS")?,
            }),
            "memory" => BackendConfig::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: "DATA_BACKEND",
                    reason: format!("expected `gcp` or `memory`, got `{}`", other),
                })
            }
        };

        Ok(Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port: parse("PORT", &env_or("PORT", "8080"))?,
                base_url: required("BASE_URL")?,
            },
            identity: IdentityConfig {
                client_id: required("GOAUTH_CLIENT_ID")?,
                client_secret: required("GOAUTH_CLIENT_SECRET")?,
                redirect_url: required("GOAUTH_REDIRECT_CALLBACK_URL")?,
                frontend_url: required("GOAUTH_REDIRECT_FE_URL")?,
                auth_url: env_or("GOAUTH_AUTH_URL", GOOGLE_AUTH_URL),
                token_url: env_or("GOAUTH_TOKEN_URL", GOOGLE_TOKEN_URL),
                userinfo_url: env_or("GOAUTH_USERINFO_URL", GOOGLE_USERINFO_URL),
            },
            session: SessionConfig {
                secret: required("JWT_SECRET_KEY")?,
                max_age_seconds: match get("SESSION_MAX_AGE") {
                    Some(v) => parse("SESSION_MAX_AGE", &v)?,
                    None => DEFAULT_SESSION_MAX_AGE,
                },
            },
            internal_secret: required("INTERNAL_SECRET")?,
            backend,
            max_upload_bytes: match get("MAX_UPLOAD_BYTES") {
                Some(v) => parse("MAX_UPLOAD_BYTES", &v)?,
                None => DEFAULT_MAX_UPLOAD_BYTES,
            },
        })
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("BASE_URL", "http://localhost:3000"),
            ("GOAUTH_CLIENT_ID", "client"),
            ("GOAUTH_CLIENT_SECRET", "secret"),
            ("GOAUTH_REDIRECT_CALLBACK_URL", "http://localhost:3000/api/auth/google/callback"),
            ("GOAUTH_REDIRECT_FE_URL", "http://localhost:3000/login"),
            ("JWT_SECRET_KEY", "jwt-secret"),
            ("INTERNAL_SECRET", "internal"),
            ("DATA_BACKEND", "memory"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults_applied() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.session.max_age_seconds, 86_400);
        assert_eq!(config.identity.token_url, GOOGLE_TOKEN_URL);
        assert!(matches!(config.backend, BackendConfig::Memory));
    }

    #[test]
    fn test_missing_required_variable_named() {
        let mut env = base_env();
        env.remove("JWT_SECRET_KEY");
        let err = load(&env).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET_KEY")));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut env = base_env();
        env.insert("INTERNAL_SECRET", "  ");
        assert!(matches!(
            load(&env).unwrap_err(),
            ConfigError::Missing("INTERNAL_SECRET")
        ));
    }

    #[test]
    fn test_gcp_backend_requires_cloud_settings() {
        let mut env = base_env();
        env.insert("DATA_BACKEND", "gcp");
        env.insert("GCP_PROJECT_ID", "demo");
        let err = load(&env).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GCP_BUCKET_NAME")));
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut env = base_env();
        env.insert("PORT", "eighty");
        assert!(matches!(
            load(&env).unwrap_err(),
            ConfigError::Invalid { name: "PORT", .. }
        ));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut env = base_env();
        env.insert("DATA_BACKEND", "postgres");
        assert!(matches!(
            load(&env).unwrap_err(),
            ConfigError::Invalid { name: "DATA_BACKEND", .. }
        ));
    }
}
