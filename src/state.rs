//! Application state for the portfolio server.
//!
//! Contains the shared state that is passed to all handlers. Store clients
//! are built once here and injected, so tests can swap in memory backends.

use std::sync::Arc;

use reqwest::Client;
use tracing::info;

use crate::config::{BackendConfig, Config, GcpConfig};
use crate::db::{Collection, DocumentStore, FirestoreStore, MemoryDocumentStore};
use crate::gcp::{ServiceAccountKey, ServiceAccountTokens, TokenProvider};
use crate::middleware::AccessGate;
use crate::models::{User, PROJECTS, USERS};
use crate::services::{AuthService, ProjectService};
use crate::storage::{CloudStorage, GcsObjectStore, MemoryObjectStore, ObjectStore};
use crate::{Error, Result};

/// Bucket name the memory backend builds public URLs with.
const MEMORY_BUCKET: &str = "portfolio-local";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Compiled access gate table.
    pub gate: Arc<AccessGate>,
    /// Sign-in and session service.
    pub auth: AuthService,
    /// Project management service.
    pub projects: ProjectService,
    /// Allow-listed users.
    pub users: Collection<User>,
}

impl AppState {
    /// Create the application state with the configured backends.
    pub fn new(config: Config) -> Result<Self> {
        let http = Client::new();

        let (documents, objects): (Arc<dyn DocumentStore>, Arc<dyn ObjectStore>) =
            match &config.backend {
                BackendConfig::Gcp(gcp) => gcp_backends(gcp, &http)?,
                BackendConfig::Memory => {
                    info!("Using in-memory document and object stores");
                    (
                        Arc::new(MemoryDocumentStore::new()),
                        Arc::new(MemoryObjectStore::new(MEMORY_BUCKET)),
                    )
                }
            };

        Self::assemble(config, documents, objects, http)
    }

    /// Create the application state over explicit backends.
    pub fn with_backends(
        config: Config,
        documents: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Result<Self> {
        Self::assemble(config, documents, objects, Client::new())
    }

    fn assemble(
        config: Config,
        documents: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        http: Client,
    ) -> Result<Self> {
        let gate = AccessGate::new()
            .map_err(|e| Error::Internal(format!("Invalid access gate route: {}", e)))?;
        let auth = AuthService::new(&config.identity, &config.session, http)?;
        let projects = ProjectService::new(
            Collection::new(PROJECTS, documents.clone()),
            CloudStorage::new(objects),
        );

        Ok(Self {
            config: Arc::new(config),
            gate: Arc::new(gate),
            auth,
            projects,
            users: Collection::new(USERS, documents),
        })
    }
}

fn gcp_backends(
    gcp: &GcpConfig,
    http: &Client,
) -> Result<(Arc<dyn DocumentStore>, Arc<dyn ObjectStore>)> {
    let key = ServiceAccountKey::from_json(&gcp.credentials)
        .map_err(|e| Error::Internal(format!("Invalid service account credentials: {}", e)))?;
    let tokens: Arc<dyn TokenProvider> = Arc::new(
        ServiceAccountTokens::new(key, http.clone())
            .map_err(|e| Error::Internal(format!("Invalid service account key: {}", e)))?,
    );

    info!(
        project_id = %gcp.project_id,
        bucket = %gcp.bucket_name,
        "Using Firestore and Cloud Storage"
    );

    Ok((
        Arc::new(FirestoreStore::new(&gcp.project_id, tokens.clone(), http.clone())),
        Arc::new(GcsObjectStore::new(&gcp.bucket_name, tokens, http.clone())),
    ))
}
