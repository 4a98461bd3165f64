//! Object storage for project images.
//!
//! [`ObjectStore`] is the raw seam to a blob backend. [`CloudStorage`] adds
//! the application conventions on top: extensions derived from the mime
//! type, public URLs, and recovering an object path from a stored URL.

mod gcs;
mod memory;

pub use gcs::GcsObjectStore;
pub use memory::MemoryObjectStore;

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use tracing::{debug, error};

#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("credentials: {0}")]
    Auth(#[from] crate::gcp::TokenError),
}

/// Errors from the storage wrapper, phrased for API callers.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Unable to determine file extension")]
    MissingExtension { mime_type: String },

    #[error("Failed to upload file")]
    Upload {
        path: String,
        #[source]
        source: ObjectStoreError,
    },

    #[error("Failed deleting image")]
    Delete {
        path: String,
        #[source]
        source: ObjectStoreError,
    },
}

/// Raw blob operations. One backend call per method, no retries.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write (or overwrite) an object with public read access.
    async fn put(&self, name: &str, content_type: &str, bytes: Bytes) -> Result<(), ObjectStoreError>;

    /// Remove an object. Removing a missing object is an error.
    async fn remove(&self, name: &str) -> Result<(), ObjectStoreError>;

    /// Unauthenticated URL the object is served from.
    fn public_url(&self, name: &str) -> String;
}

/// An uploaded file ready to be stored.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub mime_type: String,
    pub bytes: Bytes,
}

/// Image storage with the application's naming conventions.
#[derive(Clone)]
pub struct CloudStorage {
    backend: Arc<dyn ObjectStore>,
}

impl CloudStorage {
    pub fn new(backend: Arc<dyn ObjectStore>) -> Self {
        Self { backend }
    }

    /// Store `file` at `path.<ext>` and return its public URL.
    pub async fn store_file(&self, path: &str, file: &StoredFile) -> Result<String, StorageError> {
        let ext = extension_for(&file.mime_type).ok_or_else(|| StorageError::MissingExtension {
            mime_type: file.mime_type.clone(),
        })?;
        let name = format!("{}.{}", path, ext);

        self.backend
            .put(&name, &file.mime_type, file.bytes.clone())
            .await
            .map_err(|source| {
                error!(path = %name, error = %source, "Upload failed");
                StorageError::Upload {
                    path: name.clone(),
                    source,
                }
            })?;

        debug!(path = %name, size = file.bytes.len(), "Stored file");
        Ok(self.backend.public_url(&name))
    }

    pub async fn delete_file(&self, path: &str) -> Result<(), StorageError> {
        self.backend.remove(path).await.map_err(|source| {
            error!(path, error = %source, "Delete failed");
            StorageError::Delete {
                path: path.to_string(),
                source,
            }
        })?;

        debug!(path, "Deleted file");
        Ok(())
    }
}

/// `image/png` -> `png`. None when the subtype is missing or empty.
fn extension_for(mime_type: &str) -> Option<&str> {
    mime_type
        .split_once('/')
        .map(|(_, sub)| sub.split(';').next().unwrap_or(sub).trim())
        .filter(|sub| !sub.is_empty())
}

fn stored_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^.*/(projects/[^/]+/[^/]+)$").expect("stored path pattern is valid")
    })
}

fn preview_index_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"preview-(\d+)").expect("preview index pattern is valid"))
}

/// Recover `projects/<id>/<file>` from a public URL.
pub fn object_path(url: &str) -> Option<String> {
    stored_path_pattern()
        .captures(url)
        .map(|caps| caps[1].to_string())
}

/// Drop the extension from the last path segment.
pub fn strip_extension(path: &str) -> &str {
    let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..file_start + dot],
        _ => path,
    }
}

/// The index one past the highest `preview-<n>` among `urls` (1 when none).
pub fn next_preview_index<S: AsRef<str>>(urls: &[S]) -> u32 {
    urls.iter()
        .filter_map(|url| {
            preview_index_pattern()
                .captures(url.as_ref())
                .and_then(|caps| caps[1].parse::<u32>().ok())
        })
        .max()
        .unwrap_or(0)
        + 1
}
