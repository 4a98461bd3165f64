//! In-process object store for local development and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

use super::{ObjectStore, ObjectStoreError};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Bytes,
}

pub struct MemoryObjectStore {
    bucket: String,
    objects: Mutex<HashMap<String, StoredObject>>,
    calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Total put and remove calls made so far, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.objects.lock().await.contains_key(name)
    }

    pub async fn get(&self, name: &str) -> Option<StoredObject> {
        self.objects.lock().await.get(name).cloned()
    }

    /// Names of all stored objects, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.objects.lock().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, name: &str, content_type: &str, bytes: Bytes) -> Result<(), ObjectStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().await.insert(
            name.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), ObjectStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.objects.lock().await.remove(name) {
            Some(_) => Ok(()),
            None => Err(ObjectStoreError::NotFound(name.to_string())),
        }
    }

    fn public_url(&self, name: &str) -> String {
        format!("https://storage.googleapis.com/{}/{}", self.bucket, name)
    }
}
