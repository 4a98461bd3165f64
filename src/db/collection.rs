//! Typed CRUD façade over one named collection.
//!
//! Every record carries its own `id`, which doubles as the storage key.
//! Mutations check existence first so callers get a clean not-found signal
//! rather than a backend-specific failure.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::{Document, DocumentStore, FieldFilter, FilterOp, StoreError};

/// A type that can live in a [`Collection`].
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    fn id(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("Document does not exist")]
    NotFound { collection: &'static str, id: String },

    /// A backend fault. `action` is the caller-facing summary.
    #[error("{action}")]
    Storage {
        action: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Malformed {collection} document: {message}")]
    Decode {
        collection: &'static str,
        message: String,
    },
}

fn storage(action: &'static str) -> impl FnOnce(StoreError) -> CollectionError {
    move |source| CollectionError::Storage { action, source }
}

pub struct Collection<T> {
    name: &'static str,
    store: Arc<dyn DocumentStore>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            store: self.store.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Record> Collection<T> {
    pub fn new(name: &'static str, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            name,
            store,
            _record: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Every record. Order is whatever the backend returns.
    pub async fn find_all(&self) -> Result<Vec<T>, CollectionError> {
        let docs = self
            .store
            .list(self.name, None)
            .await
            .map_err(storage("Failed getting documents"))?;
        docs.into_iter().map(|d| self.decode(d)).collect()
    }

    /// Every record projected to `fields`, decoded into a narrower shape.
    pub async fn find_all_fields<P: DeserializeOwned>(
        &self,
        fields: &[&str],
    ) -> Result<Vec<P>, CollectionError> {
        let docs = self
            .store
            .list(self.name, Some(fields))
            .await
            .map_err(storage("Failed getting documents"))?;
        docs.into_iter().map(|d| self.decode(d)).collect()
    }

    /// First record whose `field` satisfies `op value`.
    ///
    /// Further matches are dropped; the collection does not enforce
    /// uniqueness of any field other than the id.
    pub async fn find_by_field(
        &self,
        field: &str,
        op: FilterOp,
        value: impl Into<Value>,
    ) -> Result<Option<T>, CollectionError> {
        let filter = FieldFilter::new(field, op, value);
        let mut docs = self
            .store
            .query(self.name, &filter)
            .await
            .map_err(storage("Failed finding document"))?;

        if docs.len() > 1 {
            warn!(
                collection = self.name,
                field,
                matches = docs.len(),
                "Multiple documents matched, using the first"
            );
        }

        if docs.is_empty() {
            return Ok(None);
        }
        self.decode(docs.swap_remove(0)).map(Some)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<T>, CollectionError> {
        let doc = self
            .store
            .get(self.name, id)
            .await
            .map_err(storage("Failed finding document"))?;
        doc.map(|d| self.decode(d)).transpose()
    }

    /// Write `record` under its own id, replacing any existing document.
    pub async fn create(&self, record: &T) -> Result<(), CollectionError> {
        let doc = self.encode(record)?;
        self.store
            .set(self.name, record.id(), doc)
            .await
            .map_err(storage("Failed creating document"))
    }

    /// Merge the top-level fields of `changes` into an existing record.
    ///
    /// Arrays and nested objects are replaced wholesale.
    pub async fn update<C: Serialize>(&self, id: &str, changes: &C) -> Result<(), CollectionError> {
        let fields = self.encode(changes)?;
        self.ensure_exists(id, "Failed updating document").await?;

        if fields.is_empty() {
            return Ok(());
        }

        self.store
            .merge(self.name, id, fields)
            .await
            .map_err(storage("Failed updating document"))
    }

    pub async fn delete(&self, id: &str) -> Result<(), CollectionError> {
        self.ensure_exists(id, "Failed deleting document").await?;
        self.store
            .delete(self.name, id)
            .await
            .map_err(storage("Failed deleting document"))
    }

    async fn ensure_exists(&self, id: &str, action: &'static str) -> Result<(), CollectionError> {
        let existing = self
            .store
            .get(self.name, id)
            .await
            .map_err(storage(action))?;

        match existing {
            Some(_) => Ok(()),
            None => Err(CollectionError::NotFound {
                collection: self.name,
                id: id.to_string(),
            }),
        }
    }

    fn encode<S: Serialize>(&self, value: &S) -> Result<Document, CollectionError> {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(self.decode_error(format!("expected an object, got {}", other))),
            Err(e) => Err(self.decode_error(e.to_string())),
        }
    }

    fn decode<D: DeserializeOwned>(&self, doc: Document) -> Result<D, CollectionError> {
        serde_json::from_value(Value::Object(doc)).map_err(|e| self.decode_error(e.to_string()))
    }

    fn decode_error(&self, message: String) -> CollectionError {
        CollectionError::Decode {
            collection: self.name,
            message,
        }
    }
}
