//! Firestore REST backend.
//!
//! Talks to the Firestore v1 REST API. Documents are plain JSON on our side
//! and typed `Value` messages on the wire; the conversion lives at the bottom
//! of this file.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{Document, DocumentStore, FieldFilter, StoreError};
use crate::gcp::TokenProvider;

const FIRESTORE_API: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: &str = "300";

/// Document store backed by a Firestore database.
pub struct FirestoreStore {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    /// `.../projects/{project}/databases/(default)/documents`
    documents_url: String,
}

impl FirestoreStore {
    pub fn new(project_id: &str, tokens: Arc<dyn TokenProvider>, http: reqwest::Client) -> Self {
        Self::with_endpoint(FIRESTORE_API, project_id, tokens, http)
    }

    /// Point the client at a different API root (emulator, test server).
    pub fn with_endpoint(
        endpoint: &str,
        project_id: &str,
        tokens: Arc<dyn TokenProvider>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            http,
            tokens,
            documents_url: format!(
                "{}/projects/{}/databases/(default)/documents",
                endpoint.trim_end_matches('/'),
                project_id
            ),
        }
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.documents_url,
            collection,
            urlencoding::encode(id)
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let token = self.tokens.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Backend {
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireDocument {
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<WireDocument>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<WireDocument>,
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn list(
        &self,
        collection: &str,
        fields: Option<&[&str]>,
    ) -> Result<Vec<Document>, StoreError> {
        let url = format!("{}/{}", self.documents_url, collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params: Vec<(&str, &str)> = vec![("pageSize", PAGE_SIZE)];
            if let Some(fields) = fields {
                params.extend(fields.iter().map(|f| ("mask.fieldPaths", *f)));
            }
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let page: ListResponse = self
                .send(self.http.get(&url).query(&params))
                .await?
                .json()
                .await?;

            for doc in page.documents {
                documents.push(decode_fields(doc.fields)?);
            }

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        debug!(collection, count = documents.len(), "Listed documents");
        Ok(documents)
    }

    async fn query(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Vec<Document>, StoreError> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": filter.field },
                        "op": filter.op.as_firestore(),
                        "value": encode_value(&filter.value),
                    }
                }
            }
        });

        let url = format!("{}:runQuery", self.documents_url);
        let items: Vec<RunQueryItem> = self
            .send(self.http.post(&url).json(&body))
            .await?
            .json()
            .await?;

        items
            .into_iter()
            .filter_map(|item| item.document)
            .map(|doc| decode_fields(doc.fields))
            .collect()
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let request = self.http.get(self.document_url(collection, id));
        match self.send(request).await {
            Ok(response) => {
                let doc: WireDocument = response.json().await?;
                Ok(Some(decode_fields(doc.fields)?))
            }
            Err(StoreError::Backend { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set(&self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError> {
        let body = json!({ "fields": encode_fields(&doc) });
        self.send(self.http.patch(self.document_url(collection, id)).json(&body))
            .await?;
        Ok(())
    }

    async fn merge(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        let mut params: Vec<(&str, &str)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths", k.as_str()))
            .collect();
        params.push(("currentDocument.exists", "true"));

        let body = json!({ "fields": encode_fields(&fields) });
        self.send(
            self.http
                .patch(self.document_url(collection, id))
                .query(&params)
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.send(self.http.delete(self.document_url(collection, id)))
            .await?;
        Ok(())
    }
}

// ============================================================================
// Value conversion
// ============================================================================

fn encode_fields(doc: &Document) -> Value {
    Value::Object(
        doc.iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // Firestore carries int64 as a decimal string.
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

fn decode_fields(fields: Map<String, Value>) -> Result<Document, StoreError> {
    fields
        .into_iter()
        .map(|(k, v)| decode_value(v).map(|v| (k, v)))
        .collect()
}

fn decode_value(value: Value) -> Result<Value, StoreError> {
    let Value::Object(mut wrapper) = value else {
        return Err(StoreError::Malformed("expected typed value object".into()));
    };
    let Some((kind, inner)) = wrapper.iter_mut().next().map(|(k, v)| (k.clone(), v.take()))
    else {
        return Err(StoreError::Malformed("empty typed value".into()));
    };

    Ok(match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" | "doubleValue" => inner,
        "integerValue" => {
            let raw = inner.as_str().map(str::to_owned).unwrap_or_else(|| inner.to_string());
            let parsed: i64 = raw
                .parse()
                .map_err(|_| StoreError::Malformed(format!("bad integerValue {}", raw)))?;
            Value::from(parsed)
        }
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner,
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            Value::Array(
                values
                    .into_iter()
                    .map(decode_value)
                    .collect::<Result<_, _>>()?,
            )
        }
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            Value::Object(decode_fields(fields)?)
        }
        "geoPointValue" => inner,
        other => {
            return Err(StoreError::Malformed(format!(
                "unsupported value type {}",
                other
            )))
        }
    })
}
