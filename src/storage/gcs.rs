//! Google Cloud Storage JSON API backend.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;

use super::{ObjectStore, ObjectStoreError};
use crate::gcp::TokenProvider;

const STORAGE_API: &str = "https://storage.googleapis.com";

pub struct GcsObjectStore {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    bucket: String,
    api_base: String,
    public_base: String,
}

impl GcsObjectStore {
    pub fn new(bucket: &str, tokens: Arc<dyn TokenProvider>, http: reqwest::Client) -> Self {
        Self::with_endpoint(STORAGE_API, bucket, tokens, http)
    }

    /// Send API calls to `endpoint`. Public URLs still use the real host.
    pub fn with_endpoint(
        endpoint: &str,
        bucket: &str,
        tokens: Arc<dyn TokenProvider>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            http,
            tokens,
            bucket: bucket.to_string(),
            api_base: endpoint.trim_end_matches('/').to_string(),
            public_base: STORAGE_API.to_string(),
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ObjectStoreError> {
        let token = self.tokens.access_token().await?;
        Ok(request.bearer_auth(token).send().await?)
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn put(&self, name: &str, content_type: &str, bytes: Bytes) -> Result<(), ObjectStoreError> {
        let url = format!("{}/upload/storage/v1/b/{}/o", self.api_base, self.bucket);
        let request = self
            .http
            .post(url)
            .query(&[
                ("uploadType", "media"),
                ("name", name),
                ("predefinedAcl", "publicRead"),
            ])
            .header(CONTENT_TYPE, content_type)
            .body(bytes);

        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), ObjectStoreError> {
        let url = format!(
            "{}/storage/v1/b/{}/o/{}",
            self.api_base,
            self.bucket,
            urlencoding::encode(name)
        );

        let response = self.send(self.http.delete(url)).await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(name.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}/{}/{}", self.public_base, self.bucket, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::StaticToken;
    use wiremock::matchers::{body_bytes, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> GcsObjectStore {
        GcsObjectStore::with_endpoint(
            &server.uri(),
            "portfolio-images",
            Arc::new(StaticToken("gcs-token".into())),
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn test_put_uploads_public_media() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/storage/v1/b/portfolio-images/o"))
            .and(query_param("uploadType", "media"))
            .and(query_param("name", "projects/p1/thumbnail.png"))
            .and(query_param("predefinedAcl", "publicRead"))
            .and(header("content-type", "image/png"))
            .and(header("authorization", "Bearer gcs-token"))
            .and(body_bytes(b"pixels".to_vec()))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .put("projects/p1/thumbnail.png", "image/png", Bytes::from_static(b"pixels"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remove_encodes_object_name() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/portfolio-images/o/projects%2Fp1%2Fpreview-1.png"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .remove("projects/p1/preview-1.png")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remove_missing_object() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = store(&server).remove("projects/p1/x.png").await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::NotFound(_)));
    }

    #[test]
    fn test_public_url_uses_bucket() {
        let store = GcsObjectStore::new(
            "portfolio-images",
            Arc::new(StaticToken(String::new())),
            reqwest::Client::new(),
        );
        assert_eq!(
            store.public_url("projects/p1/thumbnail.png"),
            "https://storage.googleapis.com/portfolio-images/projects/p1/thumbnail.png"
        );
    }
}
