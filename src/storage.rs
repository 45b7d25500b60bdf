use crate::config::StorageConfig;
use reqwest::{header, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const GCS_ENDPOINT: &str = "https://storage.googleapis.com";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Download error: {0}")]
    Download(#[from] reqwest::Error),
    #[error("Invalid storage endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("Fetching gs://{bucket}/{object} returned status {status}")]
    Status {
        bucket: String,
        object: String,
        status: StatusCode,
    },
    #[error("Object gs://{bucket}/{object} is empty")]
    Empty { bucket: String, object: String },
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

/// Reads objects through the Cloud Storage JSON API.
pub struct GcsArtifactStore {
    client: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
}

impl GcsArtifactStore {
    pub fn new(config: &StorageConfig) -> Result<Self, ArtifactError> {
        Self::with_timeout(config, DOWNLOAD_TIMEOUT)
    }

    /// `timeout` bounds the whole request, body included.
    pub fn with_timeout(config: &StorageConfig, timeout: Duration) -> Result<Self, ArtifactError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    /// `{endpoint}/storage/v1/b/{bucket}/o/{object}?alt=media`, with bucket and
    /// object each encoded as a single path segment.
    pub fn object_url(&self, bucket: &str, object: &str) -> Result<Url, ArtifactError> {
        let invalid = |reason: String| ArtifactError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason,
        };

        let mut url = Url::parse(&self.endpoint).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("endpoint cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", bucket, "o", object]);
        url.query_pairs_mut().append_pair("alt", "media");

        Ok(url)
    }

    /// Configured token first, then the GCE metadata server for the default
    /// endpoint. `None` means an anonymous request.
    async fn bearer_token(&self) -> Option<String> {
        if let Some(token) = &self.access_token {
            return Some(token.clone());
        }
        if self.endpoint != GCS_ENDPOINT {
            return None;
        }

        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .timeout(Duration::from_secs(2))
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                match response.json::<MetadataToken>().await {
                    Ok(token) => Some(token.access_token),
                    Err(e) => {
                        tracing::warn!("Unreadable metadata server token: {}", e);
                        None
                    }
                }
            }
            Ok(response) => {
                tracing::warn!("Metadata server returned status {}", response.status());
                None
            }
            Err(e) => {
                tracing::info!("Metadata server unavailable, fetching anonymously: {}", e);
                None
            }
        }
    }

    pub async fn fetch(&self, bucket: &str, object: &str) -> Result<Vec<u8>, ArtifactError> {
        let url = self.object_url(bucket, object)?;
        tracing::info!("Downloading model from gs://{}/{}", bucket, object);

        let mut request = self.client.get(url);
        if let Some(token) = self.bearer_token().await {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::error!("Model download failed with status {}", status);
            return Err(ArtifactError::Status {
                bucket: bucket.to_string(),
                object: object.to_string(),
                status,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ArtifactError::Empty {
                bucket: bucket.to_string(),
                object: object.to_string(),
            });
        }

        tracing::info!("Model downloaded successfully ({} bytes)", bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode as HttpStatus},
        routing::get,
        Router,
    };
    use tokio::net::TcpListener;

    fn storage_config(endpoint: &str, access_token: Option<&str>) -> StorageConfig {
        StorageConfig {
            bucket_name: "bucket".to_string(),
            endpoint: endpoint.to_string(),
            access_token: access_token.map(str::to_string),
        }
    }

    fn store(endpoint: &str, access_token: Option<&str>) -> GcsArtifactStore {
        GcsArtifactStore::new(&storage_config(endpoint, access_token)).unwrap()
    }

    async fn serve_objects() -> String {
        async fn object(
            Path((bucket, object)): Path<(String, String)>,
            headers: HeaderMap,
        ) -> Result<Vec<u8>, HttpStatus> {
            let authorized = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                == Some("Bearer test-token");
            match (bucket.as_str(), object.as_str(), authorized) {
                (_, _, false) => Err(HttpStatus::UNAUTHORIZED),
                ("bucket", "models/model1.onnx", true) => Ok(b"onnx-bytes".to_vec()),
                ("bucket", "empty.onnx", true) => Ok(Vec::new()),
                ("bucket", "stalled.onnx", true) => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(b"too-late".to_vec())
                }
                _ => Err(HttpStatus::NOT_FOUND),
            }
        }

        let router = Router::new().route("/storage/v1/b/{bucket}/o/{object}", get(object));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[test]
    fn test_object_url_encodes_segments() {
        let store = store("https://storage.googleapis.com/", None);
        let url = store.object_url("replaste-h5", "models/model 1.onnx").unwrap();

        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/replaste-h5/o/models%2Fmodel%201.onnx?alt=media"
        );
    }

    #[test]
    fn test_object_url_rejects_bad_endpoint() {
        let store = store("not a url", None);
        assert!(matches!(
            store.object_url("bucket", "model.onnx"),
            Err(ArtifactError::InvalidEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_object() {
        let endpoint = serve_objects().await;
        let store = store(&endpoint, Some("test-token"));

        let bytes = store.fetch("bucket", "models/model1.onnx").await.unwrap();
        assert_eq!(bytes, b"onnx-bytes");
    }

    #[tokio::test]
    async fn test_fetch_missing_object() {
        let endpoint = serve_objects().await;
        let store = store(&endpoint, Some("test-token"));

        let result = store.fetch("bucket", "missing.onnx").await;
        assert!(matches!(
            result,
            Err(ArtifactError::Status { status, .. }) if status == StatusCode::NOT_FOUND
        ));
    }

    #[tokio::test]
    async fn test_fetch_anonymous_against_emulator() {
        let endpoint = serve_objects().await;
        let store = store(&endpoint, None);

        let result = store.fetch("bucket", "models/model1.onnx").await;
        assert!(matches!(
            result,
            Err(ArtifactError::Status { status, .. }) if status == StatusCode::UNAUTHORIZED
        ));
    }

    #[tokio::test]
    async fn test_fetch_empty_object() {
        let endpoint = serve_objects().await;
        let store = store(&endpoint, Some("test-token"));

        let result = store.fetch("bucket", "empty.onnx").await;
        assert!(matches!(result, Err(ArtifactError::Empty { .. })));
    }

    #[tokio::test]
    async fn test_fetch_stalled_download_times_out() {
        let endpoint = serve_objects().await;
        let store = GcsArtifactStore::with_timeout(
            &storage_config(&endpoint, Some("test-token")),
            Duration::from_millis(200),
        )
        .unwrap();

        let result = store.fetch("bucket", "stalled.onnx").await;
        assert!(matches!(result, Err(ArtifactError::Download(e)) if e.is_timeout()));
    }
}
