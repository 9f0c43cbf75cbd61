//! Blob upload to a pre-authorized storage URL.

use std::future::Future;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{debug, warn};

use huddle_types::StorageId;
use huddle_types::api::UploadResponse;

/// Longest slice of an error body kept in [`UploadError::Status`].
const ERROR_BODY_LIMIT: usize = 400;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upload failed ({status}) {body}")]
    Status { status: u16, body: String },
    #[error("upload response not understood: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A file picked by the user, held in memory until sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes,
        }
    }
}

pub trait BlobUploader: Send + Sync + 'static {
    /// POST `attachment` to `url` and return the storage id it was given.
    fn upload(
        &self,
        url: &str,
        attachment: &Attachment,
    ) -> impl Future<Output = Result<StorageId, UploadError>> + Send;
}

#[derive(Debug, Clone, Default)]
pub struct HttpUploader {
    client: Client,
}

impl HttpUploader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl BlobUploader for HttpUploader {
    async fn upload(&self, url: &str, attachment: &Attachment) -> Result<StorageId, UploadError> {
        let res = self
            .client
            .post(url)
            .header(CONTENT_TYPE, attachment.content_type.as_str())
            .body(attachment.bytes.clone())
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "blob upload rejected");
            return Err(UploadError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let parsed: UploadResponse = serde_json::from_str(&body)?;
        debug!(storage_id = %parsed.storage_id.0, size = attachment.bytes.len(), "blob uploaded");
        Ok(parsed.storage_id)
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use serde_json::json;

    use super::*;

    async fn accept(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if content_type != "image/png" || body.is_empty() {
            return (StatusCode::BAD_REQUEST, "bad upload").into_response();
        }
        axum::Json(json!({ "storageId": format!("blob-{}", body.len()) })).into_response()
    }

    async fn reject() -> impl IntoResponse {
        (StatusCode::INTERNAL_SERVER_ERROR, "storage offline")
    }

    async fn garbage() -> impl IntoResponse {
        "not json"
    }

    async fn serve() -> String {
        let app = Router::new()
            .route("/upload", post(accept))
            .route("/broken", post(reject))
            .route("/garbage", post(garbage));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn returns_storage_id_from_json_body() {
        let base = serve().await;
        let uploader = HttpUploader::default();
        let attachment = Attachment::new("image/png", vec![1, 2, 3]);

        let id = uploader.upload(&format!("{base}/upload"), &attachment).await.unwrap();

        assert_eq!(id, StorageId("blob-3".into()));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let base = serve().await;
        let uploader = HttpUploader::default();
        let attachment = Attachment::new("image/png", vec![1]);

        let err = uploader.upload(&format!("{base}/broken"), &attachment).await.unwrap_err();
        assert!(matches!(err, UploadError::Status { status: 500, ref body } if body == "storage offline"));

        let err = uploader
            .upload(&format!("{base}/upload"), &Attachment::new("text/plain", vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn unparseable_body_is_an_error() {
        let base = serve().await;
        let err = HttpUploader::default()
            .upload(&format!("{base}/garbage"), &Attachment::new("image/png", vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Decode(_)));
    }
}
