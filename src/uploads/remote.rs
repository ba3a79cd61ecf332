/// Remote object-storage upload backend
use crate::{
    error::{CmsError, CmsResult},
    uploads::{local::check_folder, DeleteOutcome, UploadBackend, UploadFile},
};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tracing::{debug, error, info};

/// Object-storage backend speaking the `/storage/v1/object` HTTP API
///
/// Objects are written with `POST {base}/storage/v1/object/{bucket}/{path}`
/// and served from `{base}/storage/v1/object/public/{bucket}/{path}`.
#[derive(Clone)]
pub struct RemoteUploadBackend {
    client: Client,
    base_url: String,
    api_key: String,
    bucket: String,
}

impl RemoteUploadBackend {
    /// Create a new remote backend
    pub fn new(base_url: String, api_key: String, bucket: String) -> CmsResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| CmsError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        info!(
            "Initializing remote upload storage (bucket: {}, endpoint: {})",
            bucket, base_url
        );

        Ok(Self {
            client,
            base_url,
            api_key,
            bucket,
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            encode_path(path)
        )
    }

    /// Public URL handed to clients for an object path
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            encode_path(path)
        )
    }

    /// Recover the object path from a URL previously returned by `upload`.
    ///
    /// Accepts public URLs and any URL on this storage host with a segment
    /// equal to the bucket name; everything else yields `None`.
    pub fn object_path(&self, url: &str) -> Option<String> {
        let rest = url.strip_prefix(&self.base_url)?;
        let rest = rest.split(['?', '#']).next().unwrap_or("");

        let public_marker = format!("/storage/v1/object/public/{}/", self.bucket);
        let raw = match rest.find(&public_marker) {
            Some(idx) => rest[idx + public_marker.len()..].to_string(),
            None => {
                let segments: Vec<&str> = rest.split('/').collect();
                let bucket_at = segments.iter().position(|s| *s == self.bucket)?;
                segments[bucket_at + 1..].join("/")
            }
        };

        let decoded = urlencoding::decode(&raw).ok()?.into_owned();
        let clean = decoded
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");

        if decoded.is_empty() || !clean {
            return None;
        }

        Some(decoded)
    }

    fn upload_error(&self, status: StatusCode, body: &str) -> CmsError {
        let message = match status {
            StatusCode::UNAUTHORIZED => "unauthorized, check the storage key".to_string(),
            StatusCode::FORBIDDEN => "forbidden, check the bucket policies".to_string(),
            StatusCode::NOT_FOUND => format!("bucket '{}' not found", self.bucket),
            StatusCode::PAYLOAD_TOO_LARGE => "file too large for the bucket".to_string(),
            other => format!("status {}: {}", other, body),
        };
        CmsError::Upload(format!("Remote upload failed: {}", message))
    }
}

#[async_trait]
impl UploadBackend for RemoteUploadBackend {
    async fn upload(&self, file: UploadFile, folder: &str) -> CmsResult<String> {
        check_folder(folder)?;

        let path = format!("{}/{}", folder, file.stored_name());
        let content_type = file.resolved_content_type();
        let size = file.bytes.len();

        debug!(
            "Uploading {} to object storage ({} bytes, type: {})",
            path, size, content_type
        );

        let response = self
            .client
            .post(self.object_url(&path))
            .bearer_auth(&self.api_key)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CACHE_CONTROL, "public, max-age=31536000")
            .body(file.bytes)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach object storage: {}", e);
                CmsError::Upload(format!("Remote upload failed: {}", e))
            })?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            error!("Object storage rejected upload of {}: {} {}", path, status, body);
            return Err(self.upload_error(status, &body));
        }

        debug!("✓ Uploaded {} to object storage", path);
        Ok(self.public_url(&path))
    }

    async fn delete(&self, url: &str) -> CmsResult<DeleteOutcome> {
        let Some(path) = self.object_path(url) else {
            return Ok(DeleteOutcome::NotFound);
        };

        let response = self
            .client
            .delete(self.object_url(&path))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| CmsError::Upload(format!("Remote delete failed: {}", e)))?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                debug!("✓ Deleted {} from object storage", path);
                Ok(DeleteOutcome::Deleted)
            }
            StatusCode::NOT_FOUND => Ok(DeleteOutcome::NotFound),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(CmsError::Upload(format!(
                    "Remote delete of {} failed with status {}: {}",
                    path, status, body
                )))
            }
        }
    }

    fn owns(&self, url: &str) -> bool {
        url.starts_with(&self.base_url)
    }

    fn kind(&self) -> &'static str {
        "remote"
    }
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, State},
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::post,
        Router,
    };
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    fn backend(base: &str) -> RemoteUploadBackend {
        RemoteUploadBackend::new(base.to_string(), "service-key".to_string(), "uploads".to_string())
            .unwrap()
    }

    #[test]
    fn test_public_url_layout() {
        let b = backend("https://store.example.com/");
        assert_eq!(
            b.public_url("projects/a.png"),
            "https://store.example.com/storage/v1/object/public/uploads/projects/a.png"
        );
    }

    #[test]
    fn test_object_path_extraction() {
        let b = backend("https://store.example.com");

        assert_eq!(
            b.object_path("https://store.example.com/storage/v1/object/public/uploads/projects/a.png")
                .as_deref(),
            Some("projects/a.png")
        );
        assert_eq!(
            b.object_path("https://store.example.com/storage/v1/object/uploads/skills/b.svg?v=2")
                .as_deref(),
            Some("skills/b.svg")
        );
    }

    #[test]
    fn test_object_path_rejects_foreign_urls() {
        let b = backend("https://store.example.com");

        for url in [
            "https://elsewhere.example.com/storage/v1/object/public/uploads/a.png",
            "/uploads/projects/a.png",
            "https://store.example.com/storage/v1/object/public/uploads/",
            "https://store.example.com/storage/v1/object/public/other/a.png",
            "https://store.example.com/storage/v1/object/public/uploads/../x",
            "#",
        ] {
            assert_eq!(b.object_path(url), None, "{}", url);
        }

        assert!(b.owns("https://store.example.com/storage/v1/object/public/uploads/a.png"));
        assert!(!b.owns("https://elsewhere.example.com/storage/v1/object/public/uploads/a.png"));
        assert!(!b.owns("/uploads/projects/a.png"));
    }

    type Objects = Arc<Mutex<HashSet<String>>>;

    async fn put_object(
        State(objects): State<Objects>,
        Path((bucket, path)): Path<(String, String)>,
        headers: HeaderMap,
    ) -> AxumStatus {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer service-key");
        if !authorized {
            return AxumStatus::UNAUTHORIZED;
        }
        if bucket != "uploads" {
            return AxumStatus::NOT_FOUND;
        }
        objects.lock().unwrap().insert(path);
        AxumStatus::OK
    }

    async fn delete_object(
        State(objects): State<Objects>,
        Path((_bucket, path)): Path<(String, String)>,
    ) -> AxumStatus {
        if objects.lock().unwrap().remove(&path) {
            AxumStatus::OK
        } else {
            AxumStatus::NOT_FOUND
        }
    }

    async fn fake_store() -> (String, Objects) {
        let objects: Objects = Arc::default();
        let app = Router::new()
            .route(
                "/storage/v1/object/:bucket/*path",
                post(put_object).delete(delete_object),
            )
            .with_state(objects.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), objects)
    }

    #[tokio::test]
    async fn test_upload_and_delete_roundtrip() {
        let (base, objects) = fake_store().await;
        let b = backend(&base);

        let file = UploadFile::new(b"pdf".to_vec(), Some("cert.pdf".to_string()), None);
        let url = b.upload(file, "certificates").await.unwrap();

        assert!(url.starts_with(&format!("{}/storage/v1/object/public/uploads/certificates/", base)));
        assert_eq!(objects.lock().unwrap().len(), 1);

        assert_eq!(b.delete(&url).await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(b.delete(&url).await.unwrap(), DeleteOutcome::NotFound);
        assert!(objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_with_bad_key_fails() {
        let (base, _objects) = fake_store().await;
        let b = RemoteUploadBackend::new(base, "wrong".to_string(), "uploads".to_string()).unwrap();

        let file = UploadFile::new(b"x".to_vec(), Some("a.png".to_string()), None);
        let result = b.upload(file, "projects").await;

        match result {
            Err(CmsError::Upload(msg)) => assert!(msg.contains("unauthorized")),
            other => panic!("expected upload failure, got {:?}", other.map(|_| ())),
        }
    }
}
