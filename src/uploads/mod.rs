/// File uploads for portfolio attachments
///
/// Images, icons and certificate scans are stored through an [`UploadBackend`]
/// chosen once at startup: local disk served under `/uploads`, or a remote
/// object store reached over HTTP.

pub mod local;
pub mod remote;

pub use local::LocalUploadBackend;
pub use remote::RemoteUploadBackend;

use crate::{
    config::UploadConfig,
    error::{CmsError, CmsResult},
};
use async_trait::async_trait;
use axum::body::Bytes;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// A file received from a client
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub bytes: Bytes,
    /// Client-suggested file name, used only for its extension
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

impl UploadFile {
    pub fn new(bytes: impl Into<Bytes>, file_name: Option<String>, content_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            file_name,
            content_type,
        }
    }

    /// Lowercased extension including the dot: from the file name, else the content type
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .or_else(|| {
                self.content_type
                    .as_deref()
                    .and_then(extension_for_content_type)
                    .map(String::from)
            })
    }

    /// Collision-resistant stored name: `{uuid}{ext}`, `.dat` when no extension is known
    pub fn stored_name(&self) -> String {
        format!(
            "{}{}",
            Uuid::new_v4(),
            self.extension().unwrap_or_else(|| ".dat".to_string())
        )
    }

    /// Content type to store with the object, guessed from the extension when absent
    pub fn resolved_content_type(&self) -> String {
        self.content_type
            .clone()
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
            .or_else(|| {
                self.extension()
                    .as_deref()
                    .and_then(content_type_for_extension)
                    .map(String::from)
            })
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }
}

/// Result of deleting a previously returned URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The URL does not address a file this backend owns, or the file is already gone
    NotFound,
}

/// Upload storage backend trait
#[async_trait]
pub trait UploadBackend: Send + Sync {
    /// Store a file below `folder` and return a URL clients can fetch it from
    async fn upload(&self, file: UploadFile, folder: &str) -> CmsResult<String>;

    /// Delete a file by the URL `upload` returned
    async fn delete(&self, url: &str) -> CmsResult<DeleteOutcome>;

    /// True when `url` points into this backend's storage space
    fn owns(&self, url: &str) -> bool;

    /// Provider name, e.g. for health reporting
    fn kind(&self) -> &'static str;
}

/// Build the backend selected by configuration
pub fn build_backend(config: &UploadConfig) -> CmsResult<Arc<dyn UploadBackend>> {
    let backend: Arc<dyn UploadBackend> = match config {
        UploadConfig::Local { directory } => Arc::new(LocalUploadBackend::new(directory.clone())),
        UploadConfig::Remote {
            base_url,
            api_key,
            bucket,
        } => Arc::new(RemoteUploadBackend::new(
            base_url.clone(),
            api_key.clone(),
            bucket.clone(),
        )?),
    };

    tracing::info!("Upload backend: {}", backend.kind());
    Ok(backend)
}

/// Delete a stored file without failing the caller; problems are only logged
pub async fn discard(backend: &dyn UploadBackend, url: &str) {
    if url.is_empty() || url == "#" {
        return;
    }

    match backend.delete(url).await {
        Ok(DeleteOutcome::Deleted) => tracing::debug!("Deleted upload {}", url),
        Ok(DeleteOutcome::NotFound) => {
            tracing::warn!("Upload {} was not found during cleanup", url)
        }
        Err(e) => tracing::warn!("Failed to delete upload {}: {}", url, e),
    }
}

/// Size and type limits for one upload folder
#[derive(Debug, Clone, Copy)]
pub struct UploadRules {
    pub folder: &'static str,
    pub max_bytes: usize,
    pub allowed_extensions: &'static [&'static str],
}

impl UploadRules {
    pub const PROJECT_IMAGE: UploadRules = UploadRules {
        folder: "projects",
        max_bytes: 10 * 1024 * 1024,
        allowed_extensions: &[".jpg", ".jpeg", ".png", ".webp", ".gif", ".svg"],
    };

    pub const SKILL_ICON: UploadRules = UploadRules {
        folder: "skills",
        max_bytes: 5 * 1024 * 1024,
        allowed_extensions: &[".jpg", ".jpeg", ".png", ".webp", ".svg", ".ico"],
    };

    pub const CERTIFICATE_IMAGE: UploadRules = UploadRules {
        folder: "certificates",
        max_bytes: 10 * 1024 * 1024,
        allowed_extensions: &[".jpg", ".jpeg", ".png", ".webp", ".pdf"],
    };

    /// Reject empty, oversized or disallowed files
    pub fn check(&self, file: &UploadFile) -> CmsResult<()> {
        if file.bytes.is_empty() {
            return Err(CmsError::Validation("Uploaded file is empty".to_string()));
        }

        if file.bytes.len() > self.max_bytes {
            return Err(CmsError::Validation(format!(
                "File too large: {} bytes, maximum is {} MB",
                file.bytes.len(),
                self.max_bytes / (1024 * 1024)
            )));
        }

        match file.extension() {
            Some(ext) if self.allowed_extensions.contains(&ext.as_str()) => Ok(()),
            _ => Err(CmsError::Validation(format!(
                "Unsupported file type, allowed: {}",
                self.allowed_extensions.join(", ")
            ))),
        }
    }
}

fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    let content_type = match ext {
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        ".svg" => "image/svg+xml",
        ".ico" => "image/x-icon",
        ".pdf" => "application/pdf",
        _ => return None,
    };
    Some(content_type)
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    let ext = match essence {
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/svg+xml" => ".svg",
        "image/x-icon" | "image/vnd.microsoft.icon" => ".ico",
        "application/pdf" => ".pdf",
        _ => return None,
    };
    Some(ext)
}
