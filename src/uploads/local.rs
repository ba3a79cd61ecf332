/// Disk-based upload backend
use crate::{
    error::{CmsError, CmsResult},
    uploads::{DeleteOutcome, UploadBackend, UploadFile},
};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// URL prefix local uploads are served under
pub const PUBLIC_PREFIX: &str = "/uploads/";

/// Local disk backend
///
/// Files are written to `{base}/{folder}/{uuid}{ext}` and addressed as
/// `/uploads/{folder}/{uuid}{ext}`.
#[derive(Clone)]
pub struct LocalUploadBackend {
    base_path: PathBuf,
}

impl LocalUploadBackend {
    /// Create a new local backend
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map a public URL back to a file below the base path.
    ///
    /// Only `/uploads/...` URLs made of plain path segments qualify.
    fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let relative = url.strip_prefix(PUBLIC_PREFIX)?;
        let relative = Path::new(relative);

        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !plain || relative.as_os_str().is_empty() {
            return None;
        }

        Some(self.base_path.join(relative))
    }
}

/// Folders are single plain segments such as `projects`
pub(crate) fn check_folder(folder: &str) -> CmsResult<()> {
    let valid = !folder.is_empty()
        && folder
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(CmsError::Upload(format!("Invalid upload folder '{}'", folder)))
    }
}

#[async_trait]
impl UploadBackend for LocalUploadBackend {
    async fn upload(&self, file: UploadFile, folder: &str) -> CmsResult<String> {
        check_folder(folder)?;

        let dir = self.base_path.join(folder);
        fs::create_dir_all(&dir).await.map_err(|e| {
            CmsError::Upload(format!("Failed to create upload directory: {}", e))
        })?;

        let name = file.stored_name();
        let path = dir.join(&name);

        fs::write(&path, &file.bytes).await.map_err(|e| {
            CmsError::Upload(format!("Failed to write upload {}: {}", name, e))
        })?;

        debug!("Stored {} bytes at {}", file.bytes.len(), path.display());

        Ok(format!("{}{}/{}", PUBLIC_PREFIX, folder, name))
    }

    async fn delete(&self, url: &str) -> CmsResult<DeleteOutcome> {
        let Some(path) = self.path_for_url(url) else {
            return Ok(DeleteOutcome::NotFound);
        };

        match fs::remove_file(&path).await {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DeleteOutcome::NotFound),
            Err(e) => Err(CmsError::Upload(format!(
                "Failed to delete upload {}: {}",
                url, e
            ))),
        }
    }

    fn owns(&self, url: &str) -> bool {
        url.starts_with(PUBLIC_PREFIX)
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}
