/// Success envelope and upload helpers for handlers
use crate::{
    context::AppContext,
    error::{CmsError, CmsResult},
    uploads::{self, UploadFile, UploadRules},
};
use axum::{http::StatusCode, Json};
use serde::Serialize;
use std::future::Future;

/// `{"message": ..., "data": ...}`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub message: String,
    pub data: T,
}

pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        message: message.into(),
        data,
    })
}

pub fn created<T: Serialize>(
    message: impl Into<String>,
    data: T,
) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, ok(message, data))
}

/// Delete responses carry `"data": null`
pub fn deleted(message: impl Into<String>) -> Json<Envelope<()>> {
    ok(message, ())
}

/// Check a file against its folder rules and store it
pub async fn store_upload(
    ctx: &AppContext,
    file: UploadFile,
    rules: UploadRules,
) -> CmsResult<String> {
    rules.check(&file)?;
    ctx.uploads.upload(file, rules.folder).await
}

/// Reject a client-supplied attachment URL that points into upload storage.
///
/// Stored files are only referenced through the upload endpoints, so deleting
/// an owner never removes a file another record uses. `current` is the
/// owner's present value, which may be sent back unchanged.
pub fn check_client_url(
    ctx: &AppContext,
    field: &str,
    url: &str,
    current: Option<&str>,
) -> CmsResult<()> {
    if ctx.uploads.owns(url) && current != Some(url) {
        return Err(CmsError::Validation(format!(
            "{} cannot reference stored uploads, use the upload endpoint instead",
            field
        )));
    }
    Ok(())
}

/// Run a database write that references `new_url`, removing the file again if the write fails
pub async fn write_or_discard<T, F>(ctx: &AppContext, new_url: Option<&str>, write: F) -> CmsResult<T>
where
    F: Future<Output = CmsResult<T>>,
{
    match write.await {
        Ok(value) => Ok(value),
        Err(e) => {
            if let Some(url) = new_url {
                tracing::warn!("Write failed after upload, removing {}", url);
                uploads::discard(ctx.uploads.as_ref(), url).await;
            }
            Err(e)
        }
    }
}

/// Remove a replaced attachment once the new one is committed
pub async fn discard_replaced(ctx: &AppContext, old_url: &str, new_url: &str) {
    if old_url != new_url {
        uploads::discard(ctx.uploads.as_ref(), old_url).await;
    }
}
