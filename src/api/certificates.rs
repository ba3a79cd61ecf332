/// Certificate endpoints
use crate::{
    api::{
        extract::{path_id, MultipartForm, ValidJson},
        response::{check_client_url, created, deleted, ok, store_upload, write_or_discard},
    },
    context::AppContext,
    error::{CmsError, CmsResult},
    portfolio::{certificate::parse_issue_date, CertificateChanges, NewCertificate},
    uploads::{self, UploadRules},
};
use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

/// Build certificate routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/v1/certificates",
            get(list_certificates).post(create_certificate),
        )
        .route(
            "/api/v1/certificates/with-image",
            post(create_certificate_with_image),
        )
        .route(
            "/api/v1/certificates/:id",
            get(get_certificate)
                .put(update_certificate)
                .delete(delete_certificate),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCertificateRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1))]
    pub image_url: String,
    /// `YYYY-MM-DD`
    pub issue_date: Option<String>,
    pub issuer: Option<String>,
    #[serde(default)]
    pub credential_url: String,
    #[serde(default)]
    pub display_order: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCertificateRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1))]
    pub image_url: Option<String>,
    pub issue_date: Option<String>,
    pub issuer: Option<String>,
    pub credential_url: Option<String>,
    pub display_order: Option<i64>,
}

/// Blank dates are treated as absent
fn issue_date(raw: Option<String>) -> CmsResult<Option<NaiveDate>> {
    raw.filter(|d| !d.trim().is_empty())
        .map(|d| parse_issue_date(&d))
        .transpose()
}

async fn list_certificates(State(ctx): State<AppContext>) -> CmsResult<impl IntoResponse> {
    Ok(ok("Certificates retrieved", ctx.certificates.list_all().await?))
}

async fn get_certificate(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    let certificate = ctx.certificates.get(path_id(&id)?).await?;
    Ok(ok("Certificate retrieved", certificate))
}

async fn create_certificate(
    State(ctx): State<AppContext>,
    ValidJson(req): ValidJson<CreateCertificateRequest>,
) -> CmsResult<impl IntoResponse> {
    check_client_url(&ctx, "image_url", &req.image_url, None)?;

    let defaults = NewCertificate::default();
    let certificate = ctx
        .certificates
        .create(NewCertificate {
            name: req.name,
            image_url: req.image_url,
            issue_date: issue_date(req.issue_date)?,
            issuer: req
                .issuer
                .filter(|i| !i.trim().is_empty())
                .unwrap_or(defaults.issuer),
            credential_url: req.credential_url,
            display_order: req.display_order,
        })
        .await?;
    Ok(created("Certificate created", certificate))
}

/// Multipart create; the `image` part is required
async fn create_certificate_with_image(
    State(ctx): State<AppContext>,
    multipart: Multipart,
) -> CmsResult<impl IntoResponse> {
    let mut form = MultipartForm::read(multipart).await?;
    let defaults = NewCertificate::default();

    let mut new = NewCertificate {
        name: form.required("name")?,
        issue_date: issue_date(form.text("issue_date"))?,
        issuer: form.non_empty("issuer").unwrap_or(defaults.issuer),
        credential_url: form.text("credential_url").unwrap_or_default(),
        display_order: form.parse("display_order")?.unwrap_or(0),
        image_url: String::new(),
    };

    let file = form
        .take_file("image")
        .ok_or_else(|| CmsError::Validation("image file is required".to_string()))?;
    let image_url = store_upload(&ctx, file, UploadRules::CERTIFICATE_IMAGE).await?;
    new.image_url = image_url.clone();

    let certificate =
        write_or_discard(&ctx, Some(&image_url), ctx.certificates.create(new)).await?;
    Ok(created("Certificate created", certificate))
}

async fn update_certificate(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateCertificateRequest>,
) -> CmsResult<impl IntoResponse> {
    let id = path_id(&id)?;
    if let Some(image_url) = &req.image_url {
        let existing = ctx.certificates.get(id).await?;
        check_client_url(&ctx, "image_url", image_url, Some(&existing.image_url))?;
    }

    let certificate = ctx
        .certificates
        .update(
            id,
            CertificateChanges {
                name: req.name,
                image_url: req.image_url,
                issue_date: issue_date(req.issue_date)?,
                issuer: req.issuer,
                credential_url: req.credential_url,
                display_order: req.display_order,
            },
        )
        .await?;
    Ok(ok("Certificate updated", certificate))
}

async fn delete_certificate(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    let certificate = ctx.certificates.delete(path_id(&id)?).await?;
    uploads::discard(ctx.uploads.as_ref(), &certificate.image_url).await;
    Ok(deleted("Certificate deleted"))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{delete, get, json, local_file, multipart, send, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_with_image_requires_file() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;

        let (status, _) = send(
            &app,
            multipart(
                "POST",
                "/api/v1/certificates/with-image",
                &[("name", None, "AWS")],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_pdf_certificate_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;

        let (status, body) = send(
            &app,
            multipart(
                "POST",
                "/api/v1/certificates/with-image",
                &[
                    ("name", None, "AWS"),
                    ("issue_date", None, "2024-03-15"),
                    ("image", Some("cert.pdf"), "%PDF-1.7"),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["issuer"], "-");
        assert_eq!(body["data"]["issue_date"], "2024-03-15");
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let url = body["data"]["image_url"].as_str().unwrap().to_string();
        assert!(local_file(dir.path(), &url).exists());

        let (status, body) = send(
            &app,
            json(
                "PUT",
                &format!("/api/v1/certificates/{}", id),
                json!({"issuer": "Amazon"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["issuer"], "Amazon");

        let (status, _) = send(&app, delete(&format!("/api/v1/certificates/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!local_file(dir.path(), &url).exists());

        let (_, body) = send(&app, get("/api/v1/certificates")).await;
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_issue_date() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;

        let (status, _) = send(
            &app,
            json(
                "POST",
                "/api/v1/certificates",
                json!({"name": "X", "image_url": "https://x/y.png", "issue_date": "15/03/2024"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
