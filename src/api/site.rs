/// Site layout endpoints: sections, social links and settings
use crate::{
    api::{
        extract::{path_id, ValidJson},
        response::{created, deleted, ok},
    },
    context::AppContext,
    error::CmsResult,
    portfolio::{NewSection, NewSetting, NewSocialLink},
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get},
    Router,
};
use serde::Deserialize;
use validator::Validate;

/// Build site layout routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/v1/sections", get(list_sections).post(create_section))
        .route("/api/v1/sections/:id", delete(delete_section))
        .route(
            "/api/v1/social-links",
            get(list_social_links).post(create_social_link),
        )
        .route("/api/v1/social-links/:id", delete(delete_social_link))
        .route("/api/v1/settings", get(list_settings).post(create_setting))
        .route("/api/v1/settings/:id", delete(delete_setting))
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSectionRequest {
    #[validate(length(min = 1, max = 50))]
    pub section_id: String,
    #[validate(length(min = 1, max = 100))]
    pub label: String,
    #[serde(default)]
    pub display_order: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSocialLinkRequest {
    #[validate(length(min = 1, max = 50))]
    pub platform: String,
    #[validate(url)]
    pub url: String,
    #[serde(default)]
    pub icon_name: String,
    #[serde(default)]
    pub display_order: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSettingRequest {
    #[validate(length(min = 1, max = 100))]
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub description: String,
}

async fn list_sections(State(ctx): State<AppContext>) -> CmsResult<impl IntoResponse> {
    Ok(ok("Sections retrieved", ctx.sections.list_all().await?))
}

async fn create_section(
    State(ctx): State<AppContext>,
    ValidJson(req): ValidJson<CreateSectionRequest>,
) -> CmsResult<impl IntoResponse> {
    let section = ctx
        .sections
        .create(NewSection {
            section_id: req.section_id,
            label: req.label,
            display_order: req.display_order,
            is_active: req.is_active,
        })
        .await?;
    Ok(created("Section created", section))
}

async fn delete_section(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    ctx.sections.delete(path_id(&id)?).await?;
    Ok(deleted("Section deleted"))
}

async fn list_social_links(State(ctx): State<AppContext>) -> CmsResult<impl IntoResponse> {
    Ok(ok("Social links retrieved", ctx.social_links.list_all().await?))
}

async fn create_social_link(
    State(ctx): State<AppContext>,
    ValidJson(req): ValidJson<CreateSocialLinkRequest>,
) -> CmsResult<impl IntoResponse> {
    let link = ctx
        .social_links
        .create(NewSocialLink {
            platform: req.platform,
            url: req.url,
            icon_name: req.icon_name,
            display_order: req.display_order,
            is_active: req.is_active,
        })
        .await?;
    Ok(created("Social link created", link))
}

async fn delete_social_link(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    ctx.social_links.delete(path_id(&id)?).await?;
    Ok(deleted("Social link deleted"))
}

async fn list_settings(State(ctx): State<AppContext>) -> CmsResult<impl IntoResponse> {
    Ok(ok("Settings retrieved", ctx.settings.list_all().await?))
}

async fn create_setting(
    State(ctx): State<AppContext>,
    ValidJson(req): ValidJson<CreateSettingRequest>,
) -> CmsResult<impl IntoResponse> {
    let setting = ctx
        .settings
        .create(NewSetting {
            key: req.key,
            value: req.value,
            data_type: req.data_type,
            description: req.description,
        })
        .await?;
    Ok(created("Setting created", setting))
}

async fn delete_setting(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    ctx.settings.delete(path_id(&id)?).await?;
    Ok(deleted("Setting deleted"))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{delete, get, json, send, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_sections() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;

        let (status, body) = send(
            &app,
            json("POST", "/api/v1/sections", json!({"section_id": "about", "label": "About"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["is_active"], true);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            json("POST", "/api/v1/sections", json!({"section_id": "about", "label": "Again"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&app, delete(&format!("/api/v1/sections/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&app, get("/api/v1/sections")).await;
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_social_links_require_url() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;

        let (status, _) = send(
            &app,
            json("POST", "/api/v1/social-links", json!({"platform": "github", "url": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            json(
                "POST",
                "/api/v1/social-links",
                json!({"platform": "github", "url": "https://github.com/me"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_settings() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;

        let (status, body) = send(
            &app,
            json("POST", "/api/v1/settings", json!({"key": "site_title", "value": "Me"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["data_type"], "string");

        let (status, _) = send(
            &app,
            delete("/api/v1/settings/00000000-0000-0000-0000-000000000000"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
