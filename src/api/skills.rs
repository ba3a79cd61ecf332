/// Skill endpoints, with optional icon uploads
use crate::{
    api::{
        extract::{path_id, MultipartForm, ValidJson},
        response::{
            check_client_url, created, deleted, discard_replaced, ok, store_upload,
            write_or_discard,
        },
    },
    context::AppContext,
    error::CmsResult,
    portfolio::{NewSkill, SkillChanges},
    uploads::{self, UploadRules},
};
use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use validator::Validate;

/// Build skill routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/v1/skills", get(list_skills).post(create_skill))
        .route("/api/v1/skills/with-icon", post(create_skill_with_icon))
        .route("/api/v1/skills/featured", get(list_featured))
        .route("/api/v1/skills/category/:category", get(list_by_category))
        .route(
            "/api/v1/skills/:id",
            get(get_skill).put(update_skill).delete(delete_skill),
        )
        .route("/api/v1/skills/:id/with-icon", put(update_skill_with_icon))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSkillRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(range(min = 0, max = 100))]
    pub value: i64,
    #[serde(default)]
    pub icon_url: String,
    pub category: Option<String>,
    #[serde(default)]
    pub display_order: i64,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSkillRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(range(min = 0, max = 100))]
    pub value: Option<i64>,
    pub icon_url: Option<String>,
    pub category: Option<String>,
    pub display_order: Option<i64>,
    pub is_featured: Option<bool>,
}

fn skill_from_form(form: &MultipartForm) -> CmsResult<NewSkill> {
    let defaults = NewSkill::default();
    Ok(NewSkill {
        name: form.required("name")?,
        value: form.parse("value")?.unwrap_or(defaults.value),
        category: form.non_empty("category").unwrap_or(defaults.category),
        display_order: form.parse("display_order")?.unwrap_or(0),
        is_featured: form.flag("is_featured")?.unwrap_or(false),
        ..defaults
    })
}

async fn list_skills(State(ctx): State<AppContext>) -> CmsResult<impl IntoResponse> {
    Ok(ok("Skills retrieved", ctx.skills.list_all().await?))
}

async fn list_featured(State(ctx): State<AppContext>) -> CmsResult<impl IntoResponse> {
    Ok(ok("Featured skills retrieved", ctx.skills.list_featured().await?))
}

async fn list_by_category(
    State(ctx): State<AppContext>,
    Path(category): Path<String>,
) -> CmsResult<impl IntoResponse> {
    let skills = ctx.skills.list_by_category(&category).await?;
    Ok(ok("Skills retrieved", skills))
}

async fn get_skill(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    Ok(ok("Skill retrieved", ctx.skills.get(path_id(&id)?).await?))
}

async fn create_skill(
    State(ctx): State<AppContext>,
    ValidJson(req): ValidJson<CreateSkillRequest>,
) -> CmsResult<impl IntoResponse> {
    check_client_url(&ctx, "icon_url", &req.icon_url, None)?;

    let defaults = NewSkill::default();
    let skill = ctx
        .skills
        .create(NewSkill {
            name: req.name,
            value: req.value,
            icon_url: req.icon_url,
            category: req
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(defaults.category),
            display_order: req.display_order,
            is_featured: req.is_featured,
        })
        .await?;
    Ok(created("Skill created", skill))
}

async fn create_skill_with_icon(
    State(ctx): State<AppContext>,
    multipart: Multipart,
) -> CmsResult<impl IntoResponse> {
    let mut form = MultipartForm::read(multipart).await?;
    let mut new = skill_from_form(&form)?;

    let icon_url = match form.take_file("icon") {
        Some(file) => Some(store_upload(&ctx, file, UploadRules::SKILL_ICON).await?),
        None => None,
    };
    new.icon_url = icon_url.clone().unwrap_or_default();

    let skill = write_or_discard(&ctx, icon_url.as_deref(), ctx.skills.create(new)).await?;
    Ok(created("Skill created", skill))
}

async fn update_skill(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateSkillRequest>,
) -> CmsResult<impl IntoResponse> {
    let id = path_id(&id)?;
    if let Some(icon_url) = &req.icon_url {
        let existing = ctx.skills.get(id).await?;
        check_client_url(&ctx, "icon_url", icon_url, Some(&existing.icon_url))?;
    }

    let skill = ctx
        .skills
        .update(
            id,
            SkillChanges {
                name: req.name,
                value: req.value,
                icon_url: req.icon_url,
                category: req.category,
                display_order: req.display_order,
                is_featured: req.is_featured,
            },
        )
        .await?;
    Ok(ok("Skill updated", skill))
}

async fn update_skill_with_icon(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> CmsResult<impl IntoResponse> {
    let id = path_id(&id)?;
    let mut form = MultipartForm::read(multipart).await?;
    let existing = ctx.skills.get(id).await?;

    let mut changes = SkillChanges {
        name: form.non_empty("name"),
        value: form.parse("value")?,
        icon_url: None,
        category: form.non_empty("category"),
        display_order: form.parse("display_order")?,
        is_featured: form.flag("is_featured")?,
    };

    let new_url = match form.take_file("icon") {
        Some(file) => Some(store_upload(&ctx, file, UploadRules::SKILL_ICON).await?),
        None => None,
    };
    changes.icon_url = new_url.clone();

    let skill = write_or_discard(&ctx, new_url.as_deref(), ctx.skills.update(id, changes)).await?;

    if let Some(new_url) = &new_url {
        discard_replaced(&ctx, &existing.icon_url, new_url).await;
    }

    Ok(ok("Skill updated", skill))
}

async fn delete_skill(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    let skill = ctx.skills.delete(path_id(&id)?).await?;
    uploads::discard(ctx.uploads.as_ref(), &skill.icon_url).await;
    Ok(deleted("Skill deleted"))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{delete, get, json, local_file, multipart, send, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_icon_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;

        let (status, body) = send(
            &app,
            multipart(
                "POST",
                "/api/v1/skills/with-icon",
                &[
                    ("name", None, "Rust"),
                    ("value", None, "90"),
                    ("icon", Some("rust.svg"), "<svg/>"),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["category"], "programming");
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let first = body["data"]["icon_url"].as_str().unwrap().to_string();
        assert!(first.starts_with("/uploads/skills/"));

        let (status, body) = send(
            &app,
            multipart(
                "PUT",
                &format!("/api/v1/skills/{}/with-icon", id),
                &[("icon", Some("rust.png"), "png")],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let second = body["data"]["icon_url"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["value"], 90);
        assert!(!local_file(dir.path(), &first).exists());
        assert!(local_file(dir.path(), &second).exists());

        // JSON updates may resend the current icon but not point at another stored file
        let uri = format!("/api/v1/skills/{}", id);
        let (status, _) = send(&app, json("PUT", &uri, json!({"icon_url": second}))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(
            &app,
            json("PUT", &uri, json!({"icon_url": "/uploads/skills/other.svg"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, delete(&format!("/api/v1/skills/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!local_file(dir.path(), &second).exists());
    }

    #[tokio::test]
    async fn test_json_validation_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;

        let (status, _) = send(
            &app,
            json("POST", "/api/v1/skills", json!({"name": "Go", "value": 150})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        for (name, category, featured) in [("Go", "programming", true), ("Docker", "tools", false)] {
            let (status, _) = send(
                &app,
                json(
                    "POST",
                    "/api/v1/skills",
                    json!({"name": name, "value": 70, "category": category, "is_featured": featured}),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, body) = send(&app, get("/api/v1/skills/featured")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        let (_, body) = send(&app, get("/api/v1/skills/category/tools")).await;
        assert_eq!(body["data"][0]["name"], "Docker");

        let (status, _) = send(
            &app,
            json("POST", "/api/v1/skills", json!({"name": "Go", "value": 10})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
