/// Education endpoints
use crate::{
    api::{
        extract::{path_id, ValidJson},
        response::{created, deleted, ok},
    },
    context::AppContext,
    error::CmsResult,
    portfolio::{EducationChanges, NewAchievement, NewEducation},
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use validator::Validate;

/// Build education routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/v1/education", get(list_education).post(create_education))
        .route(
            "/api/v1/education/:id",
            get(get_education)
                .put(update_education)
                .delete(delete_education),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEducationRequest {
    #[validate(length(min = 1, max = 200))]
    pub school: String,
    #[validate(length(min = 1, max = 200))]
    pub major: String,
    #[validate(length(min = 1, max = 10))]
    pub start_year: String,
    #[serde(default)]
    pub end_year: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub degree: String,
    #[serde(default)]
    pub display_order: i64,
    #[serde(default)]
    pub achievements: Vec<NewAchievement>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEducationRequest {
    #[validate(length(min = 1, max = 200))]
    pub school: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub major: Option<String>,
    pub start_year: Option<String>,
    pub end_year: Option<String>,
    pub description: Option<String>,
    pub degree: Option<String>,
    pub display_order: Option<i64>,
    pub achievements: Option<Vec<NewAchievement>>,
}

async fn list_education(State(ctx): State<AppContext>) -> CmsResult<impl IntoResponse> {
    Ok(ok("Education retrieved", ctx.education.list_all().await?))
}

async fn get_education(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    Ok(ok("Education retrieved", ctx.education.get(path_id(&id)?).await?))
}

async fn create_education(
    State(ctx): State<AppContext>,
    ValidJson(req): ValidJson<CreateEducationRequest>,
) -> CmsResult<impl IntoResponse> {
    let new = NewEducation {
        school: req.school,
        major: req.major,
        start_year: req.start_year,
        end_year: req.end_year,
        description: req.description,
        degree: req.degree,
        display_order: req.display_order,
    };

    let education = ctx.education.create(new, &req.achievements).await?;
    Ok(created("Education created", education))
}

async fn update_education(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateEducationRequest>,
) -> CmsResult<impl IntoResponse> {
    let changes = EducationChanges {
        school: req.school,
        major: req.major,
        start_year: req.start_year,
        end_year: req.end_year,
        description: req.description,
        degree: req.degree,
        display_order: req.display_order,
    };

    let education = ctx
        .education
        .update(path_id(&id)?, changes, req.achievements.as_deref())
        .await?;
    Ok(ok("Education updated", education))
}

async fn delete_education(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    ctx.education.delete(path_id(&id)?).await?;
    Ok(deleted("Education deleted"))
}
