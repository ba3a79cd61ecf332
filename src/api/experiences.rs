/// Work experience endpoints, always with responsibilities and skills
use crate::{
    api::{
        extract::{path_id, ValidJson},
        response::{created, deleted, ok},
    },
    context::AppContext,
    error::CmsResult,
    portfolio::{ExperienceChanges, ExperienceRelations, NewExperience, NewResponsibility},
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use validator::Validate;

/// Build experience routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/v1/experiences/with-relations",
            get(list_experiences).post(create_experience),
        )
        .route(
            "/api/v1/experiences/with-relations/:id",
            get(get_experience)
                .put(update_experience)
                .delete(delete_experience),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExperienceRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 200))]
    pub company: String,
    #[validate(length(min = 1, max = 200))]
    pub location: String,
    #[validate(length(min = 1, max = 10))]
    pub start_year: String,
    #[serde(default)]
    pub end_year: String,
    #[serde(default)]
    pub current_job: bool,
    #[serde(default)]
    pub display_order: i64,
    #[serde(default)]
    pub responsibilities: Vec<NewResponsibility>,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateExperienceRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub company: Option<String>,
    pub location: Option<String>,
    pub start_year: Option<String>,
    pub end_year: Option<String>,
    pub current_job: Option<bool>,
    pub display_order: Option<i64>,
    pub responsibilities: Option<Vec<NewResponsibility>>,
    pub skills: Option<Vec<String>>,
}

async fn list_experiences(State(ctx): State<AppContext>) -> CmsResult<impl IntoResponse> {
    Ok(ok("Experiences retrieved", ctx.experiences.list_all().await?))
}

async fn get_experience(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    let experience = ctx.experiences.get(path_id(&id)?).await?;
    Ok(ok("Experience retrieved", experience))
}

async fn create_experience(
    State(ctx): State<AppContext>,
    ValidJson(req): ValidJson<CreateExperienceRequest>,
) -> CmsResult<impl IntoResponse> {
    let new = NewExperience {
        title: req.title,
        company: req.company,
        location: req.location,
        start_year: req.start_year,
        end_year: req.end_year,
        current_job: req.current_job,
        display_order: req.display_order,
    };

    let experience = ctx
        .experiences
        .create(new, &req.responsibilities, &req.skills)
        .await?;
    Ok(created("Experience created", experience))
}

async fn update_experience(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateExperienceRequest>,
) -> CmsResult<impl IntoResponse> {
    let changes = ExperienceChanges {
        title: req.title,
        company: req.company,
        location: req.location,
        start_year: req.start_year,
        end_year: req.end_year,
        current_job: req.current_job,
        display_order: req.display_order,
    };
    let relations = ExperienceRelations {
        responsibilities: req.responsibilities.as_deref(),
        skills: req.skills.as_deref(),
    };

    let experience = ctx
        .experiences
        .update(path_id(&id)?, changes, relations)
        .await?;
    Ok(ok("Experience updated", experience))
}

async fn delete_experience(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    ctx.experiences.delete(path_id(&id)?).await?;
    Ok(deleted("Experience deleted"))
}
