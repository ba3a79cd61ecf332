/// Testimonial endpoints
use crate::{
    api::{
        extract::{path_id, ValidJson},
        response::{created, deleted, ok},
    },
    context::AppContext,
    error::CmsResult,
    portfolio::{NewTestimonial, TestimonialChanges},
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use validator::Validate;

/// Build testimonial routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/v1/testimonials",
            get(list_testimonials).post(create_testimonial),
        )
        .route("/api/v1/testimonials/featured", get(list_featured))
        .route("/api/v1/testimonials/status/:status", get(list_by_status))
        .route(
            "/api/v1/testimonials/:id",
            get(get_testimonial)
                .put(update_testimonial)
                .delete(delete_testimonial),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTestimonialRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[validate(length(min = 1))]
    pub message: String,
    #[serde(default)]
    pub avatar_url: String,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i64>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub display_order: i64,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTestimonialRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub message: Option<String>,
    pub avatar_url: Option<String>,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i64>,
    pub is_featured: Option<bool>,
    pub display_order: Option<i64>,
    pub status: Option<String>,
}

async fn list_testimonials(State(ctx): State<AppContext>) -> CmsResult<impl IntoResponse> {
    Ok(ok("Testimonials retrieved", ctx.testimonials.list_all().await?))
}

async fn list_featured(State(ctx): State<AppContext>) -> CmsResult<impl IntoResponse> {
    let testimonials = ctx.testimonials.list_featured().await?;
    Ok(ok("Featured testimonials retrieved", testimonials))
}

async fn list_by_status(
    State(ctx): State<AppContext>,
    Path(status): Path<String>,
) -> CmsResult<impl IntoResponse> {
    let testimonials = ctx.testimonials.list_by_status(&status).await?;
    Ok(ok("Testimonials retrieved", testimonials))
}

async fn get_testimonial(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    let testimonial = ctx.testimonials.get(path_id(&id)?).await?;
    Ok(ok("Testimonial retrieved", testimonial))
}

async fn create_testimonial(
    State(ctx): State<AppContext>,
    ValidJson(req): ValidJson<CreateTestimonialRequest>,
) -> CmsResult<impl IntoResponse> {
    let defaults = NewTestimonial::default();
    let testimonial = ctx
        .testimonials
        .create(NewTestimonial {
            name: req.name,
            title: req.title,
            message: req.message,
            avatar_url: req.avatar_url,
            rating: req.rating.unwrap_or(defaults.rating),
            is_featured: req.is_featured,
            display_order: req.display_order,
            status: req
                .status
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.status),
        })
        .await?;
    Ok(created("Testimonial created", testimonial))
}

async fn update_testimonial(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateTestimonialRequest>,
) -> CmsResult<impl IntoResponse> {
    let testimonial = ctx
        .testimonials
        .update(
            path_id(&id)?,
            TestimonialChanges {
                name: req.name,
                title: req.title,
                message: req.message,
                avatar_url: req.avatar_url,
                rating: req.rating,
                is_featured: req.is_featured,
                display_order: req.display_order,
                status: req.status,
            },
        )
        .await?;
    Ok(ok("Testimonial updated", testimonial))
}

async fn delete_testimonial(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    ctx.testimonials.delete(path_id(&id)?).await?;
    Ok(deleted("Testimonial deleted"))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{get, json, send, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_moderation_flow() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;

        let (status, body) = send(
            &app,
            json(
                "POST",
                "/api/v1/testimonials",
                json!({"name": "Dana", "message": "Great", "is_featured": true, "status": "pending"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["rating"], 5);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (_, body) = send(&app, get("/api/v1/testimonials/featured")).await;
        assert!(body["data"].as_array().unwrap().is_empty());

        let (status, _) = send(
            &app,
            json(
                "PUT",
                &format!("/api/v1/testimonials/{}", id),
                json!({"status": "approved"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, get("/api/v1/testimonials/featured")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app, get("/api/v1/testimonials/status/unknown")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rating_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;

        let (status, _) = send(
            &app,
            json(
                "POST",
                "/api/v1/testimonials",
                json!({"name": "Dana", "message": "Great", "rating": 9}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
