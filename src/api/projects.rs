/// Project endpoints, project tags and project-tag links
use crate::{
    api::{
        extract::{path_id, tag_names, MultipartForm, TagInput, ValidJson},
        response::{
            check_client_url, created, deleted, discard_replaced, ok, store_upload,
            write_or_discard,
        },
    },
    context::AppContext,
    error::{CmsError, CmsResult},
    portfolio::{NewProject, ProjectChanges},
    uploads::{self, UploadRules},
};
use axum::{
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

/// Build project routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/v1/projects", get(list_projects).post(create_project))
        .route("/api/v1/projects/with-image", post(create_project_with_image))
        .route(
            "/api/v1/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/api/v1/tags", get(list_tags).post(create_tag))
        .route(
            "/api/projects/:project_id/tags",
            get(list_project_tags).post(add_project_tag),
        )
        .route(
            "/api/projects/:project_id/tags/:tag_id",
            delete(remove_project_tag),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListProjectsParams {
    pub with_tags: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    pub demo_url: Option<String>,
    pub code_url: Option<String>,
    #[serde(default)]
    pub display_order: i64,
    #[serde(default)]
    pub is_featured: bool,
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LinkTagRequest {
    #[validate(length(min = 1))]
    pub tag_id: String,
}

/// Blank optional fields fall back to the project defaults
fn new_project(
    title: String,
    description: Option<String>,
    demo_url: Option<String>,
    code_url: Option<String>,
    status: Option<String>,
) -> NewProject {
    let defaults = NewProject::default();
    NewProject {
        title,
        description: description.unwrap_or_default(),
        demo_url: demo_url
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.demo_url),
        code_url: code_url
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.code_url),
        status: status
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.status),
        ..defaults
    }
}

async fn list_projects(
    State(ctx): State<AppContext>,
    Query(params): Query<ListProjectsParams>,
) -> CmsResult<impl IntoResponse> {
    let projects = ctx
        .projects
        .list_all(params.with_tags.unwrap_or(true))
        .await?;
    Ok(ok("Projects retrieved", projects))
}

async fn get_project(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    let project = ctx.projects.get_by_id_with_tags(path_id(&id)?).await?;
    Ok(ok("Project retrieved", project))
}

async fn create_project(
    State(ctx): State<AppContext>,
    ValidJson(req): ValidJson<CreateProjectRequest>,
) -> CmsResult<impl IntoResponse> {
    check_client_url(&ctx, "image_url", &req.image_url, None)?;

    let mut new = new_project(
        req.title,
        Some(req.description),
        req.demo_url,
        req.code_url,
        req.status,
    );
    new.image_url = req.image_url;
    new.display_order = req.display_order;
    new.is_featured = req.is_featured;

    let project = ctx
        .projects
        .create_with_tags(new, &tag_names(req.tags))
        .await?;

    info!("Created project {}", project.id);
    Ok(created("Project created", project))
}

/// Multipart create; the optional `image` part is uploaded before the row is written
async fn create_project_with_image(
    State(ctx): State<AppContext>,
    multipart: Multipart,
) -> CmsResult<impl IntoResponse> {
    let mut form = MultipartForm::read(multipart).await?;

    let mut new = new_project(
        form.required("title")?,
        form.text("description"),
        form.text("demo_url"),
        form.text("code_url"),
        form.text("status"),
    );
    new.display_order = form.parse("display_order")?.unwrap_or(0);
    new.is_featured = form.flag("is_featured")?.unwrap_or(false);
    let tags = form.list("tags").unwrap_or_default();

    let image_url = match form.take_file("image") {
        Some(file) => Some(store_upload(&ctx, file, UploadRules::PROJECT_IMAGE).await?),
        None => None,
    };
    new.image_url = image_url.clone().unwrap_or_default();

    let project = write_or_discard(
        &ctx,
        image_url.as_deref(),
        ctx.projects.create_with_tags(new, &tags),
    )
    .await?;

    info!("Created project {} with image '{}'", project.id, project.image_url);
    Ok(created("Project created", project))
}

/// Multipart update; every field is optional, `tags` replaces the set when sent
async fn update_project(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> CmsResult<impl IntoResponse> {
    let id = path_id(&id)?;
    let mut form = MultipartForm::read(multipart).await?;
    let existing = ctx.projects.get_by_id_with_tags(id).await?;

    let changes = ProjectChanges {
        title: form.non_empty("title"),
        description: form.text("description"),
        image_url: None,
        demo_url: form.non_empty("demo_url"),
        code_url: form.non_empty("code_url"),
        display_order: form.parse("display_order")?,
        is_featured: form.flag("is_featured")?,
        status: form.non_empty("status"),
    };
    let tags = form.list("tags");

    let new_url = match form.take_file("image") {
        Some(file) => Some(store_upload(&ctx, file, UploadRules::PROJECT_IMAGE).await?),
        None => None,
    };
    let changes = ProjectChanges {
        image_url: new_url.clone(),
        ..changes
    };

    let project = write_or_discard(
        &ctx,
        new_url.as_deref(),
        ctx.projects.update_with_tags(id, changes, tags.as_deref()),
    )
    .await?;

    if let Some(new_url) = &new_url {
        discard_replaced(&ctx, &existing.image_url, new_url).await;
    }

    Ok(ok("Project updated", project))
}

async fn delete_project(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    let project = ctx.projects.delete_with_tags(path_id(&id)?).await?;
    uploads::discard(ctx.uploads.as_ref(), &project.image_url).await;

    info!("Deleted project {}", project.id);
    Ok(deleted("Project deleted"))
}

async fn list_tags(State(ctx): State<AppContext>) -> CmsResult<impl IntoResponse> {
    let tags = ctx.projects.tagging().store.get_all().await?;
    Ok(ok("Tags retrieved", tags))
}

async fn create_tag(
    State(ctx): State<AppContext>,
    ValidJson(req): ValidJson<CreateTagRequest>,
) -> CmsResult<impl IntoResponse> {
    let tag = ctx
        .projects
        .tagging()
        .store
        .create(&req.name, req.color.as_deref())
        .await?;
    Ok(created("Tag created", tag))
}

async fn list_project_tags(
    State(ctx): State<AppContext>,
    Path(project_id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    let project = ctx.projects.get_by_id_with_tags(path_id(&project_id)?).await?;
    Ok(ok("Project tags retrieved", project.tags))
}

async fn add_project_tag(
    State(ctx): State<AppContext>,
    Path(project_id): Path<String>,
    ValidJson(req): ValidJson<LinkTagRequest>,
) -> CmsResult<impl IntoResponse> {
    let project_id = path_id(&project_id)?;
    let tag_id = path_id(&req.tag_id)
        .map_err(|_| CmsError::Validation(format!("Invalid tag id: {}", req.tag_id)))?;

    let project = ctx.projects.add_tag(project_id, tag_id).await?;
    Ok(created("Tag added to project", project))
}

async fn remove_project_tag(
    State(ctx): State<AppContext>,
    Path((project_id, tag_id)): Path<(String, String)>,
) -> CmsResult<impl IntoResponse> {
    let project = ctx
        .projects
        .remove_tag(path_id(&project_id)?, path_id(&tag_id)?)
        .await?;
    Ok(ok("Tag removed from project", project))
}
