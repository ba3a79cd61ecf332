/// Blog post endpoints and blog tags
use crate::{
    api::{
        extract::{path_id, tag_names, TagInput, ValidJson},
        response::{created, deleted, ok},
    },
    context::AppContext,
    error::CmsResult,
    portfolio::{BlogPostChanges, NewBlogPost},
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

/// Build blog routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/v1/blog", get(list_posts).post(create_post))
        .route("/api/v1/blog/published", get(list_published))
        .route("/api/v1/blog/tags", get(list_blog_tags).post(create_blog_tag))
        .route("/api/v1/blog/slug/:slug", get(get_post_by_slug))
        .route(
            "/api/v1/blog/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[validate(length(min = 1, max = 255))]
    pub slug: String,
    #[serde(default)]
    pub featured_image: String,
    pub publish_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagInput>,
}

/// Absent fields are left unchanged; `tags`, when present, replaces the set
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub slug: Option<String>,
    pub featured_image: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub tags: Option<Vec<TagInput>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBlogTagRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
}

async fn list_posts(State(ctx): State<AppContext>) -> CmsResult<impl IntoResponse> {
    let posts = ctx.blog.list_all_with_tags().await?;
    Ok(ok("Blog posts retrieved", posts))
}

async fn list_published(State(ctx): State<AppContext>) -> CmsResult<impl IntoResponse> {
    let posts = ctx.blog.list_published_with_tags().await?;
    Ok(ok("Published blog posts retrieved", posts))
}

/// The returned post carries the count before this view
async fn get_post(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    let post = ctx.blog.get_by_id_with_tags(path_id(&id)?).await?;
    ctx.blog.increment_view_count(post.id).await?;
    Ok(ok("Blog post retrieved", post))
}

async fn get_post_by_slug(
    State(ctx): State<AppContext>,
    Path(slug): Path<String>,
) -> CmsResult<impl IntoResponse> {
    let post = ctx.blog.get_by_slug_with_tags(&slug).await?;
    ctx.blog.increment_view_count(post.id).await?;
    Ok(ok("Blog post retrieved", post))
}

async fn create_post(
    State(ctx): State<AppContext>,
    ValidJson(req): ValidJson<CreatePostRequest>,
) -> CmsResult<impl IntoResponse> {
    let defaults = NewBlogPost::default();
    let new = NewBlogPost {
        title: req.title,
        content: req.content,
        excerpt: req.excerpt,
        slug: req.slug,
        featured_image: req.featured_image,
        publish_date: req.publish_date,
        status: req
            .status
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.status),
    };

    let post = ctx
        .blog
        .create_with_tags(new, &tag_names(req.tags))
        .await?;
    Ok(created("Blog post created", post))
}

async fn update_post(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdatePostRequest>,
) -> CmsResult<impl IntoResponse> {
    let id = path_id(&id)?;
    let changes = BlogPostChanges {
        title: req.title,
        content: req.content,
        excerpt: req.excerpt,
        slug: req.slug,
        featured_image: req.featured_image,
        publish_date: req.publish_date,
        status: req.status,
    };
    let tags = req.tags.map(tag_names);

    let post = ctx
        .blog
        .update_with_tags(id, changes, tags.as_deref())
        .await?;
    Ok(ok("Blog post updated", post))
}

async fn delete_post(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<impl IntoResponse> {
    ctx.blog.delete_with_tags(path_id(&id)?).await?;
    Ok(deleted("Blog post deleted"))
}

async fn list_blog_tags(State(ctx): State<AppContext>) -> CmsResult<impl IntoResponse> {
    let tags = ctx.blog.tagging().store.get_all().await?;
    Ok(ok("Blog tags retrieved", tags))
}

async fn create_blog_tag(
    State(ctx): State<AppContext>,
    ValidJson(req): ValidJson<CreateBlogTagRequest>,
) -> CmsResult<impl IntoResponse> {
    let tag = ctx.blog.tagging().store.create(&req.name, None).await?;
    Ok(created("Blog tag created", tag))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{delete, get, json, send, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_hello_world_post() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;

        let (status, body) = send(
            &app,
            json(
                "POST",
                "/api/v1/blog",
                json!({
                    "title": "Hello",
                    "slug": "hello-world",
                    "content": "First post",
                    "status": "published",
                    "publish_date": "2025-01-01T00:00:00Z",
                    "tags": [{"name": "intro"}, "rust"]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, get("/api/v1/blog/slug/hello-world")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["view_count"], 0);
        let names: Vec<&str> = body["data"]["tags"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["intro", "rust"]);
        assert!(body["data"]["tags"][0].get("color").is_none());

        let (_, body) = send(&app, get(&format!("/api/v1/blog/{}", id))).await;
        assert_eq!(body["data"]["view_count"], 1);

        let (_, body) = send(&app, get("/api/v1/blog/published")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;
        let post = json!({"title": "A", "slug": "same"});

        let (status, _) = send(&app, json("POST", "/api/v1/blog", post.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = send(&app, json("POST", "/api/v1/blog", post)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Conflict");
    }

    #[tokio::test]
    async fn test_update_with_empty_tag_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;

        let (_, body) = send(
            &app,
            json(
                "POST",
                "/api/v1/blog",
                json!({"title": "Before", "slug": "p", "tags": ["keep"]}),
            ),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/blog/{}", id);

        let (status, _) = send(
            &app,
            json("PUT", &uri, json!({"title": "After", "tags": ["ok", "  "]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, get(&uri)).await;
        assert_eq!(body["data"]["title"], "Before");
        assert_eq!(body["data"]["tags"][0]["name"], "keep");

        let (status, body) = send(&app, json("PUT", &uri, json!({"tags": []}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["tags"].as_array().unwrap().is_empty());

        let (status, _) = send(&app, delete(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_blog_tags() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;

        let (status, _) = send(&app, json("POST", "/api/v1/blog/tags", json!({"name": "news"}))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = send(&app, get("/api/v1/blog/tags")).await;
        assert_eq!(body["data"][0]["name"], "news");
    }
}
