/// HTTP server setup and routing
use crate::{
    config::{DeploymentMode, UploadConfig},
    context::AppContext,
    error::{CmsError, CmsResult},
};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, Method, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    let max_body_bytes = ctx.config.service.max_body_bytes;

    let mut router = Router::new()
        .route("/api/health", get(health_check))
        .route("/api", get(api_banner))
        .merge(crate::api::routes())
        // Provide state - converts Router<AppContext> to Router<()>
        .with_state(ctx.clone());

    // Local uploads are served straight from disk by the long-running process
    if let (UploadConfig::Local { directory }, DeploymentMode::Standalone) =
        (&ctx.config.uploads, ctx.config.service.deployment)
    {
        router = router.nest_service("/uploads", ServeDir::new(directory));
    }

    // The fallback goes in before the layers so 404s get CORS and tracing too
    router
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// Health check handler
async fn health_check(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    let database = match crate::db::test_connection(&ctx.db).await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!("Health check database probe failed: {}", e);
            "unavailable"
        }
    };

    Json(json!({
        "status": "ok",
        "service": ctx.config.service.name,
        "version": ctx.config.service.version,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uploads": ctx.uploads.kind(),
        "database": database,
    }))
}

/// API root banner
async fn api_banner(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(json!({
        "message": format!("{} API", ctx.config.service.name),
        "version": ctx.config.service.version,
        "endpoints": {
            "health": "/api/health",
            "projects": "/api/v1/projects",
            "tags": "/api/v1/tags",
            "blog": "/api/v1/blog",
            "skills": "/api/v1/skills",
            "certificates": "/api/v1/certificates",
            "education": "/api/v1/education",
            "experiences": "/api/v1/experiences",
            "testimonials": "/api/v1/testimonials",
            "sections": "/api/v1/sections",
            "social_links": "/api/v1/social-links",
            "settings": "/api/v1/settings"
        }
    }))
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> CmsResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("{} listening on {}", ctx.config.service.name, addr);
    info!("   Service URL: {}", ctx.service_url());
    info!("   Uploads: {}", ctx.uploads.kind());

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CmsError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| CmsError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
