/// Function-host entry point
///
/// The router is built on the first invocation and reused by every later one
/// on the same instance. A failed initialisation is not cached, so the next
/// invocation tries again.
use crate::{
    config::ServerConfig,
    context::AppContext,
    error::{CmsError, CmsResult, ErrorResponse},
    server::build_router,
};
use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use tokio::sync::OnceCell;
use tower::ServiceExt;
use tracing::{error, info};

pub struct FunctionHandler {
    config: ServerConfig,
    router: OnceCell<Router>,
}

impl FunctionHandler {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            router: OnceCell::new(),
        }
    }

    pub fn from_env() -> CmsResult<Self> {
        Ok(Self::new(ServerConfig::from_env()?))
    }

    async fn router(&self) -> CmsResult<&Router> {
        self.router
            .get_or_try_init(|| async {
                info!("Initializing {} for function invocation", self.config.service.name);
                let ctx = AppContext::new(self.config.clone()).await?;
                Ok::<_, CmsError>(build_router(ctx))
            })
            .await
    }

    /// Serve one invocation
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let router = match self.router().await {
            Ok(router) => router.clone(),
            Err(e) => {
                error!("Function initialization failed: {}", e);
                return init_failure();
            }
        };

        match router.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

fn init_failure() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "InternalServerError".to_string(),
            message: "Service failed to initialize".to_string(),
        }),
    )
        .into_response()
}
