/// Portfolio CMS server binary
use axum::{extract::Request, Router};
use portfolio_cms::{
    config::{DeploymentMode, ServerConfig},
    context::AppContext,
    error::{CmsError, CmsResult},
    server,
    serverless::FunctionHandler,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> CmsResult<()> {
    // Load configuration first so logging can honour it
    let config = ServerConfig::from_env()?;

    init_logging(&config);
    print_banner(&config);

    match config.service.deployment {
        DeploymentMode::Standalone => {
            let ctx = AppContext::new(config).await?;
            server::serve(ctx).await?;
        }
        DeploymentMode::Serverless => serve_function(config).await?,
    }

    Ok(())
}

fn init_logging(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("portfolio_cms={},tower_http=debug", config.logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Local function emulation: every request goes through the lazily initialised handler
async fn serve_function(config: ServerConfig) -> CmsResult<()> {
    let addr = format!("{}:{}", config.service.hostname, config.service.port);
    let handler = Arc::new(FunctionHandler::new(config));

    let app = Router::new().fallback(move |request: Request| {
        let handler = Arc::clone(&handler);
        async move { handler.handle(request).await }
    });

    info!("Function handler listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CmsError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| CmsError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

fn print_banner(config: &ServerConfig) {
    println!(
        r#"
    ____             __  ____      ___          ________  ________
   / __ \____  _____/ /_/ __/___  / (_)___     / ____/  |/  / ___/
  / /_/ / __ \/ ___/ __/ /_/ __ \/ / / __ \   / /   / /|_/ /\__ \
 / ____/ /_/ / /  / /_/ __/ /_/ / / / /_/ /  / /___/ /  / /___/ /
/_/    \____/_/   \__/_/  \____/_/_/\____/   \____/_/  /_//____/

        {} v{} ({:?}, uploads: {})
        "#,
        config.service.name,
        config.service.version,
        config.service.deployment,
        config.uploads.provider()
    );
}
