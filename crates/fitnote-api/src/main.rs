//! FitNote API Server
//!
//! Author: sd207@naver.com

use anyhow::Context;
use fitnote_api::{create_router, state::AppState};
use fitnote_core::{AppConfig, LoggingConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "fitnote_api={level},fitnote_core={level},tower_http={level},audit=info",
            level = logging.level
        )
        .into()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (FITNOTE_CONFIG file, then environment)
    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.logging);

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create application state
    let state = Arc::new(AppState::from_config(config).await?);

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("FitNote API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/v3/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
