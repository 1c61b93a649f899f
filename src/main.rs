/// Веб-сервер формы предсказания аренды

use std::path::PathBuf;

use anyhow::Context;
use axum::http::Method;
use tower_http::cors::{Any, CorsLayer};

use house_rent::{
    server::{router, AppState},
    PipelineConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализация логирования
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = PipelineConfig::load(config_path.as_deref()).context("failed to load configuration")?;

    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = router(AppState::new(config.paths.clone())).layer(cors);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("cannot bind {}", config.server.bind))?;
    tracing::info!("Server listening on http://{}", config.server.bind);
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
