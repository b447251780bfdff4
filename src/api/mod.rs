// src/api/mod.rs — HTTP control surface for the engine

pub mod auth;
pub mod handlers;
pub mod types;

use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::engine::EngineContext;
use crate::infra::config::ApiConfig;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<EngineContext>,
    pub token: Option<String>,
}

/// Build the axum router with all control routes.
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/api/v1/settings", post(handlers::update_settings))
        .route("/api/v1/bot", post(handlers::set_bot))
        .route("/api/v1/whitelist", post(handlers::add_whitelist))
        .route(
            "/api/v1/whitelist/{user_id}",
            delete(handlers::remove_whitelist),
        )
        .route("/api/v1/run/{task}", post(handlers::run_task))
        .route("/api/v1/status", get(handlers::get_status))
        .route("/api/v1/logs", get(handlers::get_logs))
        .route("/api/v1/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}

/// Start the API server on the given port (blocking).
pub async fn start_server(config: &ApiConfig, state: ApiState) -> anyhow::Result<()> {
    let port = config.port;
    let addr = format!("127.0.0.1:{port}");

    let router = build_router(state);

    tracing::info!("Control API listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
