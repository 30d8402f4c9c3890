//! HTTP server implementation for the webhook

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers;
use crate::bot::BotHandler;
use crate::telegram::Update;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<BotHandler>,
}

pub fn router(handler: Arc<BotHandler>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/webhook", post(webhook_handler))
        .with_state(AppState { handler })
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Configure and start the HTTP server
pub async fn start_http_server(handler: Arc<BotHandler>, host: &str, port: u16) -> Result<()> {
    let app = router(handler);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    info!("🌐 Webhook server listening on http://{}:{}", host, port);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(handlers::health_check()))
}

async fn webhook_handler(State(state): State<AppState>, Json(update): Json<Update>) -> impl IntoResponse {
    (StatusCode::OK, Json(handlers::handle_webhook(&state.handler, &update).await))
}
