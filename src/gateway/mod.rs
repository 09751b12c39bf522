//! HTTP gateway exposing the response pipeline as `POST /chat`.
//!
//! The server is stateless with respect to conversations: every request
//! carries its own history, and nothing is persisted between requests.

pub mod api;

use crate::agent::ResponsePipeline;
use crate::config::Config;
use crate::providers::{self, Provider};
use crate::resources::ResourceSet;
use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum accepted request body size (64 KiB).
pub const MAX_BODY_SIZE: usize = 65_536;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ResponsePipeline>,
    pub provider: String,
    pub model: String,
}

impl AppState {
    pub fn new(pipeline: Arc<ResponsePipeline>) -> Self {
        let provider = pipeline.provider().name().to_string();
        let model = pipeline.provider().model().to_string();
        Self {
            pipeline,
            provider,
            model,
        }
    }
}

/// Assemble the router with body-size and request-timeout limits.
#[allow(deprecated)]
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/chat", post(api::handle_chat))
        .route("/health", get(api::handle_health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

/// Build the pipeline from `config` and serve it until Ctrl-C.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    let resources = Arc::new(ResourceSet::load(&config.resources_path())?);
    let provider: Arc<dyn Provider> = Arc::from(providers::create_provider_from_config(&config)?);
    if let Some(var) = provider.missing_credential() {
        tracing::warn!(
            credential = var,
            "No LLM credential configured; /chat will answer 400 until it is set"
        );
    }

    let pipeline = Arc::new(ResponsePipeline::new(provider, resources));
    let state = AppState::new(pipeline);
    let app = build_router(
        state,
        Duration::from_secs(config.gateway.request_timeout_secs),
    );

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind gateway to {addr}"))?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        address = %local_addr,
        provider = %config.default_provider,
        model = %config.default_model,
        "Gateway listening"
    );
    println!("Kairos gateway listening on http://{local_addr}");
    println!("  POST /chat    {{\"message\": \"...\", \"history\": [...]}}");
    println!("  GET  /health");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("Gateway server terminated unexpectedly")?;

    Ok(())
}
