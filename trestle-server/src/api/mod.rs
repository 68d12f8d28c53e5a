//! API Module
//!
//! HTTP API layer for the server.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod execution;
pub mod health;
pub mod pipeline;
pub mod webhook;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use trestle_engine::config::EngineConfig;

use crate::service::coordinator::ExecutionCoordinator;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub coordinator: Arc<ExecutionCoordinator>,
    pub config: Arc<EngineConfig>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Pipeline endpoints
        .route("/pipeline/create", post(pipeline::create_pipeline))
        .route("/pipeline/list", get(pipeline::list_pipelines))
        .route("/pipeline/{id}", get(pipeline::get_pipeline))
        .route("/pipeline/{id}", delete(pipeline::delete_pipeline))
        .route(
            "/pipeline/{id}/deactivate",
            post(pipeline::deactivate_pipeline),
        )
        .route(
            "/pipeline/{id}/configuration",
            post(pipeline::attach_configuration),
        )
        .route(
            "/pipeline/{id}/configuration",
            get(pipeline::get_active_configuration),
        )
        .route("/pipeline/{id}/executions", get(pipeline::list_executions))
        .route("/pipeline/{id}/trigger", post(pipeline::trigger_pipeline))
        // Webhook endpoint
        .route("/webhook/{token}", post(webhook::receive_webhook))
        // Execution endpoints
        .route("/execution/{id}", get(execution::get_execution))
        .route("/execution/{id}/logs", get(execution::get_execution_logs))
        .route("/execution/{id}/cancel", post(execution::cancel_execution))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
