//! Pipeline API Handlers
//!
//! HTTP endpoints for pipeline registration, configuration management
//! and manual triggering.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use trestle_core::domain::configuration::Configuration;
use trestle_core::domain::pipeline::Pipeline;
use trestle_core::dto::configuration::CreateConfiguration;
use trestle_core::dto::execution::{ExecutionView, TriggerResponse};
use trestle_core::dto::pipeline::{CreatePipeline, PipelineSummary};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::{pipeline_service, trigger_service};

/// POST /pipeline/create
/// Register a new pipeline and return it with its trigger token
pub async fn create_pipeline(
    State(state): State<AppState>,
    Json(req): Json<CreatePipeline>,
) -> ApiResult<(StatusCode, Json<CreatePipelineResponse>)> {
    tracing::info!("Creating pipeline: {}", req.name);

    let pipeline = pipeline_service::create_pipeline(&state.pool, req).await?;

    // The trigger token is returned once, at creation time; it is never
    // serialized with the pipeline afterward.
    let trigger_token = pipeline.trigger_token.clone();
    let response = CreatePipelineResponse {
        pipeline,
        trigger_token,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /pipeline/list
/// List all pipelines
pub async fn list_pipelines(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PipelineSummary>>> {
    tracing::debug!("Listing pipelines");

    let pipelines = pipeline_service::list_pipelines(&state.pool).await?;
    let summaries = pipelines.into_iter().map(PipelineSummary::from).collect();

    Ok(Json(summaries))
}

/// GET /pipeline/{id}
/// Get pipeline details by ID
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Pipeline>> {
    tracing::debug!("Getting pipeline: {}", id);

    let pipeline = pipeline_service::get_pipeline(&state.pool, id).await?;
    Ok(Json(pipeline))
}

/// POST /pipeline/{id}/deactivate
/// Soft-deactivate a pipeline so it stops accepting triggers
pub async fn deactivate_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deactivating pipeline: {}", id);

    pipeline_service::deactivate_pipeline(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /pipeline/{id}
/// Delete a pipeline and its configurations and executions
pub async fn delete_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting pipeline: {}", id);

    pipeline_service::delete_pipeline(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /pipeline/{id}/configuration
/// Attach a new configuration version and activate it
pub async fn attach_configuration(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateConfiguration>,
) -> ApiResult<(StatusCode, Json<Configuration>)> {
    tracing::info!("Attaching configuration to pipeline: {}", id);

    let configuration = pipeline_service::attach_configuration(&state.pool, id, req).await?;
    Ok((StatusCode::CREATED, Json(configuration)))
}

/// GET /pipeline/{id}/configuration
/// Get the active configuration of a pipeline
pub async fn get_active_configuration(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Option<Configuration>>> {
    tracing::debug!("Getting active configuration for pipeline: {}", id);

    let configuration = pipeline_service::get_active_configuration(&state.pool, id).await?;
    Ok(Json(configuration))
}

/// GET /pipeline/{id}/executions
/// List executions of a pipeline, newest first
pub async fn list_executions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ExecutionView>>> {
    tracing::debug!("Listing executions for pipeline: {}", id);

    let executions = pipeline_service::list_executions(&state.pool, id).await?;
    let views = executions.into_iter().map(ExecutionView::from).collect();

    Ok(Json(views))
}

/// POST /pipeline/{id}/trigger
/// Manually trigger a pipeline's active configuration
pub async fn trigger_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ManualTriggerRequest>,
) -> ApiResult<(StatusCode, Json<TriggerResponse>)> {
    tracing::info!("Manual trigger for pipeline: {}", id);

    let (pipeline, execution) =
        trigger_service::trigger_manual(&state.pool, id, req.triggered_by).await?;

    state.coordinator.dispatch(execution.id).await;

    let response = TriggerResponse {
        execution_id: execution.id,
        pipeline_name: pipeline.name,
    };

    Ok((StatusCode::ACCEPTED, Json(response)))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ManualTriggerRequest {
    /// User requesting the run, recorded on the execution.
    pub triggered_by: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CreatePipelineResponse {
    #[serde(flatten)]
    pub pipeline: Pipeline,
    pub trigger_token: String,
}
