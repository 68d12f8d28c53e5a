//! Execution API Handlers
//!
//! HTTP endpoints for observing and cancelling executions.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use trestle_core::dto::execution::ExecutionView;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::repository::execution_repository;

/// GET /execution/{id}
/// Get execution status by ID
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ExecutionView>> {
    tracing::debug!("Getting execution: {}", id);

    let execution = execution_repository::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Execution {} not found", id)))?;

    Ok(Json(ExecutionView::from(execution)))
}

/// GET /execution/{id}/logs
/// Get the aggregated task output of an execution as plain text
pub async fn get_execution_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<String> {
    tracing::debug!("Getting logs for execution: {}", id);

    let execution = execution_repository::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Execution {} not found", id)))?;

    Ok(execution.logs.unwrap_or_default())
}

/// POST /execution/{id}/cancel
/// Request cancellation of a pending or running execution
pub async fn cancel_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Cancel requested for execution: {}", id);

    let execution = execution_repository::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Execution {} not found", id)))?;

    if execution.status.is_terminal() {
        return Err(ApiError::BadRequest(format!(
            "Execution {} is already {}",
            id,
            execution.status.as_str()
        )));
    }

    state.coordinator.cancel(id).await?;

    Ok(StatusCode::ACCEPTED)
}
