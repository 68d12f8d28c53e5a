//! Webhook API Handler
//!
//! Token-addressed trigger endpoint for source hosting services.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use trestle_core::dto::execution::TriggerResponse;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::trigger_service;
use crate::service::trigger_service::WebhookRequest;

/// POST /webhook/{token}
/// Accept a webhook trigger, verify its signature and queue a run
///
/// Responds 202 as soon as the execution record exists; delivery
/// services time out quickly and must not wait on the run itself.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<TriggerResponse>)> {
    let request = WebhookRequest {
        signature_sha256: header_str(&headers, "x-hub-signature-256"),
        signature_sha1: header_str(&headers, "x-hub-signature"),
        event: header_str(&headers, "x-github-event"),
        delivery: header_str(&headers, "x-github-delivery"),
        body: &body,
    };

    let (pipeline, execution) =
        trigger_service::trigger_by_token(&state.pool, &state.config, &token, request).await?;

    state.coordinator.dispatch(execution.id).await;

    let response = TriggerResponse {
        execution_id: execution.id,
        pipeline_name: pipeline.name,
    };

    Ok((StatusCode::ACCEPTED, Json(response)))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
