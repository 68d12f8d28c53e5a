//! Health Check Endpoint

use axum::Json;

/// GET /health
/// Liveness probe
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
