//! Execution DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::execution::{Execution, ExecutionStatus, TriggerMethod};

/// Response returned from a trigger request
///
/// Execution is asynchronous; the caller polls the execution record with
/// the returned id to observe progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub execution_id: Uuid,
    pub pipeline_name: String,
}

/// Status view for pollers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionView {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub trigger_method: TriggerMethod,
    pub status: ExecutionStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error_message: Option<String>,
}

impl From<Execution> for ExecutionView {
    fn from(e: Execution) -> Self {
        Self {
            id: e.id,
            pipeline_id: e.pipeline_id,
            trigger_method: e.trigger_method,
            status: e.status,
            started_at: e.started_at,
            completed_at: e.completed_at,
            error_message: e.error_message,
        }
    }
}
