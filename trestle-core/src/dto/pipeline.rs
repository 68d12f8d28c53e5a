//! Pipeline DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pipeline::Pipeline;

/// Request to register a new pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePipeline {
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Optional shared secret for webhook signature verification.
    pub webhook_secret: Option<String>,
}

/// Compact pipeline view for list responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Pipeline> for PipelineSummary {
    fn from(p: Pipeline) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            is_active: p.is_active,
            created_at: p.created_at,
        }
    }
}
