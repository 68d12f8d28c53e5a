//! Pipeline domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered pipeline
///
/// Owns zero-or-more configurations and executions. The trigger token is
/// the unguessable credential embedded in the pipeline's webhook URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// 32-character random alphanumeric credential, unique across
    /// pipelines. Returned once at creation time, never serialized with
    /// the pipeline afterward.
    #[serde(skip_serializing)]
    pub trigger_token: String,
    /// Shared secret for webhook signature verification. A pipeline without
    /// a secret only accepts unsigned triggers when the server explicitly
    /// runs in open mode.
    #[serde(skip_serializing)]
    pub webhook_secret: Option<String>,
    /// Soft deactivation flag; inactive pipelines reject all triggers.
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
