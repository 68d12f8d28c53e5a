//! Execution Repository
//!
//! Handles all database operations related to executions. Status writes
//! follow the linear lifecycle: a pending record is created at trigger
//! time, moved to running when picked up, and finalized exactly once.

use sqlx::PgPool;
use trestle_core::domain::execution::{Execution, ExecutionStatus, TriggerMethod};
use uuid::Uuid;

const EXECUTION_COLUMNS: &str = "id, pipeline_id, configuration_id, triggered_by, \
     trigger_method, status, started_at, completed_at, logs, error_message, metadata";

/// Insert a new pending execution
pub async fn create_pending(
    pool: &PgPool,
    pipeline_id: Uuid,
    configuration_id: Uuid,
    triggered_by: Option<Uuid>,
    trigger_method: TriggerMethod,
    metadata: serde_json::Value,
) -> Result<Execution, sqlx::Error> {
    let execution = Execution {
        id: Uuid::new_v4(),
        pipeline_id,
        configuration_id,
        triggered_by,
        trigger_method,
        status: ExecutionStatus::Pending,
        started_at: None,
        completed_at: None,
        logs: None,
        error_message: None,
        metadata,
    };

    sqlx::query(
        r#"
        INSERT INTO executions (id, pipeline_id, configuration_id, triggered_by,
                                trigger_method, status, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(execution.id)
    .bind(execution.pipeline_id)
    .bind(execution.configuration_id)
    .bind(execution.triggered_by)
    .bind(execution.trigger_method.as_str())
    .bind(execution.status.as_str())
    .bind(&execution.metadata)
    .execute(pool)
    .await?;

    Ok(execution)
}

/// Find an execution by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Execution>, sqlx::Error> {
    let row = sqlx::query_as::<_, ExecutionRow>(&format!(
        "SELECT {EXECUTION_COLUMNS} FROM executions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List executions of a pipeline, newest first
pub async fn list_by_pipeline(
    pool: &PgPool,
    pipeline_id: Uuid,
) -> Result<Vec<Execution>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ExecutionRow>(&format!(
        "SELECT {EXECUTION_COLUMNS} FROM executions \
         WHERE pipeline_id = $1 ORDER BY started_at DESC NULLS FIRST"
    ))
    .bind(pipeline_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Move a pending execution to running and stamp its start time
///
/// Guarded on the current status so a cancelled-while-queued execution
/// is never resurrected; returns whether the transition happened.
pub async fn update_status_to_running(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE executions
        SET status = $1, started_at = $2
        WHERE id = $3 AND status = $4
        "#,
    )
    .bind(ExecutionStatus::Running.as_str())
    .bind(chrono::Utc::now())
    .bind(id)
    .bind(ExecutionStatus::Pending.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Cancel an execution that has not started yet
///
/// Guarded on pending status; returns whether the row was cancelled.
pub async fn cancel_pending(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE executions
        SET status = $1, completed_at = $2
        WHERE id = $3 AND status = $4
        "#,
    )
    .bind(ExecutionStatus::Cancelled.as_str())
    .bind(chrono::Utc::now())
    .bind(id)
    .bind(ExecutionStatus::Pending.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Finalize an execution with its terminal status, logs and error
pub async fn finalize(
    pool: &PgPool,
    id: Uuid,
    status: ExecutionStatus,
    logs: Option<String>,
    error_message: Option<String>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE executions
        SET status = $1, completed_at = $2, logs = $3, error_message = $4
        WHERE id = $5
        "#,
    )
    .bind(status.as_str())
    .bind(chrono::Utc::now())
    .bind(logs)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

// =============================================================================
// Helper Functions
// =============================================================================

fn string_to_status(s: &str) -> ExecutionStatus {
    match s {
        "pending" => ExecutionStatus::Pending,
        "running" => ExecutionStatus::Running,
        "success" => ExecutionStatus::Success,
        "failed" => ExecutionStatus::Failed,
        "cancelled" => ExecutionStatus::Cancelled,
        _ => ExecutionStatus::Pending,
    }
}

fn string_to_trigger_method(s: &str) -> TriggerMethod {
    match s {
        "webhook" => TriggerMethod::Webhook,
        _ => TriggerMethod::Manual,
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ExecutionRow {
    id: Uuid,
    pipeline_id: Uuid,
    configuration_id: Uuid,
    triggered_by: Option<Uuid>,
    trigger_method: String,
    status: String,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
    logs: Option<String>,
    error_message: Option<String>,
    metadata: serde_json::Value,
}

impl From<ExecutionRow> for Execution {
    fn from(row: ExecutionRow) -> Self {
        Execution {
            id: row.id,
            pipeline_id: row.pipeline_id,
            configuration_id: row.configuration_id,
            triggered_by: row.triggered_by,
            trigger_method: string_to_trigger_method(&row.trigger_method),
            status: string_to_status(&row.status),
            started_at: row.started_at,
            completed_at: row.completed_at,
            logs: row.logs,
            error_message: row.error_message,
            metadata: row.metadata,
        }
    }
}
