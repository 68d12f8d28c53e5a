//! Pipeline Repository
//!
//! Handles all database operations related to pipelines.

use sqlx::PgPool;
use trestle_core::domain::pipeline::Pipeline;
use uuid::Uuid;

const PIPELINE_COLUMNS: &str = "id, owner_id, name, description, trigger_token, \
     webhook_secret, is_active, created_at, updated_at";

/// Insert a new pipeline
///
/// The caller is responsible for supplying a freshly generated trigger
/// token; a unique-violation on it surfaces as `sqlx::Error` so the
/// service layer can regenerate and retry.
pub async fn create(pool: &PgPool, pipeline: &Pipeline) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pipelines (id, owner_id, name, description, trigger_token,
                               webhook_secret, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(pipeline.id)
    .bind(pipeline.owner_id)
    .bind(&pipeline.name)
    .bind(&pipeline.description)
    .bind(&pipeline.trigger_token)
    .bind(&pipeline.webhook_secret)
    .bind(pipeline.is_active)
    .bind(pipeline.created_at)
    .bind(pipeline.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Find a pipeline by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Pipeline>, sqlx::Error> {
    let row = sqlx::query_as::<_, PipelineRow>(&format!(
        "SELECT {PIPELINE_COLUMNS} FROM pipelines WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Find a pipeline by its trigger token
pub async fn find_by_trigger_token(
    pool: &PgPool,
    token: &str,
) -> Result<Option<Pipeline>, sqlx::Error> {
    let row = sqlx::query_as::<_, PipelineRow>(&format!(
        "SELECT {PIPELINE_COLUMNS} FROM pipelines WHERE trigger_token = $1"
    ))
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List all pipelines, newest first
pub async fn list_all(pool: &PgPool) -> Result<Vec<Pipeline>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PipelineRow>(&format!(
        "SELECT {PIPELINE_COLUMNS} FROM pipelines ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Flip the soft-deactivation flag
pub async fn set_active(pool: &PgPool, id: Uuid, is_active: bool) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE pipelines
        SET is_active = $1, updated_at = $2
        WHERE id = $3
        "#,
    )
    .bind(is_active)
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a pipeline by ID (cascades to configurations and executions)
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM pipelines WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    description: Option<String>,
    trigger_token: String,
    webhook_secret: Option<String>,
    is_active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<PipelineRow> for Pipeline {
    fn from(row: PipelineRow) -> Self {
        Pipeline {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            description: row.description,
            trigger_token: row.trigger_token,
            webhook_secret: row.webhook_secret,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
