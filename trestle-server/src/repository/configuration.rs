//! Configuration Repository
//!
//! Handles all database operations related to pipeline configurations.
//! Activation is an atomic swap inside a transaction; a partial unique
//! index guarantees at most one active configuration per pipeline.

use sqlx::PgPool;
use trestle_core::domain::configuration::{Configuration, ConfigurationSource};
use trestle_core::dto::configuration::CreateConfiguration;
use uuid::Uuid;

const CONFIGURATION_COLUMNS: &str = "id, pipeline_id, source, definition, repo_url, \
     repo_branch, definition_path, version, is_active, created_at, updated_at";

/// Insert a new configuration as the active one
///
/// Deactivates any previously active configuration of the pipeline and
/// assigns the next version number, all in one transaction.
pub async fn create_active(
    pool: &PgPool,
    pipeline_id: Uuid,
    req: CreateConfiguration,
) -> Result<Configuration, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let next_version: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(version), 0) + 1 FROM configurations WHERE pipeline_id = $1",
    )
    .bind(pipeline_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE configurations
        SET is_active = FALSE, updated_at = $1
        WHERE pipeline_id = $2 AND is_active
        "#,
    )
    .bind(chrono::Utc::now())
    .bind(pipeline_id)
    .execute(&mut *tx)
    .await?;

    let id = Uuid::new_v4();
    let now = chrono::Utc::now();

    let configuration = Configuration {
        id,
        pipeline_id,
        source: req.source,
        definition: req.definition,
        repo_url: req.repo_url,
        repo_branch: req.repo_branch,
        definition_path: req.definition_path,
        version: next_version,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO configurations (id, pipeline_id, source, definition, repo_url,
                                    repo_branch, definition_path, version, is_active,
                                    created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(configuration.id)
    .bind(configuration.pipeline_id)
    .bind(configuration.source.as_str())
    .bind(&configuration.definition)
    .bind(&configuration.repo_url)
    .bind(&configuration.repo_branch)
    .bind(&configuration.definition_path)
    .bind(configuration.version)
    .bind(configuration.is_active)
    .bind(configuration.created_at)
    .bind(configuration.updated_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(configuration)
}

/// Find a configuration by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Configuration>, sqlx::Error> {
    let row = sqlx::query_as::<_, ConfigurationRow>(&format!(
        "SELECT {CONFIGURATION_COLUMNS} FROM configurations WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Find the active configuration of a pipeline, if any
pub async fn find_active(
    pool: &PgPool,
    pipeline_id: Uuid,
) -> Result<Option<Configuration>, sqlx::Error> {
    let row = sqlx::query_as::<_, ConfigurationRow>(&format!(
        "SELECT {CONFIGURATION_COLUMNS} FROM configurations \
         WHERE pipeline_id = $1 AND is_active"
    ))
    .bind(pipeline_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List all configuration versions of a pipeline, newest first
pub async fn list_by_pipeline(
    pool: &PgPool,
    pipeline_id: Uuid,
) -> Result<Vec<Configuration>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ConfigurationRow>(&format!(
        "SELECT {CONFIGURATION_COLUMNS} FROM configurations \
         WHERE pipeline_id = $1 ORDER BY version DESC"
    ))
    .bind(pipeline_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ConfigurationRow {
    id: Uuid,
    pipeline_id: Uuid,
    source: String,
    definition: Option<String>,
    repo_url: Option<String>,
    repo_branch: String,
    definition_path: String,
    version: i32,
    is_active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ConfigurationRow> for Configuration {
    fn from(row: ConfigurationRow) -> Self {
        Configuration {
            id: row.id,
            pipeline_id: row.pipeline_id,
            source: row
                .source
                .parse()
                .unwrap_or(ConfigurationSource::Inline),
            definition: row.definition,
            repo_url: row.repo_url,
            repo_branch: row.repo_branch,
            definition_path: row.definition_path,
            version: row.version,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
