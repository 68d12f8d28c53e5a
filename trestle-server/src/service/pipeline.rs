//! Pipeline Service
//!
//! Business logic for pipeline registration and configuration
//! management.

use sqlx::PgPool;
use trestle_core::domain::configuration::{Configuration, ConfigurationSource};
use trestle_core::domain::execution::Execution;
use trestle_core::domain::pipeline::Pipeline;
use trestle_core::dto::configuration::CreateConfiguration;
use trestle_core::dto::pipeline::CreatePipeline;
use uuid::Uuid;

use crate::repository::{configuration_repository, execution_repository, pipeline_repository};
use crate::service::token;

/// How many times to regenerate a trigger token that collides with an
/// existing one before giving up.
const TOKEN_RETRY_LIMIT: usize = 5;

/// Service error type
#[derive(Debug)]
pub enum PipelineError {
    NotFound(Uuid),
    ValidationError(String),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::DatabaseError(err)
    }
}

/// Register a new pipeline with a freshly generated trigger token
pub async fn create_pipeline(pool: &PgPool, req: CreatePipeline) -> Result<Pipeline, PipelineError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(PipelineError::ValidationError(
            "Pipeline name cannot be empty".to_string(),
        ));
    }
    if name.len() > 100 {
        return Err(PipelineError::ValidationError(
            "Pipeline name cannot exceed 100 characters".to_string(),
        ));
    }

    // A collision on the random token is vanishingly rare but the unique
    // constraint makes it observable, so regenerate and retry.
    let mut attempt = 0;
    loop {
        attempt += 1;
        let now = chrono::Utc::now();
        let pipeline = Pipeline {
            id: Uuid::new_v4(),
            owner_id: req.owner_id,
            name: name.to_string(),
            description: req.description.clone(),
            trigger_token: token::generate_trigger_token(),
            webhook_secret: req.webhook_secret.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        match pipeline_repository::create(pool, &pipeline).await {
            Ok(()) => {
                tracing::info!("Pipeline created: {} ({})", pipeline.name, pipeline.id);
                return Ok(pipeline);
            }
            Err(e) if attempt < TOKEN_RETRY_LIMIT && is_unique_violation(&e) => {
                tracing::warn!("Trigger token collision, regenerating");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Get a pipeline by ID
pub async fn get_pipeline(pool: &PgPool, id: Uuid) -> Result<Pipeline, PipelineError> {
    let pipeline = pipeline_repository::find_by_id(pool, id)
        .await?
        .ok_or(PipelineError::NotFound(id))?;

    Ok(pipeline)
}

/// List all pipelines
pub async fn list_pipelines(pool: &PgPool) -> Result<Vec<Pipeline>, PipelineError> {
    let pipelines = pipeline_repository::list_all(pool).await?;
    Ok(pipelines)
}

/// Attach a new configuration version to a pipeline and activate it
pub async fn attach_configuration(
    pool: &PgPool,
    pipeline_id: Uuid,
    req: CreateConfiguration,
) -> Result<Configuration, PipelineError> {
    // Verify pipeline exists
    let _pipeline = pipeline_repository::find_by_id(pool, pipeline_id)
        .await?
        .ok_or(PipelineError::NotFound(pipeline_id))?;

    validate_configuration(&req)?;

    let configuration = configuration_repository::create_active(pool, pipeline_id, req).await?;

    tracing::info!(
        "Configuration v{} activated for pipeline {}",
        configuration.version,
        pipeline_id
    );

    Ok(configuration)
}

/// Get the active configuration of a pipeline
pub async fn get_active_configuration(
    pool: &PgPool,
    pipeline_id: Uuid,
) -> Result<Option<Configuration>, PipelineError> {
    // Verify pipeline exists
    let _pipeline = pipeline_repository::find_by_id(pool, pipeline_id)
        .await?
        .ok_or(PipelineError::NotFound(pipeline_id))?;

    let configuration = configuration_repository::find_active(pool, pipeline_id).await?;
    Ok(configuration)
}

/// List executions of a pipeline
pub async fn list_executions(
    pool: &PgPool,
    pipeline_id: Uuid,
) -> Result<Vec<Execution>, PipelineError> {
    // Verify pipeline exists
    let _pipeline = pipeline_repository::find_by_id(pool, pipeline_id)
        .await?
        .ok_or(PipelineError::NotFound(pipeline_id))?;

    let executions = execution_repository::list_by_pipeline(pool, pipeline_id).await?;
    Ok(executions)
}

/// Soft-deactivate a pipeline so it stops accepting triggers
pub async fn deactivate_pipeline(pool: &PgPool, id: Uuid) -> Result<(), PipelineError> {
    let updated = pipeline_repository::set_active(pool, id, false).await?;
    if !updated {
        return Err(PipelineError::NotFound(id));
    }

    tracing::info!("Pipeline {} deactivated", id);
    Ok(())
}

/// Delete a pipeline and everything attached to it
pub async fn delete_pipeline(pool: &PgPool, id: Uuid) -> Result<(), PipelineError> {
    let deleted = pipeline_repository::delete(pool, id).await?;
    if !deleted {
        return Err(PipelineError::NotFound(id));
    }

    tracing::info!("Pipeline {} deleted", id);
    Ok(())
}

// =============================================================================
// Validation
// =============================================================================

fn validate_configuration(req: &CreateConfiguration) -> Result<(), PipelineError> {
    match req.source {
        ConfigurationSource::Inline => {
            if req.definition.as_deref().unwrap_or("").trim().is_empty() {
                return Err(PipelineError::ValidationError(
                    "Inline configurations require a non-empty definition".to_string(),
                ));
            }
        }
        ConfigurationSource::Repo => {
            if req.repo_url.as_deref().unwrap_or("").trim().is_empty() {
                return Err(PipelineError::ValidationError(
                    "Repo configurations require a repository URL".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline_request(definition: Option<&str>) -> CreateConfiguration {
        CreateConfiguration {
            source: ConfigurationSource::Inline,
            definition: definition.map(|s| s.to_string()),
            repo_url: None,
            repo_branch: "main".to_string(),
            definition_path: "pipeline.yml".to_string(),
        }
    }

    #[test]
    fn test_inline_configuration_requires_definition() {
        assert!(validate_configuration(&inline_request(None)).is_err());
        assert!(validate_configuration(&inline_request(Some("   "))).is_err());
        assert!(validate_configuration(&inline_request(Some("tasks:\n  - command: make"))).is_ok());
    }

    #[test]
    fn test_repo_configuration_requires_url() {
        let mut req = inline_request(None);
        req.source = ConfigurationSource::Repo;
        assert!(validate_configuration(&req).is_err());

        req.repo_url = Some("https://example.com/app.git".to_string());
        assert!(validate_configuration(&req).is_ok());
    }
}
