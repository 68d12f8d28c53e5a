//! Configuration resolver
//!
//! Obtains a configuration's definition text. Inline configurations
//! return their stored text directly; repo-sourced configurations do a
//! throwaway depth-limited clone into a temporary directory and read the
//! definition file out of it.
//!
//! The throwaway clone is deliberately separate from the full working
//! tree provisioned later for task execution: the definition gets
//! validated before committing to a checkout of potentially large size.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use trestle_core::domain::configuration::{Configuration, ConfigurationSource};

use crate::error::EngineError;
use crate::git;

/// Resolves the definition text for a configuration
pub async fn resolve_definition(
    configuration: &Configuration,
    git_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<String, EngineError> {
    match configuration.source {
        ConfigurationSource::Inline => configuration
            .definition
            .clone()
            .ok_or_else(|| EngineError::Internal("inline configuration has no definition text".to_string())),
        ConfigurationSource::Repo => {
            let repo_url = configuration.repo_url.as_deref().ok_or_else(|| {
                EngineError::Internal("repo configuration has no repository URL".to_string())
            })?;

            let tmp = tempfile::tempdir()
                .map_err(|e| EngineError::Internal(format!("failed to create temp dir: {e}")))?;
            let checkout = tmp.path().join("repo");

            git::clone_repository(
                repo_url,
                &configuration.repo_branch,
                &checkout,
                git_timeout,
                cancel,
            )
            .await?;

            let definition_file = checkout.join(&configuration.definition_path);
            debug!("Reading definition from {}", definition_file.display());

            match tokio::fs::read_to_string(&definition_file).await {
                Ok(text) => Ok(text),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                    EngineError::DefinitionFileMissing(configuration.definition_path.clone()),
                ),
                Err(e) => Err(EngineError::Internal(format!(
                    "failed to read definition file: {e}"
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::tests::{git_available, init_fixture_repo};
    use uuid::Uuid;

    fn inline_configuration(definition: Option<String>) -> Configuration {
        Configuration {
            id: Uuid::new_v4(),
            pipeline_id: Uuid::new_v4(),
            source: ConfigurationSource::Inline,
            definition,
            repo_url: None,
            repo_branch: "main".to_string(),
            definition_path: "pipeline.yml".to_string(),
            version: 1,
            is_active: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn repo_configuration(repo_url: String, definition_path: &str) -> Configuration {
        Configuration {
            source: ConfigurationSource::Repo,
            definition: None,
            repo_url: Some(repo_url),
            definition_path: definition_path.to_string(),
            ..inline_configuration(None)
        }
    }

    #[tokio::test]
    async fn test_inline_returns_stored_text() {
        let config = inline_configuration(Some("tasks:\n  - command: echo hi\n".to_string()));
        let text = resolve_definition(&config, Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap();
        assert!(text.contains("echo hi"));
    }

    #[tokio::test]
    async fn test_repo_source_reads_definition_file() {
        if !git_available() {
            return;
        }

        let tmp = tempfile::tempdir().unwrap();
        let origin = init_fixture_repo(
            tmp.path(),
            &[("pipeline.yml", "tasks:\n  - command: echo from-repo\n")],
        );

        let config = repo_configuration(origin.to_str().unwrap().to_string(), "pipeline.yml");
        let text = resolve_definition(&config, Duration::from_secs(60), &CancellationToken::new())
            .await
            .unwrap();
        assert!(text.contains("from-repo"));
    }

    #[tokio::test]
    async fn test_repo_source_missing_file() {
        if !git_available() {
            return;
        }

        let tmp = tempfile::tempdir().unwrap();
        let origin = init_fixture_repo(tmp.path(), &[("README.md", "no definition here\n")]);

        let config = repo_configuration(origin.to_str().unwrap().to_string(), "ci/pipeline.yml");
        let err = resolve_definition(&config, Duration::from_secs(60), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DefinitionFileMissing(path) if path == "ci/pipeline.yml"));
    }
}
