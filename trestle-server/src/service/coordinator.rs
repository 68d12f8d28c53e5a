//! Execution Coordinator
//!
//! Drives accepted executions through their whole lifecycle: admission
//! under a bounded permit pool, definition resolution, working-tree
//! provisioning, sequential task execution, and an unconditional
//! finalization step that persists the terminal status and tears down
//! everything the run touched.
//!
//! Each dispatched run owns a cancellation token registered here for as
//! long as the run is live; cancelling fires the token and the run winds
//! itself down at the next interruption point.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use trestle_core::domain::configuration::{Configuration, ConfigurationSource};
use trestle_core::domain::execution::ExecutionStatus;
use trestle_core::domain::pipeline::Pipeline;
use trestle_engine::build_log::{self, BuildLog};
use trestle_engine::config::EngineConfig;
use trestle_engine::definition::parse_definition;
use trestle_engine::error::EngineError;
use trestle_engine::git;
use trestle_engine::resolver::resolve_definition;
use trestle_engine::runner::{TaskError, TaskInvocation, TaskRunner};
use trestle_engine::workspace::{remove_workspace, run_workspace_path};
use uuid::Uuid;

use crate::repository::execution_repository;
use crate::repository::{configuration_repository, pipeline_repository};

/// Outcome of one run, ready to be persisted
struct RunOutcome {
    status: ExecutionStatus,
    logs: Option<String>,
    error_message: Option<String>,
}

/// Owns the lifecycle of every in-flight execution
pub struct ExecutionCoordinator {
    pool: PgPool,
    config: Arc<EngineConfig>,
    runner: Arc<dyn TaskRunner>,
    /// Admission control: at most `max_concurrent_runs` permits, further
    /// dispatches queue in arrival order.
    permits: Arc<Semaphore>,
    /// Cancellation tokens of live runs, keyed by execution id.
    active: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl ExecutionCoordinator {
    pub fn new(pool: PgPool, config: Arc<EngineConfig>, runner: Arc<dyn TaskRunner>) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_runs));
        Self {
            pool,
            config,
            runner,
            permits,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Hands a pending execution to the worker pool
    ///
    /// Returns immediately; the run executes on a background task once a
    /// permit is available.
    pub async fn dispatch(self: &Arc<Self>, execution_id: Uuid) {
        let token = CancellationToken::new();
        self.active.lock().await.insert(execution_id, token.clone());

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.run(execution_id, token).await;
        });
    }

    /// Requests cancellation of an execution
    ///
    /// Live runs are interrupted through their token; executions still
    /// queued from before a restart are cancelled directly in the
    /// database. Returns whether anything was cancelled.
    pub async fn cancel(&self, execution_id: Uuid) -> Result<bool, sqlx::Error> {
        if let Some(token) = self.active.lock().await.get(&execution_id) {
            token.cancel();
            tracing::info!("Cancellation requested for execution {}", execution_id);
            return Ok(true);
        }

        execution_repository::cancel_pending(&self.pool, execution_id).await
    }

    async fn run(self: Arc<Self>, execution_id: Uuid, cancel: CancellationToken) {
        // Queue for admission. The semaphore is never closed, so a failed
        // acquire means the process is shutting down.
        let Ok(_permit) = Arc::clone(&self.permits).acquire_owned().await else {
            self.deregister(execution_id).await;
            return;
        };

        self.run_admitted(execution_id, &cancel).await;
        self.deregister(execution_id).await;
    }

    async fn run_admitted(&self, execution_id: Uuid, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            // Cancelled while waiting for a permit.
            if let Err(e) =
                execution_repository::cancel_pending(&self.pool, execution_id).await
            {
                tracing::error!("Failed to cancel queued execution {}: {}", execution_id, e);
            }
            return;
        }

        let context = match self.load_context(execution_id).await {
            Ok(Some(context)) => context,
            Ok(None) => return,
            Err(message) => {
                self.finalize_failed(execution_id, message).await;
                return;
            }
        };
        let (pipeline, configuration) = context;

        match execution_repository::update_status_to_running(&self.pool, execution_id).await {
            Ok(true) => {}
            // Lost the race with a cancellation; the record is already
            // terminal.
            Ok(false) => return,
            Err(e) => {
                tracing::error!("Failed to start execution {}: {}", execution_id, e);
                return;
            }
        }

        let mut log = match BuildLog::create(
            &self.config.build_logs_dir,
            &pipeline.name,
            execution_id,
        ) {
            Ok(log) => log,
            Err(e) => {
                self.finalize_failed(execution_id, format!("failed to open build log: {e}"))
                    .await;
                return;
            }
        };

        tracing::info!(
            "Execution {} started for pipeline {} ({} mode)",
            execution_id,
            pipeline.name,
            self.runner.mode()
        );

        let outcome = self
            .run_pipeline(&pipeline, &configuration, execution_id, &mut log, cancel)
            .await;

        self.finalize(execution_id, &pipeline, outcome, log).await;
    }

    /// Loads the pipeline and configuration backing an execution
    ///
    /// `Ok(None)` means the execution should be silently skipped (gone or
    /// already picked up); `Err` carries the failure to record.
    async fn load_context(
        &self,
        execution_id: Uuid,
    ) -> Result<Option<(Pipeline, Configuration)>, String> {
        let execution = match execution_repository::find_by_id(&self.pool, execution_id).await {
            Ok(Some(execution)) => execution,
            Ok(None) => {
                tracing::warn!("Dispatched execution {} no longer exists", execution_id);
                return Ok(None);
            }
            Err(e) => {
                tracing::error!("Failed to load execution {}: {}", execution_id, e);
                return Ok(None);
            }
        };

        if execution.status != ExecutionStatus::Pending {
            return Ok(None);
        }

        let pipeline = pipeline_repository::find_by_id(&self.pool, execution.pipeline_id)
            .await
            .map_err(|e| format!("failed to load pipeline: {e}"))?
            .ok_or_else(|| format!("pipeline {} no longer exists", execution.pipeline_id))?;

        let configuration =
            configuration_repository::find_by_id(&self.pool, execution.configuration_id)
                .await
                .map_err(|e| format!("failed to load configuration: {e}"))?
                .ok_or_else(|| {
                    format!("configuration {} no longer exists", execution.configuration_id)
                })?;

        Ok(Some((pipeline, configuration)))
    }

    /// Executes the pipeline's tasks, collecting their ordered output
    ///
    /// Never returns early without an outcome: every failure mode maps to
    /// a terminal status with whatever partial logs were accumulated.
    async fn run_pipeline(
        &self,
        pipeline: &Pipeline,
        configuration: &Configuration,
        execution_id: Uuid,
        log: &mut BuildLog,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        log.info("=== PIPELINE EXECUTION START ===");
        log.info(&format!(
            "Pipeline: {} (configuration v{})",
            pipeline.name, configuration.version
        ));

        let definition =
            match resolve_definition(configuration, self.config.git_timeout, cancel).await {
                Ok(text) => text,
                Err(e) => return self.outcome_for_setup_error(e, log, Vec::new()),
            };

        let spec = match parse_definition(&definition, &self.config.default_image) {
            Ok(spec) => spec,
            Err(e) => return self.outcome_for_setup_error(e.into(), log, Vec::new()),
        };

        // Repo-sourced pipelines get a full working tree; inline ones run
        // without a checkout.
        let worktree = match configuration.source {
            ConfigurationSource::Inline => None,
            ConfigurationSource::Repo => {
                let path = run_workspace_path(
                    &self.config.workspace_dir,
                    &pipeline.name,
                    execution_id,
                );
                let repo_url = configuration.repo_url.as_deref().unwrap_or_default();
                log.info(&format!(
                    "Cloning {} (branch {})",
                    repo_url, configuration.repo_branch
                ));

                if let Err(e) = git::clone_repository(
                    repo_url,
                    &configuration.repo_branch,
                    &path,
                    self.config.git_timeout,
                    cancel,
                )
                .await
                {
                    return self.outcome_for_setup_error(e, log, Vec::new());
                }
                Some(path)
            }
        };

        let mut sections: Vec<String> = Vec::with_capacity(spec.tasks.len());

        for (index, task) in spec.tasks.iter().enumerate() {
            let position = index + 1;
            let name = task.display_name();
            log.info(&format!("Starting task {position}: {name}"));

            let invocation = TaskInvocation {
                pipeline_id: pipeline.id,
                execution_id,
                task_name: name.to_string(),
                command: task.command.clone(),
                image: spec.env_image.clone(),
                env: spec.variables.clone(),
                worktree: worktree.clone(),
            };

            match self.runner.run(&invocation, cancel).await {
                Ok(output) => {
                    log.info(&format!("Task {position} ({name}) succeeded"));
                    sections.push(task_section(position, name, &output));
                }
                Err(TaskError::Cancelled { .. }) => {
                    log.warn(&format!("Task {position} ({name}) cancelled"));
                    return RunOutcome {
                        status: ExecutionStatus::Cancelled,
                        logs: assemble_logs(sections),
                        error_message: Some("execution cancelled".to_string()),
                    };
                }
                Err(TaskError::NonZeroExit { code, output, .. }) => {
                    log.error(&format!("Task {position} ({name}) failed with exit code {code}"));
                    sections.push(task_section(position, name, &output));
                    return RunOutcome {
                        status: ExecutionStatus::Failed,
                        logs: assemble_logs(sections),
                        error_message: Some(task_failure_message(position, name, code)),
                    };
                }
                Err(e) => {
                    log.error(&format!("Task {position} ({name}) failed: {e}"));
                    return RunOutcome {
                        status: ExecutionStatus::Failed,
                        logs: assemble_logs(sections),
                        error_message: Some(e.to_string()),
                    };
                }
            }
        }

        RunOutcome {
            status: ExecutionStatus::Success,
            logs: assemble_logs(sections),
            error_message: None,
        }
    }

    /// Maps a pre-task failure (resolution, parsing, clone) to an outcome
    fn outcome_for_setup_error(
        &self,
        error: EngineError,
        log: &mut BuildLog,
        sections: Vec<String>,
    ) -> RunOutcome {
        let cancelled = matches!(
            error,
            EngineError::Cancelled | EngineError::Task(TaskError::Cancelled { .. })
        );

        if cancelled {
            log.warn("Execution cancelled during setup");
            RunOutcome {
                status: ExecutionStatus::Cancelled,
                logs: assemble_logs(sections),
                error_message: Some("execution cancelled".to_string()),
            }
        } else {
            log.error(&format!("Setup failed: {error}"));
            RunOutcome {
                status: ExecutionStatus::Failed,
                logs: assemble_logs(sections),
                error_message: Some(error.to_string()),
            }
        }
    }

    /// The unconditional teardown step of every admitted run
    async fn finalize(
        &self,
        execution_id: Uuid,
        pipeline: &Pipeline,
        outcome: RunOutcome,
        mut log: BuildLog,
    ) {
        let banner = match outcome.status {
            ExecutionStatus::Success => "=== PIPELINE EXECUTION SUCCESS ===",
            ExecutionStatus::Cancelled => "=== PIPELINE EXECUTION CANCELLED ===",
            _ => "=== PIPELINE EXECUTION FAILED ===",
        };
        log.info(banner);
        log.close();

        if let Err(e) = execution_repository::finalize(
            &self.pool,
            execution_id,
            outcome.status,
            outcome.logs,
            outcome.error_message,
        )
        .await
        {
            tracing::error!("Failed to finalize execution {}: {}", execution_id, e);
        }

        let worktree = run_workspace_path(&self.config.workspace_dir, &pipeline.name, execution_id);
        if let Err(e) = remove_workspace(&worktree).await {
            tracing::warn!("Failed to remove workspace {}: {}", worktree.display(), e);
        }

        if self.config.cleanup_old_logs {
            match build_log::prune_old_logs(&self.config.build_logs_dir, self.config.max_build_history)
            {
                Ok(0) => {}
                Ok(removed) => tracing::debug!("Pruned {} old build logs", removed),
                Err(e) => tracing::warn!("Failed to prune build logs: {}", e),
            }
        }

        tracing::info!(
            "Execution {} finished with status {}",
            execution_id,
            outcome.status.as_str()
        );
    }

    async fn finalize_failed(&self, execution_id: Uuid, message: String) {
        tracing::error!("Execution {} failed before start: {}", execution_id, message);
        if let Err(e) = execution_repository::finalize(
            &self.pool,
            execution_id,
            ExecutionStatus::Failed,
            None,
            Some(message),
        )
        .await
        {
            tracing::error!("Failed to finalize execution {}: {}", execution_id, e);
        }
    }

    async fn deregister(&self, execution_id: Uuid) {
        self.active.lock().await.remove(&execution_id);
    }
}

// =============================================================================
// Log Assembly
// =============================================================================

fn task_section(position: usize, name: &str, output: &str) -> String {
    format!("=== Task {position}: {name} ===\n{output}\n")
}

/// Failure message for a non-zero task exit
///
/// Carries the 1-based position so the failing task stays identifiable
/// even when several tasks share the unnamed fallback.
fn task_failure_message(position: usize, name: &str, code: i32) -> String {
    format!("task {position} ('{name}') failed with exit code {code}")
}

fn assemble_logs(sections: Vec<String>) -> Option<String> {
    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n"))
    }
}
