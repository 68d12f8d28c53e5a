//! Task execution
//!
//! One task is one command run in a fresh, isolated execution context:
//! an ephemeral container in container mode, or a direct host process in
//! degraded local mode. No state persists from one task to the next
//! except what is visible through the shared mounted working tree.
//!
//! The mode is a capability decided ONCE at engine startup
//! ([`detect_runner`]), not a branch taken per task.

mod container;
mod local;

pub use container::ContainerRunner;
pub use local::LocalRunner;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;

/// Everything the runner needs to execute one task
#[derive(Debug, Clone)]
pub struct TaskInvocation {
    pub pipeline_id: Uuid,
    pub execution_id: Uuid,
    /// Display name of the task, used in logs and reserved variables.
    pub task_name: String,
    pub command: String,
    /// Container image; ignored in degraded local mode.
    pub image: String,
    /// Merged environment variables from the definition.
    pub env: HashMap<String, String>,
    /// Working tree to mount (container) or run in (local), if any.
    pub worktree: Option<PathBuf>,
}

/// Why a task failed to produce a successful exit
#[derive(Debug, Error)]
pub enum TaskError {
    /// The command ran and exited non-zero. Carries the combined output
    /// so partial logs survive the failure.
    #[error("task '{task}' failed with exit code {code}")]
    NonZeroExit {
        task: String,
        code: i32,
        output: String,
    },

    /// The container image could not be resolved or pulled.
    #[error("image '{image}' could not be resolved: {detail}")]
    ImageUnresolvable { image: String, detail: String },

    /// The container runtime (or process spawn) itself failed.
    #[error("runtime failure: {0}")]
    Runtime(String),

    /// The task exceeded its wall-clock budget.
    #[error("task '{task}' timed out after {seconds} seconds")]
    TimedOut { task: String, seconds: u64 },

    /// The run was cancelled while this task was in flight.
    #[error("task '{task}' was cancelled")]
    Cancelled { task: String },
}

/// Executes tasks in whichever isolation the engine was started with
///
/// Implementations run the command to completion, capture combined
/// stdout/stderr, and guarantee their execution context is torn down
/// afterward regardless of outcome.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Human-readable mode label for logs ("container" or "local").
    fn mode(&self) -> &'static str;

    /// Runs one task to completion, returning its combined output.
    async fn run(
        &self,
        invocation: &TaskInvocation,
        cancel: &CancellationToken,
    ) -> Result<String, TaskError>;
}

/// Selects the execution mode once, at startup
///
/// Container mode requires the runtime to be reachable AND enabled in
/// configuration; otherwise the engine degrades to local host execution
/// for the remainder of its lifetime.
pub fn detect_runner(config: &EngineConfig) -> Arc<dyn TaskRunner> {
    if config.container_enabled {
        match container::check_podman_available() {
            Ok(version) => {
                info!("Container runtime available: {}", version);
                return Arc::new(ContainerRunner::new(config.task_timeout));
            }
            Err(e) => {
                warn!("Container runtime unavailable: {:#}", e);
            }
        }
    } else {
        info!("Container execution disabled by configuration");
    }

    warn!("Degraded mode: tasks will run directly on the host with reduced isolation");
    Arc::new(LocalRunner::new(config.task_timeout))
}

/// Engine-reserved variables identifying the run context
pub(crate) fn reserved_env(invocation: &TaskInvocation) -> [(String, String); 3] {
    [
        (
            "TRESTLE_PIPELINE_ID".to_string(),
            invocation.pipeline_id.to_string(),
        ),
        (
            "TRESTLE_EXECUTION_ID".to_string(),
            invocation.execution_id.to_string(),
        ),
        ("TRESTLE_TASK_NAME".to_string(), invocation.task_name.clone()),
    ]
}

/// Waits for a child process under the task's wall-clock budget and the
/// run's cancellation token
///
/// `kill_on_drop` tears the child down on either exit path.
pub(crate) async fn wait_with_limits(
    cmd: &mut Command,
    task: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<std::process::Output, TaskError> {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tokio::select! {
        output = cmd.output() => {
            output.map_err(|e| TaskError::Runtime(format!("failed to spawn process: {e}")))
        }
        _ = tokio::time::sleep(timeout) => Err(TaskError::TimedOut {
            task: task.to_string(),
            seconds: timeout.as_secs(),
        }),
        _ = cancel.cancelled() => Err(TaskError::Cancelled {
            task: task.to_string(),
        }),
    }
}

/// Combined stdout + stderr, lossily decoded
pub(crate) fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        combined.push_str(&stderr);
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn invocation(command: &str) -> TaskInvocation {
        TaskInvocation {
            pipeline_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            task_name: "test-task".to_string(),
            command: command.to_string(),
            image: "ubuntu:24.10".to_string(),
            env: HashMap::new(),
            worktree: None,
        }
    }

    #[test]
    fn test_reserved_env_identifies_run_context() {
        let inv = invocation("true");
        let vars = reserved_env(&inv);

        let map: HashMap<_, _> = vars.into_iter().collect();
        assert_eq!(
            map.get("TRESTLE_PIPELINE_ID").unwrap(),
            &inv.pipeline_id.to_string()
        );
        assert_eq!(
            map.get("TRESTLE_EXECUTION_ID").unwrap(),
            &inv.execution_id.to_string()
        );
        assert_eq!(map.get("TRESTLE_TASK_NAME").unwrap(), "test-task");
    }
}
