//! Degraded local task execution
//!
//! Used when the container runtime is unavailable or disabled: the
//! command runs as a direct host process in the working tree, with the
//! merged environment and reserved variables, under a hard wall-clock
//! timeout. Reduced isolation, same contract.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    TaskError, TaskInvocation, TaskRunner, combined_output, reserved_env, wait_with_limits,
};

/// Host-process task runner
pub struct LocalRunner {
    task_timeout: Duration,
}

impl LocalRunner {
    pub fn new(task_timeout: Duration) -> Self {
        Self { task_timeout }
    }
}

#[async_trait]
impl TaskRunner for LocalRunner {
    fn mode(&self) -> &'static str {
        "local"
    }

    async fn run(
        &self,
        invocation: &TaskInvocation,
        cancel: &CancellationToken,
    ) -> Result<String, TaskError> {
        debug!(
            "Running task '{}' as host process: {}",
            invocation.task_name, invocation.command
        );

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(&invocation.command);
        cmd.envs(&invocation.env);
        cmd.envs(reserved_env(invocation));

        if let Some(worktree) = &invocation.worktree {
            cmd.current_dir(worktree);
        }

        let output =
            wait_with_limits(&mut cmd, &invocation.task_name, self.task_timeout, cancel).await?;

        let exit_code = output.status.code().unwrap_or(-1);
        let combined = combined_output(&output);

        if exit_code == 0 {
            Ok(combined)
        } else {
            Err(TaskError::NonZeroExit {
                task: invocation.task_name.clone(),
                code: exit_code,
                output: combined,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::invocation;
    use super::*;

    fn runner() -> LocalRunner {
        LocalRunner::new(Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_successful_task_captures_output() {
        let output = runner()
            .run(&invocation("echo hi"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.trim(), "hi");
    }

    #[tokio::test]
    async fn test_combined_stdout_and_stderr() {
        let output = runner()
            .run(
                &invocation("echo out; echo err 1>&2"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(output.contains("out"));
        assert!(output.contains("err"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_keeps_partial_output() {
        let err = runner()
            .run(&invocation("echo partial; exit 7"), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            TaskError::NonZeroExit { task, code, output } => {
                assert_eq!(task, "test-task");
                assert_eq!(code, 7);
                assert!(output.contains("partial"));
            }
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_merged_and_reserved_env_visible() {
        let mut inv = invocation("echo $GREETING $TRESTLE_TASK_NAME");
        inv.env.insert("GREETING".to_string(), "hello".to_string());

        let output = runner().run(&inv, &CancellationToken::new()).await.unwrap();
        assert_eq!(output.trim(), "hello test-task");
    }

    #[tokio::test]
    async fn test_runs_in_worktree() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("marker.txt"), "here").unwrap();

        let mut inv = invocation("cat marker.txt");
        inv.worktree = Some(tmp.path().to_path_buf());

        let output = runner().run(&inv, &CancellationToken::new()).await.unwrap();
        assert_eq!(output, "here");
    }

    #[tokio::test]
    async fn test_timeout_kills_task() {
        let runner = LocalRunner::new(Duration::from_millis(200));
        let err = runner
            .run(&invocation("sleep 10"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_task() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = runner()
            .run(&invocation("sleep 10"), &token)
            .await
            .unwrap_err();

        assert!(matches!(err, TaskError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
