//! Container task execution
//!
//! Runs each task in an ephemeral podman container: fresh container from
//! the definition's image, working tree bind-mounted read-write at
//! /workspace, command as the entrypoint, removed afterward regardless
//! of outcome.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    TaskError, TaskInvocation, TaskRunner, combined_output, reserved_env, wait_with_limits,
};

/// Fixed mount point for the working tree inside task containers.
const WORKSPACE_MOUNT: &str = "/workspace";

/// Checks if podman is installed and responding
pub fn check_podman_available() -> Result<String> {
    let output = std::process::Command::new("podman")
        .arg("--version")
        .output()
        .context("Failed to execute 'podman --version'. Is podman installed?")?;

    if !output.status.success() {
        anyhow::bail!("Podman is not working correctly");
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Container-mode task runner
pub struct ContainerRunner {
    task_timeout: Duration,
}

impl ContainerRunner {
    pub fn new(task_timeout: Duration) -> Self {
        Self { task_timeout }
    }
}

#[async_trait]
impl TaskRunner for ContainerRunner {
    fn mode(&self) -> &'static str {
        "container"
    }

    async fn run(
        &self,
        invocation: &TaskInvocation,
        cancel: &CancellationToken,
    ) -> Result<String, TaskError> {
        let container_name = generate_container_name(invocation.execution_id);
        let args = build_run_args(invocation, &container_name);

        debug!(
            "Running task '{}' in container {} (image {})",
            invocation.task_name, container_name, invocation.image
        );

        let mut cmd = Command::new("podman");
        cmd.args(&args);

        let output = match wait_with_limits(
            &mut cmd,
            &invocation.task_name,
            self.task_timeout,
            cancel,
        )
        .await
        {
            Ok(output) => output,
            Err(e) => {
                // Killing the podman client can strand the container; --rm
                // only fires on a clean exit.
                remove_container(&container_name).await;
                return Err(e);
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let combined = combined_output(&output);

        match exit_code {
            0 => Ok(combined),
            // 125 is podman itself failing, before the task command ran.
            125 => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if is_image_resolution_failure(&stderr) {
                    Err(TaskError::ImageUnresolvable {
                        image: invocation.image.clone(),
                        detail: stderr.trim().to_string(),
                    })
                } else {
                    Err(TaskError::Runtime(stderr.trim().to_string()))
                }
            }
            code => Err(TaskError::NonZeroExit {
                task: invocation.task_name.clone(),
                code,
                output: combined,
            }),
        }
    }
}

/// Assembles the `podman run` argument list for one task
fn build_run_args(invocation: &TaskInvocation, container_name: &str) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "run".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        container_name.to_string(),
        "--entrypoint".to_string(),
        "/bin/sh".to_string(),
    ];

    for (key, value) in &invocation.env {
        args.push("--env".to_string());
        args.push(format!("{key}={value}"));
    }
    for (key, value) in reserved_env(invocation) {
        args.push("--env".to_string());
        args.push(format!("{key}={value}"));
    }

    if let Some(worktree) = &invocation.worktree {
        args.push("-v".to_string());
        args.push(format!("{}:{}:rw", worktree.display(), WORKSPACE_MOUNT));
        args.push("-w".to_string());
        args.push(WORKSPACE_MOUNT.to_string());
    }

    args.push(invocation.image.clone());
    args.push("-c".to_string());
    args.push(invocation.command.clone());

    args
}

fn generate_container_name(execution_id: Uuid) -> String {
    // Random suffix keeps sequential tasks of one run from colliding.
    let suffix = Uuid::new_v4().simple().to_string();
    format!("trestle-{}-{}", execution_id, &suffix[..8])
}

fn is_image_resolution_failure(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    stderr.contains("manifest unknown")
        || stderr.contains("image not known")
        || stderr.contains("name unknown")
        || stderr.contains("unable to pull")
        || stderr.contains("short-name")
}

/// Best-effort teardown after a timeout or cancellation
async fn remove_container(container_name: &str) {
    let result = Command::new("podman")
        .arg("rm")
        .arg("-f")
        .arg(container_name)
        .output()
        .await;

    match result {
        Ok(output) if output.status.success() => {
            debug!("Container {} removed", container_name);
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(
                "Container {} not removed (may have exited already): {}",
                container_name,
                stderr.trim()
            );
        }
        Err(e) => warn!("Failed to remove container {}: {}", container_name, e),
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::invocation;
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_run_args_ephemeral_and_entrypoint() {
        let inv = invocation("echo hi");
        let args = build_run_args(&inv, "trestle-test");

        assert_eq!(args[0], "run");
        assert!(args.contains(&"--rm".to_string()));
        assert!(args.contains(&"--entrypoint".to_string()));
        // Command is the payload of /bin/sh -c.
        assert_eq!(args[args.len() - 2], "-c");
        assert_eq!(args[args.len() - 1], "echo hi");
        // Image comes right before the shell payload.
        assert_eq!(args[args.len() - 3], "ubuntu:24.10");
    }

    #[test]
    fn test_run_args_mount_worktree_when_present() {
        let mut inv = invocation("make");
        inv.worktree = Some(PathBuf::from("/srv/ws/app_123"));
        let args = build_run_args(&inv, "trestle-test");

        let mount = "/srv/ws/app_123:/workspace:rw".to_string();
        assert!(args.contains(&mount));
        assert!(args.contains(&"-w".to_string()));
        assert!(args.contains(&"/workspace".to_string()));
    }

    #[test]
    fn test_run_args_no_mount_without_worktree() {
        let inv = invocation("true");
        let args = build_run_args(&inv, "trestle-test");
        assert!(!args.contains(&"-v".to_string()));
        assert!(!args.contains(&"-w".to_string()));
    }

    #[test]
    fn test_run_args_inject_reserved_env() {
        let mut inv = invocation("true");
        inv.env.insert("FOO".to_string(), "bar".to_string());
        let args = build_run_args(&inv, "trestle-test");

        assert!(args.contains(&"FOO=bar".to_string()));
        assert!(
            args.iter()
                .any(|a| a == &format!("TRESTLE_EXECUTION_ID={}", inv.execution_id))
        );
        assert!(args.contains(&"TRESTLE_TASK_NAME=test-task".to_string()));
    }

    #[test]
    fn test_container_names_are_unique() {
        let id = Uuid::new_v4();
        assert_ne!(generate_container_name(id), generate_container_name(id));
    }

    #[test]
    fn test_image_resolution_failure_detection() {
        assert!(is_image_resolution_failure(
            "Error: initializing source docker://nope:latest: manifest unknown"
        ));
        assert!(!is_image_resolution_failure("Error: OCI runtime error"));
    }
}
