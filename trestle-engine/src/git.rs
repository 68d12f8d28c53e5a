//! Git operations
//!
//! Clones repositories with a bounded time budget. Runs never reuse a
//! prior checkout: an existing destination is removed and replaced by a
//! fresh depth-limited clone of the requested branch.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::EngineError;

/// Clones `repo_url` at `branch` into `dest`
///
/// The destination is removed first if it exists. The clone is depth-1
/// and single-branch; on timeout or non-zero exit the captured git
/// diagnostics are returned in the error.
pub async fn clone_repository(
    repo_url: &str,
    branch: &str,
    dest: &Path,
    timeout: std::time::Duration,
    cancel: &CancellationToken,
) -> Result<(), EngineError> {
    if dest.exists() {
        debug!("Removing stale checkout at {}", dest.display());
        tokio::fs::remove_dir_all(dest)
            .await
            .map_err(|e| EngineError::Internal(format!("failed to remove stale checkout: {e}")))?;
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| EngineError::Internal(format!("failed to create workspace: {e}")))?;
    }

    info!("Cloning {} (branch {}) into {}", repo_url, branch, dest.display());

    let mut cmd = Command::new("git");
    cmd.arg("clone")
        .arg("--depth")
        .arg("1")
        .arg("--single-branch")
        .arg("--branch")
        .arg(branch)
        .arg(repo_url)
        .arg(dest)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::select! {
        output = cmd.output() => {
            output.map_err(|e| EngineError::Internal(format!("failed to spawn git: {e}")))?
        }
        _ = tokio::time::sleep(timeout) => {
            return Err(EngineError::CloneTimedOut(timeout.as_secs()));
        }
        _ = cancel.cancelled() => {
            return Err(EngineError::Cancelled);
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::CloneFailed(format!(
            "exit code {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }

    debug!("Clone of {} complete", repo_url);
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    /// Skips git-dependent tests on hosts without a git binary.
    pub(crate) fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Creates a throwaway local repository with the given files committed
    /// on `main`, returning its path inside `dir`.
    pub(crate) fn init_fixture_repo(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
        let repo = dir.join("origin");
        std::fs::create_dir_all(&repo).unwrap();

        let git = |args: &[&str]| {
            let status = std::process::Command::new("git")
                .args(args)
                .current_dir(&repo)
                .env("GIT_AUTHOR_NAME", "fixture")
                .env("GIT_AUTHOR_EMAIL", "fixture@localhost")
                .env("GIT_COMMITTER_NAME", "fixture")
                .env("GIT_COMMITTER_EMAIL", "fixture@localhost")
                .output()
                .unwrap();
            assert!(status.status.success(), "git {:?} failed", args);
        };

        git(&["init", "--initial-branch", "main"]);
        for (path, contents) in files {
            let full = repo.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(full, contents).unwrap();
        }
        git(&["add", "."]);
        git(&["commit", "-m", "fixture"]);

        repo
    }

    #[tokio::test]
    async fn test_clone_local_repository() {
        if !git_available() {
            return;
        }

        let tmp = tempfile::tempdir().unwrap();
        let origin = init_fixture_repo(tmp.path(), &[("hello.txt", "hello\n")]);
        let dest = tmp.path().join("checkout");

        clone_repository(
            origin.to_str().unwrap(),
            "main",
            &dest,
            Duration::from_secs(60),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let contents = std::fs::read_to_string(dest.join("hello.txt")).unwrap();
        assert_eq!(contents, "hello\n");
    }

    #[tokio::test]
    async fn test_clone_replaces_existing_destination() {
        if !git_available() {
            return;
        }

        let tmp = tempfile::tempdir().unwrap();
        let origin = init_fixture_repo(tmp.path(), &[("hello.txt", "hello\n")]);
        let dest = tmp.path().join("checkout");

        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("leftover.txt"), "stale").unwrap();

        clone_repository(
            origin.to_str().unwrap(),
            "main",
            &dest,
            Duration::from_secs(60),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(!dest.join("leftover.txt").exists());
        assert!(dest.join("hello.txt").exists());
    }

    #[tokio::test]
    async fn test_clone_nonexistent_branch_fails() {
        if !git_available() {
            return;
        }

        let tmp = tempfile::tempdir().unwrap();
        let origin = init_fixture_repo(tmp.path(), &[("hello.txt", "hello\n")]);
        let dest = tmp.path().join("checkout");

        let err = clone_repository(
            origin.to_str().unwrap(),
            "no-such-branch",
            &dest,
            Duration::from_secs(60),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, EngineError::CloneFailed(_)));
    }
}
