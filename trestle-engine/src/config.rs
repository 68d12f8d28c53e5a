//! Engine configuration
//!
//! Defines all configurable parameters for the execution engine including
//! directories, timeouts, the default container image, and admission limits.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

/// Engine configuration
///
/// All timeouts and limits are configurable to allow tuning for different
/// deployment scenarios (dev vs prod, small vs large repositories).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory for per-run working trees.
    pub workspace_dir: PathBuf,

    /// Directory for per-run build log files.
    pub build_logs_dir: PathBuf,

    /// Maximum time a git clone may take.
    pub git_timeout: Duration,

    /// Hard wall-clock limit for a single task, in either execution mode.
    pub task_timeout: Duration,

    /// Container image used when a definition does not name one.
    pub default_image: String,

    /// Whether container execution is enabled at all. When disabled (or
    /// when the runtime is unreachable at startup) the engine degrades to
    /// local host execution for the process's remaining lifetime.
    pub container_enabled: bool,

    /// Maximum number of runs executing at the same time; further
    /// dispatches queue for a permit.
    pub max_concurrent_runs: usize,

    /// How many build log files to keep when pruning.
    pub max_build_history: usize,

    /// Whether old build logs are pruned after each run.
    pub cleanup_old_logs: bool,

    /// Accept webhook triggers for pipelines without a configured secret.
    /// This is explicit open mode; it is never the default.
    pub allow_unsigned_webhooks: bool,
}

impl EngineConfig {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - TRESTLE_WORKSPACE_DIR (default: ./workspace)
    /// - TRESTLE_BUILD_LOGS_DIR (default: ./logs/builds)
    /// - TRESTLE_GIT_TIMEOUT (seconds, default: 300)
    /// - TRESTLE_TASK_TIMEOUT (seconds, default: 600)
    /// - TRESTLE_DEFAULT_IMAGE (default: ubuntu:24.10)
    /// - TRESTLE_CONTAINER_ENABLED (default: true)
    /// - TRESTLE_MAX_CONCURRENT_RUNS (default: 4)
    /// - TRESTLE_MAX_BUILD_HISTORY (default: 50)
    /// - TRESTLE_CLEANUP_OLD_LOGS (default: true)
    /// - TRESTLE_ALLOW_UNSIGNED_WEBHOOKS (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            workspace_dir: std::env::var("TRESTLE_WORKSPACE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.workspace_dir),
            build_logs_dir: std::env::var("TRESTLE_BUILD_LOGS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.build_logs_dir),
            git_timeout: env_seconds("TRESTLE_GIT_TIMEOUT").unwrap_or(defaults.git_timeout),
            task_timeout: env_seconds("TRESTLE_TASK_TIMEOUT").unwrap_or(defaults.task_timeout),
            default_image: std::env::var("TRESTLE_DEFAULT_IMAGE")
                .unwrap_or(defaults.default_image),
            container_enabled: env_bool("TRESTLE_CONTAINER_ENABLED")
                .unwrap_or(defaults.container_enabled),
            max_concurrent_runs: env_usize("TRESTLE_MAX_CONCURRENT_RUNS")
                .unwrap_or(defaults.max_concurrent_runs),
            max_build_history: env_usize("TRESTLE_MAX_BUILD_HISTORY")
                .unwrap_or(defaults.max_build_history),
            cleanup_old_logs: env_bool("TRESTLE_CLEANUP_OLD_LOGS")
                .unwrap_or(defaults.cleanup_old_logs),
            allow_unsigned_webhooks: env_bool("TRESTLE_ALLOW_UNSIGNED_WEBHOOKS")
                .unwrap_or(defaults.allow_unsigned_webhooks),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.git_timeout.as_secs() == 0 {
            anyhow::bail!("git_timeout must be greater than 0");
        }

        if self.task_timeout.as_secs() == 0 {
            anyhow::bail!("task_timeout must be greater than 0");
        }

        if self.default_image.is_empty() {
            anyhow::bail!("default_image cannot be empty");
        }

        if self.max_concurrent_runs == 0 {
            anyhow::bail!("max_concurrent_runs must be greater than 0");
        }

        if self.max_build_history == 0 {
            anyhow::bail!("max_build_history must be greater than 0");
        }

        Ok(())
    }

    /// Creates the workspace and build-log directories
    ///
    /// Failure here is process-fatal: the engine cannot run without them.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.workspace_dir).with_context(|| {
            format!(
                "Failed to create workspace directory {}",
                self.workspace_dir.display()
            )
        })?;

        std::fs::create_dir_all(&self.build_logs_dir).with_context(|| {
            format!(
                "Failed to create build logs directory {}",
                self.build_logs_dir.display()
            )
        })?;

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from("./workspace"),
            build_logs_dir: PathBuf::from("./logs/builds"),
            git_timeout: Duration::from_secs(300),
            task_timeout: Duration::from_secs(600),
            default_image: "ubuntu:24.10".to_string(),
            container_enabled: true,
            max_concurrent_runs: 4,
            max_build_history: 50,
            cleanup_old_logs: true,
            allow_unsigned_webhooks: false,
        }
    }
}

fn env_seconds(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|s| s.parse::<usize>().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|s| s.eq_ignore_ascii_case("true") || s == "1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.git_timeout, Duration::from_secs(300));
        assert_eq!(config.default_image, "ubuntu:24.10");
        assert_eq!(config.max_concurrent_runs, 4);
        assert!(!config.allow_unsigned_webhooks);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        assert!(config.validate().is_ok());

        config.git_timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());

        config.git_timeout = Duration::from_secs(300);
        config.default_image = String::new();
        assert!(config.validate().is_err());

        config.default_image = "alpine:3".to_string();
        config.max_concurrent_runs = 0;
        assert!(config.validate().is_err());
    }
}
