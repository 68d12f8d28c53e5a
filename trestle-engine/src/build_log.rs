//! Per-run build log
//!
//! Each run gets a dedicated append-only log file, distinct from the
//! engine's general diagnostic stream. The handle is owned by the run's
//! task and passed down the call chain; it is never registered in any
//! process-wide table, and the coordinator closes it in its finalization
//! step on every exit path.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::workspace::sanitize_component;

/// Append-only log sink for one run
pub struct BuildLog {
    file: File,
    path: PathBuf,
}

impl BuildLog {
    /// Opens the log file for a run
    ///
    /// The file name combines the sanitized pipeline name, the execution
    /// id and a creation timestamp, e.g.
    /// `my_pipeline_7c9e…_20260823_141503.log`.
    pub fn create(
        dir: &Path,
        pipeline_name: &str,
        execution_id: Uuid,
    ) -> std::io::Result<BuildLog> {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!(
            "{}_{}_{}.log",
            sanitize_component(pipeline_name),
            execution_id,
            timestamp
        );
        let path = dir.join(filename);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(BuildLog { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&mut self, message: &str) {
        self.write("INFO", message);
    }

    pub fn warn(&mut self, message: &str) {
        self.write("WARNING", message);
    }

    pub fn error(&mut self, message: &str) {
        self.write("ERROR", message);
    }

    fn write(&mut self, level: &str, message: &str) {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
        // A failed write must not take the run down with it.
        if let Err(e) = writeln!(self.file, "{timestamp} - {level} - {message}") {
            tracing::warn!("Failed to write build log entry: {}", e);
        }
    }

    /// Flushes and closes the sink
    pub fn close(mut self) {
        if let Err(e) = self.file.flush() {
            tracing::warn!("Failed to flush build log: {}", e);
        }
    }
}

/// Removes the oldest build logs beyond `keep` files
///
/// Returns how many files were deleted. Called after run finalization
/// when log cleanup is enabled.
pub fn prune_old_logs(dir: &Path, keep: usize) -> std::io::Result<usize> {
    let mut logs: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        logs.push((modified, path));
    }

    if logs.len() <= keep {
        return Ok(0);
    }

    // Newest first; everything past `keep` goes.
    logs.sort_by(|a, b| b.0.cmp(&a.0));

    let mut removed = 0;
    for (_, path) in logs.into_iter().skip(keep) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Failed to prune build log {}: {}", path.display(), e),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_log_writes_timestamped_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();

        let mut log = BuildLog::create(tmp.path(), "My Pipeline", id).unwrap();
        let path = log.path().to_path_buf();

        log.info("=== PIPELINE EXECUTION START ===");
        log.error("something went wrong");
        log.close();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(" - INFO - === PIPELINE EXECUTION START ==="));
        assert!(lines[1].contains(" - ERROR - something went wrong"));
    }

    #[test]
    fn test_filename_contains_sanitized_name_and_id() {
        let tmp = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();

        let log = BuildLog::create(tmp.path(), "team/app one", id).unwrap();
        let name = log.path().file_name().unwrap().to_str().unwrap().to_string();

        assert!(name.starts_with("team_app_one_"));
        assert!(name.contains(&id.to_string()));
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn test_prune_keeps_newest_logs() {
        let tmp = tempfile::tempdir().unwrap();

        for i in 0u64..5 {
            let path = tmp.path().join(format!("run_{i}.log"));
            std::fs::write(&path, "entry\n").unwrap();
            // Distinct mtimes so ordering is deterministic.
            let t = std::time::SystemTime::now() - std::time::Duration::from_secs(100 - i * 10);
            let file = File::options().write(true).open(&path).unwrap();
            file.set_times(std::fs::FileTimes::new().set_modified(t)).unwrap();
        }
        std::fs::write(tmp.path().join("notes.txt"), "not a log").unwrap();

        let removed = prune_old_logs(tmp.path(), 2).unwrap();
        assert_eq!(removed, 3);

        let remaining: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(remaining.contains(&"run_4.log".to_string()));
        assert!(remaining.contains(&"run_3.log".to_string()));
        assert!(remaining.contains(&"notes.txt".to_string()));
        assert_eq!(remaining.len(), 3);
    }

    #[test]
    fn test_prune_noop_under_limit() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("only.log"), "entry\n").unwrap();
        assert_eq!(prune_old_logs(tmp.path(), 5).unwrap(), 0);
    }
}
