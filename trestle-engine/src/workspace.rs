//! Per-run workspace paths
//!
//! Every run gets a uniquely named working tree under the workspace root,
//! derived from the pipeline name plus the execution id so concurrent
//! runs of the same pipeline never collide.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Reduces a pipeline name to a filesystem-safe component
///
/// Keeps ASCII alphanumerics, `-`, `_` and `.`; everything else becomes
/// `_`. An empty result falls back to `pipeline`.
pub fn sanitize_component(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "pipeline".to_string()
    } else {
        sanitized
    }
}

/// Working-tree path for one run
pub fn run_workspace_path(root: &Path, pipeline_name: &str, execution_id: Uuid) -> PathBuf {
    root.join(format!("{}_{}", sanitize_component(pipeline_name), execution_id))
}

/// Removes a run's working tree; a missing tree is not an error
pub async fn remove_workspace(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("My Pipeline"), "My_Pipeline");
        assert_eq!(sanitize_component("team/app#1"), "team_app_1");
        assert_eq!(sanitize_component("release-2.0"), "release-2.0");
        assert_eq!(sanitize_component(""), "pipeline");
        assert_eq!(sanitize_component("///"), "___");
    }

    #[test]
    fn test_run_workspace_paths_are_distinct_per_execution() {
        let root = Path::new("/tmp/ws");
        let a = run_workspace_path(root, "app", Uuid::new_v4());
        let b = run_workspace_path(root, "app", Uuid::new_v4());
        assert_ne!(a, b);
        assert!(a.starts_with(root));
    }

    #[tokio::test]
    async fn test_remove_missing_workspace_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("does-not-exist");
        remove_workspace(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_workspace_deletes_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run");
        std::fs::create_dir_all(path.join("nested")).unwrap();
        std::fs::write(path.join("nested/file.txt"), "x").unwrap();

        remove_workspace(&path).await.unwrap();
        assert!(!path.exists());
    }
}
