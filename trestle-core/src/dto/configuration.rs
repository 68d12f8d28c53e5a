//! Configuration DTOs

use serde::{Deserialize, Serialize};

use crate::domain::configuration::ConfigurationSource;

/// Request to attach a new configuration to a pipeline
///
/// The new configuration becomes the active one; any previously active
/// configuration is deactivated in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConfiguration {
    pub source: ConfigurationSource,
    pub definition: Option<String>,
    pub repo_url: Option<String>,
    #[serde(default = "default_branch")]
    pub repo_branch: String,
    #[serde(default = "default_definition_path")]
    pub definition_path: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_definition_path() -> String {
    "pipeline.yml".to_string()
}
