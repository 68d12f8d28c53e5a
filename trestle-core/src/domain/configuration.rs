//! Configuration domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The versioned definition of what a pipeline runs
///
/// Either holds the definition text inline or points at a file inside a
/// version-controlled repository. At most one configuration per pipeline
/// is active at a time; the database enforces this with a partial unique
/// index and activation is an atomic swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub source: ConfigurationSource,
    /// Definition text for inline configurations.
    pub definition: Option<String>,
    /// Repository location for repo-sourced configurations.
    pub repo_url: Option<String>,
    pub repo_branch: String,
    /// Path of the definition file inside the repository.
    pub definition_path: String,
    pub version: i32,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Where the definition text comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigurationSource {
    Inline,
    Repo,
}

impl ConfigurationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigurationSource::Inline => "inline",
            ConfigurationSource::Repo => "repo",
        }
    }
}

impl std::str::FromStr for ConfigurationSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inline" => Ok(ConfigurationSource::Inline),
            "repo" => Ok(ConfigurationSource::Repo),
            other => Err(format!("unknown configuration source: {other}")),
        }
    }
}
