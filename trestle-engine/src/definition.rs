//! Pipeline definition parsing
//!
//! Validates and normalizes the YAML definition into a structured task
//! list with defaults applied. Validation is all-or-nothing: a violation
//! returns a [`DefinitionError`] and no partial structure.
//!
//! The accepted document shape:
//!
//! ```yaml
//! env_image: alpine:3        # optional, defaults to the configured image
//! variables:                 # optional string -> string mapping
//!   FOO: bar
//! tasks:                     # required, non-empty, ordered
//!   - name: build            # optional
//!     command: make all      # required, non-empty
//! ```

use std::collections::HashMap;

use thiserror::Error;

/// A normalized, validated pipeline definition
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSpec {
    /// Container image tasks run in.
    pub env_image: String,
    /// Environment variables injected into every task.
    pub variables: HashMap<String, String>,
    /// Ordered task list; executed strictly sequentially.
    pub tasks: Vec<TaskSpec>,
}

/// One task of a pipeline definition
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub name: Option<String>,
    pub command: String,
}

impl TaskSpec {
    /// Display name for logs and error messages.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }
}

/// Definition validation failure, with a human-readable description of
/// which rule was violated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("definition is not valid YAML: {0}")]
    InvalidYaml(String),

    #[error("definition must be a mapping")]
    NotAMapping,

    #[error("definition must contain a 'tasks' key")]
    MissingTasks,

    #[error("'tasks' must be a list")]
    TasksNotAList,

    #[error("'tasks' must not be empty")]
    EmptyTasks,

    #[error("task {index} must be a mapping")]
    TaskNotAMapping { index: usize },

    #[error("task {index} is missing a non-empty 'command'")]
    MissingCommand { index: usize },

    #[error("'name' of task {index} must be a string")]
    InvalidTaskName { index: usize },

    #[error("'env_image' must be a non-empty string")]
    InvalidImage,

    #[error("'variables' must be a mapping of string to string")]
    InvalidVariables,
}

/// Parses and validates a definition, applying defaults
///
/// `default_image` is used when the document does not set `env_image`.
pub fn parse_definition(text: &str, default_image: &str) -> Result<PipelineSpec, DefinitionError> {
    let doc: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| DefinitionError::InvalidYaml(e.to_string()))?;

    if !doc.is_mapping() {
        return Err(DefinitionError::NotAMapping);
    }

    let env_image = match doc.get("env_image") {
        None => default_image.to_string(),
        Some(value) => match value.as_str() {
            Some(s) if !s.trim().is_empty() => s.to_string(),
            _ => return Err(DefinitionError::InvalidImage),
        },
    };

    let variables = match doc.get("variables") {
        None => HashMap::new(),
        Some(value) => {
            let mapping = value.as_mapping().ok_or(DefinitionError::InvalidVariables)?;
            let mut vars = HashMap::with_capacity(mapping.len());
            for (key, val) in mapping {
                let key = key.as_str().ok_or(DefinitionError::InvalidVariables)?;
                let val = val.as_str().ok_or(DefinitionError::InvalidVariables)?;
                vars.insert(key.to_string(), val.to_string());
            }
            vars
        }
    };

    let tasks_value = doc.get("tasks").ok_or(DefinitionError::MissingTasks)?;
    let task_list = tasks_value
        .as_sequence()
        .ok_or(DefinitionError::TasksNotAList)?;

    if task_list.is_empty() {
        return Err(DefinitionError::EmptyTasks);
    }

    let mut tasks = Vec::with_capacity(task_list.len());
    for (i, entry) in task_list.iter().enumerate() {
        // 1-based index in messages, matching task numbering in run logs.
        let index = i + 1;

        if !entry.is_mapping() {
            return Err(DefinitionError::TaskNotAMapping { index });
        }

        let command = match entry.get("command").and_then(|v| v.as_str()) {
            Some(c) if !c.trim().is_empty() => c.to_string(),
            _ => return Err(DefinitionError::MissingCommand { index }),
        };

        let name = match entry.get("name") {
            None => None,
            Some(value) => Some(
                value
                    .as_str()
                    .ok_or(DefinitionError::InvalidTaskName { index })?
                    .to_string(),
            ),
        };

        tasks.push(TaskSpec { name, command });
    }

    Ok(PipelineSpec {
        env_image,
        variables,
        tasks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_IMAGE: &str = "ubuntu:24.10";

    fn parse(text: &str) -> Result<PipelineSpec, DefinitionError> {
        parse_definition(text, DEFAULT_IMAGE)
    }

    #[test]
    fn test_minimal_definition_gets_defaults() {
        let spec = parse("tasks:\n  - command: echo hi\n").unwrap();
        assert_eq!(spec.env_image, DEFAULT_IMAGE);
        assert!(spec.variables.is_empty());
        assert_eq!(spec.tasks.len(), 1);
        assert_eq!(spec.tasks[0].command, "echo hi");
        assert_eq!(spec.tasks[0].display_name(), "unnamed");
    }

    #[test]
    fn test_full_definition() {
        let text = r#"
env_image: alpine:3
variables:
  FOO: bar
  BAZ: qux
tasks:
  - name: build
    command: make all
  - name: test
    command: make check
"#;
        let spec = parse(text).unwrap();
        assert_eq!(spec.env_image, "alpine:3");
        assert_eq!(spec.variables.get("FOO").unwrap(), "bar");
        assert_eq!(spec.tasks.len(), 2);
        assert_eq!(spec.tasks[0].name.as_deref(), Some("build"));
        assert_eq!(spec.tasks[1].command, "make check");
    }

    #[test]
    fn test_tasks_order_preserved() {
        let text = "tasks:\n  - command: first\n  - command: second\n  - command: third\n";
        let spec = parse(text).unwrap();
        let commands: Vec<&str> = spec.tasks.iter().map(|t| t.command.as_str()).collect();
        assert_eq!(commands, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_missing_tasks_rejected() {
        assert_eq!(parse("env_image: alpine:3\n"), Err(DefinitionError::MissingTasks));
    }

    #[test]
    fn test_empty_tasks_rejected() {
        assert_eq!(parse("tasks: []\n"), Err(DefinitionError::EmptyTasks));
    }

    #[test]
    fn test_tasks_not_a_list_rejected() {
        assert_eq!(
            parse("tasks: do everything\n"),
            Err(DefinitionError::TasksNotAList)
        );
    }

    #[test]
    fn test_task_missing_command_rejected() {
        assert_eq!(
            parse("tasks:\n  - name: build\n"),
            Err(DefinitionError::MissingCommand { index: 1 })
        );
        assert_eq!(
            parse("tasks:\n  - command: ok\n  - command: \"\"\n"),
            Err(DefinitionError::MissingCommand { index: 2 })
        );
    }

    #[test]
    fn test_non_mapping_document_rejected() {
        assert_eq!(parse("- just\n- a\n- list\n"), Err(DefinitionError::NotAMapping));
    }

    #[test]
    fn test_invalid_variables_rejected() {
        assert_eq!(
            parse("variables: not-a-mapping\ntasks:\n  - command: echo\n"),
            Err(DefinitionError::InvalidVariables)
        );
        assert_eq!(
            parse("variables:\n  COUNT: [1, 2]\ntasks:\n  - command: echo\n"),
            Err(DefinitionError::InvalidVariables)
        );
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        assert!(matches!(
            parse("tasks: [unclosed"),
            Err(DefinitionError::InvalidYaml(_))
        ));
    }
}
