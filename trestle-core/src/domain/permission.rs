//! Permission domain types
//!
//! Authorization itself is handled outside the execution engine; only the
//! role hierarchy lives here so the boundary can speak a shared type.

use serde::{Deserialize, Serialize};

/// Role of a user on a pipeline, ordered weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionRole {
    Reader,
    Developer,
    Maintainer,
    Owner,
}
