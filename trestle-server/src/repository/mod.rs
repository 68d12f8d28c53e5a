//! Repository Module
//!
//! Data access layer for the server. Free async functions over a
//! `PgPool`, one module per aggregate; row structs stay private to each
//! module and domain types cross the boundary.

pub mod configuration;
pub mod execution;
pub mod pipeline;

// Re-export for convenience
pub use configuration as configuration_repository;
pub use execution as execution_repository;
pub use pipeline as pipeline_repository;
