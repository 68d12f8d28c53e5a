//! Service Module
//!
//! Business logic layer for the server. Services orchestrate between
//! repositories and the execution engine, and contain domain logic.

pub mod coordinator;
pub mod pipeline;
pub mod token;
pub mod trigger;

// Re-export for convenience
pub use pipeline as pipeline_service;
pub use trigger as trigger_service;
