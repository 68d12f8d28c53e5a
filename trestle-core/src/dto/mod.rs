//! Data Transfer Objects for the HTTP boundary
//!
//! DTOs are lightweight representations of domain entities optimized for
//! request/response payloads. Handlers deserialize these and translate
//! them into domain operations.

pub mod configuration;
pub mod execution;
pub mod pipeline;
