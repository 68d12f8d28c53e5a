//! Trestle Core
//!
//! Core types and abstractions for the Trestle CI/CD system.
//!
//! This crate contains:
//! - Domain types: Core business entities (Pipeline, Configuration, Execution)
//! - DTOs: Data transfer objects for the HTTP boundary

pub mod domain;
pub mod dto;
