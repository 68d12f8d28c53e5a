//! Core domain types
//!
//! This module contains the core domain structures used across Trestle.
//! These types represent the fundamental business entities shared between
//! the HTTP surface (for persistence) and the execution engine.

pub mod configuration;
pub mod execution;
pub mod permission;
pub mod pipeline;
