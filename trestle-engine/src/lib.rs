//! Trestle Engine
//!
//! The pipeline execution engine: everything a run needs between "a
//! pending execution record exists" and "the record is in a terminal
//! state".
//!
//! - Configuration: engine settings from environment or defaults
//! - Signature: webhook authenticity against a shared secret
//! - Resolver: obtain the definition text (inline or from a repository)
//! - Definition: validate and normalize the task list
//! - Git: throwaway and full working-tree clones with bounded time
//! - Runner: per-task execution in containers or degraded local mode
//! - Build log: the dedicated per-run append-only log sink
//!
//! The engine is deliberately free of persistence concerns; the server's
//! execution coordinator drives these pieces and owns the database.

pub mod build_log;
pub mod config;
pub mod definition;
pub mod error;
pub mod git;
pub mod resolver;
pub mod runner;
pub mod signature;
pub mod workspace;
