//! MDR Engine - Orchestration layer
//!
//! Wires services, repositories, caches and leases for every entity kind
//! into one explicit [`MdrContext`], and dispatches kind-agnostic commands
//! onto the typed services.

pub mod commands;
pub mod config;
pub mod context;

pub use commands::{apply_engine_command, EngineCommand, ItemCommand, ItemKind};
pub use config::MdrConfig;
pub use context::MdrContext;
