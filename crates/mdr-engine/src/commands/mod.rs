//! Command orchestration layer.
//!
//! Kind-agnostic commands carry payloads as JSON and are dispatched onto the
//! typed per-kind services of an [`MdrContext`](crate::MdrContext).

pub mod engine_command;
pub mod item_kind;
pub mod study;

pub use engine_command::{apply_engine_command, EngineCommand, ItemCommand};
pub use item_kind::ItemKind;
pub use study::reorder_study_selections;
