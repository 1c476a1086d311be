//! Engine error types.
//!
//! All engine subsystems surface errors through [`EngineError`].  The
//! variants map onto distinct propagation policies: `Configuration` is
//! fatal and only ever raised before a run starts, `MissingState`,
//! `Execution`, `Validation`, and `InvalidRange` abort a single item's
//! walk and are isolated by the batch runner.

use chrono::{DateTime, Utc};

/// Unified error type for the workflow engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The graph wiring is invalid.  Raised by [`crate::GraphBuilder::build`]
    /// before any run starts; never a runtime condition.
    #[error("graph configuration error: {reason}")]
    Configuration { reason: String },

    /// A node's prepare stage found required workspace state absent.
    #[error("node `{node}` requires workspace state for `{key}` which is absent")]
    MissingState { node: &'static str, key: String },

    /// A collaborator call inside a node's execute stage failed.
    #[error("node `{node}` execution failed: {reason}")]
    Execution { node: &'static str, reason: String },

    /// A collaborator produced output that violates a node's invariants.
    #[error("node `{node}` received invalid output: {reason}")]
    Validation { node: &'static str, reason: String },

    /// A time window is degenerate (start at or after end).
    #[error("invalid time range: start {start} is not before end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Catch-all for unexpected internal errors.  Prefer a typed variant
    /// whenever possible.
    #[error("internal engine error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;
