//! Scheduler error types.

use meetflow_engine::EngineError;

/// Unified error type for the scheduling domain.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// An error propagated from the workflow engine.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// The scheduler configuration is invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// A value could not be parsed as an email address.
    #[error("invalid email address: `{value}`")]
    InvalidAddress { value: String },

    /// A collaborator call failed.
    #[error("collaborator `{role}` failed: {reason}")]
    Collaborator { role: &'static str, reason: String },

    /// Reading a configuration or fixture file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration parsing failed.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchedulerError {
    /// Shorthand for a collaborator failure.
    pub fn collaborator(role: &'static str, reason: impl Into<String>) -> Self {
        Self::Collaborator {
            role,
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the scheduler crate.
pub type Result<T> = std::result::Result<T, SchedulerError>;
