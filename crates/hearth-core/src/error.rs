//! Error types for hearth-core.

use crate::validate::ValidationError;
use hearth_multipass::{DecodeError, FailureCause, ToolError};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for hearth-core operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Where the fix for a failure lies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The declared spec is wrong; fix the configuration.
    Spec,
    /// The spec collides with existing state; fix the name or the state.
    Conflict,
    /// The tool or the host misbehaved; inspect the diagnostic text.
    External,
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fault::Spec => write!(f, "spec"),
            Fault::Conflict => write!(f, "conflict"),
            Fault::External => write!(f, "external"),
        }
    }
}

/// Errors that can occur during reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Spec rejected before any tool invocation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The tool does not know the name
    #[error("instance {name} not found: {detail}")]
    NotFound { name: String, detail: String },

    /// Duplicate name or a verb the current state cannot take
    #[error("conflict on instance {name}: {detail}")]
    Conflict { name: String, detail: String },

    /// Immutable fields changed; the instance must be destroyed and recreated
    #[error("instance {name} requires replacement, changed: {}", .fields.join(", "))]
    ReplacementRequired {
        name: String,
        fields: Vec<&'static str>,
    },

    /// Spawn failure, non-zero exit or local timeout of the tool
    #[error(transparent)]
    Tool(ToolError),

    /// Malformed structured output
    #[error("malformed tool output for {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: DecodeError,
    },

    /// Structured success carrying per-entity errors
    #[error("multipass errors for {name}: {}", .errors.join(", "))]
    PartialFailure { name: String, errors: Vec<String> },

    /// `delete` succeeded but `purge` did not; the instance is recoverable
    #[error("instance {name} was deleted but not purged: {source}")]
    PurgeFailed {
        name: String,
        #[source]
        source: ToolError,
    },

    /// The instance did not reach the wanted state in time
    #[error("instance {name} did not reach {wanted} within {waited:?}")]
    Timeout {
        name: String,
        wanted: String,
        waited: Duration,
    },
}

impl ReconcileError {
    /// Translate a tool failure for the given instance, using the cause
    /// classified at the tool boundary.
    pub fn from_tool(name: &str, err: ToolError) -> Self {
        match err {
            ToolError::NotFound { .. } => ReconcileError::NotFound {
                name: name.to_string(),
                detail: err.to_string(),
            },
            ToolError::Partial { errors } => ReconcileError::PartialFailure {
                name: name.to_string(),
                errors,
            },
            ToolError::Decode { source, .. } => ReconcileError::Decode {
                name: name.to_string(),
                source,
            },
            ToolError::Exit { .. } => match err.cause() {
                FailureCause::NotFound => ReconcileError::NotFound {
                    name: name.to_string(),
                    detail: err.to_string(),
                },
                FailureCause::AlreadyExists | FailureCause::StateConflict => {
                    ReconcileError::Conflict {
                        name: name.to_string(),
                        detail: err.to_string(),
                    }
                }
                FailureCause::Other => ReconcileError::Tool(err),
            },
            other => ReconcileError::Tool(other),
        }
    }

    /// Classify who has to act on this failure.
    pub fn fault(&self) -> Fault {
        match self {
            ReconcileError::Validation(_) | ReconcileError::ReplacementRequired { .. } => {
                Fault::Spec
            }
            ReconcileError::Conflict { .. } | ReconcileError::NotFound { .. } => Fault::Conflict,
            ReconcileError::Tool(_)
            | ReconcileError::Decode { .. }
            | ReconcileError::PartialFailure { .. }
            | ReconcileError::PurgeFailed { .. }
            | ReconcileError::Timeout { .. } => Fault::External,
        }
    }

    /// Check if this error indicates a not-found condition.
    ///
    /// During a read after prior success this means the instance vanished
    /// and any persisted record of it should be dropped.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcileError::NotFound { .. })
    }

    /// Check if this error indicates a name or state conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcileError::Conflict { .. })
    }

    /// Check if repeating the same call unchanged may succeed.
    ///
    /// Only failures of the process or of the clock qualify: a spawn failure,
    /// a local tool timeout, a purge left pending, or a wait that ran out.
    /// Unclassified non-zero exits (missing image, unknown remote, no room on
    /// the host) come back the same way on a blind retry, so they do not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconcileError::Tool(ToolError::Spawn { .. } | ToolError::Timeout { .. })
                | ReconcileError::PurgeFailed { .. }
                | ReconcileError::Timeout { .. }
        )
    }
}
