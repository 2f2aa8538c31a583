//! Error types for hearth-multipass.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for hearth-multipass operations.
pub type Result<T> = std::result::Result<T, ToolError>;

/// The tool verb a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Launch,
    Info,
    List,
    Delete,
    Purge,
    Start,
    Stop,
    Restart,
    Suspend,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Launch => write!(f, "launch instance"),
            Action::Info => write!(f, "get instance info"),
            Action::List => write!(f, "list instances"),
            Action::Delete => write!(f, "delete instance"),
            Action::Purge => write!(f, "purge instances"),
            Action::Start => write!(f, "start instance"),
            Action::Stop => write!(f, "stop instance"),
            Action::Restart => write!(f, "restart instance"),
            Action::Suspend => write!(f, "suspend instance"),
        }
    }
}

/// Why the tool rejected an invocation, derived from its own diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// The named instance does not exist.
    NotFound,
    /// An instance with that name already exists.
    AlreadyExists,
    /// The instance is in a state the verb cannot act on.
    StateConflict,
    /// Anything else: missing image, resources, daemon trouble.
    Other,
}

const NOT_FOUND_MARKERS: &[&str] = &["does not exist", "not found"];

const ALREADY_EXISTS_MARKERS: &[&str] = &["already exists"];

const STATE_CONFLICT_MARKERS: &[&str] = &[
    "is not running",
    "is already running",
    "already stopped",
    "is suspended",
    "is stopped",
    "is deleted",
    "cannot be",
    "in progress",
];

impl FailureCause {
    /// Classify combined tool output.
    pub fn classify(output: &str) -> Self {
        let lower = output.to_lowercase();
        let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

        if has(ALREADY_EXISTS_MARKERS) {
            FailureCause::AlreadyExists
        } else if has(NOT_FOUND_MARKERS) {
            FailureCause::NotFound
        } else if has(STATE_CONFLICT_MARKERS) {
            FailureCause::StateConflict
        } else {
            FailureCause::Other
        }
    }
}

/// Structured output the tool produced could not be parsed.
#[derive(Debug, Error)]
#[error("failed to parse {what} output: {source}")]
pub struct DecodeError {
    what: &'static str,
    #[source]
    source: serde_json::Error,
}

impl DecodeError {
    pub(crate) fn new(what: &'static str, source: serde_json::Error) -> Self {
        Self { what, source }
    }

    /// Which payload failed to decode (`list` or `info`).
    pub fn what(&self) -> &'static str {
        self.what
    }
}

/// Errors that can occur while driving the tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The binary could not be spawned (missing, not executable)
    #[error("failed to {action}: could not run {}: {source}", .binary.display())]
    Spawn {
        action: Action,
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tool exited non-zero; `output` is its combined output verbatim
    #[error("failed to {action}: {}, output: {output}", exit_label(.code))]
    Exit {
        action: Action,
        code: Option<i32>,
        cause: FailureCause,
        output: String,
    },

    /// The local guard expired before the tool returned
    #[error("failed to {action}: timed out after {limit:?}")]
    Timeout { action: Action, limit: Duration },

    /// Malformed structured output
    #[error("failed to {action}: {source}")]
    Decode {
        action: Action,
        #[source]
        source: DecodeError,
    },

    /// The name is absent from an otherwise successful payload
    #[error("instance {name} not found")]
    NotFound { name: String },

    /// Successful envelope carrying per-entity errors
    #[error("multipass errors: {}", .errors.join(", "))]
    Partial { errors: Vec<String> },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl ToolError {
    /// Build an exit failure, classifying the output once.
    pub fn exit(action: Action, code: Option<i32>, output: String) -> Self {
        let cause = FailureCause::classify(&output);
        ToolError::Exit {
            action,
            code,
            cause,
            output,
        }
    }

    /// The classified cause of this failure.
    pub fn cause(&self) -> FailureCause {
        match self {
            ToolError::Exit { cause, .. } => *cause,
            ToolError::NotFound { .. } => FailureCause::NotFound,
            _ => FailureCause::Other,
        }
    }

    /// Check if this error indicates a not-found condition.
    pub fn is_not_found(&self) -> bool {
        self.cause() == FailureCause::NotFound
    }

    /// Raw tool output, when the tool produced any.
    pub fn output(&self) -> Option<&str> {
        match self {
            ToolError::Exit { output, .. } => Some(output),
            _ => None,
        }
    }
}
