use thiserror::Error;

use super::outcome::FailureKind;

#[derive(Error, Debug)]
pub enum JobRelayError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unknown message kind: {0}")]
    UnknownKind(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Failed to load tool '{tool}': {reason}")]
    LoadFailure { tool: String, reason: String },

    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    #[error("No workers available")]
    NoWorkersAvailable,

    #[error("Registry inconsistency: worker '{0}' was selected but is not registered")]
    RegistryInconsistency(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Job failed ({kind}): {message}")]
    JobFailed { kind: FailureKind, message: String },
}

impl JobRelayError {
    /// Builds a `LoadFailure` for `tool`.
    pub fn load_failure(tool: impl Into<String>, reason: impl ToString) -> Self {
        JobRelayError::LoadFailure {
            tool: tool.into(),
            reason: reason.to_string(),
        }
    }

    /// Maps this error onto the failure kind carried in a `JOB_RESULT` reply.
    ///
    /// Socket-level failures while talking to a worker are reported as
    /// `WorkerUnreachable`; a `JobFailed` relayed from further down keeps its
    /// original kind.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            JobRelayError::UnknownTool(_) => FailureKind::UnknownTool,
            JobRelayError::LoadFailure { .. } => FailureKind::LoadFailure,
            JobRelayError::ToolExecution(_) => FailureKind::ToolExecution,
            JobRelayError::NoWorkersAvailable => FailureKind::NoWorkersAvailable,
            JobRelayError::RegistryInconsistency(_) => FailureKind::RegistryInconsistency,
            JobRelayError::Connection(_) | JobRelayError::Io(_) | JobRelayError::Timeout(_) => {
                FailureKind::WorkerUnreachable
            }
            JobRelayError::Protocol(_)
            | JobRelayError::UnknownKind(_)
            | JobRelayError::JsonSerialization(_)
            | JobRelayError::InvalidResponse(_) => FailureKind::Protocol,
            JobRelayError::Configuration(_) => FailureKind::Internal,
            JobRelayError::JobFailed { kind, .. } => *kind,
        }
    }
}

impl From<std::net::AddrParseError> for JobRelayError {
    fn from(err: std::net::AddrParseError) -> Self {
        JobRelayError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, JobRelayError>;
