/// Core types shared by the executor, the adapters and the dispatcher
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Terminal classification of one invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Handler returned and the harness exited zero
    Success,
    /// Compile failure, runtime failure or orchestration fault
    Error,
    /// Execute stage exceeded its wall-clock budget
    Timeout,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Error => "ERROR",
            ExecutionStatus::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-assigned invocation identifier.
///
/// Callers enqueue either an int64 or a string; the result record echoes the
/// same JSON form back.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InvocationId {
    Int(i64),
    Str(String),
}

impl InvocationId {
    /// Extract an id from a JSON value, accepting only integers and strings
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(InvocationId::Int),
            serde_json::Value::String(s) => Some(InvocationId::Str(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationId::Int(n) => write!(f, "{}", n),
            InvocationId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for InvocationId {
    fn from(value: i64) -> Self {
        InvocationId::Int(value)
    }
}

impl From<&str> for InvocationId {
    fn from(value: &str) -> Self {
        InvocationId::Str(value.to_string())
    }
}

/// A fully validated queue item
#[derive(Clone, Debug, PartialEq)]
pub struct InvocationRequest {
    pub invocation_id: InvocationId,
    pub code: String,
    pub input: serde_json::Value,
}

/// Outcome of one pass through the sandbox pipeline.
///
/// `raw_output` is trimmed stdout on success and the diagnostic otherwise.
/// `duration_ms` covers the execute stage only.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    pub raw_output: String,
    pub logs: String,
    pub duration_ms: u64,
}

impl ExecutionOutcome {
    pub fn success(raw_output: String, logs: String, duration_ms: u64) -> Self {
        Self {
            status: ExecutionStatus::Success,
            raw_output,
            logs,
            duration_ms,
        }
    }

    pub fn error(raw_output: impl Into<String>, logs: String, duration_ms: u64) -> Self {
        Self {
            status: ExecutionStatus::Error,
            raw_output: raw_output.into(),
            logs,
            duration_ms,
        }
    }

    pub fn timeout(raw_output: impl Into<String>, logs: String, duration_ms: u64) -> Self {
        Self {
            status: ExecutionStatus::Timeout,
            raw_output: raw_output.into(),
            logs,
            duration_ms,
        }
    }

    /// Parsed JSON view of the raw output.
    ///
    /// Only successful runs carry a parsed value. Output that is not JSON is
    /// wrapped as `{"result": raw}`; empty output maps to `None`.
    pub fn parsed_output(&self) -> Option<serde_json::Value> {
        if self.status != ExecutionStatus::Success || self.raw_output.is_empty() {
            return None;
        }
        match serde_json::from_str(&self.raw_output) {
            Ok(value) => Some(value),
            Err(_) => Some(serde_json::json!({ "result": self.raw_output })),
        }
    }

    /// Error message view: the raw output for anything but success
    pub fn error_message(&self) -> String {
        if self.status == ExecutionStatus::Success {
            String::new()
        } else {
            self.raw_output.clone()
        }
    }
}

/// Persisted projection of an [`ExecutionOutcome`], stored at `result:<id>`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    pub invocation_id: InvocationId,
    pub status: ExecutionStatus,
    pub output: Option<serde_json::Value>,
    pub output_raw: String,
    pub error_message: String,
    pub logs: String,
    pub duration_ms: u64,
}

impl InvocationResult {
    pub fn from_outcome(invocation_id: InvocationId, outcome: &ExecutionOutcome) -> Self {
        Self {
            invocation_id,
            status: outcome.status,
            output: outcome.parsed_output(),
            output_raw: outcome.raw_output.clone(),
            error_message: outcome.error_message(),
            logs: outcome.logs.clone(),
            duration_ms: outcome.duration_ms,
        }
    }

    /// Synthetic ERROR record for faults that never reached the executor
    pub fn synthetic_error(
        invocation_id: InvocationId,
        error_message: impl Into<String>,
        logs: impl Into<String>,
    ) -> Self {
        Self {
            invocation_id,
            status: ExecutionStatus::Error,
            output: None,
            output_raw: String::new(),
            error_message: error_message.into(),
            logs: logs.into(),
            duration_ms: 0,
        }
    }
}

/// Error types for invokebox
#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Queue error: {0}")]
    Queue(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}

pub type Result<T> = std::result::Result<T, InvokeError>;

impl From<nix::errno::Errno> for InvokeError {
    fn from(err: nix::errno::Errno) -> Self {
        InvokeError::Process(err.to_string())
    }
}
