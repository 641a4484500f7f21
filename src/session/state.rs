use std::path::PathBuf;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::SessionError;

/// What the caller asked the agent to do.
#[derive(Debug, Clone, Default)]
pub struct SessionRequest {
    pub instructions: Option<String>,
    pub task: Option<String>,
    /// Extra top-level fields merged into the synthetic `thread.request`.
    pub metadata: Map<String, Value>,
    /// Thread id to resume instead of starting fresh.
    pub resume: Option<String>,
    /// Overrides the configured workspace directory.
    pub workspace: Option<PathBuf>,
    pub model: Option<String>,
    pub reasoning: Option<String>,
    /// Passed through to the agent before the prompt.
    pub extra_args: Vec<String>,
}

impl SessionRequest {
    /// Parse caller-supplied metadata. Anything but a JSON object is rejected.
    pub fn parse_metadata(raw: &str) -> Result<Map<String, Value>, SessionError> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(SessionError::InvalidMetadata(format!(
                "expected an object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(SessionError::InvalidMetadata(e.to_string())),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The two ids a session goes by.
///
/// The placeholder is generated before the agent says anything and names the
/// log while it is being written. The authoritative id is the agent's own
/// thread id, learned from the stream and set at most once.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    placeholder: String,
    authoritative: Option<String>,
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::with_placeholder(Uuid::new_v4().to_string())
    }

    pub fn with_placeholder(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
            authoritative: None,
        }
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn authoritative(&self) -> Option<&str> {
        self.authoritative.as_deref()
    }

    /// Record the agent's thread id. Returns `true` only the first time a
    /// non-empty id is seen.
    pub fn discover(&mut self, id: &str) -> bool {
        if self.authoritative.is_some() || id.trim().is_empty() {
            return false;
        }
        self.authoritative = Some(id.to_string());
        true
    }

    /// The authoritative id when known, else the placeholder.
    pub fn best_id(&self) -> &str {
        self.authoritative.as_deref().unwrap_or(&self.placeholder)
    }
}

/// How a headless session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session_id: String,
    /// Wherever the log actually lives (renamed or still at the placeholder).
    pub log_path: PathBuf,
    pub exit_code: Option<i32>,
}
