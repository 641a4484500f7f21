use std::io;
use std::path::PathBuf;

/// Failures that end a live session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("metadata must be a JSON object: {0}")]
    InvalidMetadata(String),
    #[error("unable to open session log {}", .path.display())]
    LogOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed writing session log {}", .path.display())]
    LogWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn {program}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed reading agent output")]
    Stream(#[source] io::Error),
    #[error("failed forwarding agent stderr")]
    Output(#[source] io::Error),
    #[error("agent exited unsuccessfully ({}); log kept at {}", describe_exit(.code), .log_path.display())]
    ProcessFailed {
        code: Option<i32>,
        log_path: PathBuf,
    },
}

#[allow(clippy::ref_option)]
fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "terminated by signal".to_string(),
    }
}

/// Failures looking up or reading a persisted transcript.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("invalid provider: {0:?}")]
    InvalidProvider(String),
    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),
    #[error("session log not found for provider {provider} and session {session_id}")]
    NotFound {
        provider: String,
        session_id: String,
    },
    #[error("failed to read session log at {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
