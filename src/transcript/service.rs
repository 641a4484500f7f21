use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;

use super::TranscriptParser;
use super::codex::CodexTranscriptParser;
use super::types::{Event, Todo, Turn, UsageTotals};
use crate::error::TranscriptError;
use crate::session::log::log_path;

/// Looks up session logs by provider and session id and hands them to the
/// matching parser.
pub struct TranscriptService {
    sessions_dir: PathBuf,
    parsers: HashMap<String, Box<dyn TranscriptParser>>,
}

impl TranscriptService {
    /// A service over `sessions_dir` that understands codex logs.
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        let mut parsers: HashMap<String, Box<dyn TranscriptParser>> = HashMap::new();
        parsers.insert(
            CodexTranscriptParser.provider().to_string(),
            Box::new(CodexTranscriptParser),
        );
        Self {
            sessions_dir: sessions_dir.into(),
            parsers,
        }
    }

    /// Register another parser, replacing any with the same provider name.
    pub fn with_parser(
        mut self,
        parser: impl TranscriptParser + 'static,
    ) -> Result<Self, TranscriptError> {
        let provider = normalize_provider(parser.provider())?;
        self.parsers.insert(provider, Box::new(parser));
        Ok(self)
    }

    pub fn full_transcript(
        &self,
        provider: &str,
        session_id: &str,
    ) -> Result<Vec<Event>, TranscriptError> {
        let (parser, events) = self.load(provider, session_id)?;
        Ok(parser.parse_events(events))
    }

    pub fn todo_list(&self, provider: &str, session_id: &str) -> Result<Vec<Todo>, TranscriptError> {
        let (parser, events) = self.load(provider, session_id)?;
        Ok(parser.parse_todos(&events))
    }

    pub fn turns(&self, provider: &str, session_id: &str) -> Result<Vec<Turn>, TranscriptError> {
        let (parser, events) = self.load(provider, session_id)?;
        Ok(parser.parse_turns(&events))
    }

    pub fn usage_totals(
        &self,
        provider: &str,
        session_id: &str,
    ) -> Result<UsageTotals, TranscriptError> {
        let (parser, events) = self.load(provider, session_id)?;
        Ok(parser.parse_usage_totals(&events))
    }

    fn load(
        &self,
        provider: &str,
        session_id: &str,
    ) -> Result<(&dyn TranscriptParser, Vec<Event>), TranscriptError> {
        let provider = normalize_provider(provider)?;
        let parser = self
            .parsers
            .get(&provider)
            .ok_or_else(|| TranscriptError::UnsupportedProvider(provider.clone()))?;
        let session_id = normalize_session_id(session_id)?;
        let events = self.read_events(&provider, &session_id)?;
        Ok((parser.as_ref(), events))
    }

    fn read_events(&self, provider: &str, session_id: &str) -> Result<Vec<Event>, TranscriptError> {
        let path = log_path(&self.sessions_dir, provider, session_id);
        if !path.is_file() {
            return Err(TranscriptError::NotFound {
                provider: provider.to_string(),
                session_id: session_id.to_string(),
            });
        }
        let content = fs::read_to_string(&path).map_err(|source| TranscriptError::Read {
            path: path.clone(),
            source,
        })?;

        let events: Vec<Event> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(event)) => Some(event),
                _ => None,
            })
            .collect();
        debug!(path = %path.display(), events = events.len(), "read session log");
        Ok(events)
    }
}

fn normalize_provider(provider: &str) -> Result<String, TranscriptError> {
    let trimmed = provider
        .trim()
        .trim_matches(['/', '\\'])
        .to_lowercase();
    if trimmed.is_empty() || is_unsafe_segment(&trimmed) {
        return Err(TranscriptError::InvalidProvider(provider.to_string()));
    }
    Ok(trimmed)
}

fn normalize_session_id(session_id: &str) -> Result<String, TranscriptError> {
    let trimmed = session_id.trim();
    if trimmed.is_empty() || is_unsafe_segment(trimmed) {
        return Err(TranscriptError::InvalidSessionId(session_id.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Whether a path segment could escape the sessions directory.
fn is_unsafe_segment(segment: &str) -> bool {
    segment.contains("..") || segment.contains(['/', '\\'])
}
