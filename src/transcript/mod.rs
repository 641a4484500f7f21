//! Read-only analysis of persisted session logs.

pub mod codex;
pub mod service;
pub mod types;

use types::{Event, Todo, Turn, UsageTotals};

/// Provider-specific interpretation of a session log.
pub trait TranscriptParser: Send + Sync {
    /// Name of the provider directory this parser reads.
    fn provider(&self) -> &str;

    /// The events as they should be presented in a full transcript.
    fn parse_events(&self, events: Vec<Event>) -> Vec<Event> {
        events
    }

    fn parse_todos(&self, events: &[Event]) -> Vec<Todo>;

    fn parse_turns(&self, events: &[Event]) -> Vec<Turn>;

    fn parse_usage_totals(&self, events: &[Event]) -> UsageTotals;
}
