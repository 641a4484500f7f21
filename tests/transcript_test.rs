#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::fs;
use std::path::Path;

use agent_relay::commands::transcript::{TranscriptView, transcript};
use agent_relay::error::TranscriptError;
use agent_relay::transcript::TranscriptParser;
use agent_relay::transcript::service::TranscriptService;
use agent_relay::transcript::types::{Event, Todo, TodoStatus, TokenCounts, Turn, UsageTotals};
use serde_json::{Value, json};
use tempfile::TempDir;

/// Write a codex session log the way a two-turn run leaves it.
fn seed_codex_session(dir: &Path, session_id: &str) -> Vec<Value> {
    let events = vec![
        json!({"type": "workspace", "provider": "codex"}),
        json!({"type": "thread.started", "thread_id": session_id}),
        json!({"type": "turn.started"}),
        json!({"type": "item.started", "item": {"type": "todo", "id": "todo-1", "title": "Install dependencies"}}),
        json!({"type": "item.completed", "item": {"type": "todo", "id": "todo-1", "title": "Install dependencies", "status": "done"}}),
        json!({"type": "item.started", "item": {"type": "command_execution", "id": "cmd-1", "command": "cargo clippy"}}),
        json!({"type": "item.completed", "item": {"type": "command_execution", "id": "cmd-1", "command": "cargo clippy", "exit_code": 0}}),
        json!({"type": "turn.completed", "usage": {"input_tokens": 12, "cached_input_tokens": 2, "output_tokens": 4}}),
        json!({"type": "turn.started"}),
        json!({"type": "item.started", "item": {"type": "todo", "id": "todo-2", "title": "Write tests for parser", "status": "in_progress"}}),
        json!({"type": "item.updated", "item": {"type": "todo", "id": "todo-2", "title": "Write tests for parser", "status": "in processing"}}),
        json!({"type": "turn.completed", "usage": {"input_tokens": 15, "output_tokens": 7}}),
    ];

    let codex = dir.join("codex");
    fs::create_dir_all(&codex).unwrap();
    let lines: Vec<String> = events.iter().map(Value::to_string).collect();
    fs::write(codex.join(format!("{session_id}.jsonl")), lines.join("\n")).unwrap();
    events
}

#[test]
fn full_transcript_returns_decoded_events() {
    let dir = TempDir::new().unwrap();
    let events = seed_codex_session(dir.path(), "thread-history");
    let service = TranscriptService::new(dir.path());

    let transcript = service.full_transcript("codex", "thread-history").unwrap();

    let transcript: Vec<Value> = transcript.into_iter().map(Value::Object).collect();
    assert_eq!(transcript, events);
}

#[test]
fn todo_list_tracks_status_progression() {
    let dir = TempDir::new().unwrap();
    seed_codex_session(dir.path(), "thread-todos");
    let service = TranscriptService::new(dir.path());

    let todos = service.todo_list("codex", "thread-todos").unwrap();

    assert_eq!(todos.len(), 2);
    assert_eq!(todos[0].id.as_deref(), Some("todo-1"));
    assert_eq!(todos[0].status, TodoStatus::Completed);
    assert_eq!(todos[1].id.as_deref(), Some("todo-2"));
    assert_eq!(todos[1].status, TodoStatus::InProgress);
    assert_eq!(todos[1].title.as_deref(), Some("Write tests for parser"));
    assert_eq!(todos[1].raw["status"], "in processing");
}

#[test]
fn turns_group_actions_and_usage() {
    let dir = TempDir::new().unwrap();
    seed_codex_session(dir.path(), "thread-turns");
    let service = TranscriptService::new(dir.path());

    let turns = service.turns("codex", "thread-turns").unwrap();

    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].index, 1);
    assert_eq!(turns[0].actions.len(), 4);
    assert_eq!(
        turns[0].usage,
        Some(TokenCounts {
            input_tokens: 12,
            cached_input_tokens: 2,
            output_tokens: 4
        })
    );
    assert_eq!(turns[0].actions[0].event_type, "item.started");
    assert_eq!(turns[0].actions[0].item_type, "todo");

    assert_eq!(turns[1].index, 2);
    assert_eq!(turns[1].actions.len(), 2);
    assert_eq!(
        turns[1].usage,
        Some(TokenCounts {
            input_tokens: 15,
            cached_input_tokens: 0,
            output_tokens: 7
        })
    );
}

#[test]
fn usage_totals_aggregate_all_turns() {
    let dir = TempDir::new().unwrap();
    seed_codex_session(dir.path(), "thread-usage");
    let service = TranscriptService::new(dir.path());

    assert_eq!(
        service.usage_totals("codex", "thread-usage").unwrap(),
        UsageTotals {
            input_tokens: 27,
            cached_input_tokens: 2,
            output_tokens: 11,
            total_tokens: 38
        }
    );
}

#[test]
fn provider_name_is_case_insensitive() {
    let dir = TempDir::new().unwrap();
    seed_codex_session(dir.path(), "thread-case");
    let service = TranscriptService::new(dir.path());
    assert_eq!(service.turns(" CODEX ", "thread-case").unwrap().len(), 2);
}

#[test]
fn malformed_lines_are_skipped() {
    let dir = TempDir::new().unwrap();
    let codex = dir.path().join("codex");
    fs::create_dir_all(&codex).unwrap();
    fs::write(
        codex.join("messy.jsonl"),
        "Reading prompt from stdin...\n\n[1,2]\n{\"type\":\"turn.started\"}\n{broken\n",
    )
    .unwrap();
    let service = TranscriptService::new(dir.path());

    let events = service.full_transcript("codex", "messy").unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "turn.started");
}

#[test]
fn unsupported_provider_is_rejected() {
    let dir = TempDir::new().unwrap();
    let service = TranscriptService::new(dir.path());
    let err = service.full_transcript("unknown-provider", "abc").unwrap_err();
    assert!(matches!(err, TranscriptError::UnsupportedProvider(p) if p == "unknown-provider"));
}

#[test]
fn missing_log_is_not_found() {
    let dir = TempDir::new().unwrap();
    let service = TranscriptService::new(dir.path());
    let err = service.todo_list("codex", "nope").unwrap_err();
    assert!(matches!(err, TranscriptError::NotFound { .. }));
    assert_eq!(
        err.to_string(),
        "session log not found for provider codex and session nope"
    );
}

#[test]
fn path_traversal_is_rejected() {
    let dir = TempDir::new().unwrap();
    let service = TranscriptService::new(dir.path());
    assert!(matches!(
        service.turns("codex", "../secrets"),
        Err(TranscriptError::InvalidSessionId(_))
    ));
    assert!(matches!(
        service.turns("../codex", "abc"),
        Err(TranscriptError::InvalidProvider(_))
    ));
    assert!(matches!(
        service.turns("", "abc"),
        Err(TranscriptError::InvalidProvider(_))
    ));
}

/// Counts every event as its own turn; enough to prove dispatch by provider.
struct OneTurnPerEvent;

impl TranscriptParser for OneTurnPerEvent {
    fn provider(&self) -> &str {
        "Echo"
    }

    fn parse_todos(&self, _events: &[Event]) -> Vec<Todo> {
        Vec::new()
    }

    fn parse_turns(&self, events: &[Event]) -> Vec<Turn> {
        (1..=events.len()).map(Turn::new).collect()
    }

    fn parse_usage_totals(&self, _events: &[Event]) -> UsageTotals {
        UsageTotals::default()
    }
}

#[test]
fn extra_parsers_are_dispatched_by_provider() {
    let dir = TempDir::new().unwrap();
    let echo = dir.path().join("echo");
    fs::create_dir_all(&echo).unwrap();
    fs::write(echo.join("s1.jsonl"), "{\"a\":1}\n{\"b\":2}\n{\"c\":3}\n").unwrap();

    let service = TranscriptService::new(dir.path())
        .with_parser(OneTurnPerEvent)
        .unwrap();

    assert_eq!(service.turns("echo", "s1").unwrap().len(), 3);
    assert!(service.todo_list("echo", "s1").unwrap().is_empty());
}

#[test]
fn usage_view_prints_pretty_json() {
    let dir = TempDir::new().unwrap();
    seed_codex_session(dir.path(), "thread-print");
    let service = TranscriptService::new(dir.path());
    let mut out = Vec::new();

    transcript(&service, TranscriptView::Usage, "codex", "thread-print", &mut out).unwrap();

    insta::assert_snapshot!(String::from_utf8(out).unwrap(), @r#"
    {
      "input_tokens": 27,
      "cached_input_tokens": 2,
      "output_tokens": 11,
      "total_tokens": 38
    }
    "#);
}

#[test]
fn todos_view_serializes_status_names() {
    let dir = TempDir::new().unwrap();
    seed_codex_session(dir.path(), "thread-todo-view");
    let service = TranscriptService::new(dir.path());
    let mut out = Vec::new();

    transcript(&service, TranscriptView::Todos, "codex", "thread-todo-view", &mut out).unwrap();

    let printed: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(printed[0]["status"], "completed");
    assert_eq!(printed[1]["status"], "in_progress");
    assert_eq!(printed[1]["raw"]["id"], "todo-2");
}
