use std::collections::HashMap;

use serde_json::{Map, Value};

use super::TranscriptParser;
use super::types::{Action, Event, Todo, TodoStatus, TokenCounts, Turn, UsageTotals};
use crate::protocol::types::{
    ITEM_COMPLETED, ITEM_STARTED, ITEM_UPDATED, TURN_COMPLETED, TURN_STARTED,
};

/// Item subtypes that represent a todo entry.
const TODO_ITEM_TYPES: [&str; 5] = ["todo", "todo_list", "task", "task_list", "plan"];

/// Fields tried, in order, for a todo's title.
const TITLE_FIELDS: [&str; 4] = ["title", "text", "summary", "task"];

/// Reads logs written by `codex exec --json` sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodexTranscriptParser;

impl TranscriptParser for CodexTranscriptParser {
    fn provider(&self) -> &str {
        "codex"
    }

    fn parse_todos(&self, events: &[Event]) -> Vec<Todo> {
        let mut todos: Vec<Todo> = Vec::new();
        let mut by_id: HashMap<String, usize> = HashMap::new();

        for event in events {
            let Some(item) = event.get("item").and_then(Value::as_object) else {
                continue;
            };
            let item_type = item.get("type").and_then(Value::as_str).unwrap_or_default();
            if !TODO_ITEM_TYPES.contains(&item_type) {
                continue;
            }

            let todo = Todo {
                id: normalize_id(item.get("id")),
                title: resolve_title(item),
                status: resolve_status(event_type(event), item),
                raw: item.clone(),
            };

            match todo.id.as_ref().and_then(|id| by_id.get(id)) {
                Some(&index) => merge_todo(&mut todos[index], todo),
                None => {
                    if let Some(id) = &todo.id {
                        by_id.insert(id.clone(), todos.len());
                    }
                    todos.push(todo);
                }
            }
        }
        todos
    }

    fn parse_turns(&self, events: &[Event]) -> Vec<Turn> {
        let mut turns: Vec<Turn> = Vec::new();
        let mut open = false;

        for event in events {
            match event_type(event) {
                TURN_STARTED => {
                    turns.push(Turn::new(turns.len() + 1));
                    open = true;
                }
                TURN_COMPLETED => {
                    if !open {
                        turns.push(Turn::new(turns.len() + 1));
                    }
                    if let Some(turn) = turns.last_mut() {
                        turn.usage = event
                            .get("usage")
                            .and_then(Value::as_object)
                            .map(TokenCounts::from_usage);
                    }
                    open = false;
                }
                kind @ (ITEM_STARTED | ITEM_UPDATED | ITEM_COMPLETED) => {
                    if !open {
                        turns.push(Turn::new(turns.len() + 1));
                        open = true;
                    }
                    if let Some(turn) = turns.last_mut() {
                        turn.actions.push(action(kind, event));
                    }
                }
                _ => {}
            }
        }
        turns
    }

    fn parse_usage_totals(&self, events: &[Event]) -> UsageTotals {
        let mut totals = UsageTotals::default();
        for event in events {
            if event_type(event) != TURN_COMPLETED {
                continue;
            }
            if let Some(usage) = event.get("usage").and_then(Value::as_object) {
                totals.add(TokenCounts::from_usage(usage));
            }
        }
        totals
    }
}

fn event_type(event: &Event) -> &str {
    event.get("type").and_then(Value::as_str).unwrap_or_default()
}

/// A trimmed non-empty string, or an integer rendered as a string.
fn normalize_id(id: Option<&Value>) -> Option<String> {
    match id? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

fn resolve_title(item: &Map<String, Value>) -> Option<String> {
    TITLE_FIELDS
        .iter()
        .filter_map(|field| item.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|title| !title.is_empty())
        .map(str::to_string)
}

fn resolve_status(event_type: &str, item: &Map<String, Value>) -> TodoStatus {
    item.get("status")
        .and_then(Value::as_str)
        .and_then(TodoStatus::from_label)
        .unwrap_or_else(|| TodoStatus::from_event_type(event_type))
}

fn merge_todo(existing: &mut Todo, incoming: Todo) {
    existing.status = existing.status.merge(incoming.status);
    if existing.title.is_none() {
        existing.title = incoming.title;
    }
    existing.raw = incoming.raw;
}

fn action(event_type: &str, event: &Event) -> Action {
    let item = event
        .get("item")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let item_type = match item.get("type") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    };
    Action {
        event_type: event_type.to_string(),
        item_type,
        item,
    }
}
