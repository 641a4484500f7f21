//! Bookkeeping added to the event stream before it is logged.
//!
//! The enricher emits one synthetic `thread.request` describing the task,
//! remembers the task text as the stream reveals it, and backfills
//! `initial_user_input` on `thread.started` / `thread.resumed` when the agent
//! leaves it out.

use serde_json::{Map, Value};

use super::state::SessionRequest;
use crate::config::Templates;
use crate::protocol::types::{Item, ItemEvent, THREAD_REQUEST, ThreadEvent};

pub const TASK_PLACEHOLDER: &str = "{TASK}";
pub const INSTRUCTIONS_PLACEHOLDER: &str = "{INSTRUCTIONS}";

/// Joins the instructions and task when both go into one prompt.
pub const PROMPT_SEPARATOR: &str = "\n\n";

const INITIAL_USER_INPUT: &str = "initial_user_input";

/// Keys of the synthetic request that metadata may not replace.
const RESERVED_KEYS: [&str; 5] = [
    "type",
    "instructions",
    "task",
    "instructions_template",
    "task_template",
];

#[derive(Debug, Clone)]
pub struct Enricher {
    /// Caller-supplied values, before templating.
    task_input: Option<String>,
    instructions_input: Option<String>,
    templates: Templates,
    metadata: Map<String, Value>,
    /// Best-known task, updated from the stream.
    captured_task: Option<String>,
    request_emitted: bool,
    input_applied: bool,
}

impl Enricher {
    pub fn new(request: &SessionRequest, templates: &Templates) -> Self {
        let task_input = non_empty(request.task.as_deref());
        let instructions_input = non_empty(request.instructions.as_deref());
        Self {
            captured_task: task_input.clone(),
            task_input,
            instructions_input,
            templates: templates.clone(),
            metadata: request.metadata.clone(),
            request_emitted: false,
            input_applied: false,
        }
    }

    pub fn rendered_task(&self) -> Option<String> {
        render_template(
            self.templates.task.as_deref(),
            TASK_PLACEHOLDER,
            self.task_input.as_deref(),
        )
    }

    pub fn rendered_instructions(&self) -> Option<String> {
        render_template(
            self.templates.instructions.as_deref(),
            INSTRUCTIONS_PLACEHOLDER,
            self.instructions_input.as_deref(),
        )
    }

    /// The prompt handed to the agent: instructions, then the task.
    pub fn combined_prompt(&self) -> Option<String> {
        match (self.rendered_instructions(), self.rendered_task()) {
            (Some(instructions), Some(task)) => {
                Some(format!("{instructions}{PROMPT_SEPARATOR}{task}"))
            }
            (instructions, task) => instructions.or(task),
        }
    }

    /// Build the synthetic `thread.request` event, at most once per session.
    ///
    /// Returns `None` when it was already emitted (or seen in the stream) or
    /// when there is neither a task nor instructions to describe.
    pub fn request_event(&mut self) -> Option<Map<String, Value>> {
        if self.request_emitted {
            return None;
        }
        let instructions = self.rendered_instructions();
        let task = self.rendered_task();
        if instructions.is_none() && task.is_none() {
            return None;
        }

        let mut event = Map::new();
        event.insert("type".into(), Value::from(THREAD_REQUEST));
        event.insert("instructions".into(), instructions.map_or(Value::Null, Value::from));
        event.insert("task".into(), task.map_or(Value::Null, Value::from));
        if let Some(template) = &self.templates.instructions {
            event.insert("instructions_template".into(), Value::from(template.as_str()));
        }
        if let Some(template) = &self.templates.task {
            event.insert("task_template".into(), Value::from(template.as_str()));
        }
        for (key, value) in &self.metadata {
            if !RESERVED_KEYS.contains(&key.as_str()) {
                event.insert(key.clone(), value.clone());
            }
        }

        self.request_emitted = true;
        Some(event)
    }

    /// Capture what the event reveals and backfill `initial_user_input`.
    ///
    /// Returns `true` if `event` was modified and must be re-encoded.
    pub fn enrich(&mut self, event: &mut Map<String, Value>) -> bool {
        let decoded = ThreadEvent::from_object(event);
        self.capture(&decoded);

        let (ThreadEvent::ThreadStarted(started) | ThreadEvent::ThreadResumed(started)) = &decoded
        else {
            return false;
        };
        if non_empty(started.initial_user_input.as_deref()).is_some() {
            self.input_applied = true;
            return false;
        }
        if self.input_applied {
            return false;
        }
        let Some(task) = self.captured_task.clone() else {
            return false;
        };
        event.insert(INITIAL_USER_INPUT.into(), Value::from(task));
        self.input_applied = true;
        true
    }

    fn capture(&mut self, event: &ThreadEvent) {
        if let ThreadEvent::ThreadRequest(request) = event {
            if let Some(task) = non_empty(request.task.as_deref()) {
                self.captured_task = Some(task);
            }
            self.request_emitted = true;
            return;
        }

        if self.captured_task.is_some() {
            return;
        }

        match event {
            ThreadEvent::ThreadStarted(started) | ThreadEvent::ThreadResumed(started) => {
                self.captured_task = non_empty(started.initial_user_input.as_deref());
            }
            ThreadEvent::Item(ItemEvent { item, .. }) if looks_like_user(item) => {
                self.captured_task = user_text(item);
            }
            _ => {}
        }
    }
}

/// Substitute `value` for `placeholder` in `template`.
///
/// A template without the placeholder is used verbatim. Without a template
/// the value itself is the result. Blank results are `None`.
pub fn render_template(
    template: Option<&str>,
    placeholder: &str,
    value: Option<&str>,
) -> Option<String> {
    let value = value.map(str::trim).filter(|v| !v.is_empty());
    let rendered = match template.filter(|t| !t.trim().is_empty()) {
        Some(template) if template.contains(placeholder) => {
            template.replace(placeholder, value?)
        }
        Some(template) => template.to_string(),
        None => value?.to_string(),
    };
    non_empty(Some(&rendered))
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn looks_like_user(item: &Item) -> bool {
    item.role.as_deref() == Some("user")
        || item
            .item_type
            .as_deref()
            .is_some_and(|t| t.contains("user"))
}

/// Text authored by the user: the `text` field, else the text parts of
/// `content` joined by newlines.
fn user_text(item: &Item) -> Option<String> {
    if let Some(text) = non_empty(item.text.as_deref()) {
        return Some(text);
    }
    let parts: Vec<&str> = item
        .content
        .as_ref()?
        .as_array()?
        .iter()
        .filter(|part| {
            matches!(
                part.get("type").and_then(Value::as_str),
                None | Some("" | "text" | "input_text")
            )
        })
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        map
    }

    fn request(task: Option<&str>, instructions: Option<&str>) -> SessionRequest {
        SessionRequest {
            task: task.map(str::to_string),
            instructions: instructions.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn render_template_substitutes_placeholder() {
        assert_eq!(
            render_template(Some("Task: {TASK}"), TASK_PLACEHOLDER, Some(" fix it ")),
            Some("Task: fix it".to_string())
        );
    }

    #[test]
    fn render_template_without_placeholder_is_verbatim() {
        assert_eq!(
            render_template(Some("Always lint."), INSTRUCTIONS_PLACEHOLDER, Some("ignored")),
            Some("Always lint.".to_string())
        );
        assert_eq!(
            render_template(Some("Always lint."), INSTRUCTIONS_PLACEHOLDER, None),
            Some("Always lint.".to_string())
        );
    }

    #[test]
    fn render_template_needs_value_for_placeholder() {
        assert_eq!(render_template(Some("Task: {TASK}"), TASK_PLACEHOLDER, None), None);
        assert_eq!(render_template(None, TASK_PLACEHOLDER, Some("  ")), None);
        assert_eq!(
            render_template(None, TASK_PLACEHOLDER, Some("plain")),
            Some("plain".to_string())
        );
    }

    #[test]
    fn combined_prompt_puts_instructions_first() {
        let enricher = Enricher::new(&request(Some("ship it"), Some("be careful")), &Templates::default());
        assert_eq!(
            enricher.combined_prompt().as_deref(),
            Some("be careful\n\nship it")
        );
        let task_only = Enricher::new(&request(Some("ship it"), None), &Templates::default());
        assert_eq!(task_only.combined_prompt().as_deref(), Some("ship it"));
        let nothing = Enricher::new(&request(None, None), &Templates::default());
        assert!(nothing.combined_prompt().is_none());
    }

    #[test]
    fn request_event_carries_rendered_and_raw_values() {
        let templates = Templates {
            task: Some("Task: {TASK}".to_string()),
            instructions: None,
        };
        let mut req = request(Some("write tests"), Some("be brief"));
        req.metadata = object(json!({"ticket": "T-1", "type": "hijack"}));
        let mut enricher = Enricher::new(&req, &templates);

        let event = enricher.request_event().unwrap();
        assert_eq!(
            Value::Object(event),
            json!({
                "type": "thread.request",
                "instructions": "be brief",
                "task": "Task: write tests",
                "task_template": "Task: {TASK}",
                "ticket": "T-1"
            })
        );
        assert!(enricher.request_event().is_none());
    }

    #[test]
    fn template_alone_can_produce_request() {
        let templates = Templates {
            task: None,
            instructions: Some("Follow the style guide.".to_string()),
        };
        let mut enricher = Enricher::new(&SessionRequest::default(), &templates);
        let event = enricher.request_event().unwrap();
        assert_eq!(event["instructions"], "Follow the style guide.");
        assert_eq!(event["task"], Value::Null);
    }

    #[test]
    fn no_request_without_task_or_instructions() {
        let mut enricher = Enricher::new(&SessionRequest::default(), &Templates::default());
        assert!(enricher.request_event().is_none());
    }

    #[test]
    fn request_seen_in_stream_suppresses_synthesis() {
        let mut enricher = Enricher::new(&request(Some("a"), None), &Templates::default());
        let mut event = object(json!({"type": "thread.request", "task": "from stream"}));
        assert!(!enricher.enrich(&mut event));
        assert_eq!(enricher.captured_task.as_deref(), Some("from stream"));
        assert!(enricher.request_event().is_none());
    }

    #[test]
    fn thread_started_gets_captured_task() {
        let mut enricher = Enricher::new(&request(Some("list files"), None), &Templates::default());
        let mut event = object(json!({"type": "thread.started", "thread_id": "t1"}));
        assert!(enricher.enrich(&mut event));
        assert_eq!(event["initial_user_input"], "list files");
        assert_eq!(event["thread_id"], "t1");
    }

    #[test]
    fn existing_initial_input_is_never_overwritten() {
        let mut enricher = Enricher::new(&request(Some("mine"), None), &Templates::default());
        for _ in 0..2 {
            let mut event = object(json!({"type": "thread.started", "initial_user_input": "theirs"}));
            assert!(!enricher.enrich(&mut event));
            assert_eq!(event["initial_user_input"], "theirs");
        }
    }

    #[test]
    fn injection_happens_once() {
        let mut enricher = Enricher::new(&request(Some("once"), None), &Templates::default());
        let mut first = object(json!({"type": "thread.started"}));
        let mut second = object(json!({"type": "thread.resumed"}));
        assert!(enricher.enrich(&mut first));
        assert!(!enricher.enrich(&mut second));
        assert!(second.get("initial_user_input").is_none());
    }

    #[test]
    fn resumed_thread_is_backfilled() {
        let mut enricher = Enricher::new(&request(Some("continue"), None), &Templates::default());
        let mut event = object(json!({"type": "thread.resumed", "thread_id": "t1"}));
        assert!(enricher.enrich(&mut event));
        assert_eq!(event["initial_user_input"], "continue");
    }

    #[test]
    fn task_captured_from_thread_started() {
        let mut enricher = Enricher::new(&SessionRequest::default(), &Templates::default());
        let mut event = object(json!({"type": "thread.started", "initial_user_input": " hi "}));
        enricher.enrich(&mut event);
        assert_eq!(enricher.captured_task.as_deref(), Some("hi"));
    }

    #[test]
    fn task_captured_from_user_item_content() {
        let mut enricher = Enricher::new(&SessionRequest::default(), &Templates::default());
        let mut item = object(json!({
            "type": "item.completed",
            "item": {
                "type": "message",
                "role": "user",
                "content": [
                    {"type": "input_text", "text": "first"},
                    {"type": "image", "text": "skip me"},
                    {"text": "second"},
                    "not an object"
                ]
            }
        }));
        assert!(!enricher.enrich(&mut item));
        assert_eq!(enricher.captured_task.as_deref(), Some("first\nsecond"));

        let mut started = object(json!({"type": "thread.started"}));
        assert!(enricher.enrich(&mut started));
        assert_eq!(started["initial_user_input"], "first\nsecond");
    }

    #[test]
    fn task_captured_from_user_typed_item_text() {
        let mut enricher = Enricher::new(&SessionRequest::default(), &Templates::default());
        let mut item = object(json!({
            "type": "item.completed",
            "item": {"type": "user_message", "text": "do the thing"}
        }));
        enricher.enrich(&mut item);
        assert_eq!(enricher.captured_task.as_deref(), Some("do the thing"));
    }

    #[test]
    fn agent_items_are_not_captured() {
        let mut enricher = Enricher::new(&SessionRequest::default(), &Templates::default());
        let mut item = object(json!({
            "type": "item.completed",
            "item": {"type": "agent_message", "text": "I did it"}
        }));
        enricher.enrich(&mut item);
        assert!(enricher.captured_task.as_deref().is_none());
    }

    #[test]
    fn caller_task_wins_over_later_events() {
        let mut enricher = Enricher::new(&request(Some("original"), None), &Templates::default());
        let mut item = object(json!({
            "type": "item.completed",
            "item": {"type": "user_message", "text": "later"}
        }));
        enricher.enrich(&mut item);
        assert_eq!(enricher.captured_task.as_deref(), Some("original"));
    }
}
