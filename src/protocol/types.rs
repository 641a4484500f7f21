use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

pub const THREAD_REQUEST: &str = "thread.request";
pub const THREAD_STARTED: &str = "thread.started";
pub const THREAD_RESUMED: &str = "thread.resumed";
pub const TURN_STARTED: &str = "turn.started";
pub const TURN_COMPLETED: &str = "turn.completed";
pub const ITEM_STARTED: &str = "item.started";
pub const ITEM_UPDATED: &str = "item.updated";
pub const ITEM_COMPLETED: &str = "item.completed";

/// A decoded event from the agent's `--json` stream.
///
/// Known kinds carry typed fields. Anything else keeps its raw object so it
/// can still be rendered and logged untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadEvent {
    ThreadRequest(ThreadRequest),
    ThreadStarted(ThreadStarted),
    ThreadResumed(ThreadStarted),
    TurnStarted,
    TurnCompleted(TurnCompleted),
    Item(ItemEvent),
    Unknown {
        event_type: String,
        raw: Map<String, Value>,
    },
}

/// Synthetic event describing what the session was asked to do.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ThreadRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub instructions: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub task: Option<String>,
}

/// Payload shared by `thread.started` and `thread.resumed`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ThreadStarted {
    #[serde(default, deserialize_with = "lenient_string")]
    pub thread_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub initial_user_input: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TurnCompleted {
    #[serde(default)]
    usage: Option<Value>,
}

impl TurnCompleted {
    /// Token usage, or `None` when the payload is missing or an empty object.
    pub fn usage(&self) -> Option<Usage> {
        match &self.usage {
            Some(Value::Object(map)) if !map.is_empty() => {
                Usage::deserialize(Value::Object(map.clone())).ok()
            }
            _ => None,
        }
    }
}

/// Token counts reported on `turn.completed`. Each field is optional because
/// the agent omits counters it does not track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub input_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub cached_input_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub output_tokens: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemPhase {
    Started,
    Updated,
    Completed,
}

impl ItemPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemPhase::Started => "started",
            ItemPhase::Updated => "updated",
            ItemPhase::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemEvent {
    pub phase: ItemPhase,
    pub item: Item,
}

/// A thread item (reasoning, agent message, command execution, todo, ...).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Item {
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub item_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub command: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub aggregated_output: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub exit_code: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
    /// The item object exactly as received.
    #[serde(skip)]
    pub raw: Value,
}

/// Item subtypes the renderer treats specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind<'a> {
    Reasoning,
    AgentMessage,
    CommandExecution,
    Other(&'a str),
}

impl Item {
    fn from_value(value: Option<&Value>) -> Self {
        let raw = value.cloned().unwrap_or_else(|| Value::Object(Map::new()));
        let mut item = match &raw {
            Value::Object(_) => Item::deserialize(&raw).unwrap_or_default(),
            _ => Item::default(),
        };
        item.raw = raw;
        item
    }

    pub fn kind(&self) -> ItemKind<'_> {
        match self.item_type.as_deref().unwrap_or_default() {
            "reasoning" => ItemKind::Reasoning,
            "agent_message" => ItemKind::AgentMessage,
            "command_execution" => ItemKind::CommandExecution,
            other => ItemKind::Other(other),
        }
    }
}

impl ThreadEvent {
    /// Decode a JSON object into a typed event, falling back to `Unknown` when
    /// the type is unrecognized or its fields cannot be read.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let event_type = object
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let value = Value::Object(object.clone());
        let decoded = match event_type {
            THREAD_REQUEST => ThreadRequest::deserialize(&value)
                .ok()
                .map(ThreadEvent::ThreadRequest),
            THREAD_STARTED => ThreadStarted::deserialize(&value)
                .ok()
                .map(ThreadEvent::ThreadStarted),
            THREAD_RESUMED => ThreadStarted::deserialize(&value)
                .ok()
                .map(ThreadEvent::ThreadResumed),
            TURN_STARTED => Some(ThreadEvent::TurnStarted),
            TURN_COMPLETED => TurnCompleted::deserialize(&value)
                .ok()
                .map(ThreadEvent::TurnCompleted),
            ITEM_STARTED => Some(item_event(ItemPhase::Started, object)),
            ITEM_UPDATED => Some(item_event(ItemPhase::Updated, object)),
            ITEM_COMPLETED => Some(item_event(ItemPhase::Completed, object)),
            _ => None,
        };
        decoded.unwrap_or_else(|| ThreadEvent::Unknown {
            event_type: event_type.to_string(),
            raw: object.clone(),
        })
    }
}

fn item_event(phase: ItemPhase, object: &Map<String, Value>) -> ThreadEvent {
    ThreadEvent::Item(ItemEvent {
        phase,
        item: Item::from_value(object.get("item")),
    })
}

/// Read a string-ish field: strings pass through, numbers and booleans are
/// stringified, everything else is treated as absent.
fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
