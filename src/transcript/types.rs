use serde::Serialize;
use serde_json::{Map, Value};

/// One decoded log line.
pub type Event = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Completed,
    InProgress,
    Pending,
    Unknown,
}

impl TodoStatus {
    /// Parse an explicit status. Blank input means no status was given.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        let status = match label.as_str() {
            "" => return None,
            "complete" | "completed" | "done" => Self::Completed,
            "in-progress" | "in_progress" | "in progress" | "in processing" | "processing" => {
                Self::InProgress
            }
            "pending" | "todo" | "not started" => Self::Pending,
            _ => Self::Unknown,
        };
        Some(status)
    }

    /// Status implied by the item event when the item states none.
    pub fn from_event_type(event_type: &str) -> Self {
        match event_type {
            "item.completed" => Self::Completed,
            "item.started" | "item.updated" => Self::InProgress,
            _ => Self::Unknown,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Completed => 3,
            Self::InProgress => 2,
            Self::Pending => 1,
            Self::Unknown => 0,
        }
    }

    /// The status to keep when `incoming` arrives for a todo at `self`.
    /// Progress never moves backwards; ties go to `incoming`.
    pub fn merge(self, incoming: Self) -> Self {
        if incoming.rank() >= self.rank() {
            incoming
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Todo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub status: TodoStatus,
    /// The item as last seen.
    pub raw: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenCounts {
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenCounts {
    /// Read a `usage` object. Fields that are not counts read as zero.
    pub fn from_usage(usage: &Map<String, Value>) -> Self {
        Self {
            input_tokens: count(usage.get("input_tokens")),
            cached_input_tokens: count(usage.get("cached_input_tokens")),
            output_tokens: count(usage.get("output_tokens")),
        }
    }
}

/// A token count from an integer or a numeric string.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && *f >= 0.0)
                        .map(|f| f.trunc() as u64)
                })
                .unwrap_or(0)
        }
        _ => 0,
    }
}

/// One item event inside a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub event_type: String,
    pub item_type: String,
    pub item: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    /// 1-based, in order of appearance.
    pub index: usize,
    pub actions: Vec<Action>,
    pub usage: Option<TokenCounts>,
}

impl Turn {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            actions: Vec::new(),
            usage: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    /// Input plus output. Cached input is already part of input.
    pub total_tokens: u64,
}

impl UsageTotals {
    pub fn add(&mut self, counts: TokenCounts) {
        self.input_tokens = self.input_tokens.saturating_add(counts.input_tokens);
        self.cached_input_tokens = self
            .cached_input_tokens
            .saturating_add(counts.cached_input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(counts.output_tokens);
        self.total_tokens = self.input_tokens.saturating_add(self.output_tokens);
    }
}
