use std::collections::HashMap;
use std::io::{self, Write};

use crossterm::queue;
use crossterm::style::{ContentStyle, Print};
use serde::Serialize;

use super::sanitize::strip_escape_sequences;
use super::theme;
use crate::protocol::types::{
    Item, ItemEvent, ItemKind, ItemPhase, ThreadEvent, ThreadRequest, Usage,
};

/// Display configuration for the renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct RendererConfig {
    /// Style labels with ANSI colors. Off when stdout is not a terminal.
    pub color: bool,
}

/// One output line with its display role.
#[derive(Debug, Clone, PartialEq)]
enum Line {
    Header(String),
    Label(&'static str),
    Detail(String),
    Body(String),
    Error(String),
}

impl Line {
    fn text(&self) -> &str {
        match self {
            Line::Header(s) | Line::Detail(s) | Line::Body(s) | Line::Error(s) => s.as_str(),
            Line::Label(s) => *s,
        }
    }

    fn style(&self) -> Option<ContentStyle> {
        match self {
            Line::Header(_) => Some(theme::thread_header()),
            Line::Label(_) => Some(theme::label()),
            Line::Detail(_) => Some(theme::dim()),
            Line::Error(_) => Some(theme::error()),
            Line::Body(_) => None,
        }
    }
}

/// Turns decoded events into human-readable text blocks.
///
/// One renderer per session. It remembers which command executions are still
/// running so a completion that omits its command can be labelled.
pub struct Renderer<W: Write = io::Stdout> {
    /// Item id → command, between an execution's start and completion.
    pending_commands: HashMap<String, String>,
    /// Session id from the first `thread.started` / `thread.resumed`.
    session_id: Option<String>,
    config: RendererConfig,
    out: W,
}

impl<W: Write> Renderer<W> {
    pub fn with_writer(writer: W) -> Self {
        Self {
            pending_commands: HashMap::new(),
            session_id: None,
            config: RendererConfig::default(),
            out: writer,
        }
    }

    pub fn set_color(&mut self, color: bool) {
        self.config.color = color;
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Number of command executions started but not yet completed.
    pub fn pending_commands(&self) -> usize {
        self.pending_commands.len()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Render an event to the output writer.
    pub fn render_event(&mut self, event: &ThreadEvent) {
        let lines = self.event_lines(event);
        self.write_lines(&lines);
    }

    /// Render an event as plain text without writing it. Updates state the
    /// same way [`Renderer::render_event`] does.
    #[cfg(test)]
    fn format_event(&mut self, event: &ThreadEvent) -> Option<String> {
        let lines = self.event_lines(event);
        if lines.is_empty() {
            return None;
        }
        let mut text = lines.iter().map(Line::text).collect::<Vec<_>>().join("\n");
        text.push('\n');
        Some(text)
    }

    /// Echo a line that was not a JSON event.
    pub fn render_raw(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        queue!(self.out, Print(line), Print("\n")).ok();
        self.out.flush().ok();
    }

    // --- Internal ---

    fn write_lines(&mut self, lines: &[Line]) {
        if lines.is_empty() {
            return;
        }
        for line in lines {
            match line.style() {
                Some(style) if self.config.color => {
                    queue!(self.out, Print(style.apply(line.text())), Print("\n")).ok();
                }
                _ => {
                    queue!(self.out, Print(line.text()), Print("\n")).ok();
                }
            }
        }
        self.out.flush().ok();
    }

    fn event_lines(&mut self, event: &ThreadEvent) -> Vec<Line> {
        let lines = match event {
            ThreadEvent::ThreadRequest(request) => request_lines(request),
            ThreadEvent::ThreadStarted(started) => {
                self.remember_session(started.thread_id.as_deref());
                self.thread_lines("thread started")
            }
            ThreadEvent::ThreadResumed(resumed) => {
                self.remember_session(resumed.thread_id.as_deref());
                self.thread_lines("thread resumed")
            }
            ThreadEvent::TurnStarted => Vec::new(),
            ThreadEvent::TurnCompleted(completed) => {
                completed.usage().map(usage_lines).unwrap_or_default()
            }
            ThreadEvent::Item(item_event) => self.item_lines(item_event),
            ThreadEvent::Unknown { event_type, raw } => vec![
                Line::Detail(format!("event: {event_type}")),
                Line::Body(pretty(raw)),
            ],
        };
        lines
            .into_iter()
            .filter(|line| !line.text().is_empty())
            .collect()
    }

    fn remember_session(&mut self, thread_id: Option<&str>) {
        if self.session_id.is_none()
            && let Some(id) = thread_id.filter(|id| !id.is_empty())
        {
            self.session_id = Some(id.to_string());
        }
    }

    fn thread_lines(&self, header: &str) -> Vec<Line> {
        let mut lines = vec![Line::Header(header.to_string())];
        if let Some(id) = &self.session_id {
            lines.push(Line::Detail(format!("session id: {id}")));
        }
        lines
    }

    fn item_lines(&mut self, event: &ItemEvent) -> Vec<Line> {
        let item = &event.item;
        match item.kind() {
            ItemKind::Reasoning => text_block("thinking", item),
            ItemKind::AgentMessage => text_block("codex", item),
            ItemKind::CommandExecution => self.command_lines(event.phase, item),
            ItemKind::Other(subtype) => {
                let subtype = if subtype.is_empty() { "unknown" } else { subtype };
                vec![
                    Line::Detail(format!("item ({subtype}) {}", event.phase.as_str())),
                    Line::Body(pretty(&item.raw)),
                ]
            }
        }
    }

    fn command_lines(&mut self, phase: ItemPhase, item: &Item) -> Vec<Line> {
        let mut command = item.command.clone().unwrap_or_default();
        let id = item.id.as_deref().filter(|id| !id.is_empty());

        if phase == ItemPhase::Started {
            if let Some(id) = id {
                self.pending_commands.insert(id.to_string(), command.clone());
            }
            return vec![Line::Label("exec"), Line::Body(command)];
        }

        let pending = id.and_then(|id| self.pending_commands.get(id)).cloned();
        let was_started = pending.is_some();
        if command.is_empty()
            && let Some(recorded) = pending
        {
            command = recorded;
        }
        if phase == ItemPhase::Completed
            && let Some(id) = id
        {
            self.pending_commands.remove(id);
        }

        let output = strip_escape_sequences(item.aggregated_output.as_deref().unwrap_or_default());
        let output = output.trim_end_matches('\n');

        let mut lines = Vec::new();
        if phase == ItemPhase::Completed && !was_started && !command.is_empty() {
            lines.push(Line::Label("exec"));
            lines.push(Line::Body(command));
        }
        if !output.is_empty() {
            lines.push(Line::Body(output.to_string()));
        }
        if phase == ItemPhase::Completed
            && let Some(code) = item.exit_code
        {
            let text = format!("exit code: {code}");
            lines.push(if code == 0 {
                Line::Detail(text)
            } else {
                Line::Error(text)
            });
        }
        lines
    }
}

fn request_lines(request: &ThreadRequest) -> Vec<Line> {
    let mut lines = vec![Line::Header("thread request".to_string())];
    if let Some(instructions) = trimmed(request.instructions.as_deref()) {
        lines.push(Line::Body(format!("instructions: {instructions}")));
    }
    if let Some(task) = trimmed(request.task.as_deref()) {
        lines.push(Line::Body(format!("task: {task}")));
    }
    lines
}

/// `thinking` / `codex` blocks. Nothing at all when the item has no text.
fn text_block(label: &'static str, item: &Item) -> Vec<Line> {
    match trimmed(item.text.as_deref()) {
        Some(text) => vec![Line::Label(label), Line::Body(text.to_string())],
        None => Vec::new(),
    }
}

fn usage_lines(usage: Usage) -> Vec<Line> {
    let mut lines = vec![Line::Label("tokens used")];
    if let Some(input) = usage.input_tokens {
        let mut line = format!("input: {}", group_thousands(input));
        if let Some(cached) = usage.cached_input_tokens {
            line.push_str(&format!(" (cached: {})", group_thousands(cached)));
        }
        lines.push(Line::Detail(line));
    }
    if let Some(output) = usage.output_tokens {
        lines.push(Line::Detail(format!("output: {}", group_thousands(output))));
    }
    lines
}

fn trimmed(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Format a count with `,` thousands separators: `1234567` → `1,234,567`.
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
