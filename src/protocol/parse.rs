use serde_json::{Map, Value};

/// One accepted line of the agent's stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A JSON object. `line` is the text as received (minus the line ending).
    Event {
        line: String,
        object: Map<String, Value>,
    },
    /// Anything that is not a JSON object. Passed through verbatim.
    Raw(String),
}

/// Splits a byte stream into lines, carrying incomplete fragments across reads.
///
/// Bytes are buffered rather than decoded per chunk so a multi-byte UTF-8
/// character split across two reads is reassembled before decoding.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // Carried-over bytes hold no newline, so only the new chunk is searched.
        let mut search = self.pending.len();
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[search..].iter().position(|&b| b == b'\n') {
            let end = search + offset;
            lines.push(decode_line(&self.pending[start..end]));
            start = end + 1;
            search = start;
        }
        self.pending.drain(..start);
        lines
    }

    /// Flush whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = decode_line(&self.pending);
        self.pending.clear();
        (!line.trim().is_empty()).then_some(line)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Classify a single stdout line.
///
/// Returns `None` for blank lines. Lines that are not JSON objects are not an
/// error; they come back as [`Record::Raw`].
pub fn classify_line(line: &str) -> Option<Record> {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(object)) => Some(Record::Event {
            line: line.to_string(),
            object,
        }),
        _ => Some(Record::Raw(line.to_string())),
    }
}
