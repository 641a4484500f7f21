//! Stripping of terminal control sequences from text bound for the terminal.

use std::sync::LazyLock;

use regex::Regex;

/// CSI (`ESC [ ... final`), OSC (`ESC ] ... BEL|ESC \`), two-byte Fe escapes,
/// and the shift-out/shift-in control bytes.
#[allow(clippy::expect_used)]
static ESCAPE_SEQUENCES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\x1b\[[0-9;?]*[ -/]*[@-~]",
        r"|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)",
        r"|\x1b[@-Z\\-_]",
        r"|[\x0e\x0f]",
    ))
    .expect("escape sequence pattern is valid")
});

/// Remove escape sequences and normalize line endings to `\n`.
pub fn strip_escape_sequences(text: &str) -> String {
    let stripped = ESCAPE_SEQUENCES.replace_all(text, "");
    stripped.replace("\r\n", "\n").replace('\r', "")
}

/// Longest unfinished escape sequence held back between chunks.
const MAX_HELD: usize = 256;

/// Sanitizes a stream chunk by chunk, without waiting for line ends.
///
/// Only a trailing fragment that may still complete (an unfinished escape
/// sequence, a lone `\r`, a split UTF-8 character) is carried to the next
/// chunk.
#[derive(Debug, Default)]
pub struct StreamSanitizer {
    pending: Vec<u8>,
}

impl StreamSanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitize everything in `chunk` that can no longer change.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let ready = self.pending.len() - self.held_len();
        let bytes: Vec<u8> = self.pending.drain(..ready).collect();
        strip_escape_sequences(&String::from_utf8_lossy(&bytes))
    }

    /// Sanitize whatever was held back once the stream has ended.
    pub fn finish(&mut self) -> String {
        let bytes = std::mem::take(&mut self.pending);
        strip_escape_sequences(&String::from_utf8_lossy(&bytes))
    }

    fn held_len(&self) -> usize {
        let bytes = &self.pending;
        let window = bytes.len().saturating_sub(MAX_HELD);
        if let Some(start) =
            (window..bytes.len()).find(|&i| bytes[i] == 0x1b && is_escape_prefix(&bytes[i..]))
        {
            return bytes.len() - start;
        }
        if bytes.last() == Some(&b'\r') {
            return 1;
        }
        split_utf8_len(bytes)
    }
}

/// Whether `tail` (starting at ESC) is an escape sequence still missing its end.
fn is_escape_prefix(tail: &[u8]) -> bool {
    match tail {
        [0x1b] => true,
        [0x1b, b'[', rest @ ..] => rest
            .iter()
            .all(|&b| matches!(b, b'0'..=b'9' | b';' | b'?' | b' '..=b'/')),
        [0x1b, b']', rest @ ..] => match rest.iter().position(|&b| b == 0x07 || b == 0x1b) {
            None => true,
            Some(i) => rest[i] == 0x1b && i + 1 == rest.len(),
        },
        _ => false,
    }
}

/// Length of an incomplete UTF-8 character at the end of `bytes`.
fn split_utf8_len(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let b = bytes[bytes.len() - back];
        if b & 0xC0 == 0x80 {
            continue;
        }
        let width = match b {
            0xF0.. => 4,
            0xE0.. => 3,
            0xC0.. => 2,
            _ => 1,
        };
        return if width > back { back } else { 0 };
    }
    0
}
