//! Decoder for the chat-completions event stream.
//!
//! The wire format is newline-delimited text:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hi"}}]}
//! data: {"choices":[{"delta":{"content":" there"}}]}
//! data: [DONE]
//! ```
//!
//! Lines without the `data:` prefix (comments, `event:`, `id:`, blank
//! separators) carry nothing for us and are ignored.

use serde::Deserialize;

/// Payload that marks the end of the answer.
pub const TERMINATOR: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental answer text. May be empty (role-only or finish chunks).
    Delta(String),
    Terminator,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("event line is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("event payload is not a delta envelope: {0}")]
    Json(#[from] serde_json::Error),
}

/// Byte residue carried across chunk boundaries.
///
/// Chunks are arbitrary slices of the body, so a line (or a multi-byte
/// character) may be split between them. Holds at most one partial line.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every line it completes, without terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line = self.buf.drain(..=pos).collect::<Vec<u8>>();
            line.pop();
            if line.ends_with(b"\r") {
                line.pop();
            }
            out.push(line);
        }

        out
    }

    /// Take the unterminated tail left once the body has ended.
    pub fn take_rest(&mut self) -> Option<Vec<u8>> {
        if self.buf.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.buf);
        if line.ends_with(b"\r") {
            line.pop();
        }
        Some(line)
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[derive(Debug, Deserialize)]
struct ChunkEnvelope {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// Decode one complete line.
///
/// Returns `None` for lines that are not data lines.
pub fn decode_line(line: &[u8]) -> Option<Result<StreamEvent, DecodeError>> {
    let rest = line.strip_prefix(b"data:")?;
    let rest = rest.strip_prefix(b" ").unwrap_or(rest);
    Some(decode_payload(rest))
}

fn decode_payload(payload: &[u8]) -> Result<StreamEvent, DecodeError> {
    let payload = std::str::from_utf8(payload)?;
    if payload == TERMINATOR {
        return Ok(StreamEvent::Terminator);
    }

    let envelope: ChunkEnvelope = serde_json::from_str(payload)?;
    let text = envelope
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .unwrap_or_default();
    Ok(StreamEvent::Delta(text))
}
