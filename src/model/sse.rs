// Decodes `text/event-stream` bodies. Chunks split lines arbitrarily, so a
// `data:` payload is only emitted once its line is complete.

use serde_json::Value;

use super::ModelError;

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every `data:` payload completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = parse_line(&line[..line.len() - 1]) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flushes a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest).into_iter().collect()
    }
}

fn parse_line(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches('\r');
    // Lines starting with ':' are comments; event/id/retry fields are unused.
    line.strip_prefix("data:")
        .map(|data| data.strip_prefix(' ').unwrap_or(data).to_string())
}

/// One decoded event from a chat-completions stream.
#[derive(Debug, PartialEq, Eq)]
pub enum CompletionEvent {
    /// A text fragment; `None` for chunks that carry no content (role
    /// announcements, finish markers).
    Delta(Option<String>),
    Done,
}

pub fn parse_event(data: &str) -> Result<CompletionEvent, ModelError> {
    if data.trim() == "[DONE]" {
        return Ok(CompletionEvent::Done);
    }

    let chunk: Value = serde_json::from_str(data)
        .map_err(|e| ModelError::Decode(format!("invalid stream chunk: {}", e)))?;

    if let Some(error) = chunk.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown upstream error");
        return Err(ModelError::Upstream(message.to_string()));
    }

    let content = chunk
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|content| content.as_str())
        .filter(|content| !content.is_empty())
        .map(str::to_string);

    Ok(CompletionEvent::Delta(content))
}
