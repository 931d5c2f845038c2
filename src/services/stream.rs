use axum::response::sse::Event;
use serde_json::Value;

/// Marker prefixing a JSON payload inside the frame stream.
pub const STRUCTURED_MARKER: &str = "[STRUCTURED]";
/// Terminal marker; always the last frame of a reply.
pub const DONE_MARKER: &str = "[DONE]";

/// One frame of a streamed chat reply.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Plain prose shown to the user as it arrives.
    Text(String),
    /// A JSON payload the client renders as a widget.
    Structured(Value),
    /// End of reply.
    Done,
}

impl StreamFrame {
    /// Wire encoding of the frame payload.
    pub fn encode(&self) -> String {
        match self {
            StreamFrame::Text(text) => text.clone(),
            StreamFrame::Structured(value) => format!("{}{}", STRUCTURED_MARKER, value),
            StreamFrame::Done => DONE_MARKER.to_string(),
        }
    }

    pub fn into_event(self) -> Event {
        Event::default().data(self.encode())
    }
}

/// Incremental decoder for a frame stream. Chunk boundaries carry no meaning,
/// so markers may arrive split across chunks; the decoder buffers until each
/// marker (and, for `[STRUCTURED]`, its complete JSON value) is unambiguous.
#[derive(Debug, Default)]
pub struct ReplyDecoder {
    buffer: String,
    done: bool,
}

impl ReplyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every frame completed by it.
    pub fn feed(&mut self, chunk: &str) -> Vec<StreamFrame> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();
        loop {
            if self.done || self.buffer.is_empty() {
                break;
            }
            if let Some(pos) = self.buffer.find(STRUCTURED_MARKER).into_iter().chain(self.buffer.find(DONE_MARKER)).min() {
                if pos > 0 {
                    let text: String = self.buffer.drain(..pos).collect();
                    frames.push(StreamFrame::Text(text));
                    continue;
                }
                if self.buffer.starts_with(DONE_MARKER) {
                    self.buffer.drain(..DONE_MARKER.len());
                    self.done = true;
                    frames.push(StreamFrame::Done);
                    continue;
                }
                // Structured frame: need the full JSON value before emitting.
                // Only container payloads are valid after the marker; anything
                // else is passed through as text so the buffer never wedges.
                match self.buffer.as_bytes().get(STRUCTURED_MARKER.len()).copied() {
                    None => break,
                    Some(b'{') | Some(b'[') => {
                        match complete_json(&self.buffer[STRUCTURED_MARKER.len()..]) {
                            Some((value, consumed)) => {
                                self.buffer.drain(..STRUCTURED_MARKER.len() + consumed);
                                frames.push(StreamFrame::Structured(value));
                            }
                            None => break,
                        }
                    }
                    Some(_) => {
                        let text: String = self.buffer.drain(..STRUCTURED_MARKER.len()).collect();
                        frames.push(StreamFrame::Text(text));
                    }
                }
            } else if let Some(keep) = marker_prefix_len(&self.buffer) {
                // A marker may be arriving split across chunks; hold back the
                // suffix that could still become one.
                let emit_len = self.buffer.len() - keep;
                if emit_len > 0 {
                    let text: String = self.buffer.drain(..emit_len).collect();
                    frames.push(StreamFrame::Text(text));
                }
                break;
            } else {
                let text = std::mem::take(&mut self.buffer);
                frames.push(StreamFrame::Text(text));
            }
        }
        frames
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

// Internal helper that measures the longest buffer suffix that is a proper
// prefix of either marker.
fn marker_prefix_len(buffer: &str) -> Option<usize> {
    for marker in [STRUCTURED_MARKER, DONE_MARKER] {
        for len in (1..marker.len()).rev() {
            if buffer.ends_with(&marker[..len]) {
                return Some(len);
            }
        }
    }
    None
}

// Internal helper that scans for a balanced JSON value at the start of the
// input, returning it with the byte count consumed.
fn complete_json(input: &str) -> Option<(Value, usize)> {
    let bytes = input.as_bytes();
    if bytes.is_empty() {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let candidate = &input[..=i];
                    return serde_json::from_str(candidate).ok().map(|v| (v, i + 1));
                }
            }
            _ => {}
        }
    }
    None
}
