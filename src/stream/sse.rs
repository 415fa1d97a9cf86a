//! Line-oriented SSE reassembly.
//!
//! Bytes arrive in chunks with arbitrary boundaries, possibly splitting a
//! line or a multi-byte UTF-8 character. [`SseLineBuffer`] decodes them
//! incrementally and yields the payload of every complete `data:` line.
use memchr::memchr_iter;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Incremental SSE line buffer.
///
/// Only `data:` lines matter to the chat dialects: `event:`, `id:`, `retry:`,
/// comments and blank lines are skipped, as is the `[DONE]` sentinel.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: String,
    read_offset: usize,
    utf8_tail: Vec<u8>,
}

impl SseLineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw chunk and return the data payloads it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        self.feed_into(chunk, &mut out);
        out
    }

    /// Feed a raw chunk and append completed data payloads into `out`.
    pub fn feed_into(&mut self, chunk: &[u8], out: &mut Vec<String>) {
        if self.utf8_tail.is_empty() {
            self.push_utf8(chunk);
        } else {
            let mut joined = std::mem::take(&mut self.utf8_tail);
            joined.extend_from_slice(chunk);
            self.push_utf8(&joined);
        }

        let mut processed_up_to = self.read_offset;
        let scan_start = processed_up_to;
        let bytes = self.buffer.as_bytes();
        for rel_pos in memchr_iter(b'\n', &bytes[scan_start..]) {
            let line_end = scan_start + rel_pos;
            if let Some(payload) = data_payload(&self.buffer[processed_up_to..line_end]) {
                out.push(payload.to_owned());
            }
            processed_up_to = line_end + 1;
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }

    /// Flush an unterminated final line at end of stream.
    pub fn finish_into(&mut self, out: &mut Vec<String>) {
        if !self.utf8_tail.is_empty() {
            let tail = std::mem::take(&mut self.utf8_tail);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        if let Some(payload) = data_payload(&self.buffer[self.read_offset..]) {
            out.push(payload.to_owned());
        }
        self.buffer.clear();
        self.read_offset = 0;
    }

    fn push_utf8(&mut self, mut bytes: &[u8]) {
        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    self.buffer
                        .push_str(std::str::from_utf8(&bytes[..valid_up_to]).unwrap_or_default());
                    match err.error_len() {
                        Some(invalid_len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            bytes = &bytes[valid_up_to + invalid_len..];
                        }
                        None => {
                            // Incomplete character at the chunk boundary.
                            self.utf8_tail.extend_from_slice(&bytes[valid_up_to..]);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Extract the payload of a `data:` line, skipping the `[DONE]` sentinel.
fn data_payload(line: &str) -> Option<&str> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let value = line.strip_prefix(DATA_PREFIX)?;
    let value = value.strip_prefix(' ').unwrap_or(value);
    if value.trim() == DONE_SENTINEL {
        return None;
    }
    Some(value)
}
