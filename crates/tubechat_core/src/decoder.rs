use encoding_rs::{CoderResult, Decoder, UTF_8};
use engine_logging::{engine_debug, engine_warn};

use crate::event::{parse_event_line, ParsedLine, StreamEvent};

/// Incremental decoder for the newline-delimited chat event stream.
///
/// Bytes may arrive split at any point, including inside a multi-byte UTF-8
/// sequence or in the middle of a line. Only complete lines are parsed; the
/// trailing partial line stays buffered until the next chunk completes it.
pub struct EventStreamDecoder {
    utf8: Decoder,
    pending: String,
    malformed_lines: usize,
}

impl Default for EventStreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self {
            utf8: UTF_8.new_decoder_without_bom_handling(),
            pending: String::new(),
            malformed_lines: 0,
        }
    }

    /// Feeds one transport chunk and returns the events of every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.decode(chunk, false);
        self.drain_complete_lines()
    }

    /// Flushes the decoder at end of stream. A final unterminated line is
    /// complete at this point and gets parsed.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        self.decode(&[], true);
        let mut events = self.drain_complete_lines();
        if !self.pending.is_empty() {
            let last = std::mem::take(&mut self.pending);
            self.parse_into(&last, &mut events);
        }
        events
    }

    /// Number of `data:` lines skipped because their payload was not valid JSON.
    pub fn malformed_lines(&self) -> usize {
        self.malformed_lines
    }

    /// Text buffered after the last newline.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    fn decode(&mut self, mut bytes: &[u8], last: bool) {
        loop {
            let needed = self
                .utf8
                .max_utf8_buffer_length(bytes.len())
                .unwrap_or(bytes.len().saturating_mul(3).saturating_add(4));
            self.pending.reserve(needed);
            let (result, read, _had_errors) =
                self.utf8.decode_to_string(bytes, &mut self.pending, last);
            bytes = &bytes[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
    }

    fn drain_complete_lines(&mut self) -> Vec<StreamEvent> {
        let Some(last_newline) = self.pending.rfind('\n') else {
            return Vec::new();
        };
        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        let mut events = Vec::new();
        for line in complete.lines() {
            self.parse_into(line, &mut events);
        }
        events
    }

    fn parse_into(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        match parse_event_line(line) {
            ParsedLine::Event(StreamEvent::Unknown) => {
                engine_debug!("Skipping stream event of unknown type: {}", line);
            }
            ParsedLine::Event(event) => events.push(event),
            ParsedLine::Ignored => {}
            ParsedLine::Malformed { payload, reason } => {
                self.malformed_lines += 1;
                engine_warn!(
                    "Skipping malformed stream line ({}): payload_len={} payload={}",
                    reason,
                    payload.len(),
                    payload
                );
            }
        }
    }
}
