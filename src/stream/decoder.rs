//! Stream decoder state machine.
//!
//! Reading → Done on end of stream, Reading → Aborted on cancellation or a
//! guard trip. Each chunk is split into SSE data payloads, every payload is
//! decoded with the profile's extractor and applied to the accumulator in
//! arrival order.
use crate::error::ChatError;
use crate::protocol::canonical::{AccumulatedMessage, StreamDelta, StreamUsage};
use crate::protocol::{decode_stream_record, ProviderProfile};

use super::guard::{GuardVerdict, MisfiledReasoningGuard};
use super::sse::SseLineBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Reading,
    Done,
    Aborted,
}

#[derive(Debug)]
pub struct StreamDecoder {
    profile: ProviderProfile,
    lines: SseLineBuffer,
    payloads: Vec<String>,
    message: AccumulatedMessage,
    guard: MisfiledReasoningGuard,
    state: DecoderState,
    held_back: bool,
    stop_reason: Option<String>,
    usage: StreamUsage,
    skipped_records: u64,
}

impl StreamDecoder {
    /// The guard only ever applies to the OpenAI delta channel; for other
    /// profiles it is disarmed here.
    #[must_use]
    pub fn new(profile: ProviderProfile, mut guard: MisfiledReasoningGuard) -> Self {
        if profile != ProviderProfile::OpenAi {
            guard.disarm();
        }
        Self {
            profile,
            lines: SseLineBuffer::new(),
            payloads: Vec::new(),
            message: AccumulatedMessage::new(),
            guard,
            state: DecoderState::Reading,
            held_back: false,
            stop_reason: None,
            usage: StreamUsage::default(),
            skipped_records: 0,
        }
    }

    /// Feed one body chunk.
    ///
    /// Returns `true` when the accumulator changed in a way that should be
    /// surfaced to the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::MisfiledReasoning`] when the guard trips. Malformed
    /// records are logged and skipped, never returned.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<bool, ChatError> {
        if self.state != DecoderState::Reading {
            return Ok(false);
        }
        let mut payloads = std::mem::take(&mut self.payloads);
        self.lines.feed_into(chunk, &mut payloads);
        let surfaced = self.process(&payloads);
        payloads.clear();
        self.payloads = payloads;
        surfaced
    }

    /// Process the unterminated tail and move to `Done`.
    ///
    /// Content still held back by an undecided guard is released here.
    ///
    /// # Errors
    ///
    /// Same as [`StreamDecoder::feed`].
    pub fn finish(&mut self) -> Result<bool, ChatError> {
        if self.state != DecoderState::Reading {
            return Ok(false);
        }
        let mut payloads = Vec::new();
        self.lines.finish_into(&mut payloads);
        let surfaced = self.process(&payloads)?;
        self.state = DecoderState::Done;
        let released = std::mem::take(&mut self.held_back);
        Ok(surfaced || released)
    }

    /// Stop applying deltas. Used on cancellation.
    pub fn abort(&mut self) {
        self.state = DecoderState::Aborted;
    }

    #[must_use]
    pub fn state(&self) -> DecoderState {
        self.state
    }

    #[must_use]
    pub fn profile(&self) -> ProviderProfile {
        self.profile
    }

    #[must_use]
    pub fn message(&self) -> &AccumulatedMessage {
        &self.message
    }

    #[must_use]
    pub fn into_message(self) -> AccumulatedMessage {
        self.message
    }

    #[must_use]
    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    #[must_use]
    pub fn usage(&self) -> StreamUsage {
        self.usage
    }

    #[must_use]
    pub fn skipped_records(&self) -> u64 {
        self.skipped_records
    }

    fn process(&mut self, payloads: &[String]) -> Result<bool, ChatError> {
        let mut surfaced = false;
        for payload in payloads {
            // Parse failures are recovered here; guard errors from `apply`
            // are outside this match and always propagate.
            let delta = match decode_stream_record(self.profile, payload) {
                Ok(delta) => delta,
                Err(err) => {
                    self.skipped_records += 1;
                    tracing::warn!(
                        profile = %self.profile,
                        error = %err,
                        payload_len = payload.len(),
                        "skipping malformed stream record"
                    );
                    continue;
                }
            };
            surfaced |= self.apply(delta)?;
        }
        Ok(surfaced)
    }

    fn apply(&mut self, delta: StreamDelta) -> Result<bool, ChatError> {
        if let Some(reason) = &delta.stop_reason {
            self.stop_reason = Some(reason.clone());
        }
        if let Some(usage) = delta.usage {
            self.usage.merge(usage);
        }
        if delta.is_empty_text() {
            return Ok(false);
        }
        let content = delta.content.filter(|text| !text.is_empty());
        let reasoning = delta.reasoning.filter(|text| !text.is_empty());

        if let Some(text) = &content {
            self.message.push_content(text);
        }
        if let Some(text) = &reasoning {
            self.message.push_reasoning(text);
        }

        if !self.message.reasoning_content.is_empty() {
            self.guard.disarm();
            self.held_back = false;
            return Ok(true);
        }

        match self.guard.check(&self.message.content) {
            GuardVerdict::Pass => {
                self.held_back = false;
                Ok(true)
            }
            GuardVerdict::Hold => {
                self.held_back = true;
                Ok(false)
            }
            GuardVerdict::Abort(prefix) => {
                self.state = DecoderState::Aborted;
                tracing::warn!(
                    profile = %self.profile,
                    prefix = %prefix,
                    "content channel opened with a reasoning marker, aborting stream"
                );
                Err(ChatError::MisfiledReasoning(format!(
                    "content began with {prefix:?}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai_record(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices":[{"delta":{"content":content}}]})
        )
    }

    fn armed(prefixes: &[&str]) -> MisfiledReasoningGuard {
        MisfiledReasoningGuard::new(true, prefixes.iter().copied())
    }

    #[test]
    fn test_openai_content_accumulates_in_order() {
        let mut dec = StreamDecoder::new(ProviderProfile::OpenAi, MisfiledReasoningGuard::disabled());
        assert!(dec.feed(openai_record("He").as_bytes()).unwrap());
        assert!(dec.feed(openai_record("llo").as_bytes()).unwrap());
        assert!(!dec.feed(b"data: [DONE]\n\n").unwrap());
        assert!(!dec.finish().unwrap());
        assert_eq!(dec.state(), DecoderState::Done);
        assert_eq!(dec.message().content, "Hello");
        assert_eq!(dec.message().reasoning_content, "");
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let mut dec = StreamDecoder::new(ProviderProfile::OpenAi, MisfiledReasoningGuard::disabled());
        let mut body = String::from("data: {not json\n\n");
        body.push_str(&openai_record("ok"));
        assert!(dec.feed(body.as_bytes()).unwrap());
        assert_eq!(dec.skipped_records(), 1);
        assert_eq!(dec.message().content, "ok");
    }

    #[test]
    fn test_guard_abort_after_held_fragments() {
        let mut dec = StreamDecoder::new(ProviderProfile::OpenAi, armed(&["think"]));
        assert!(!dec.feed(openai_record("t").as_bytes()).unwrap());
        assert!(!dec.feed(openai_record("hi").as_bytes()).unwrap());
        let err = dec.feed(openai_record("nk is wrong").as_bytes()).unwrap_err();
        assert!(err.is_misfiled_reasoning());
        assert_eq!(dec.state(), DecoderState::Aborted);
        assert!(!dec.feed(openai_record("more").as_bytes()).unwrap());
    }

    #[test]
    fn test_guard_error_beats_later_malformed_record() {
        let mut dec = StreamDecoder::new(ProviderProfile::OpenAi, armed(&["<think>"]));
        let mut body = openai_record("<think>");
        body.push_str("data: {broken\n\n");
        assert!(dec.feed(body.as_bytes()).is_err());
        assert_eq!(dec.skipped_records(), 0);
    }

    #[test]
    fn test_reasoning_disarms_guard() {
        let mut dec = StreamDecoder::new(ProviderProfile::OpenAi, armed(&["<think>"]));
        let record = serde_json::json!({"choices":[{"delta":{"reasoning_content":"hmm"}}]});
        assert!(dec.feed(format!("data: {record}\n").as_bytes()).unwrap());
        assert!(dec.feed(openai_record("<think>ok").as_bytes()).unwrap());
        assert_eq!(dec.message().content, "<think>ok");
        assert_eq!(dec.message().reasoning_content, "hmm");
    }

    #[test]
    fn test_guard_ignored_for_other_profiles() {
        let mut dec = StreamDecoder::new(ProviderProfile::Gemini, armed(&["<think>"]));
        let record = serde_json::json!({"candidates":[{"content":{"parts":[{"text":"<think>"}]}}]});
        assert!(dec.feed(format!("data: {record}\n").as_bytes()).unwrap());
    }

    #[test]
    fn test_held_content_released_at_end_of_stream() {
        let mut dec = StreamDecoder::new(ProviderProfile::OpenAi, armed(&["<think>"]));
        assert!(!dec.feed(openai_record("<th").as_bytes()).unwrap());
        assert!(dec.finish().unwrap());
        assert_eq!(dec.message().content, "<th");
    }

    #[test]
    fn test_unterminated_tail_processed_on_finish() {
        let mut dec = StreamDecoder::new(ProviderProfile::OpenAi, MisfiledReasoningGuard::disabled());
        let record = openai_record("tail");
        assert!(!dec.feed(record.trim_end().as_bytes()).unwrap());
        assert!(dec.finish().unwrap());
        assert_eq!(dec.message().content, "tail");
    }

    #[test]
    fn test_claude_stop_reason_and_usage_recorded() {
        let mut dec = StreamDecoder::new(ProviderProfile::Claude, MisfiledReasoningGuard::disabled());
        let body = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":12}}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
            "event: message_delta\n",
            "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":3}}\n\n",
        );
        assert!(dec.feed(body.as_bytes()).unwrap());
        assert_eq!(dec.message().content, "Hi");
        assert_eq!(dec.stop_reason(), Some("end_turn"));
        assert_eq!(dec.usage().input_tokens, Some(12));
        assert_eq!(dec.usage().output_tokens, Some(3));
    }

    #[test]
    fn test_finish_only_record_surfaces_nothing() {
        let mut dec = StreamDecoder::new(ProviderProfile::OpenAi, armed(&["<think>"]));
        assert_eq!(dec.profile(), ProviderProfile::OpenAi);
        let record = r#"data: {"choices":[{"delta":{"content":""},"finish_reason":"stop"}]}"#;
        assert!(!dec.feed(format!("{record}\n").as_bytes()).unwrap());
        assert_eq!(dec.stop_reason(), Some("stop"));
        assert!(dec.message().is_empty());
        assert_eq!(dec.state(), DecoderState::Reading);
    }
}
