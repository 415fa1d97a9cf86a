use crate::protocol::canonical::{StreamDelta, StreamUsage};

use super::OpenAiStreamChunk;

/// Extract the incremental delta from one `OpenAI` stream record.
///
/// Only the first choice is read. `content` and `reasoning_content` are
/// independent; either may be present alone.
///
/// # Errors
///
/// Returns the `serde_json` error when the payload is not a JSON object of
/// the expected shape.
pub fn decode_openai_stream_record(payload: &str) -> Result<StreamDelta, serde_json::Error> {
    let chunk: OpenAiStreamChunk = serde_json::from_str(payload)?;
    if let Some(error) = chunk.error.as_ref() {
        tracing::warn!(error = %error, "openai stream carried an error record");
    }

    let mut delta = StreamDelta::default();
    if let Some(choice) = chunk.choices.into_iter().next() {
        delta.content = choice.delta.content;
        delta.reasoning = choice.delta.reasoning_content;
        delta.stop_reason = choice.finish_reason;
    }
    delta.usage = chunk.usage.map(|usage| StreamUsage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
    });
    Ok(delta)
}
