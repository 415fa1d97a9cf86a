use crate::protocol::canonical::{StreamDelta, StreamUsage};

use super::GeminiStreamResponse;

/// Extract the incremental delta from one Gemini stream record.
///
/// Every text part of the first candidate is appended, in order, to the
/// content channel. Gemini never feeds the reasoning channel.
///
/// # Errors
///
/// Returns the `serde_json` error when the payload does not decode.
pub fn decode_gemini_stream_record(payload: &str) -> Result<StreamDelta, serde_json::Error> {
    let response: GeminiStreamResponse = serde_json::from_str(payload)?;
    if let Some(error) = response.error.as_ref() {
        tracing::warn!(error = %error, "gemini stream carried an error record");
    }

    let mut delta = StreamDelta::default();
    if let Some(candidate) = response.candidates.into_iter().next() {
        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        if !text.is_empty() {
            delta.content = Some(text);
        }
        delta.stop_reason = candidate.finish_reason;
    }
    delta.usage = response.usage_metadata.map(|usage| StreamUsage {
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
    });
    Ok(delta)
}
