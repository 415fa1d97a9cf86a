use crate::protocol::canonical::{StreamDelta, StreamUsage};

use super::{AnthropicStreamEvent, AnthropicUsage};

fn usage_from(usage: AnthropicUsage) -> StreamUsage {
    StreamUsage {
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
    }
}

/// Extract the incremental delta from one Anthropic stream record.
///
/// `content_block_delta` text feeds the content channel and extended-thinking
/// text feeds the reasoning channel. `message_delta` contributes only its
/// stop reason and usage.
///
/// # Errors
///
/// Returns the `serde_json` error when the payload does not decode.
pub fn decode_anthropic_stream_record(payload: &str) -> Result<StreamDelta, serde_json::Error> {
    let event: AnthropicStreamEvent = serde_json::from_str(payload)?;
    let mut delta = StreamDelta::default();
    match event {
        AnthropicStreamEvent::MessageStart { message } => {
            delta.usage = message.usage.map(usage_from);
        }
        AnthropicStreamEvent::ContentBlockDelta { delta: body } => {
            delta.content = body.text;
            delta.reasoning = body.thinking;
        }
        AnthropicStreamEvent::MessageDelta { delta: body, usage } => {
            delta.stop_reason = body.stop_reason;
            delta.usage = usage.map(usage_from);
        }
        AnthropicStreamEvent::Error { error } => {
            tracing::warn!(error = %error, "anthropic stream carried an error event");
        }
        AnthropicStreamEvent::Other => {}
    }
    Ok(delta)
}
