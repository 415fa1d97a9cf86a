pub mod anthropic;
pub mod canonical;
pub mod gemini;
pub mod mapping;
pub mod openai_chat;
pub mod profile;
pub mod system_prompt;

use crate::error::ChatError;
use canonical::{Message, StreamDelta};
pub use profile::{resolve, ProviderProfile};

/// Translate `messages` for `profile` and serialize the request body.
///
/// # Errors
///
/// Returns [`ChatError::Translation`] when the wire request cannot be
/// serialized.
pub fn encode_request_body(
    profile: ProviderProfile,
    model: &str,
    messages: &[Message],
) -> Result<Vec<u8>, ChatError> {
    let encoded = match profile {
        ProviderProfile::OpenAi => {
            serde_json::to_vec(&openai_chat::encoder::encode_openai_chat_request(model, messages))
        }
        ProviderProfile::Gemini => {
            serde_json::to_vec(&gemini::encoder::encode_gemini_request(messages))
        }
        ProviderProfile::Claude => serde_json::to_vec(
            &anthropic::encoder::encode_anthropic_request(model, messages),
        ),
    };
    encoded.map_err(|err| ChatError::Translation(err.to_string()))
}

/// Decode one SSE data payload with the extractor for `profile`.
///
/// # Errors
///
/// Returns the `serde_json` error for a malformed record; callers log and
/// skip it.
pub fn decode_stream_record(
    profile: ProviderProfile,
    payload: &str,
) -> Result<StreamDelta, serde_json::Error> {
    match profile {
        ProviderProfile::OpenAi => openai_chat::stream::decode_openai_stream_record(payload),
        ProviderProfile::Gemini => gemini::stream::decode_gemini_stream_record(payload),
        ProviderProfile::Claude => anthropic::stream::decode_anthropic_stream_record(payload),
    }
}
