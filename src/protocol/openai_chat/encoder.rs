use crate::protocol::canonical::Message;

use super::OpenAiChatRequest;

/// Encode the conversation into the `OpenAI` Chat Completions wire format.
///
/// This is the identity strategy: messages pass through untouched.
#[must_use]
pub fn encode_openai_chat_request<'a>(
    model: &'a str,
    messages: &'a [Message],
) -> OpenAiChatRequest<'a> {
    OpenAiChatRequest {
        model,
        messages,
        stream: true,
    }
}
