pub mod encoder;
pub mod stream;

use serde::{Deserialize, Serialize};

use crate::protocol::canonical::Message;

/// `OpenAI` Chat Completion streaming request wire type.
///
/// Messages are borrowed and serialized unchanged: the common message model
/// already uses the chat-completions shape.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
}

/// A streaming chunk. Every field is optional so that proxies emitting
/// trimmed-down chunks still decode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiStreamChunk {
    #[serde(default)]
    pub choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// A choice within a stream chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiStreamChoice {
    #[serde(default)]
    pub delta: OpenAiDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Delta content within a stream choice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

/// Usage info, sent on the last chunk by servers that support it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
}
