pub mod encoder;
pub mod stream;

use serde::{Deserialize, Serialize};

/// Anthropic Messages API request wire type.
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
    pub stream: bool,
}

/// Anthropic message wire type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnthropicMessage {
    pub role: &'static str,
    pub content: Vec<AnthropicContentBlock>,
}

/// A content block in an Anthropic request message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    Text { text: String },
    Image { source: AnthropicImageSource },
}

/// Inline image source. Only base64 sources are produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnthropicImageSource {
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub media_type: String,
    pub data: String,
}

/// Anthropic SSE stream event. Event types this adapter has no use for
/// collapse into `Other`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    MessageStart {
        message: AnthropicMessageStart,
    },
    ContentBlockDelta {
        delta: AnthropicDelta,
    },
    MessageDelta {
        #[serde(default)]
        delta: AnthropicMessageDeltaBody,
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    Error {
        error: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

/// Message start payload; only usage is read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnthropicMessageStart {
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

/// Content block delta body. Text and thinking deltas are read; other delta
/// kinds (tool input JSON, signatures) leave both fields empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnthropicDelta {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub thinking: Option<String>,
}

/// Message delta body (`stop_reason` etc).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnthropicMessageDeltaBody {
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Anthropic usage.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnthropicUsage {
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
}
