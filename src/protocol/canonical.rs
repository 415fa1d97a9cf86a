use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Canonical message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Image reference inside a multimodal message. `url` is either a remote URL
/// or a `data:<mime>;base64,<payload>` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A single part of a multimodal message. Serializes in the OpenAI chat shape
/// so that the OpenAI dialect can pass messages through untouched.
///
/// Parts of any other kind (`input_audio`, `file`, ...) deserialize into
/// [`ContentPart::Unknown`] one by one, so a single unfamiliar item never
/// costs the rest of the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
    /// Kept verbatim; passed through for openai, skipped by the translators.
    Unknown(serde_json::Value),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImageUrlRepr {
    Bare(String),
    Object(ImageUrl),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KnownPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrlRepr },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KnownPartRef<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: &'a ImageUrl },
}

impl Serialize for ContentPart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ContentPart::Text { text } => KnownPartRef::Text { text }.serialize(serializer),
            ContentPart::ImageUrl { image_url } => {
                KnownPartRef::ImageUrl { image_url }.serialize(serializer)
            }
            ContentPart::Unknown(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ContentPart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match KnownPart::deserialize(&value) {
            Ok(KnownPart::Text { text }) => ContentPart::Text { text },
            Ok(KnownPart::ImageUrl {
                image_url: ImageUrlRepr::Bare(url),
            }) => ContentPart::image(url),
            Ok(KnownPart::ImageUrl {
                image_url: ImageUrlRepr::Object(image_url),
            }) => ContentPart::ImageUrl { image_url },
            Err(_) => ContentPart::Unknown(value),
        })
    }
}

impl ContentPart {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    #[must_use]
    pub fn image(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: url.into(),
                detail: None,
            },
        }
    }
}

/// Message content: plain text, an ordered list of parts, or any other JSON
/// shape a caller managed to put there (kept verbatim, rendered as JSON text where a
/// string is required).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Other(serde_json::Value),
}

impl MessageContent {
    /// Textual form used where a dialect needs a plain string.
    ///
    /// Text parts are joined with newlines; images are skipped.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } | ContentPart::Unknown(_) => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            MessageContent::Other(serde_json::Value::Null) => String::new(),
            MessageContent::Other(value) => value.to_string(),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(value: &str) -> Self {
        MessageContent::Text(value.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(value: String) -> Self {
        MessageContent::Text(value)
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(value: Vec<ContentPart>) -> Self {
        MessageContent::Parts(value)
    }
}

/// A single message in the provider-agnostic conversation.
///
/// Unknown fields (stored reasoning, UI flags) are dropped on deserialize, so
/// history records can be fed in as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// One page of browser context attached to a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_current: bool,
}

/// Webpage context folded into the system message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebpageInfo {
    #[serde(default)]
    pub pages: Vec<PageInfo>,
}

/// The reply being assembled for one call. Append-only while the call runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatedMessage {
    pub content: String,
    pub reasoning_content: String,
}

impl AccumulatedMessage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_content(&mut self, delta: &str) {
        self.content.push_str(delta);
    }

    pub fn push_reasoning(&mut self, delta: &str) {
        self.reasoning_content.push_str(delta);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.reasoning_content.is_empty()
    }
}

/// Token usage reported by the upstream, when it reports any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl StreamUsage {
    /// Overlay the fields `other` actually carries.
    pub fn merge(&mut self, other: StreamUsage) {
        if other.input_tokens.is_some() {
            self.input_tokens = other.input_tokens;
        }
        if other.output_tokens.is_some() {
            self.output_tokens = other.output_tokens;
        }
    }
}

/// Everything one decoded SSE record contributes, regardless of dialect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDelta {
    pub content: Option<String>,
    pub reasoning: Option<String>,
    pub stop_reason: Option<String>,
    pub usage: Option<StreamUsage>,
}

impl StreamDelta {
    /// True when the record appends to neither channel.
    #[must_use]
    pub fn is_empty_text(&self) -> bool {
        self.content.as_deref().map_or(true, str::is_empty)
            && self.reasoning.as_deref().map_or(true, str::is_empty)
    }
}
