use crate::protocol::anthropic::{
    AnthropicContentBlock, AnthropicImageSource, AnthropicMessage, AnthropicRequest,
};
use crate::protocol::canonical::{ContentPart, Message, MessageContent, Role};
use crate::protocol::mapping::{role_to_anthropic, split_data_url};

pub const DEFAULT_MAX_TOKENS: u64 = 8192;

/// Encode the conversation into the Anthropic Messages API wire format.
///
/// System messages are joined with blank lines, in encounter order, into the
/// top-level `system` field. Other messages keep their role; messages whose
/// content converts to no blocks are dropped.
#[must_use]
pub fn encode_anthropic_request(model: &str, messages: &[Message]) -> AnthropicRequest {
    // --- system ---
    let system_texts: Vec<String> = messages
        .iter()
        .filter(|msg| msg.role == Role::System)
        .map(|msg| msg.content.to_text())
        .collect();
    let system = if system_texts.is_empty() {
        None
    } else {
        Some(system_texts.join("\n\n"))
    };

    // --- messages ---
    let messages = messages
        .iter()
        .filter(|msg| msg.role != Role::System)
        .filter_map(|msg| {
            let content = encode_blocks(&msg.content);
            if content.is_empty() {
                return None;
            }
            Some(AnthropicMessage {
                role: role_to_anthropic(msg.role),
                content,
            })
        })
        .collect();

    AnthropicRequest {
        model: model.to_string(),
        max_tokens: DEFAULT_MAX_TOKENS,
        system,
        messages,
        stream: true,
    }
}

fn encode_blocks(content: &MessageContent) -> Vec<AnthropicContentBlock> {
    match content {
        MessageContent::Text(text) => vec![AnthropicContentBlock::Text { text: text.clone() }],
        MessageContent::Parts(parts) => parts.iter().filter_map(encode_block).collect(),
        MessageContent::Other(_) => Vec::new(),
    }
}

fn encode_block(part: &ContentPart) -> Option<AnthropicContentBlock> {
    match part {
        ContentPart::Text { text } => Some(AnthropicContentBlock::Text { text: text.clone() }),
        ContentPart::ImageUrl { image_url } => {
            let Some(image) = split_data_url(&image_url.url) else {
                tracing::debug!("anthropic encoder: skipping non-data image url");
                return None;
            };
            Some(AnthropicContentBlock::Image {
                source: AnthropicImageSource {
                    type_: "base64",
                    media_type: image.mime_type.to_string(),
                    data: image.data.to_string(),
                },
            })
        }
        ContentPart::Unknown(_) => {
            tracing::debug!("anthropic encoder: skipping unsupported content part");
            None
        }
    }
}
