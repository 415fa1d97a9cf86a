use crate::protocol::canonical::{ContentPart, Message, MessageContent, Role};
use crate::protocol::gemini::{
    GeminiBlob, GeminiContent, GeminiGenerationConfig, GeminiPart, GeminiRequest,
};
use crate::protocol::mapping::{role_to_gemini, split_data_url};

/// Encode the conversation into a Gemini `streamGenerateContent` request.
///
/// The first system message becomes `systemInstruction`; every system
/// message is removed from `contents`. Messages that convert to zero parts
/// are dropped.
#[must_use]
pub fn encode_gemini_request(messages: &[Message]) -> GeminiRequest {
    // --- system instruction ---
    let system_instruction = messages
        .iter()
        .find(|msg| msg.role == Role::System)
        .map(|msg| GeminiContent {
            role: None,
            parts: encode_system_parts(&msg.content),
        })
        .filter(|content| !content.parts.is_empty());

    // --- contents ---
    let contents = messages
        .iter()
        .filter(|msg| msg.role != Role::System)
        .filter_map(|msg| {
            let parts = encode_parts(&msg.content);
            if parts.is_empty() {
                return None;
            }
            Some(GeminiContent {
                role: Some(role_to_gemini(msg.role)),
                parts,
            })
        })
        .collect();

    GeminiRequest {
        contents,
        system_instruction,
        generation_config: GeminiGenerationConfig::default(),
    }
}

/// Convert message content into Gemini parts.
///
/// Text maps directly and `data:` images become inline data. Remote images
/// and unsupported part kinds are skipped item by item.
#[must_use]
pub fn encode_parts(content: &MessageContent) -> Vec<GeminiPart> {
    match content {
        MessageContent::Text(text) => vec![GeminiPart::Text(text.clone())],
        MessageContent::Parts(parts) => parts.iter().filter_map(encode_part).collect(),
        MessageContent::Other(_) => Vec::new(),
    }
}

fn encode_part(part: &ContentPart) -> Option<GeminiPart> {
    match part {
        ContentPart::Text { text } => Some(GeminiPart::Text(text.clone())),
        ContentPart::ImageUrl { image_url } => {
            let Some(image) = split_data_url(&image_url.url) else {
                tracing::debug!("gemini encoder: skipping non-data image url");
                return None;
            };
            Some(GeminiPart::InlineData(GeminiBlob {
                mime_type: image.mime_type.to_string(),
                data: image.data.to_string(),
            }))
        }
        ContentPart::Unknown(_) => {
            tracing::debug!("gemini encoder: skipping unsupported content part");
            None
        }
    }
}

fn encode_system_parts(content: &MessageContent) -> Vec<GeminiPart> {
    match content {
        MessageContent::Other(_) => {
            let text = content.to_text();
            if text.is_empty() {
                Vec::new()
            } else {
                vec![GeminiPart::Text(text)]
            }
        }
        _ => encode_parts(content),
    }
}
