use std::sync::LazyLock;

use regex_lite::Regex;

use super::canonical::Role;

const DEFAULT_IMAGE_MIME: &str = "image/png";

static DATA_URL_MIME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^data:([^;,]+)").ok());

// ---------------------------------------------------------------------------
// Role mappings
// ---------------------------------------------------------------------------

#[must_use]
pub fn role_to_gemini(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::System | Role::User => "user", // system is handled via systemInstruction
    }
}

#[must_use]
pub fn role_to_anthropic(role: Role) -> &'static str {
    match role {
        Role::Assistant => "assistant",
        Role::System | Role::User => "user", // system is top-level in Anthropic
    }
}

// ---------------------------------------------------------------------------
// Data URIs
// ---------------------------------------------------------------------------

/// An inline image split out of a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage<'a> {
    pub mime_type: &'a str,
    pub data: &'a str,
}

/// Split a `data:<mime>;base64,<payload>` URI on its first comma.
///
/// Returns `None` for anything that is not a `data:` URI (remote images are
/// never fetched) or that has no payload separator. A header without a
/// recognisable mime type falls back to `image/png`.
#[must_use]
pub fn split_data_url(url: &str) -> Option<InlineImage<'_>> {
    if !url.starts_with("data:") {
        return None;
    }
    let (header, data) = url.split_once(',')?;
    let mime_type = DATA_URL_MIME
        .as_ref()
        .and_then(|re| re.captures(header))
        .and_then(|caps| caps.get(1))
        .map_or(DEFAULT_IMAGE_MIME, |m| m.as_str());
    Some(InlineImage { mime_type, data })
}
