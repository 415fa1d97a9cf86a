use std::fmt;

use serde::{Deserialize, Serialize};

/// The wire dialect spoken to the upstream server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderProfile {
    OpenAi,
    Gemini,
    Claude,
}

const GEMINI_URL_MARKERS: &[&str] = &[
    "generativelanguage.googleapis.com",
    "aiplatform.googleapis.com",
    "gemini",
];
const CLAUDE_URL_MARKERS: &[&str] = &["anthropic.com", "claude", "api.anthropic"];

impl ProviderProfile {
    pub const ALL: [ProviderProfile; 3] = [
        ProviderProfile::OpenAi,
        ProviderProfile::Gemini,
        ProviderProfile::Claude,
    ];

    /// Parse an explicit `api_format` value. Only the three exact names are
    /// recognised.
    #[must_use]
    pub fn from_explicit(format: &str) -> Option<Self> {
        match format {
            "openai" => Some(ProviderProfile::OpenAi),
            "gemini" => Some(ProviderProfile::Gemini),
            "claude" => Some(ProviderProfile::Claude),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderProfile::OpenAi => "openai",
            ProviderProfile::Gemini => "gemini",
            ProviderProfile::Claude => "claude",
        }
    }

    /// Model used when the config leaves `model_name` empty.
    #[must_use]
    pub fn default_model(self) -> &'static str {
        match self {
            ProviderProfile::OpenAi => "gpt-4o",
            ProviderProfile::Gemini => "gemini-1.5-flash",
            ProviderProfile::Claude => "claude-3-5-sonnet-20241022",
        }
    }
}

impl fmt::Display for ProviderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the dialect for a call. An explicit, recognised format always wins;
/// otherwise the base URL is matched against known host/name markers, falling
/// back to OpenAI.
#[must_use]
pub fn resolve(base_url: &str, explicit_format: Option<&str>) -> ProviderProfile {
    if let Some(profile) = explicit_format.and_then(ProviderProfile::from_explicit) {
        return profile;
    }

    let url = base_url.to_ascii_lowercase();
    if GEMINI_URL_MARKERS.iter().any(|marker| url.contains(marker)) {
        return ProviderProfile::Gemini;
    }
    if CLAUDE_URL_MARKERS.iter().any(|marker| url.contains(marker)) {
        return ProviderProfile::Claude;
    }
    ProviderProfile::OpenAi
}
