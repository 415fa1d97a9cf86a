//! Base URL normalization.
//!
//! Users paste base URLs in many shapes (`https://host`, `https://host/v1/`,
//! the full endpoint). The normalizer turns them into one canonical
//! chat-completions URL that the request composer then rewrites per dialect.

/// Turns a configured base URL into the canonical chat-completions URL.
pub trait UrlNormalizer: Send + Sync {
    fn normalize(&self, base_url: &str) -> String;
}

/// Default normalizer.
///
/// Endpoints that already name a concrete API (`/chat/completions`,
/// `/messages`, Gemini `/models/...`) are left alone apart from trailing
/// slashes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatCompletionsUrlNormalizer;

const CHAT_COMPLETIONS_SUFFIX: &str = "/chat/completions";

impl UrlNormalizer for ChatCompletionsUrlNormalizer {
    fn normalize(&self, base_url: &str) -> String {
        let base = base_url.trim().trim_end_matches('/');
        if base.ends_with(CHAT_COMPLETIONS_SUFFIX)
            || base.ends_with("/messages")
            || base.contains(":generateContent")
            || base.contains(":streamGenerateContent")
            || base.contains("/models/")
        {
            return base.to_string();
        }
        if base.ends_with("/v1") {
            format!("{base}{CHAT_COMPLETIONS_SUFFIX}")
        } else {
            format!("{base}/v1{CHAT_COMPLETIONS_SUFFIX}")
        }
    }
}
