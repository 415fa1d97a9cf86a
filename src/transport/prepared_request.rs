//! Request composer: endpoint, headers and body for one streaming call.
use bytes::Bytes;
use http::{HeaderMap, HeaderValue};

use crate::error::ChatError;
use crate::protocol::canonical::Message;
use crate::protocol::{encode_request_body, ProviderProfile};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_CHAT_SUFFIX: &str = "/v1/chat/completions";
const GEMINI_STREAM_ACTION: &str = ":streamGenerateContent";

/// A fully composed upstream request, ready for the transport.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub profile: ProviderProfile,
    pub model: String,
    pub url: url::Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl PreparedRequest {
    /// The request URL with any `key` query parameter masked, for logging.
    #[must_use]
    pub fn redacted_url(&self) -> String {
        redact_url(&self.url)
    }
}

/// Pick the configured model, or the profile default when none is set.
#[must_use]
pub fn resolve_model(profile: ProviderProfile, configured: Option<&str>) -> String {
    configured
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .unwrap_or_else(|| profile.default_model())
        .to_string()
}

/// Compose the upstream request for `profile`.
///
/// `normalized_url` is the canonical chat-completions URL produced by the
/// URL normalizer; Gemini and Claude rewrite it to their own endpoints.
///
/// # Errors
///
/// Returns [`ChatError::Config`] when the URL or API key cannot be used in a
/// request, and [`ChatError::Translation`] when the body fails to serialize.
pub fn compose_request(
    profile: ProviderProfile,
    normalized_url: &str,
    api_key: &str,
    model: &str,
    messages: &[Message],
) -> Result<PreparedRequest, ChatError> {
    let endpoint = match profile {
        ProviderProfile::OpenAi => normalized_url.to_string(),
        ProviderProfile::Gemini => gemini_stream_endpoint(normalized_url, model),
        ProviderProfile::Claude => anthropic_messages_endpoint(normalized_url),
    };
    let mut url = url::Url::parse(&endpoint)
        .map_err(|err| ChatError::Config(format!("Invalid API URL '{endpoint}': {err}")))?;
    if profile == ProviderProfile::Gemini {
        set_gemini_query(&mut url, api_key);
    }

    let headers = build_headers(profile, api_key)?;
    let body = encode_request_body(profile, model, messages)?;

    Ok(PreparedRequest {
        profile,
        model: model.to_string(),
        url,
        headers,
        body: Bytes::from(body),
    })
}

fn gemini_stream_endpoint(normalized_url: &str, model: &str) -> String {
    if normalized_url.contains(GEMINI_STREAM_ACTION) || normalized_url.contains(":generateContent")
    {
        return normalized_url.to_string();
    }
    let base = normalized_url
        .strip_suffix(OPENAI_CHAT_SUFFIX)
        .unwrap_or(normalized_url)
        .trim_end_matches('/');
    if base.contains("/models/") {
        format!("{base}{GEMINI_STREAM_ACTION}")
    } else {
        format!("{base}/v1beta/models/{model}{GEMINI_STREAM_ACTION}")
    }
}

fn anthropic_messages_endpoint(normalized_url: &str) -> String {
    if normalized_url.ends_with("/messages") {
        return normalized_url.to_string();
    }
    match normalized_url.strip_suffix(OPENAI_CHAT_SUFFIX) {
        Some(base) => format!("{base}/v1/messages"),
        None => normalized_url.to_string(),
    }
}

/// Replace `key` and `alt` with the API key and SSE mode, keeping any other
/// query parameters.
fn set_gemini_query(url: &mut url::Url, api_key: &str) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| name != "key" && name != "alt")
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("key", api_key)
        .append_pair("alt", "sse");
}

fn header_value(value: &str, what: &str) -> Result<HeaderValue, ChatError> {
    HeaderValue::from_str(value)
        .map_err(|_| ChatError::Config(format!("{what} contains characters not allowed in a header")))
}

fn build_headers(profile: ProviderProfile, api_key: &str) -> Result<HeaderMap, ChatError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        http::header::ACCEPT,
        HeaderValue::from_static("text/event-stream"),
    );

    match profile {
        ProviderProfile::OpenAi => {
            let mut value = header_value(&format!("Bearer {api_key}"), "API key")?;
            value.set_sensitive(true);
            headers.insert(http::header::AUTHORIZATION, value);
        }
        ProviderProfile::Claude => {
            let mut value = header_value(api_key, "API key")?;
            value.set_sensitive(true);
            headers.insert("x-api-key", value);
            headers.insert(
                "anthropic-version",
                HeaderValue::from_static(ANTHROPIC_VERSION),
            );
            headers.insert(
                "anthropic-dangerous-direct-browser-access",
                HeaderValue::from_static("true"),
            );
        }
        // Gemini authenticates through the `key` query parameter.
        ProviderProfile::Gemini => {}
    }
    Ok(headers)
}

fn redact_url(url: &url::Url) -> String {
    if !url.query_pairs().any(|(name, _)| name == "key") {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| {
            let value = if name == "key" {
                "***".to_string()
            } else {
                value.into_owned()
            };
            (name.into_owned(), value)
        })
        .collect();
    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msgs() -> Vec<Message> {
        vec![Message::system("Be terse"), Message::user("hi")]
    }

    #[test]
    fn test_openai_request() {
        let req = compose_request(
            ProviderProfile::OpenAi,
            "https://api.openai.com/v1/chat/completions",
            "sk-test",
            "gpt-4o",
            &msgs(),
        )
        .unwrap();
        assert_eq!(req.url.as_str(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(req.headers.get("authorization").unwrap(), "Bearer sk-test");
        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_gemini_request_rewrites_url_and_query() {
        let req = compose_request(
            ProviderProfile::Gemini,
            "https://generativelanguage.googleapis.com/v1/chat/completions",
            "g-key",
            "gemini-1.5-flash",
            &msgs(),
        )
        .unwrap();
        assert_eq!(
            req.url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:streamGenerateContent?key=g-key&alt=sse"
        );
        assert!(req.headers.get("authorization").is_none());
        assert_eq!(
            req.redacted_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:streamGenerateContent?key=***&alt=sse"
        );
        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be terse");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
    }

    #[test]
    fn test_gemini_models_segment_gets_action_only() {
        assert_eq!(
            gemini_stream_endpoint("https://proxy.example.com/v1beta/models/gemini-pro", "x"),
            "https://proxy.example.com/v1beta/models/gemini-pro:streamGenerateContent"
        );
        let streaming = "https://proxy.example.com/v1beta/models/m:streamGenerateContent";
        assert_eq!(gemini_stream_endpoint(streaming, "x"), streaming);
    }

    #[test]
    fn test_gemini_existing_key_and_alt_replaced() {
        let mut url = url::Url::parse("https://h.example.com/m:streamGenerateContent?alt=json&key=old&x=1")
            .unwrap();
        set_gemini_query(&mut url, "new");
        assert_eq!(url.query(), Some("x=1&key=new&alt=sse"));
    }

    #[test]
    fn test_claude_request_headers_and_url() {
        let req = compose_request(
            ProviderProfile::Claude,
            "https://api.anthropic.com/v1/chat/completions",
            "ak",
            "claude-3-5-sonnet-20241022",
            &msgs(),
        )
        .unwrap();
        assert_eq!(req.url.as_str(), "https://api.anthropic.com/v1/messages");
        assert_eq!(req.headers.get("x-api-key").unwrap(), "ak");
        assert_eq!(req.headers.get("anthropic-version").unwrap(), ANTHROPIC_VERSION);
        assert_eq!(
            req.headers
                .get("anthropic-dangerous-direct-browser-access")
                .unwrap(),
            "true"
        );
        assert!(req.headers.get("authorization").is_none());
        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body["system"], "Be terse");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"][0]["type"], "text");
        assert_eq!(body["max_tokens"], 8192);
    }

    #[test]
    fn test_claude_messages_url_untouched() {
        assert_eq!(
            anthropic_messages_endpoint("https://proxy.example.com/anthropic/v1/messages"),
            "https://proxy.example.com/anthropic/v1/messages"
        );
    }

    #[test]
    fn test_invalid_key_rejected() {
        let err = compose_request(
            ProviderProfile::OpenAi,
            "https://api.openai.com/v1/chat/completions",
            "bad\nkey",
            "gpt-4o",
            &msgs(),
        )
        .unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn test_resolve_model_defaults() {
        assert_eq!(resolve_model(ProviderProfile::Gemini, None), "gemini-1.5-flash");
        assert_eq!(resolve_model(ProviderProfile::OpenAi, Some("  ")), "gpt-4o");
        assert_eq!(resolve_model(ProviderProfile::Claude, Some("c-1")), "c-1");
    }
}
