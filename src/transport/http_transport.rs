use std::time::Duration;

use crate::config::HttpConfig;
use crate::error::ChatError;

use super::prepared_request::PreparedRequest;

const MAX_ERROR_BODY_CHARS: usize = 2000;

fn build_reqwest_client(
    timeout: Duration,
    connect_timeout: Duration,
    use_env_proxy: bool,
    proxy_url: Option<&str>,
) -> Result<reqwest::Client, ChatError> {
    let mut builder = reqwest::Client::builder()
        .tcp_nodelay(true)
        .connect_timeout(connect_timeout)
        .timeout(timeout);

    if let Some(proxy_url) = proxy_url {
        url::Url::parse(proxy_url)
            .map_err(|err| ChatError::Config(format!("Invalid proxy URL: {err}")))?;
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|err| ChatError::Config(format!("Invalid proxy URL: {err}")))?;
        builder = builder.no_proxy().proxy(proxy);
    } else if !use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| ChatError::Transport(format!("Failed to build HTTP client: {err}")))
}

/// HTTP transport for streaming chat requests. Never retries; a failed call
/// is retried, if at all, by the caller.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport from HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] for an unusable proxy URL and
    /// [`ChatError::Transport`] when the client cannot be built.
    pub fn new(config: &HttpConfig) -> Result<Self, ChatError> {
        let proxy = config
            .proxy
            .as_deref()
            .map(str::trim)
            .filter(|proxy| !proxy.is_empty());
        let client = build_reqwest_client(
            Duration::from_secs(config.timeout),
            Duration::from_secs(config.connect_timeout),
            config.http_use_env_proxy,
            proxy,
        )?;
        Ok(Self { client })
    }

    /// POST the request and return the response once a 2xx status arrived.
    /// The caller reads the body as a stream.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Transport`] when the request cannot be sent and
    /// [`ChatError::Upstream`] for a non-2xx status, carrying the body text or,
    /// failing that, the status line.
    pub async fn send_stream(
        &self,
        request: &PreparedRequest,
    ) -> Result<reqwest::Response, ChatError> {
        let mut http_request = reqwest::Request::new(http::Method::POST, request.url.clone());
        *http_request.headers_mut() = request.headers.clone();
        *http_request.body_mut() = Some(reqwest::Body::from(request.body.clone()));

        let response = self
            .client
            .execute(http_request)
            .await
            .map_err(|err| ChatError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let body = body.trim();
        let message = if body.is_empty() {
            status_line(status)
        } else {
            truncate_chars(body, MAX_ERROR_BODY_CHARS)
        };
        Err(ChatError::Upstream {
            status: status.as_u16(),
            message,
        })
    }
}

fn status_line(status: http::StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {reason}", status.as_u16()),
        None => format!("HTTP {}", status.as_u16()),
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
