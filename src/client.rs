//! Streaming call entry point.
//!
//! [`ChatClient::call_api`] returns a [`StreamingCall`] whose cancellation
//! token exists before any network I/O, so a caller can cancel even before
//! the first byte. [`StreamingCall::start_streaming`] composes the request,
//! reads the SSE body and pushes throttled snapshots of the reply to the
//! history store and the UI callback.
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ApiConfig, ClientConfig, FeaturesConfig, HttpConfig};
use crate::error::ChatError;
use crate::observability::{log_stream_complete, StreamSummary};
use crate::protocol::canonical::{AccumulatedMessage, Message, WebpageInfo};
use crate::protocol::resolve;
use crate::protocol::system_prompt::{compose_system_prompt, prepend_system_message};
use crate::stream::{DispatchAction, MisfiledReasoningGuard, StreamDecoder, UpdateDispatcher};
use crate::transport::{
    compose_request, resolve_model, ChatCompletionsUrlNormalizer, HttpTransport, UrlNormalizer,
};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Receives every flushed snapshot of the reply being streamed.
pub trait HistoryStore: Send + Sync {
    fn update_last_message(&self, conversation_id: &str, snapshot: AccumulatedMessage);
}

/// In-memory history store keeping the latest snapshot per conversation.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<FxHashMap<String, (AccumulatedMessage, u64)>>,
}

impl MemoryHistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last_message(&self, conversation_id: &str) -> Option<AccumulatedMessage> {
        self.entries
            .lock()
            .get(conversation_id)
            .map(|(message, _)| message.clone())
    }

    /// Number of snapshots received for `conversation_id`.
    #[must_use]
    pub fn update_count(&self, conversation_id: &str) -> u64 {
        self.entries
            .lock()
            .get(conversation_id)
            .map_or(0, |(_, count)| *count)
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn update_last_message(&self, conversation_id: &str, snapshot: AccumulatedMessage) {
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(conversation_id.to_string())
            .or_insert_with(|| (AccumulatedMessage::new(), 0));
        entry.0 = snapshot;
        entry.1 += 1;
    }
}

/// UI callback invoked with each flushed snapshot.
pub type UpdateCallback = Arc<dyn Fn(&str, AccumulatedMessage) + Send + Sync>;

/// Keys for user-facing error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    MissingBaseUrl,
    MissingApiKey,
    MisfiledReasoning,
    UnreadableResponse,
}

/// Looks up user-facing strings.
pub trait Localizer: Send + Sync {
    fn message(&self, key: MessageKey) -> String;
}

/// English strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLocalizer;

impl Localizer for DefaultLocalizer {
    fn message(&self, key: MessageKey) -> String {
        match key {
            MessageKey::MissingBaseUrl => "API base URL is not configured",
            MessageKey::MissingApiKey => "API key is not configured",
            MessageKey::MisfiledReasoning => {
                "The model streamed its reasoning as reply content; the response was discarded"
            }
            MessageKey::UnreadableResponse => "Failed to read the response stream",
        }
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Call parameters
// ---------------------------------------------------------------------------

/// Everything one call needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct CallParams {
    pub messages: Vec<Message>,
    pub api_config: ApiConfig,
    pub user_language: String,
    pub webpage_info: Option<WebpageInfo>,
}

impl CallParams {
    #[must_use]
    pub fn new(messages: Vec<Message>, api_config: ApiConfig) -> Self {
        Self {
            messages,
            api_config,
            user_language: "en".to_string(),
            webpage_info: None,
        }
    }

    #[must_use]
    pub fn with_user_language(mut self, user_language: impl Into<String>) -> Self {
        self.user_language = user_language.into();
        self
    }

    #[must_use]
    pub fn with_webpage_info(mut self, webpage_info: WebpageInfo) -> Self {
        self.webpage_info = Some(webpage_info);
        self
    }
}

/// Per-call stream options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOptions {
    pub detect_misfiled_think_silently: bool,
    pub misfiled_think_silently_prefix: Option<String>,
    pub misfiled_think_silently_prefixes: Vec<String>,
}

impl StreamOptions {
    #[must_use]
    pub fn from_features(features: &FeaturesConfig) -> Self {
        Self {
            detect_misfiled_think_silently: features.detect_misfiled_think_silently,
            misfiled_think_silently_prefix: features.misfiled_think_silently_prefix.clone(),
            misfiled_think_silently_prefixes: features.misfiled_think_silently_prefixes.clone(),
        }
    }

    /// The prefix list wins over the single prefix; with neither, the guard
    /// uses its default.
    fn guard_prefixes(&self) -> Vec<&str> {
        if !self.misfiled_think_silently_prefixes.is_empty() {
            return self
                .misfiled_think_silently_prefixes
                .iter()
                .map(String::as_str)
                .collect();
        }
        self.misfiled_think_silently_prefix
            .as_deref()
            .into_iter()
            .collect()
    }

    #[must_use]
    pub fn build_guard(&self) -> MisfiledReasoningGuard {
        MisfiledReasoningGuard::new(self.detect_misfiled_think_silently, self.guard_prefixes())
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ChatClient {
    transport: HttpTransport,
    normalizer: Arc<dyn UrlNormalizer>,
    localizer: Arc<dyn Localizer>,
    update_interval: Duration,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("update_interval", &self.update_interval)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// Client with default collaborators over the given HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(http: &HttpConfig) -> Result<Self, ChatError> {
        Ok(Self::with_transport(HttpTransport::new(http)?))
    }

    /// Client configured from a loaded config file.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ChatError> {
        Ok(Self::new(&config.http)?.with_update_interval(config.features.update_interval()))
    }

    #[must_use]
    pub fn with_transport(transport: HttpTransport) -> Self {
        Self {
            transport,
            normalizer: Arc::new(ChatCompletionsUrlNormalizer),
            localizer: Arc::new(DefaultLocalizer),
            update_interval: crate::stream::DEFAULT_UPDATE_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_url_normalizer(mut self, normalizer: Arc<dyn UrlNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    #[must_use]
    pub fn with_localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = localizer;
        self
    }

    #[must_use]
    pub fn with_update_interval(mut self, update_interval: Duration) -> Self {
        self.update_interval = update_interval;
        self
    }

    /// Prepare a streaming call. No I/O happens until
    /// [`StreamingCall::start_streaming`] is awaited.
    #[must_use]
    pub fn call_api(
        &self,
        params: CallParams,
        history: Arc<dyn HistoryStore>,
        conversation_id: impl Into<String>,
        on_update: UpdateCallback,
        options: StreamOptions,
    ) -> StreamingCall {
        StreamingCall {
            cancel: CancellationToken::new(),
            client: self.clone(),
            params,
            history,
            conversation_id: conversation_id.into(),
            on_update,
            options,
        }
    }
}

/// A prepared call. Cancel it through [`StreamingCall::cancel_token`].
pub struct StreamingCall {
    cancel: CancellationToken,
    client: ChatClient,
    params: CallParams,
    history: Arc<dyn HistoryStore>,
    conversation_id: String,
    on_update: UpdateCallback,
    options: StreamOptions,
}

struct FlushSink<'a> {
    history: &'a dyn HistoryStore,
    on_update: &'a UpdateCallback,
    conversation_id: &'a str,
}

impl FlushSink<'_> {
    /// Hand out independent copies so neither side can touch the live
    /// accumulator or each other's snapshot.
    fn flush(&self, message: &AccumulatedMessage) {
        self.history
            .update_last_message(self.conversation_id, message.clone());
        (self.on_update)(self.conversation_id, message.clone());
    }
}

impl StreamingCall {
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run the call to completion.
    ///
    /// Resolves to `Ok(Some(message))` with the full reply, or `Ok(None)`
    /// when cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] for a missing base URL or API key (before
    /// any I/O), [`ChatError::Upstream`] for a non-2xx status,
    /// [`ChatError::Transport`] when the body cannot be read, and
    /// [`ChatError::MisfiledReasoning`] when the guard trips.
    pub async fn start_streaming(self) -> Result<Option<AccumulatedMessage>, ChatError> {
        let started = std::time::Instant::now();
        let StreamingCall {
            cancel,
            client,
            params,
            history,
            conversation_id,
            on_update,
            options,
        } = self;
        let api = &params.api_config;

        if api.base_url.trim().is_empty() {
            return Err(ChatError::Config(
                client.localizer.message(MessageKey::MissingBaseUrl),
            ));
        }
        if api.api_key.trim().is_empty() {
            return Err(ChatError::Config(
                client.localizer.message(MessageKey::MissingApiKey),
            ));
        }

        let mut messages = params.messages;
        let system_prompt = compose_system_prompt(
            api.system_prompt(),
            &params.user_language,
            params.webpage_info.as_ref(),
        );
        prepend_system_message(&mut messages, system_prompt);

        let profile = resolve(&api.base_url, api.api_format.as_deref());
        let model = resolve_model(profile, api.model_name.as_deref());
        let normalized_url = client.normalizer.normalize(&api.base_url);
        let request = compose_request(
            profile,
            &normalized_url,
            api.api_key.trim(),
            &model,
            &messages,
        )?;
        debug!(
            profile = %profile,
            model = %model,
            url = %request.redacted_url(),
            message_count = messages.len(),
            "sending streaming request"
        );

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(conversation_id = %conversation_id, "call cancelled before response");
                return Ok(None);
            }
            result = client.transport.send_stream(&request) => match result {
                Ok(response) => response,
                Err(err) => {
                    warn!(profile = %profile, error = %err, "streaming request failed");
                    return Err(err);
                }
            },
        };

        let mut body = std::pin::pin!(response.bytes_stream());
        let mut decoder = StreamDecoder::new(profile, options.build_guard());
        let mut dispatcher = UpdateDispatcher::new(client.update_interval);
        let sink = FlushSink {
            history: history.as_ref(),
            on_update: &on_update,
            conversation_id: &conversation_id,
        };
        let guard_error = |err: ChatError| {
            if err.is_misfiled_reasoning() {
                ChatError::MisfiledReasoning(client.localizer.message(MessageKey::MisfiledReasoning))
            } else {
                err
            }
        };

        loop {
            let deadline = dispatcher.deadline();
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    decoder.abort();
                    info!(
                        conversation_id = %conversation_id,
                        flush_count = dispatcher.flush_count(),
                        "call cancelled while streaming"
                    );
                    return Ok(None);
                }
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let now = Instant::now();
                    if dispatcher.is_due(now) {
                        sink.flush(decoder.message());
                        dispatcher.mark_flushed(now);
                    }
                }
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        if decoder.feed(&bytes).map_err(guard_error)? {
                            let now = Instant::now();
                            if dispatcher.on_update(now) == DispatchAction::FlushNow {
                                sink.flush(decoder.message());
                                dispatcher.mark_flushed(now);
                            }
                        }
                    }
                    Some(Err(err)) => {
                        warn!(profile = %profile, error = %err, "response stream failed");
                        return Err(ChatError::Transport(format!(
                            "{}: {err}",
                            client.localizer.message(MessageKey::UnreadableResponse)
                        )));
                    }
                    None => break,
                },
            }
        }

        if decoder.finish().map_err(guard_error)? {
            dispatcher.on_update(Instant::now());
        }
        if dispatcher.needs_final_flush() {
            sink.flush(decoder.message());
            dispatcher.mark_flushed(Instant::now());
        }

        log_stream_complete(&StreamSummary {
            profile: decoder.profile(),
            model: &model,
            content_len: decoder.message().content.len(),
            reasoning_len: decoder.message().reasoning_content.len(),
            flush_count: dispatcher.flush_count(),
            skipped_records: decoder.skipped_records(),
            stop_reason: decoder.stop_reason(),
            usage: decoder.usage(),
            elapsed: started.elapsed(),
        });

        Ok(Some(decoder.into_message()))
    }
}
