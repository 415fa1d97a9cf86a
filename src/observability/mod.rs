use std::time::Duration;

use crate::protocol::canonical::StreamUsage;
use crate::protocol::ProviderProfile;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber with the configured log level.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (DEBUG, INFO, ERROR)
///
/// Output goes to stderr so it never interleaves with streamed content on
/// stdout. A second call is a no-op.
pub fn init_tracing(log_level: &str) {
    let Some(directive) = tracing_directive(log_level) else {
        return;
    };

    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("INFO"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

fn tracing_directive(log_level: &str) -> Option<String> {
    let level = log_level.trim().to_uppercase();
    match level.as_str() {
        "DISABLED" => None,
        "WARNING" => Some("WARN".to_string()),
        "CRITICAL" => Some("ERROR".to_string()),
        _ => Some(level),
    }
}

/// What one finished stream looked like.
#[derive(Debug, Clone)]
pub struct StreamSummary<'a> {
    pub profile: ProviderProfile,
    pub model: &'a str,
    pub content_len: usize,
    pub reasoning_len: usize,
    pub flush_count: u64,
    pub skipped_records: u64,
    pub stop_reason: Option<&'a str>,
    pub usage: StreamUsage,
    pub elapsed: Duration,
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Log the end of a completed stream.
pub fn log_stream_complete(summary: &StreamSummary<'_>) {
    info!(
        profile = %summary.profile,
        model = summary.model,
        content_len = summary.content_len,
        reasoning_len = summary.reasoning_len,
        flush_count = summary.flush_count,
        skipped_records = summary.skipped_records,
        stop_reason = summary.stop_reason.unwrap_or("none"),
        input_tokens = summary.usage.input_tokens,
        output_tokens = summary.usage.output_tokens,
        duration_ms = elapsed_ms(summary.elapsed),
        "stream complete"
    );
}
