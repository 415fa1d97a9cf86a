/// Error type returned by every fallible operation on a streaming call.
///
/// Cancellation is deliberately absent: a cancelled call resolves with
/// `Ok(None)` rather than an error.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Protocol translation error: {0}")]
    Translation(String),
    #[error("Misfiled reasoning detected: {0}")]
    MisfiledReasoning(String),
}

/// Broad error category, mostly useful for deciding whether a whole call is
/// worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    InvalidRequest,
    Authentication,
    Permission,
    RateLimit,
    ServerError,
    MisfiledReasoning,
    Unknown,
}

/// Map an upstream HTTP status code to an error category.
#[must_use]
pub fn category_from_upstream_status(status: u16) -> ErrorCategory {
    match status {
        400 | 404 | 422 => ErrorCategory::InvalidRequest,
        401 => ErrorCategory::Authentication,
        403 => ErrorCategory::Permission,
        429 => ErrorCategory::RateLimit,
        500..=599 => ErrorCategory::ServerError,
        _ => ErrorCategory::Unknown,
    }
}

impl ChatError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            ChatError::Config(_) => ErrorCategory::Configuration,
            ChatError::MisfiledReasoning(_) => ErrorCategory::MisfiledReasoning,
            ChatError::Transport(_) | ChatError::Translation(_) => ErrorCategory::ServerError,
            ChatError::Upstream { status, .. } => category_from_upstream_status(*status),
        }
    }

    /// True when the stream was aborted because reasoning text showed up in
    /// the visible content channel.
    #[must_use]
    pub fn is_misfiled_reasoning(&self) -> bool {
        matches!(self, ChatError::MisfiledReasoning(_))
    }
}

impl From<crate::config::ConfigError> for ChatError {
    fn from(err: crate::config::ConfigError) -> Self {
        ChatError::Config(err.to_string())
    }
}
