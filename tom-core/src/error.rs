//! The error taxonomy shared by every Tom process.
//!
//! Each variant documents the policy a caller is expected to apply — retry,
//! surface to the end user, log and continue, or abort startup. Providers
//! and the backend funnel their failures through [`TomError`] so the
//! gateway can make a single, consistent decision about the HTTP status to
//! return.

use thiserror::Error;

/// Unified error type for all Tom components.
#[derive(Debug, Error)]
pub enum TomError {
    /// Malformed or missing configuration. Fatal: the process should exit(1).
    #[error("configuration error: {0}")]
    Config(String),

    /// Session token did not resolve to a live user, or credentials were rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A downstream HTTP peer (backend, provider, memory service) could not be reached.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A downstream HTTP peer did not respond within its deadline.
    #[error("upstream timed out after {0:?}")]
    UpstreamTimeout(std::time::Duration),

    /// The LLM provider returned a transient failure (HTTP 5xx). Caller should
    /// retry up to twice with a 300ms backoff before escalating to `LLMPermanent`.
    #[error("LLM call failed transiently: {0}")]
    LlmTransient(String),

    /// The LLM provider returned a non-retryable failure.
    #[error("LLM call failed: {0}")]
    LlmPermanent(String),

    /// A tool was invoked with arguments that failed schema validation.
    /// Returned to the model as a `{"status":"error",...}` tool result, not a
    /// hard failure of the turn.
    #[error("invalid tool arguments: {0}")]
    ToolArgError(String),

    /// A tool's upstream dependency failed. Also surfaced to the model as a
    /// tool result so it can self-correct or inform the user.
    #[error("tool upstream error: {0}")]
    ToolUpstreamError(String),

    /// A provider's local SQLite cache failed to open or its schema didn't
    /// match expectations. Policy: drop and recreate the table, log at ERROR.
    #[error("cache corruption: {0}")]
    CacheCorruption(String),

    /// Sending a push notification failed. Policy: leave the reminder
    /// unsent and retry on the next scheduler tick; drop the token only if
    /// the push provider reports it as permanently invalid.
    #[error("push send failed: {0}")]
    PushSendError(String),
}

pub type Result<T> = std::result::Result<T, TomError>;

impl From<reqwest::Error> for TomError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TomError::UpstreamTimeout(std::time::Duration::from_secs(30))
        } else {
            TomError::UpstreamUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TomError {
    fn from(err: serde_json::Error) -> Self {
        TomError::ToolArgError(err.to_string())
    }
}
