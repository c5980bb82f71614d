//! Firebase push delivery. The Firebase integration itself is an external
//! collaborator out of scope for this core, but the fan-out seam and its
//! logging are part of this provider's behavior.

use async_trait::async_trait;
use tom_core::error::{Result, TomError};

/// One outbound push. A real deployment swaps [`LoggingPushSender`] for a
/// `firebase-admin`-backed implementation without touching the worker or
/// the tool handlers.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, token: &str, title: &str, body: &str) -> Result<()>;
}

/// Stand-in used whenever Firebase credentials are not configured: logs
/// what would have been sent and reports success, so reminder/recurrence
/// bookkeeping can be exercised without a live Firebase project.
pub struct LoggingPushSender;

#[async_trait]
impl PushSender for LoggingPushSender {
    async fn send(&self, token: &str, title: &str, body: &str) -> Result<()> {
        log::info!("push to token {token}: {title} — {body}");
        Ok(())
    }
}

/// Fans a single message out to every token. Succeeds if at least one
/// device accepted it; returns an error only when every send failed.
pub async fn fan_out(sender: &dyn PushSender, tokens: &[String], title: &str, body: &str) -> Result<()> {
    if tokens.is_empty() {
        return Err(TomError::PushSendError("no device tokens registered".into()));
    }
    let mut delivered = 0;
    for token in tokens {
        match sender.send(token, title, body).await {
            Ok(()) => delivered += 1,
            Err(e) => log::warn!("push to token {token} failed: {e}"),
        }
    }
    if delivered == 0 {
        return Err(TomError::PushSendError("every device token rejected the push".into()));
    }
    Ok(())
}
