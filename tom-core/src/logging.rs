//! Structured logging on `log` + `env_logger`.
//!
//! Context is an explicit [`RequestContext`] threaded through call sites
//! and rendered into every log line's message, rather than a singleton
//! logger carrying thread-local `{username, client_type, module_name}`
//! state, so the mapping from log record to request is unambiguous
//! without relying on which thread happens to be running.

use std::fmt;

/// Per-request logging context, carried by value through the orchestration
/// loop and formatted into every log line it touches.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub username: String,
    pub client_type: String,
    pub module_name: Option<String>,
}

impl RequestContext {
    pub fn new(username: impl Into<String>, client_type: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            client_type: client_type.into(),
            module_name: None,
        }
    }

    pub fn with_module(&self, module_name: impl Into<String>) -> Self {
        let mut ctx = self.clone();
        ctx.module_name = Some(module_name.into());
        ctx
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<12} | {:<4} | {:<15}",
            truncate_chars(&self.username, 12),
            truncate_chars(&self.client_type, 4),
            self.module_name.as_deref().unwrap_or("system")
        )
    }
}

/// Initialize the global `env_logger` subscriber. Call once per process,
/// at the top of `main`.
pub fn init(log_level: &str) {
    let level = match log_level.to_uppercase().as_str() {
        "DEBUG" => log::LevelFilter::Debug,
        "WARNING" => log::LevelFilter::Warn,
        "ERROR" => log::LevelFilter::Error,
        "CRITICAL" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

/// Log a user request at INFO, matching the original's `user_request` helper.
#[macro_export]
macro_rules! log_user_request {
    ($ctx:expr, $msg:expr) => {
        log::info!("[{}] request: {}", $ctx, $msg)
    };
}

/// Log a user-facing response at INFO, truncated to 100 chars.
#[macro_export]
macro_rules! log_user_response {
    ($ctx:expr, $msg:expr) => {{
        let text: &str = $msg;
        let char_count = text.chars().count();
        let truncated: String = text.chars().take(100).collect();
        log::info!("[{}] response: {}{}", $ctx, truncated, if char_count > 100 { "..." } else { "" });
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_display_truncates_long_fields() {
        let ctx = RequestContext::new("a-very-long-username", "web").with_module("calendar");
        let rendered = ctx.to_string();
        assert!(rendered.contains("a-very-long-"));
        assert!(rendered.contains("calendar"));
    }
}
