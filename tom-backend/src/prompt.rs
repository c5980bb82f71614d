//! Prompt assembly: the clock preamble, the assistant charter, and the
//! response-format hint per client kind.

use chrono::Utc;
use chrono_tz::Tz;

/// Client surface the response is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Web,
    Pwa,
    Tui,
}

impl ClientKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "tui" => ClientKind::Tui,
            "pwa" => ClientKind::Pwa,
            _ => ClientKind::Web,
        }
    }
}

/// Render the slot-0 clock preamble: weekday, day, month, year, ISO week
/// number, and GPS coordinates if supplied. Falls back to Europe/Paris
/// when no position is given.
pub fn clock_preamble(timezone: Option<Tz>, position: Option<(f64, f64)>) -> String {
    let tz = timezone.unwrap_or(chrono_tz::Europe::Paris);
    let now = Utc::now().with_timezone(&tz);
    let week = now.iso_week().week();
    let formatted = now.format("%A %d %B %Y %H:%M:%S");

    let gps = match position {
        Some((lat, lon)) => format!("\nMy actual GPS position is:\nlatitude: {lat}\nlongitude: {lon}."),
        None => String::new(),
    };

    format!("Today is {formatted}. Week number is {week}.{gps}")
}

/// The fixed assistant charter plus the user's personal context. Appended
/// once as slot 1 when a conversation is (re)created.
pub fn base_charter(personal_context: &str) -> String {
    format!(
        "Your name is Tom, and you are my personal assistant. You have access to numerous \
         external functionalities via function calls. Since you have access to more functions \
         than your memory can hold, they are grouped into modules. A module is a logical \
         grouping of functions within a specific scope. One of your primary tasks will be \
         \"triage\", which involves identifying the modules to load to fulfill the user's \
         request.\n\n\
         It is important to be precise and not make assumptions. If the request is unclear, \
         ask for clarification.\n\n{personal_context}"
    )
}

/// Response-format hint appended before the execute phase, keyed on
/// `client_kind`: markdown is fine in a TUI, but web/pwa responses are
/// read aloud by text-to-speech and must stay plain.
pub fn response_context(kind: ClientKind) -> &'static str {
    match kind {
        ClientKind::Tui => {
            "Your response will be displayed in a TUI terminal application. You should use \
             markdown to format your answer for better readability."
        }
        ClientKind::Web | ClientKind::Pwa => {
            "Your response will be displayed in a web browser or mobile app, so it must be \
             concise and free of markdown formatting, lists, or complex layouts. Use simple \
             text and line breaks. Responses are typically read aloud via text-to-speech."
        }
    }
}

pub fn greeting(lang: &str) -> &'static str {
    if lang == "fr" {
        "Salut ! Comment puis-je t'aider ?"
    } else {
        "Hello! How can I help you?"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_preamble_includes_gps_when_given() {
        let preamble = clock_preamble(None, Some((48.85, 2.35)));
        assert!(preamble.contains("latitude: 48.85"));
    }

    #[test]
    fn clock_preamble_omits_gps_when_absent() {
        let preamble = clock_preamble(None, None);
        assert!(!preamble.contains("latitude"));
    }

    #[test]
    fn greeting_is_localized() {
        assert_eq!(greeting("fr"), "Salut ! Comment puis-je t'aider ?");
        assert_eq!(greeting("en"), "Hello! How can I help you?");
    }
}
