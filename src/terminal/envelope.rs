//! Terminal frame classification and rendering.
//!
//! Inbound socket text is either raw terminal output or a JSON envelope
//! `{"stream": "...", "data": "..."}`. Rendering colors `stderr` and dims
//! `system`; everything else is written verbatim.

use serde::Serialize;
use serde_json::Value;

const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// One classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Text that is not an envelope.
    Raw(String),
    Envelope { stream: Option<String>, data: String },
}

/// Classify one inbound text frame.
///
/// Only a JSON object with a string `data` field counts as an envelope; a
/// non-string `stream` is treated as absent.
pub fn classify(text: &str) -> Inbound {
    let trimmed = text.trim_start();
    if !trimmed.starts_with('{') {
        return Inbound::Raw(text.to_string());
    }

    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return Inbound::Raw(text.to_string());
    };
    let Some(data) = value.get("data").and_then(Value::as_str) else {
        return Inbound::Raw(text.to_string());
    };

    Inbound::Envelope {
        stream: value.get("stream").and_then(Value::as_str).map(str::to_string),
        data: data.to_string(),
    }
}

/// Render an inbound frame to the bytes written on the surface.
pub fn render(inbound: &Inbound) -> String {
    match inbound {
        Inbound::Raw(text) => text.clone(),
        Inbound::Envelope { stream, data } => match stream.as_deref() {
            Some("stderr") => format!("{RED}{data}{RESET}"),
            Some("system") => format!("{DIM}{data}{RESET}"),
            _ => data.clone(),
        },
    }
}

/// Dim inline status line, e.g. when the socket closes.
pub fn status_line(message: &str) -> String {
    format!("\r\n{DIM}[{message}]{RESET}\r\n")
}

/// Red inline error line.
pub fn error_line(message: &str) -> String {
    format!("\r\n{RED}[{message}]{RESET}\r\n")
}

/// Outbound control messages. Keystrokes are sent as raw text instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Control {
    Resize { cols: u16, rows: u16 },
}

impl Control {
    pub fn to_text(self) -> String {
        // Serializing a plain enum of integers cannot fail.
        serde_json::to_string(&self).unwrap_or_default()
    }
}
