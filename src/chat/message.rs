//! Text extraction from chat messages.
//!
//! UI messages arrive either in the parts format (`{"parts": [...]}` with a
//! `type` on each part) or the legacy format with a `content` field.
//! [`extract_text`] flattens both into display text and never fails.

use serde_json::Value;

use crate::run::ChatMessage;

/// Flatten a message into displayable text.
///
/// Parts are rendered in order; when they yield nothing but whitespace the
/// legacy `content` field is used instead.
pub fn extract_text(message: &Value) -> String {
    let from_parts = message
        .get("parts")
        .and_then(Value::as_array)
        .map(|parts| parts.iter().map(render_part).collect::<String>())
        .unwrap_or_default();

    if !from_parts.trim().is_empty() {
        return from_parts;
    }

    message.get("content").map(coerce_content).unwrap_or_default()
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn render_part(part: &Value) -> String {
    let Some(kind) = str_field(part, "type") else {
        return String::new();
    };

    match kind {
        "text" => str_field(part, "text").unwrap_or_default().to_string(),

        "reasoning" | "thinking" => {
            let text = str_field(part, "text")
                .or_else(|| str_field(part, "reasoning"))
                .unwrap_or_default();
            format!("<details><summary>Thinking</summary>\n\n{text}\n\n</details>\n\n")
        }

        "tool-invocation" => {
            let name = part
                .get("toolInvocation")
                .and_then(|inv| str_field(inv, "toolName"))
                .or_else(|| str_field(part, "toolName"))
                .unwrap_or("tool");
            tool_line(name)
        }

        "source-url" | "source" => {
            let source = part.get("source").unwrap_or(part);
            let url = str_field(source, "url").unwrap_or_default();
            let title = str_field(source, "title").unwrap_or(url);
            format!("\n📎 [{title}]({url})\n")
        }

        "source-document" => {
            let title = str_field(part, "title")
                .or_else(|| str_field(part, "filename"))
                .unwrap_or("document");
            format!("\n📄 {title}\n")
        }

        "file" => {
            let url = str_field(part, "url").unwrap_or_default();
            let name = str_field(part, "filename").unwrap_or(url);
            format!("\n📁 [{name}]({url})\n")
        }

        "step-start" => "\n— step —\n".to_string(),
        "step-finish" => "\n— step complete —\n".to_string(),

        other => match other.strip_prefix("tool-") {
            Some(name) if !name.is_empty() => tool_line(name),
            _ => format!("\n[{other}]\n"),
        },
    }
}

fn tool_line(name: &str) -> String {
    format!("\n\n`🔧 {name}`\n\n")
}

/// Legacy `content`: a string, an array of fragments, or an object.
fn coerce_content(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                other => str_field(other, "text"),
            })
            .collect(),
        Value::Object(_) => str_field(content, "content")
            .or_else(|| str_field(content, "text"))
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// Convert a UI message into the role/content pair sent to the run endpoint.
pub fn to_wire(message: &Value) -> ChatMessage {
    let role = str_field(message, "role").unwrap_or("user");
    ChatMessage {
        role: role.to_string(),
        content: extract_text(message),
    }
}

/// Convert a saved conversation into wire messages.
///
/// Accepts a bare array of UI messages or an object with a `messages` array.
/// Messages with no displayable text are left out.
pub fn conversation_to_wire(conversation: &Value) -> Vec<ChatMessage> {
    let messages = conversation
        .as_array()
        .or_else(|| conversation.get("messages").and_then(Value::as_array));

    messages
        .into_iter()
        .flatten()
        .map(to_wire)
        .filter(|m| !m.content.trim().is_empty())
        .collect()
}
