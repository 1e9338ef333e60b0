//! Extracts tool calls from free-text model replies.
//!
//! Grammar, matched left to right over the whole reply:
//!
//! ```text
//! call      := "<tool_use" attr attr WS* ">" body "</tool_use>"
//! attr      := WS+ ("id" | "name") WS* "=" WS* '"' [^"]+ '"'
//! body      := any text up to the first following "</tool_use>"
//! ```
//!
//! The body must hold a JSON object. A call whose start tag is malformed is
//! skipped and scanning resumes right after its `<tool_use`; a call whose body
//! is not a JSON object is dropped once its end tag is consumed. Neither stops
//! later calls from being returned.

use serde_json::Value;
use tracing::{debug, warn};

use crate::types::ToolCall;

const OPEN: &str = "<tool_use";
const CLOSE: &str = "</tool_use>";

/// Every well-formed tool call in `reply`, in document order.
pub fn parse_tool_calls(reply: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let mut cursor = 0;

    while let Some(found) = reply[cursor..].find(OPEN) {
        let tag_start = cursor + found;
        let after_open = tag_start + OPEN.len();

        let Some((id, name, body_start)) = parse_start_tag(reply, after_open) else {
            debug!(offset = tag_start, "skipping malformed tool_use start tag");
            cursor = after_open;
            continue;
        };

        let Some(body_len) = reply[body_start..].find(CLOSE) else {
            warn!(id, name, "tool_use tag has no closing tag");
            break;
        };
        let body = reply[body_start..body_start + body_len].trim();
        cursor = body_start + body_len + CLOSE.len();

        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(input)) => calls.push(ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                input,
            }),
            Ok(other) => warn!(id, name, body = %other, "tool input is not a JSON object"),
            Err(e) => warn!(id, name, body, error = %e, "failed to parse tool input"),
        }
    }

    calls
}

/// Parse the attributes and `>` that follow `<tool_use`, returning the id,
/// the name, and the offset where the body begins.
fn parse_start_tag(text: &str, mut pos: usize) -> Option<(&str, &str, usize)> {
    let mut id = None;
    let mut name = None;

    for _ in 0..2 {
        let ws = leading_whitespace(&text[pos..]);
        if ws == 0 {
            return None;
        }
        pos += ws;
        let (key, value, next) = parse_attribute(text, pos)?;
        let slot = match key {
            "id" => &mut id,
            "name" => &mut name,
            _ => return None,
        };
        if slot.replace(value).is_some() {
            return None;
        }
        pos = next;
    }

    pos += leading_whitespace(&text[pos..]);
    let rest = text[pos..].strip_prefix('>')?;
    Some((id?, name?, text.len() - rest.len()))
}

/// `key="value"` starting at `pos`; returns key, value, and the offset after
/// the closing quote.
fn parse_attribute(text: &str, pos: usize) -> Option<(&str, &str, usize)> {
    let rest = &text[pos..];
    let key_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if key_len == 0 {
        return None;
    }
    let key = &rest[..key_len];

    let rest = rest[key_len..].trim_start().strip_prefix('=')?.trim_start();
    let rest = rest.strip_prefix('"')?;
    let value_len = rest.find('"')?;
    if value_len == 0 {
        return None;
    }
    let value = &rest[..value_len];
    let after = text.len() - rest.len() + value_len + 1;
    Some((key, value, after))
}

fn leading_whitespace(text: &str) -> usize {
    text.len() - text.trim_start().len()
}
