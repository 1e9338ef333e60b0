use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who authored a turn in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A message in the conversation history sent to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// An element the page exposes for interaction.
///
/// `selector` is best-effort (id, then first class, then tag name) and is
/// not guaranteed to be unique on the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractiveElement {
    pub selector: String,
    pub text: String,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub visible: bool,
}

/// What the agent observes at the start of an iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub raw_text: String,
    pub elements: Vec<InteractiveElement>,
}

/// A single action request extracted from a model reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Map<String, Value>,
}

impl ToolCall {
    /// String field of the input, if present.
    pub fn str_input(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(Value::as_str)
    }
}

/// Per-task progress owned by the agent loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskState {
    pub iteration_count: usize,
    pub actions_taken: Vec<String>,
    pub last_url: Option<String>,
}

impl TaskState {
    /// The trailing `window` action labels, oldest first.
    pub fn recent_actions(&self, window: usize) -> &[String] {
        let start = self.actions_taken.len().saturating_sub(window);
        &self.actions_taken[start..]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: String,
    pub detail: String,
}

pub const DEFAULT_MAX_ITERATIONS: usize = 20;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const ELEMENT_TEXT_MAX_CHARS: usize = 50;

/// Phrases that mark a tool-free reply as the model declaring the task done.
pub const COMPLETION_PHRASES: &[&str] = &["task completed", "done", "finished", "successfully"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_actions_returns_trailing_window() {
        let state = TaskState {
            actions_taken: (1..=7).map(|i| format!("click:#b{i}")).collect(),
            ..TaskState::default()
        };
        assert_eq!(state.recent_actions(3), ["click:#b5", "click:#b6", "click:#b7"]);
        assert_eq!(state.recent_actions(10).len(), 7);
    }

    #[test]
    fn element_deserializes_from_page_json() {
        let raw =
            r##"{"selector":"#q","text":"Search","type":"text","placeholder":"Find","visible":true}"##;
        let el: InteractiveElement = serde_json::from_str(raw).unwrap();
        assert_eq!(el.element_type, "text");
        assert!(el.visible);
    }
}
