use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error};

use crate::config::ModelConfig;
use crate::error::AgentError;
use crate::types::Turn;

/// Tool catalogue and behavioral rules sent with every request.
pub const SYSTEM_PROMPT: &str = r#"You are an AI agent that controls a real web browser to complete tasks for the user.

Available tools:
- navigate(url): Navigate to a URL
- click(selector): Click an element using a CSS selector
- type(selector, text): Type text into an input field
- scroll(direction, amount): Scroll the page (direction: "up" or "down", amount: number of scroll steps)
- wait(seconds): Wait for the given number of seconds
- extract_text(): Get the visible text of the page
- get_elements(): Get the list of interactive elements
- screenshot(path): Save a screenshot
- get_url(): Get the current URL
- wait_for_element(selector, timeout): Wait up to timeout milliseconds for an element to appear

To use a tool, write it exactly like this (the body is a JSON object of arguments):
<tool_use id="unique_id" name="tool_name">
{"param1": "value1", "param2": "value2"}
</tool_use>

Strategy:
1. Check the current page state before acting.
2. Use get_elements() to find the right selector; prefer ids and unique classes.
3. Execute actions step by step and verify the result of each one.
4. If an action fails, try an alternative approach.
5. When the task is complete, reply WITHOUT any tool calls and start with "Task completed", followed by a summary of what was accomplished."#;

/// Produces the assistant's next reply for a conversation.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system_prompt: &str, history: &[Turn]) -> Result<String>;
}

/// OpenAI-compatible chat-completions client.
pub struct ChatClient {
    client: Client,
    api_key: String,
    config: ModelConfig,
}

impl ChatClient {
    pub fn new(api_key: String, config: ModelConfig) -> Self {
        Self {
            client: Client::new(),
            api_key,
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LanguageModel for ChatClient {
    async fn complete(&self, system_prompt: &str, history: &[Turn]) -> Result<String> {
        let messages: Vec<serde_json::Value> = std::iter::once(json!({
            "role": "system",
            "content": system_prompt,
        }))
        .chain(
            history
                .iter()
                .map(|t| json!({"role": t.role.as_str(), "content": t.content})),
        )
        .collect();

        debug!(messages = messages.len(), model = %self.config.model, "sending chat request");

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.config.model,
                "messages": messages,
                "max_tokens": self.config.max_tokens,
                "temperature": self.config.temperature,
            }))
            .send()
            .await?;

        let status = response.status();
        let json_resp: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let message = json_resp["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error")
                .to_string();
            error!(status = status.as_u16(), %message, "model API error");
            return Err(AgentError::Model {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let content = json_resp["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("No content in LLM response: {}", json_resp))?;

        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url() {
        let client = ChatClient::new(
            "k".into(),
            ModelConfig {
                base_url: "http://localhost:8080/v1/".into(),
                ..ModelConfig::default()
            },
        );
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn prompt_lists_every_tool() {
        for name in crate::dispatch::ACTION_NAMES {
            assert!(SYSTEM_PROMPT.contains(&format!("- {name}(")), "{name}");
        }
    }
}
