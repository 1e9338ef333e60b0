//! Confirmation gate for clicks that look irreversible.

use std::io::Write;

use async_trait::async_trait;
use tracing::warn;

use crate::types::ToolCall;

/// Flags clicks whose selector contains a blocklisted verb.
///
/// Matching is a case-insensitive substring test on the selector only, so
/// `#unsubmitted-note` is flagged just like `#submit`.
#[derive(Debug, Clone)]
pub struct DestructiveActionGate {
    blocklist: Vec<String>,
}

impl DestructiveActionGate {
    pub fn new<I, S>(verbs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            blocklist: verbs
                .into_iter()
                .map(|v| v.as_ref().to_lowercase())
                .filter(|v| !v.is_empty())
                .collect(),
        }
    }

    pub fn is_destructive(&self, call: &ToolCall) -> bool {
        if call.name != "click" {
            return false;
        }
        let selector = call.str_input("selector").unwrap_or_default().to_lowercase();
        self.blocklist.iter().any(|verb| selector.contains(verb.as_str()))
    }
}

/// Decides whether a flagged tool call may run.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, call: &ToolCall) -> bool;
}

#[async_trait]
impl<T: Confirm + ?Sized> Confirm for std::sync::Arc<T> {
    async fn confirm(&self, call: &ToolCall) -> bool {
        (**self).confirm(call).await
    }
}

/// Approves everything without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl Confirm for AutoApprove {
    async fn confirm(&self, call: &ToolCall) -> bool {
        warn!(
            tool = %call.name,
            input = %serde_json::Value::Object(call.input.clone()),
            "auto-approving destructive action"
        );
        true
    }
}

/// Asks on the terminal and blocks the loop until the user answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt;

#[async_trait]
impl Confirm for StdinPrompt {
    async fn confirm(&self, call: &ToolCall) -> bool {
        let question = format!(
            "\nAgent wants to: {}({})\nAllow? (y/n): ",
            call.name,
            serde_json::Value::Object(call.input.clone())
        );
        let answer = tokio::task::spawn_blocking(move || {
            print!("{question}");
            std::io::stdout().flush().ok();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => line.trim().eq_ignore_ascii_case("y"),
            Ok(Err(e)) => {
                warn!(error = %e, "could not read confirmation, treating as rejection");
                false
            }
            Err(e) => {
                warn!(error = %e, "confirmation prompt failed, treating as rejection");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, input: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "1".into(),
            name: name.into(),
            input: input.as_object().cloned().unwrap_or_default(),
        }
    }

    fn gate() -> DestructiveActionGate {
        DestructiveActionGate::new(["submit", "delete", "pay", "checkout", "confirm"])
    }

    #[test]
    fn flags_blocklisted_click_case_insensitively() {
        assert!(gate().is_destructive(&call("click", json!({"selector": "#Submit-Now"}))));
        assert!(gate().is_destructive(&call("click", json!({"selector": ".CHECKOUT"}))));
    }

    #[test]
    fn leaves_harmless_clicks_alone() {
        assert!(!gate().is_destructive(&call("click", json!({"selector": "#cancel"}))));
        assert!(!gate().is_destructive(&call("click", json!({}))));
    }

    #[test]
    fn substring_policy_false_positives_are_kept() {
        assert!(gate().is_destructive(&call("click", json!({"selector": "#unsubmitted-note"}))));
    }

    #[test]
    fn only_clicks_are_gated() {
        let navigate = call("navigate", json!({"url": "https://pay.example/delete"}));
        assert!(!gate().is_destructive(&navigate));
        assert!(!gate().is_destructive(&call("type", json!({"selector": "#submit", "text": "x"}))));
    }

    #[tokio::test]
    async fn auto_approve_allows() {
        assert!(AutoApprove.confirm(&call("click", json!({"selector": "#pay"}))).await);
    }
}
