use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::browser::{Browser, ScrollDirection};
use crate::compress::ContextCompressor;
use crate::config::{Pacing, pause};
use crate::error::AgentError;
use crate::retry::{Recovery, RetryCoordinator};
use crate::types::{TaskState, ToolCall};

/// Every tool name the model may use.
pub const ACTION_NAMES: &[&str] = &[
    "navigate",
    "click",
    "type",
    "scroll",
    "wait",
    "extract_text",
    "get_elements",
    "screenshot",
    "get_url",
    "wait_for_element",
];

/// Longest pause a single `wait` may request.
pub const MAX_WAIT_SECS: f64 = 60.0;

/// A single browser action the model asked for.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Navigate {
        url: String,
    },
    Click {
        selector: String,
    },
    Type {
        selector: String,
        text: String,
    },
    Scroll {
        #[serde(default)]
        direction: ScrollDirection,
        #[serde(default = "default_scroll_amount")]
        amount: u32,
    },
    Wait {
        #[serde(default = "default_wait_seconds")]
        seconds: f64,
    },
    ExtractText,
    GetElements,
    Screenshot {
        #[serde(default = "default_screenshot_path")]
        path: PathBuf,
    },
    GetUrl,
    WaitForElement {
        selector: String,
        #[serde(default = "default_wait_timeout")]
        timeout: u64,
    },
    /// A name outside the supported set.
    #[serde(skip)]
    Unknown(String),
}

fn default_scroll_amount() -> u32 {
    3
}

fn default_wait_seconds() -> f64 {
    1.0
}

fn default_screenshot_path() -> PathBuf {
    PathBuf::from("screenshot.png")
}

fn default_wait_timeout() -> u64 {
    5000
}

impl Action {
    /// Build an action from a tool name and its JSON input.
    ///
    /// Unknown names are not an error; missing or mistyped fields are.
    pub fn from_input(name: &str, input: &Map<String, Value>) -> Result<Self, AgentError> {
        if !ACTION_NAMES.contains(&name) {
            return Ok(Action::Unknown(name.to_string()));
        }
        let mut tagged = input.clone();
        tagged.insert("action".to_string(), Value::String(name.to_string()));
        serde_json::from_value(Value::Object(tagged)).map_err(|e| AgentError::InvalidParams {
            action: name.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Runs actions against the browser and describes the result in text.
#[derive(Debug)]
pub struct ActionDispatcher {
    pacing: Pacing,
    compressor: ContextCompressor,
    retry: RetryCoordinator,
}

impl ActionDispatcher {
    pub fn new(pacing: Pacing, compressor: ContextCompressor, retry: RetryCoordinator) -> Self {
        Self {
            pacing,
            compressor,
            retry,
        }
    }

    pub fn retry(&self) -> &RetryCoordinator {
        &self.retry
    }

    pub fn retry_mut(&mut self) -> &mut RetryCoordinator {
        &mut self.retry
    }

    /// Execute `call` and return the observation for the model.
    ///
    /// Failures come back as `Error executing <name>: ...` text and are
    /// recorded in the error ledger.
    pub async fn dispatch<B: Browser + ?Sized>(
        &mut self,
        browser: &B,
        state: &mut TaskState,
        call: &ToolCall,
    ) -> String {
        let result = match Action::from_input(&call.name, &call.input) {
            Ok(action) => self.run(browser, state, action).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(observation) => observation,
            Err(e) => {
                self.retry.record(call.name.as_str(), format!("{e:#}"));
                let message = format!("Error executing {}: {e:#}", call.name);
                error!("{message}");
                message
            }
        }
    }

    async fn run<B: Browser + ?Sized>(
        &mut self,
        browser: &B,
        state: &mut TaskState,
        action: Action,
    ) -> anyhow::Result<String> {
        match action {
            Action::Navigate { url } => {
                browser.navigate(&url).await?;
                state.last_url = Some(url.clone());
                pause(self.pacing.navigate_ms).await;
                Ok(format!("Successfully navigated to {url}"))
            }
            Action::Click { selector } => self.click(browser, state, &selector).await,
            Action::Type { selector, text } => {
                browser.type_text(&selector, &text).await?;
                state.actions_taken.push(format!("type:{selector}"));
                pause(self.pacing.type_ms).await;
                let preview: String = text.chars().take(50).collect();
                Ok(format!("Typed in {selector}: {preview}"))
            }
            Action::Scroll { direction, amount } => {
                browser.scroll(direction, amount).await?;
                pause(self.pacing.scroll_ms).await;
                Ok(format!("Scrolled {} by {amount} steps", direction.as_str()))
            }
            Action::Wait { seconds } => {
                if seconds > MAX_WAIT_SECS {
                    return Err(AgentError::InvalidParams {
                        action: "wait".to_string(),
                        reason: format!("seconds must be at most {MAX_WAIT_SECS}"),
                    }
                    .into());
                }
                let duration = Duration::try_from_secs_f64(seconds).map_err(|e| {
                    AgentError::InvalidParams {
                        action: "wait".to_string(),
                        reason: e.to_string(),
                    }
                })?;
                tokio::time::sleep(duration).await;
                Ok(format!("Waited {seconds} seconds"))
            }
            Action::ExtractText => {
                let text = browser.extract_text_content().await?;
                Ok(self.compressor.compress_extracted_text(&text))
            }
            Action::GetElements => {
                let elements = browser.get_interactive_elements().await?;
                Ok(self.compressor.format_listed_elements(&elements))
            }
            Action::Screenshot { path } => {
                browser.take_screenshot(&path).await?;
                Ok(format!("Screenshot saved to {}", path.display()))
            }
            Action::GetUrl => {
                let url = browser.get_current_url().await?;
                Ok(format!("Current URL: {url}"))
            }
            Action::WaitForElement { selector, timeout } => {
                match browser.wait_for_element(&selector, timeout).await {
                    Ok(()) => Ok(format!("Element appeared: {selector}")),
                    Err(e) => {
                        self.retry.record("wait_for_element", format!("{e:#}"));
                        match self.retry.recover_timeout(&selector, browser).await {
                            Recovery::Continue | Recovery::RetryOnce => {
                                Ok(format!("Timeout for element: {selector}, continuing..."))
                            }
                            Recovery::Exhausted => Err(e),
                        }
                    }
                }
            }
            Action::Unknown(name) => Ok(format!("Unknown tool: {name}")),
        }
    }

    async fn click<B: Browser + ?Sized>(
        &mut self,
        browser: &B,
        state: &mut TaskState,
        selector: &str,
    ) -> anyhow::Result<String> {
        let observation = match browser.click(selector).await {
            Ok(()) => format!("Successfully clicked: {selector}"),
            Err(e) => {
                match self.retry.recover_click(selector, browser).await {
                    Recovery::RetryOnce => {
                        pause(self.pacing.retry_ms).await;
                        // A failed re-click is recorded once by `dispatch`.
                        browser.click(selector).await?;
                        self.retry.record("click", format!("{e:#}"));
                        info!(selector, "click succeeded after retry");
                        format!("Clicked after retry: {selector}")
                    }
                    Recovery::Continue | Recovery::Exhausted => return Err(e),
                }
            }
        };
        state.actions_taken.push(format!("click:{selector}"));
        pause(self.pacing.click_ms).await;
        Ok(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextConfig;
    use crate::test_support::FakeBrowser;
    use crate::types::InteractiveElement;
    use serde_json::json;

    fn dispatcher(max_retries: u32) -> ActionDispatcher {
        ActionDispatcher::new(
            Pacing::none(),
            ContextCompressor::new(ContextConfig::default()),
            RetryCoordinator::new(max_retries, 0),
        )
    }

    fn call(name: &str, input: Value) -> ToolCall {
        ToolCall {
            id: "t".into(),
            name: name.into(),
            input: input.as_object().cloned().unwrap_or_default(),
        }
    }

    fn listed(selector: &str) -> Vec<InteractiveElement> {
        vec![InteractiveElement {
            selector: selector.into(),
            ..Default::default()
        }]
    }

    #[test]
    fn builds_actions_with_defaults() {
        let empty = Map::new();
        assert_eq!(
            Action::from_input("scroll", &empty).unwrap(),
            Action::Scroll {
                direction: ScrollDirection::Down,
                amount: 3
            }
        );
        assert_eq!(
            Action::from_input("screenshot", &empty).unwrap(),
            Action::Screenshot {
                path: PathBuf::from("screenshot.png")
            }
        );
        assert_eq!(Action::from_input("get_url", &empty).unwrap(), Action::GetUrl);
        assert_eq!(
            Action::from_input("hover", &empty).unwrap(),
            Action::Unknown("hover".into())
        );
    }

    #[test]
    fn missing_field_is_a_parameter_error() {
        let input = json!({"selector": "#q"});
        let err = Action::from_input("type", input.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, AgentError::InvalidParams { ref action, .. } if action == "type"));
    }

    #[tokio::test]
    async fn negative_wait_is_rejected() {
        let browser = FakeBrowser::new();
        let mut dispatcher = dispatcher(3);
        let mut state = TaskState::default();
        let out = dispatcher
            .dispatch(&browser, &mut state, &call("wait", json!({"seconds": -1})))
            .await;
        assert!(
            out.starts_with("Error executing wait: invalid parameters for wait"),
            "{out}"
        );
        let out = dispatcher
            .dispatch(&browser, &mut state, &call("wait", json!({"seconds": 0})))
            .await;
        assert_eq!(out, "Waited 0 seconds");
    }

    #[tokio::test]
    async fn overlong_wait_is_rejected_without_sleeping() {
        let browser = FakeBrowser::new();
        let mut dispatcher = dispatcher(3);
        let out = dispatcher
            .dispatch(
                &browser,
                &mut TaskState::default(),
                &call("wait", json!({"seconds": 1e9})),
            )
            .await;
        assert!(
            out.starts_with("Error executing wait: invalid parameters for wait"),
            "{out}"
        );
        assert!(out.contains("at most 60"), "{out}");
        assert_eq!(dispatcher.retry().errors().len(), 1);
    }

    #[tokio::test]
    async fn navigate_updates_last_url() {
        let browser = FakeBrowser::new();
        let mut state = TaskState::default();
        let out = dispatcher(3)
            .dispatch(
                &browser,
                &mut state,
                &call("navigate", json!({"url": "https://example.com"})),
            )
            .await;
        assert_eq!(out, "Successfully navigated to https://example.com");
        assert_eq!(state.last_url.as_deref(), Some("https://example.com"));
        assert!(state.actions_taken.is_empty());
    }

    #[tokio::test]
    async fn click_and_type_record_action_labels() {
        let browser = FakeBrowser::new();
        let mut state = TaskState::default();
        let mut dispatcher = dispatcher(3);
        dispatcher
            .dispatch(&browser, &mut state, &call("click", json!({"selector": "#go"})))
            .await;
        dispatcher
            .dispatch(
                &browser,
                &mut state,
                &call("type", json!({"selector": "#q", "text": "hello"})),
            )
            .await;
        assert_eq!(state.actions_taken, ["click:#go", "type:#q"]);
    }

    #[tokio::test]
    async fn unknown_tool_is_a_normal_observation() {
        let browser = FakeBrowser::new();
        let mut dispatcher = dispatcher(3);
        let out = dispatcher
            .dispatch(&browser, &mut TaskState::default(), &call("hover", json!({})))
            .await;
        assert_eq!(out, "Unknown tool: hover");
        assert!(dispatcher.retry().errors().is_empty());
    }

    #[tokio::test]
    async fn missing_parameter_becomes_error_observation() {
        let browser = FakeBrowser::new();
        let mut dispatcher = dispatcher(3);
        let out = dispatcher
            .dispatch(&browser, &mut TaskState::default(), &call("click", json!({})))
            .await;
        assert!(
            out.starts_with("Error executing click: invalid parameters for click"),
            "{out}"
        );
        assert_eq!(browser.count_calls("click"), 0);
        assert_eq!(dispatcher.retry().errors().len(), 1);
    }

    #[tokio::test]
    async fn failing_click_retries_once_when_element_is_listed() {
        let browser = FakeBrowser::new()
            .with_elements(listed("#late"))
            .fail_clicks("#late", 1);
        let mut state = TaskState::default();
        let mut dispatcher = dispatcher(3);
        let out = dispatcher
            .dispatch(&browser, &mut state, &call("click", json!({"selector": "#late"})))
            .await;
        assert_eq!(out, "Clicked after retry: #late");
        assert_eq!(browser.count_calls("click"), 2);
        assert_eq!(state.actions_taken, ["click:#late"]);
        assert_eq!(dispatcher.retry().errors().len(), 1);
    }

    #[tokio::test]
    async fn failed_reclick_is_recorded_once() {
        let browser = FakeBrowser::new()
            .with_elements(listed("#stuck"))
            .fail_clicks("#stuck", 2);
        let mut state = TaskState::default();
        let mut dispatcher = dispatcher(3);
        let out = dispatcher
            .dispatch(&browser, &mut state, &call("click", json!({"selector": "#stuck"})))
            .await;
        assert!(out.starts_with("Error executing click:"), "{out}");
        assert_eq!(browser.count_calls("click"), 2);
        assert!(state.actions_taken.is_empty());
        assert_eq!(dispatcher.retry().errors().len(), 1);
    }

    #[tokio::test]
    async fn failing_click_without_match_reports_error() {
        let browser = FakeBrowser::new().fail_clicks("#gone", usize::MAX);
        let mut state = TaskState::default();
        let mut dispatcher = dispatcher(3);
        let out = dispatcher
            .dispatch(&browser, &mut state, &call("click", json!({"selector": "#gone"})))
            .await;
        assert!(out.starts_with("Error executing click:"), "{out}");
        assert_eq!(browser.count_calls("click"), 1);
        assert!(state.actions_taken.is_empty());
        assert_eq!(dispatcher.retry().errors().len(), 1);
        assert_eq!(
            dispatcher.retry().last_error().map(|r| r.kind.as_str()),
            Some("click")
        );
    }

    #[tokio::test]
    async fn wait_for_element_timeout_is_soft() {
        let browser = FakeBrowser::new().time_out_on("#spinner");
        let mut dispatcher = dispatcher(3);
        let mut state = TaskState::default();
        let out = dispatcher
            .dispatch(
                &browser,
                &mut state,
                &call("wait_for_element", json!({"selector": "#spinner"})),
            )
            .await;
        assert_eq!(out, "Timeout for element: #spinner, continuing...");
        assert_eq!(dispatcher.retry().errors().len(), 1);

        let out = dispatcher
            .dispatch(
                &browser,
                &mut state,
                &call("wait_for_element", json!({"selector": "#ready", "timeout": 10})),
            )
            .await;
        assert_eq!(out, "Element appeared: #ready");
    }

    #[tokio::test]
    async fn reads_are_rendered_through_the_compressor() {
        let browser = FakeBrowser::new()
            .with_url("https://example.com/a")
            .with_text("Example Domain")
            .with_elements(vec![InteractiveElement {
                selector: "a".into(),
                text: "More information".into(),
                element_type: "a".into(),
                ..Default::default()
            }]);
        let mut dispatcher = dispatcher(3);
        let mut state = TaskState::default();

        let url = dispatcher
            .dispatch(&browser, &mut state, &call("get_url", json!({})))
            .await;
        assert_eq!(url, "Current URL: https://example.com/a");
        let text = dispatcher
            .dispatch(&browser, &mut state, &call("extract_text", json!({})))
            .await;
        assert_eq!(text, "Example Domain");
        let elements = dispatcher
            .dispatch(&browser, &mut state, &call("get_elements", json!({})))
            .await;
        assert_eq!(elements, "[0] a (a) - More information");
        let scrolled = dispatcher
            .dispatch(
                &browser,
                &mut state,
                &call("scroll", json!({"direction": "up", "amount": 2})),
            )
            .await;
        assert_eq!(scrolled, "Scrolled up by 2 steps");
    }
}
