//! The observe, decide, act loop.
//!
//! Each iteration takes a fresh snapshot, asks the model what to do next,
//! and runs the tool calls in its reply strictly in order. Everything that
//! can fail inside an iteration is turned into history the model can read;
//! the loop itself only ends on a completion reply or the iteration cap.

use std::fmt;

use tracing::{info, warn};

use crate::brain::{LanguageModel, SYSTEM_PROMPT};
use crate::browser::Browser;
use crate::compress::ContextCompressor;
use crate::config::{AgentConfig, LoopConfig, Pacing, pause};
use crate::dispatch::ActionDispatcher;
use crate::gate::{Confirm, DestructiveActionGate};
use crate::parser::parse_tool_calls;
use crate::retry::RetryCoordinator;
use crate::types::{COMPLETION_PHRASES, ErrorRecord, PageSnapshot, TaskState, ToolCall, Turn};

pub const REJECTED_OBSERVATION: &str = "User rejected this action. Try a different approach.";

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The model replied without tool calls and declared the task done.
    Completed { summary: String },
    /// The iteration cap was hit. `last_reply` is set when the final reply
    /// had no tool calls.
    MaxIterations {
        iterations: usize,
        last_reply: Option<String>,
    },
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed { .. })
    }

    pub fn text(&self) -> String {
        match self {
            TaskOutcome::Completed { summary } => summary.clone(),
            TaskOutcome::MaxIterations {
                last_reply: Some(reply),
                ..
            } => format!("Max iterations reached. Summary: {reply}"),
            TaskOutcome::MaxIterations {
                iterations,
                last_reply: None,
            } => format!("Max iterations ({iterations}) reached without completing task"),
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// True when a tool-free reply contains a completion phrase.
pub fn is_completion(reply: &str) -> bool {
    let lower = reply.to_lowercase();
    COMPLETION_PHRASES.iter().any(|p| lower.contains(p))
}

pub struct Agent<B, M> {
    browser: B,
    model: M,
    confirm: Box<dyn Confirm>,
    gate: DestructiveActionGate,
    compressor: ContextCompressor,
    dispatcher: ActionDispatcher,
    settings: LoopConfig,
    pacing: Pacing,
    history: Vec<Turn>,
    state: TaskState,
}

impl<B: Browser, M: LanguageModel> Agent<B, M> {
    pub fn new(config: &AgentConfig, browser: B, model: M, confirm: Box<dyn Confirm>) -> Self {
        let compressor = ContextCompressor::new(config.context.clone());
        let retry = RetryCoordinator::new(config.agent.max_retries, config.pacing.recovery_ms);
        Self {
            browser,
            model,
            confirm,
            gate: DestructiveActionGate::new(&config.agent.destructive_actions),
            dispatcher: ActionDispatcher::new(config.pacing.clone(), compressor.clone(), retry),
            compressor,
            settings: config.agent.clone(),
            pacing: config.pacing.clone(),
            history: Vec::new(),
            state: TaskState::default(),
        }
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn browser_mut(&mut self) -> &mut B {
        &mut self.browser
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        self.dispatcher.retry().errors()
    }

    pub fn last_error(&self) -> Option<&ErrorRecord> {
        self.dispatcher.retry().last_error()
    }

    pub fn error_summary(&self) -> String {
        self.dispatcher.retry().summary()
    }

    /// Drive the browser toward `task` until the model reports completion or
    /// the iteration cap is reached.
    pub async fn execute_task(&mut self, task: &str) -> TaskOutcome {
        info!(%task, "starting task");
        self.history.clear();
        self.state = TaskState::default();
        self.dispatcher.retry_mut().reset();

        let max = self.settings.max_iterations;
        while self.state.iteration_count < max {
            self.state.iteration_count += 1;
            let iteration = self.state.iteration_count;
            info!(iteration, max, "iteration");

            let snapshot = self.snapshot().await;
            let prompt = self.compose_prompt(task, &snapshot);
            self.history.push(Turn::user(prompt));
            if self.compressor.should_trim_history(&self.history) {
                warn!(
                    tokens = self.compressor.estimate_conversation_tokens(&self.history),
                    available = self.compressor.available_tokens(),
                    "conversation history is close to the context budget"
                );
            }

            let reply = match self.model.complete(SYSTEM_PROMPT, &self.history).await {
                Ok(reply) => reply,
                Err(e) => {
                    self.dispatcher.retry_mut().record("model", format!("{e:#}"));
                    pause(self.pacing.idle_ms).await;
                    continue;
                }
            };
            self.history.push(Turn::assistant(reply.clone()));
            info!(reply = %preview(&reply, 300), "model replied");

            let calls = parse_tool_calls(&reply);
            if calls.is_empty() {
                if is_completion(&reply) {
                    info!(iteration, "task completed");
                    return TaskOutcome::Completed { summary: reply };
                }
                if iteration >= max {
                    return TaskOutcome::MaxIterations {
                        iterations: iteration,
                        last_reply: Some(reply),
                    };
                }
                pause(self.pacing.idle_ms).await;
                continue;
            }

            for call in &calls {
                self.run_tool_call(call).await;
            }
            pause(self.pacing.step_ms).await;
        }

        warn!(max, "iteration cap reached");
        TaskOutcome::MaxIterations {
            iterations: max,
            last_reply: None,
        }
    }

    async fn run_tool_call(&mut self, call: &ToolCall) {
        if self.gate.is_destructive(call) {
            warn!(
                id = %call.id,
                tool = %call.name,
                input = %serde_json::Value::Object(call.input.clone()),
                "destructive action detected"
            );
            if !self.confirm.confirm(call).await {
                info!(id = %call.id, "destructive action rejected");
                self.history.push(Turn::user(REJECTED_OBSERVATION));
                return;
            }
        }

        let result = self
            .dispatcher
            .dispatch(&self.browser, &mut self.state, call)
            .await;
        info!(id = %call.id, tool = %call.name, result = %preview(&result, 200), "tool result");
        self.history.push(Turn::user(format!("Tool result: {result}")));
    }

    /// Current page state. Failed reads degrade to placeholder fields.
    async fn snapshot(&self) -> PageSnapshot {
        let url = self.browser.get_current_url().await.unwrap_or_else(|e| {
            warn!(error = %e, "could not read current url");
            "unknown".to_string()
        });
        let raw_text = self.browser.extract_text_content().await.unwrap_or_else(|e| {
            warn!(error = %e, "could not extract page text");
            String::new()
        });
        let elements = self
            .browser
            .get_interactive_elements()
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "could not list interactive elements");
                Vec::new()
            });
        PageSnapshot {
            url,
            raw_text,
            elements,
        }
    }

    fn compose_prompt(&self, task: &str, snapshot: &PageSnapshot) -> String {
        let recent = self.state.recent_actions(self.settings.recent_actions_window);
        let actions = if recent.is_empty() {
            "None".to_string()
        } else {
            recent.join(", ")
        };
        format!(
            "{}\n\nTask: {task}\n\nActions taken so far: {actions}\n\nWhat should I do next?",
            self.compressor.page_summary(snapshot)
        )
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
