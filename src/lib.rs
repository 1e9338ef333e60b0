//! Drives a browser toward a natural-language goal with a language model in
//! the loop: observe the page, ask the model, run the tool calls it emits,
//! feed the results back.

pub mod agent;
pub mod brain;
pub mod browser;
pub mod compress;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod hands;
pub mod logging;
pub mod parser;
pub mod retry;
pub mod shell;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod types;

pub use agent::{Agent, TaskOutcome};
pub use error::{AgentError, AgentResult};
