//! Typed errors for the agent.
//!
//! Collaborator boundaries (browser, model transport) speak `anyhow`; these
//! variants cover the failures callers need to tell apart.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The model credential is absent from the environment.
    #[error("{0} not set in environment or .env file")]
    MissingCredential(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A tool call lacks a required field or carries one of the wrong type.
    #[error("invalid parameters for {action}: {reason}")]
    InvalidParams { action: String, reason: String },

    #[error("model API error ({status}): {message}")]
    Model { status: u16, message: String },

    #[error("browser not launched")]
    BrowserNotLaunched,
}

pub type AgentResult<T> = std::result::Result<T, AgentError>;
