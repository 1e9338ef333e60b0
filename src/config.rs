//! Agent configuration loaded from `agent.toml`.
//!
//! Every section defaults, so a missing file or a partial file is fine. The
//! model credential never lives in the file; it is read from the environment
//! (after `.env` is loaded) under the name in `model.api_key_env`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, AgentResult};
use crate::types::{DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_RETRIES};

pub const CONFIG_FILE_NAME: &str = "agent.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub model: ModelConfig,
    pub browser: BrowserConfig,
    pub agent: LoopConfig,
    pub context: ContextConfig,
    pub pacing: Pacing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub model: String,
    pub base_url: String,
    /// Per-request completion ceiling.
    pub max_tokens: u32,
    pub temperature: f32,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 1500,
            temperature: 0.2,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    /// Attach to an already running Chrome here before launching a new one.
    pub debug_url: Option<String>,
    pub args: Vec<String>,
    pub idle_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            chrome_path: None,
            debug_url: Some("http://127.0.0.1:9222".to_string()),
            args: vec![
                "--no-sandbox".to_string(),
                "--disable-setuid-sandbox".to_string(),
            ],
            idle_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoopConfig {
    pub max_iterations: usize,
    pub max_retries: u32,
    /// How many recent action labels the prompt shows.
    pub recent_actions_window: usize,
    /// Click selectors containing any of these (case-insensitive) need confirmation.
    pub destructive_actions: Vec<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_retries: DEFAULT_MAX_RETRIES,
            recent_actions_window: 5,
            destructive_actions: [
                "submit", "delete", "remove", "pay", "checkout", "purchase", "confirm", "send",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContextConfig {
    pub max_tokens: usize,
    pub token_buffer: usize,
    pub page_content_tokens: usize,
    pub extract_text_tokens: usize,
    pub summary_elements: usize,
    pub listed_elements: usize,
    pub element_text_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 8000,
            token_buffer: 500,
            page_content_tokens: 1500,
            extract_text_tokens: 2000,
            summary_elements: 12,
            listed_elements: 15,
            element_text_chars: 40,
        }
    }
}

/// Fixed waits, in milliseconds, that let the page settle between steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Pacing {
    pub navigate_ms: u64,
    pub click_ms: u64,
    pub type_ms: u64,
    pub scroll_ms: u64,
    /// After a batch of tool calls.
    pub step_ms: u64,
    /// After a reply with no tool calls.
    pub idle_ms: u64,
    /// Before re-querying elements when a click fails.
    pub recovery_ms: u64,
    /// Before re-issuing a recovered click.
    pub retry_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            navigate_ms: 1500,
            click_ms: 500,
            type_ms: 300,
            scroll_ms: 500,
            step_ms: 300,
            idle_ms: 1000,
            recovery_ms: 1000,
            retry_ms: 1000,
        }
    }
}

impl Pacing {
    /// No waits at all; used by tests and scripted runs.
    pub fn none() -> Self {
        Self {
            navigate_ms: 0,
            click_ms: 0,
            type_ms: 0,
            scroll_ms: 0,
            step_ms: 0,
            idle_ms: 0,
            recovery_ms: 0,
            retry_ms: 0,
        }
    }
}

/// Sleep for `ms` milliseconds; a zero wait does not yield.
pub async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

impl AgentConfig {
    pub fn validate(&self) -> AgentResult<()> {
        if self.agent.max_iterations == 0 {
            return Err(AgentError::InvalidConfig(
                "agent.max_iterations must be > 0".into(),
            ));
        }
        if self.context.token_buffer >= self.context.max_tokens {
            return Err(AgentError::InvalidConfig(
                "context.token_buffer must be smaller than context.max_tokens".into(),
            ));
        }
        if self.model.model.trim().is_empty() {
            return Err(AgentError::InvalidConfig("model.model must be set".into()));
        }
        if self.model.api_key_env.trim().is_empty() {
            return Err(AgentError::InvalidConfig(
                "model.api_key_env must be set".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the API key via `lookup` (normally the process environment).
    pub fn api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> AgentResult<String> {
        lookup(&self.model.api_key_env)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AgentError::MissingCredential(self.model.api_key_env.clone()))
    }

    pub fn api_key(&self) -> AgentResult<String> {
        self.api_key_with(|name| std::env::var(name).ok())
    }
}

/// Load config from a TOML file, validating it.
pub fn load_config(path: &Path) -> AgentResult<AgentConfig> {
    let raw = fs::read_to_string(path).map_err(|source| AgentError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let config: AgentConfig = toml::from_str(&raw).map_err(|source| AgentError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Where to look for a config file when none is given explicitly.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("browser-agent").join(CONFIG_FILE_NAME));
    }
    paths
}

/// Load the explicit file if given (it must exist), else the first default
/// location that exists, else built-in defaults.
pub fn resolve_config(explicit: Option<&Path>) -> AgentResult<AgentConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match default_config_paths().into_iter().find(|p| p.exists()) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            load_config(&path)
        }
        None => Ok(AgentConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        AgentConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[agent]\nmax_iterations = 7\n\n[pacing]\nnavigate_ms = 0\n\n[model]\nmodel = \"local\""
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.agent.max_iterations, 7);
        assert_eq!(config.agent.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.pacing.navigate_ms, 0);
        assert_eq!(config.pacing.click_ms, 500);
        assert_eq!(config.model.model, "local");
        assert_eq!(config.model.max_tokens, 1500);
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent]\nmax_iterations = 0").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(AgentError::InvalidConfig(_))
        ));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent\nmax_iterations = ").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(AgentError::ConfigParse { .. })
        ));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolve_config(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(AgentError::ConfigRead { .. })));
    }

    #[test]
    fn missing_or_blank_credential_is_reported() {
        let config = AgentConfig::default();
        let err = config.api_key_with(|_| None).unwrap_err();
        assert!(matches!(err, AgentError::MissingCredential(ref name) if name == "OPENAI_API_KEY"));
        assert!(config.api_key_with(|_| Some("  ".into())).is_err());
        assert_eq!(config.api_key_with(|_| Some("sk-1".into())).unwrap(), "sk-1");
    }
}
