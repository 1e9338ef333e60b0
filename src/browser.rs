//! The browser the agent drives.
//!
//! Implementations report failures as plain errors; the dispatcher is the
//! only place they are caught and turned into observations.

use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::InteractiveElement;

/// Pixels moved per scroll step.
pub const SCROLL_STEP_PX: i64 = 300;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ScrollDirection {
    Up,
    #[default]
    Down,
}

impl ScrollDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
        }
    }

    /// Vertical offset for `amount` steps.
    pub fn offset(self, amount: u32) -> i64 {
        let px = i64::from(amount) * SCROLL_STEP_PX;
        match self {
            ScrollDirection::Up => -px,
            ScrollDirection::Down => px,
        }
    }
}

impl FromStr for ScrollDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(ScrollDirection::Up),
            "down" => Ok(ScrollDirection::Down),
            other => Err(format!("unknown scroll direction '{other}'")),
        }
    }
}

impl TryFrom<String> for ScrollDirection {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

#[async_trait]
pub trait Browser: Send + Sync {
    async fn launch(&mut self) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
    async fn navigate(&self, url: &str) -> Result<()>;
    async fn click(&self, selector: &str) -> Result<()>;
    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;
    async fn scroll(&self, direction: ScrollDirection, amount: u32) -> Result<()>;
    async fn extract_text_content(&self) -> Result<String>;
    async fn get_interactive_elements(&self) -> Result<Vec<InteractiveElement>>;
    async fn get_current_url(&self) -> Result<String>;
    async fn wait_for_element(&self, selector: &str, timeout_ms: u64) -> Result<()>;
    async fn take_screenshot(&self, path: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("UP".parse::<ScrollDirection>(), Ok(ScrollDirection::Up));
        assert!("left".parse::<ScrollDirection>().is_err());
        let parsed: ScrollDirection = serde_json::from_str("\"Down\"").unwrap();
        assert_eq!(parsed, ScrollDirection::Down);
    }

    #[test]
    fn offset_sign_follows_direction() {
        assert_eq!(ScrollDirection::Down.offset(3), 900);
        assert_eq!(ScrollDirection::Up.offset(2), -600);
    }
}
