//! Chrome backend built on `headless_chrome`.
//!
//! `headless_chrome` is synchronous, so every operation runs on the blocking
//! pool against a cloned `Arc<Tab>`.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser as Chrome, LaunchOptions, Tab};
use tracing::{info, warn};

use crate::browser::{Browser, ScrollDirection};
use crate::config::BrowserConfig;
use crate::error::AgentError;
use crate::types::{ELEMENT_TEXT_MAX_CHARS, InteractiveElement};

/// Visible text nodes of the body, one per line.
const TEXT_JS: &str = r#"
(() => {
  const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_TEXT, null, false);
  const lines = [];
  let node;
  while ((node = walker.nextNode())) {
    const parent = node.parentElement;
    if (parent && ['SCRIPT', 'STYLE', 'NOSCRIPT'].includes(parent.tagName)) continue;
    const trimmed = node.textContent.trim();
    if (trimmed) lines.push(trimmed);
  }
  return lines.join('\n');
})()
"#;

/// Interactive elements as a JSON string. Selector preference is id, then
/// first class, then tag name; collisions are possible.
const ELEMENTS_JS: &str = r#"
(() => {
  const out = [];
  const nodes = document.querySelectorAll('button, a, input, select, textarea, [role="button"]');
  for (const el of nodes) {
    const rect = el.getBoundingClientRect();
    if (rect.width <= 0 || rect.height <= 0) continue;
    let selector;
    if (el.id) {
      selector = '#' + el.id;
    } else if (typeof el.className === 'string' && el.className.trim()) {
      selector = '.' + el.className.trim().split(/\s+/)[0];
    } else {
      selector = el.tagName.toLowerCase();
    }
    out.push({
      selector,
      text: (el.textContent || '').trim().slice(0, __MAX_TEXT__),
      type: el.getAttribute('type') || el.tagName.toLowerCase(),
      placeholder: el.getAttribute('placeholder') || '',
      visible: rect.top < window.innerHeight && rect.bottom > 0,
    });
    if (out.length >= 50) break;
  }
  return JSON.stringify(out);
})()
"#;

pub struct ChromeBrowser {
    config: BrowserConfig,
    chrome: Option<Chrome>,
    tab: Option<Arc<Tab>>,
}

impl ChromeBrowser {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            chrome: None,
            tab: None,
        }
    }

    fn tab(&self) -> Result<Arc<Tab>> {
        self.tab
            .clone()
            .ok_or_else(|| AgentError::BrowserNotLaunched.into())
    }

    /// Run `op` against the active tab on the blocking pool.
    async fn with_tab<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
    {
        let tab = self.tab()?;
        tokio::task::spawn_blocking(move || op(&tab))
            .await
            .map_err(|e| anyhow!("browser task panicked: {e}"))?
    }
}

#[async_trait]
impl Browser for ChromeBrowser {
    async fn launch(&mut self) -> Result<()> {
        let config = self.config.clone();
        let (chrome, tab) = tokio::task::spawn_blocking(move || open_session(&config))
            .await
            .map_err(|e| anyhow!("browser launch panicked: {e}"))??;
        self.chrome = Some(chrome);
        self.tab = Some(tab);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.tab = None;
        if let Some(chrome) = self.chrome.take() {
            // Dropping the handle shuts down a Chrome we launched.
            tokio::task::spawn_blocking(move || drop(chrome))
                .await
                .map_err(|e| anyhow!("browser shutdown panicked: {e}"))?;
            info!("browser closed");
        }
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.with_tab(move |tab| {
            tab.navigate_to(&url)?;
            tab.wait_for_element("body")?;
            info!(%url, "navigated");
            Ok(())
        })
        .await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let selector = selector.to_string();
        self.with_tab(move |tab| {
            tab.find_element(&selector)?.click()?;
            info!(%selector, "clicked");
            Ok(())
        })
        .await
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        let selector = selector.to_string();
        let text = text.to_string();
        self.with_tab(move |tab| {
            tab.find_element(&selector)?.click()?;
            let literal = serde_json::to_string(&selector)?;
            tab.evaluate(
                &format!("(document.querySelector({literal}) || {{}}).value = ''"),
                false,
            )?;
            tab.type_str(&text)?;
            info!(%selector, "typed text");
            Ok(())
        })
        .await
    }

    async fn scroll(&self, direction: ScrollDirection, amount: u32) -> Result<()> {
        let offset = direction.offset(amount);
        self.with_tab(move |tab| {
            tab.evaluate(&format!("window.scrollBy(0, {offset})"), false)?;
            Ok(())
        })
        .await
    }

    async fn extract_text_content(&self) -> Result<String> {
        self.with_tab(|tab| evaluate_string(tab, TEXT_JS)).await
    }

    async fn get_interactive_elements(&self) -> Result<Vec<InteractiveElement>> {
        self.with_tab(|tab| {
            let script = ELEMENTS_JS.replace("__MAX_TEXT__", &ELEMENT_TEXT_MAX_CHARS.to_string());
            let raw = evaluate_string(tab, &script)?;
            if raw.is_empty() {
                return Ok(Vec::new());
            }
            serde_json::from_str(&raw).context("decode interactive elements")
        })
        .await
    }

    async fn get_current_url(&self) -> Result<String> {
        self.with_tab(|tab| {
            let url = evaluate_string(tab, "window.location.href")?;
            Ok(if url.is_empty() { tab.get_url() } else { url })
        })
        .await
    }

    async fn wait_for_element(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let selector = selector.to_string();
        self.with_tab(move |tab| {
            tab.wait_for_element_with_custom_timeout(&selector, Duration::from_millis(timeout_ms))?;
            Ok(())
        })
        .await
    }

    async fn take_screenshot(&self, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        self.with_tab(move |tab| {
            let png = tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)?;
            std::fs::write(&path, png).with_context(|| format!("write {}", path.display()))?;
            info!(path = %path.display(), "screenshot saved");
            Ok(())
        })
        .await
    }
}

/// Attach to a running Chrome when `debug_url` answers, else launch one.
fn open_session(config: &BrowserConfig) -> Result<(Chrome, Arc<Tab>)> {
    if let Some(debug_url) = &config.debug_url {
        info!(%debug_url, "attempting to attach to existing Chrome");
        match Chrome::connect(debug_url.clone()) {
            Ok(chrome) => {
                let existing = {
                    let tabs = chrome
                        .get_tabs()
                        .lock()
                        .map_err(|_| anyhow!("tab list lock poisoned"))?;
                    tabs.first().cloned()
                };
                let tab = match existing {
                    Some(tab) => tab,
                    None => chrome.new_tab()?,
                };
                info!("attached to existing Chrome");
                return Ok((chrome, tab));
            }
            Err(e) => warn!(error = %e, "could not attach, launching a new Chrome"),
        }
    }

    let args: Vec<&OsStr> = config.args.iter().map(OsStr::new).collect();
    let options = LaunchOptions {
        headless: config.headless,
        path: config.chrome_path.clone(),
        args,
        idle_browser_timeout: Duration::from_secs(config.idle_timeout_secs),
        ..Default::default()
    };

    let chrome = Chrome::new(options).context("browser launch failed")?;
    let tab = chrome.new_tab()?;
    tab.navigate_to("about:blank")?;
    info!(headless = config.headless, "Chrome ready");
    Ok((chrome, tab))
}

fn evaluate_string(tab: &Tab, script: &str) -> Result<String> {
    let result = tab.evaluate(script, false)?;
    Ok(result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default())
}
