//! Scripted stand-ins for the browser, the model, and the human.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;

use crate::brain::LanguageModel;
use crate::browser::{Browser, ScrollDirection};
use crate::gate::Confirm;
use crate::types::{InteractiveElement, ToolCall, Turn};

/// In-memory browser that logs every call as `op` or `op:arg`.
#[derive(Debug, Default)]
pub struct FakeBrowser {
    url: Mutex<String>,
    text: String,
    elements: Vec<InteractiveElement>,
    click_failures: Mutex<HashMap<String, usize>>,
    slow_selectors: HashSet<String>,
    fail_navigation: bool,
    fail_reads: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self {
            url: Mutex::new("about:blank".to_string()),
            ..Self::default()
        }
    }

    pub fn with_url(self, url: &str) -> Self {
        *self.url.lock().unwrap() = url.to_string();
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_elements(mut self, elements: Vec<InteractiveElement>) -> Self {
        self.elements = elements;
        self
    }

    /// The next `times` clicks on `selector` fail.
    pub fn fail_clicks(self, selector: &str, times: usize) -> Self {
        self.click_failures
            .lock()
            .unwrap()
            .insert(selector.to_string(), times);
        self
    }

    /// `wait_for_element` on `selector` always times out.
    pub fn time_out_on(mut self, selector: &str) -> Self {
        self.slow_selectors.insert(selector.to_string());
        self
    }

    pub fn fail_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    /// URL, text and element reads all fail.
    pub fn fail_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls whose operation name is `op`.
    pub fn count_calls(&self, op: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.split(':').next() == Some(op))
            .count()
    }

    fn log(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    fn check_read(&self, what: &str) -> Result<()> {
        if self.fail_reads {
            bail!("target closed while reading {what}");
        }
        Ok(())
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn launch(&mut self) -> Result<()> {
        self.log("launch".into());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.log("close".into());
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.log(format!("navigate:{url}"));
        if self.fail_navigation {
            bail!("net::ERR_NAME_NOT_RESOLVED at {url}");
        }
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.log(format!("click:{selector}"));
        let mut failures = self.click_failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(selector) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(anyhow!("no node found for selector {selector}"));
            }
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, _text: &str) -> Result<()> {
        self.log(format!("type:{selector}"));
        Ok(())
    }

    async fn scroll(&self, direction: ScrollDirection, amount: u32) -> Result<()> {
        self.log(format!("scroll:{}x{amount}", direction.as_str()));
        Ok(())
    }

    async fn extract_text_content(&self) -> Result<String> {
        self.log("extract_text_content".into());
        self.check_read("text")?;
        Ok(self.text.clone())
    }

    async fn get_interactive_elements(&self) -> Result<Vec<InteractiveElement>> {
        self.log("get_interactive_elements".into());
        self.check_read("elements")?;
        Ok(self.elements.clone())
    }

    async fn get_current_url(&self) -> Result<String> {
        self.log("get_current_url".into());
        self.check_read("url")?;
        Ok(self.url.lock().unwrap().clone())
    }

    async fn wait_for_element(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        self.log(format!("wait_for_element:{selector}"));
        if self.slow_selectors.contains(selector) {
            bail!("timed out after {timeout_ms}ms waiting for {selector}");
        }
        Ok(())
    }

    async fn take_screenshot(&self, path: &Path) -> Result<()> {
        self.log(format!("take_screenshot:{}", path.display()));
        Ok(())
    }
}

/// Model that replays canned replies, then keeps repeating the last one.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Option<String>>,
    requests: AtomicUsize,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    /// Queue a transport failure.
    pub fn then_fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn then_reply(self, reply: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(reply.to_string()));
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _system_prompt: &str, _history: &[Turn]) -> Result<String> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(reply)) => {
                *self.last.lock().unwrap() = Some(reply.clone());
                Ok(reply)
            }
            Some(Err(message)) => Err(anyhow!(message)),
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| anyhow!("scripted model has no replies")),
        }
    }
}

/// Confirmation provider with a fixed answer.
#[derive(Debug)]
pub struct ScriptedConfirm {
    answer: bool,
    prompts: AtomicUsize,
}

impl ScriptedConfirm {
    pub fn approve() -> Self {
        Self {
            answer: true,
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn reject() -> Self {
        Self {
            answer: false,
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Confirm for ScriptedConfirm {
    async fn confirm(&self, _call: &ToolCall) -> bool {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}
