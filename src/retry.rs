//! Recovery policy for flaky actions and the run's error ledger.

use tracing::{error, info, warn};

use crate::browser::Browser;
use crate::config::pause;
use crate::types::ErrorRecord;

const SUMMARY_ENTRIES: usize = 5;

/// What the caller should do after a failed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// A matching element is on the page; try the action once more.
    RetryOnce,
    /// Treat the failure as soft and carry on.
    Continue,
    /// Give up and report the failure as is.
    Exhausted,
}

#[derive(Debug)]
pub struct RetryCoordinator {
    max_retries: u32,
    retry_count: u32,
    backoff_ms: u64,
    errors: Vec<ErrorRecord>,
}

impl RetryCoordinator {
    pub fn new(max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            max_retries,
            retry_count: 0,
            backoff_ms,
            errors: Vec::new(),
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Decide whether a failed click on `selector` is worth one more try.
    ///
    /// The counter is shared by every selector in the run. Once it passes
    /// `max_retries` the page is not searched again.
    pub async fn recover_click<B: Browser + ?Sized>(
        &mut self,
        selector: &str,
        browser: &B,
    ) -> Recovery {
        self.retry_count += 1;
        if self.retry_count > self.max_retries {
            error!(selector, max = self.max_retries, "click retries exhausted");
            return Recovery::Exhausted;
        }

        warn!(
            selector,
            attempt = self.retry_count,
            max = self.max_retries,
            "click failed, looking for the element again"
        );
        pause(self.backoff_ms).await;

        match browser.get_interactive_elements().await {
            Ok(elements) => {
                if let Some(found) = elements
                    .iter()
                    .find(|el| el.selector.contains(selector) || el.text.contains(selector))
                {
                    info!(selector, candidate = %found.selector, "element still present, retrying");
                    return Recovery::RetryOnce;
                }
                Recovery::Exhausted
            }
            Err(e) => {
                error!(selector, error = %e, "could not list elements during click recovery");
                Recovery::Exhausted
            }
        }
    }

    /// A `wait_for_element` timeout never escalates.
    pub async fn recover_timeout<B: Browser + ?Sized>(
        &mut self,
        selector: &str,
        browser: &B,
    ) -> Recovery {
        warn!(selector, "timed out waiting for element");
        match browser.get_current_url().await {
            Ok(url) => info!(%url, "current page during timeout"),
            Err(e) => warn!(error = %e, "could not read current url during timeout"),
        }
        pause(self.backoff_ms).await;
        Recovery::Continue
    }

    pub fn record(&mut self, kind: impl Into<String>, detail: impl Into<String>) {
        let record = ErrorRecord {
            kind: kind.into(),
            detail: detail.into(),
        };
        error!(kind = %record.kind, detail = %record.detail, "error recorded");
        self.errors.push(record);
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    pub fn last_error(&self) -> Option<&ErrorRecord> {
        self.errors.last()
    }

    /// Total count plus the most recent five records.
    pub fn summary(&self) -> String {
        if self.errors.is_empty() {
            return "No errors recorded".to_string();
        }
        let start = self.errors.len().saturating_sub(SUMMARY_ENTRIES);
        let mut out = format!("Total errors: {}\n", self.errors.len());
        for (i, record) in self.errors[start..].iter().enumerate() {
            out.push_str(&format!("{}. {}: {}\n", i + 1, record.kind, record.detail));
        }
        out
    }

    /// Reset the retry counter for a new task. The ledger is kept.
    pub fn reset(&mut self) {
        self.retry_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeBrowser;
    use crate::types::InteractiveElement;

    fn button(selector: &str, text: &str) -> InteractiveElement {
        InteractiveElement {
            selector: selector.into(),
            text: text.into(),
            element_type: "button".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn retries_when_selector_or_text_matches() {
        let browser = FakeBrowser::new().with_elements(vec![button("#go-now", "Continue")]);
        let mut retry = RetryCoordinator::new(3, 0);
        assert_eq!(retry.recover_click("#go", &browser).await, Recovery::RetryOnce);
        assert_eq!(retry.recover_click("Continue", &browser).await, Recovery::RetryOnce);
        assert_eq!(retry.recover_click("#missing", &browser).await, Recovery::Exhausted);
    }

    #[tokio::test]
    async fn stops_searching_after_max_attempts() {
        let browser = FakeBrowser::new().with_elements(vec![button("#go", "Go")]);
        let mut retry = RetryCoordinator::new(2, 0);
        assert_eq!(retry.recover_click("#go", &browser).await, Recovery::RetryOnce);
        assert_eq!(retry.recover_click("#other", &browser).await, Recovery::Exhausted);
        assert_eq!(browser.count_calls("get_interactive_elements"), 2);

        assert_eq!(retry.recover_click("#go", &browser).await, Recovery::Exhausted);
        assert_eq!(browser.count_calls("get_interactive_elements"), 2);
        assert_eq!(retry.retry_count(), 3);

        retry.reset();
        assert_eq!(retry.recover_click("#go", &browser).await, Recovery::RetryOnce);
    }

    #[tokio::test]
    async fn timeout_always_continues() {
        let browser = FakeBrowser::new().with_url("https://slow.test");
        let mut retry = RetryCoordinator::new(0, 0);
        assert_eq!(retry.recover_timeout("#late", &browser).await, Recovery::Continue);
        assert_eq!(browser.count_calls("get_current_url"), 1);
    }

    #[test]
    fn summary_shows_last_five() {
        let mut retry = RetryCoordinator::new(3, 0);
        assert_eq!(retry.summary(), "No errors recorded");
        for i in 0..7 {
            retry.record("click", format!("failure {i}"));
        }
        let summary = retry.summary();
        assert!(summary.starts_with("Total errors: 7\n"));
        assert!(summary.contains("1. click: failure 2"));
        assert!(summary.contains("5. click: failure 6"));
        assert!(!summary.contains("failure 1\n"));
        assert_eq!(retry.last_error().map(|r| r.detail.as_str()), Some("failure 6"));
    }
}
