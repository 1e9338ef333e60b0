//! Keeps page text and element lists inside the model's context budget.
//!
//! Token counts are estimated from whitespace-separated words, not from a
//! real tokenizer. Compression filters structurally first (blank, tiny, and
//! boilerplate lines) and only truncates words when that is not enough.

use crate::config::ContextConfig;
use crate::types::{InteractiveElement, PageSnapshot, Turn};

const MIN_LINE_CHARS: usize = 3;
const BOILERPLATE_MARKERS: &[&str] = &["script", "style", "meta", "link"];
const HISTORY_TRIM_RATIO: f64 = 0.8;

/// Rough token estimate: `words / 4 + 1`.
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count() / 4 + 1
}

/// Shrink `text` so its estimated token count is at most `budget`.
///
/// Text already within budget is returned unchanged, which also makes the
/// operation idempotent.
pub fn compress(text: &str, budget: usize) -> String {
    if estimate_tokens(text) <= budget {
        return text.to_string();
    }

    let filtered = text
        .lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > MIN_LINE_CHARS)
        .filter(|line| {
            let lower = line.to_lowercase();
            !BOILERPLATE_MARKERS.iter().any(|m| lower.contains(m))
        })
        .collect::<Vec<_>>()
        .join("\n");

    if estimate_tokens(&filtered) <= budget {
        return filtered;
    }

    // Largest word count whose estimate still fits: words / 4 + 1 <= budget.
    let max_words = (budget * 4).saturating_sub(1);
    filtered
        .split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render up to `max_items` elements as `[i] selector (type) - text` lines.
pub fn format_elements(
    elements: &[InteractiveElement],
    max_items: usize,
    text_chars: usize,
) -> String {
    if elements.is_empty() {
        return "No interactive elements found".to_string();
    }

    elements
        .iter()
        .take(max_items)
        .enumerate()
        .map(|(i, el)| {
            let text: String = el.text.chars().take(text_chars).collect();
            format!("[{i}] {} ({}) - {}", el.selector, el.element_type, text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Budget-aware renderer for snapshots and history size checks.
#[derive(Debug, Clone)]
pub struct ContextCompressor {
    config: ContextConfig,
}

impl ContextCompressor {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Tokens left for history once the safety buffer is reserved.
    pub fn available_tokens(&self) -> usize {
        self.config.max_tokens.saturating_sub(self.config.token_buffer)
    }

    pub fn compress_extracted_text(&self, text: &str) -> String {
        compress(text, self.config.extract_text_tokens)
    }

    pub fn format_listed_elements(&self, elements: &[InteractiveElement]) -> String {
        format_elements(
            elements,
            self.config.listed_elements,
            self.config.element_text_chars,
        )
    }

    /// URL, compressed page text, and a short element list as one prompt fragment.
    pub fn page_summary(&self, snapshot: &PageSnapshot) -> String {
        format!(
            "Current page:\nURL: {}\n\nContent preview:\n{}\n\nInteractive elements:\n{}",
            snapshot.url,
            compress(&snapshot.raw_text, self.config.page_content_tokens),
            format_elements(
                &snapshot.elements,
                self.config.summary_elements,
                self.config.element_text_chars,
            ),
        )
    }

    pub fn estimate_conversation_tokens(&self, history: &[Turn]) -> usize {
        history.iter().map(|t| estimate_tokens(&t.content)).sum()
    }

    /// Advisory: true once history uses more than 80% of the available budget.
    pub fn should_trim_history(&self, history: &[Turn]) -> bool {
        self.estimate_conversation_tokens(history) as f64
            > self.available_tokens() as f64 * HISTORY_TRIM_RATIO
    }
}
