//! Core data model for DeepFlow relevance decisions.
//!
//! A navigation event carries (tab, URL, title); the engine answers with a
//! verdict keyed by (intention, URL). Verdicts are immutable once produced
//! and are what the decision cache memoizes.

use serde::{Deserialize, Serialize};

/// Justification used whenever the classifier could not produce a decision.
/// The system fails open: infrastructure failure never blocks a site.
pub const FALLBACK_JUSTIFICATION: &str = "Could not get a decision from the AI. Allowing site.";

/// Message the block surface shows when no reason parameter is present.
pub const DEFAULT_BLOCK_MESSAGE: &str = "This site is not aligned with your current task.";

// ── Tab identity ─────────────────────────────────────────────────

/// Opaque identifier for a browser tab, assigned by the navigation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u64);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Navigation event ─────────────────────────────────────────────

/// A completed page load reported by the navigation surface.
///
/// Produced once per load; the gate never sees partial loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationEvent {
    /// Tab the load completed in.
    pub tab_id: TabId,
    /// Absolute URL of the loaded page.
    pub url: String,
    /// Page title as reported by the browser.
    pub title: String,
}

// ── Verdict ──────────────────────────────────────────────────────

/// Relevance decision for one (intention, URL) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether navigation to the page should be blocked.
    pub should_block: bool,
    /// Human-readable reason for the decision, shown on the block surface
    /// and in the per-tab explanation popup.
    pub justification: String,
}

impl Verdict {
    /// The fail-open verdict applied when classification fails for any
    /// reason (upstream error, malformed response, transport failure).
    pub fn fallback() -> Self {
        Self {
            should_block: false,
            justification: FALLBACK_JUSTIFICATION.to_string(),
        }
    }

    /// Truncate the justification to at most `word_limit` words.
    ///
    /// The word limit is sent to the model as a prompt instruction; the
    /// model does not always honor it, so the returned text is clamped
    /// defensively as well.
    pub fn truncated(mut self, word_limit: usize) -> Self {
        let words: Vec<&str> = self.justification.split_whitespace().collect();
        if words.len() > word_limit {
            self.justification = words[..word_limit].join(" ");
        }
        self
    }
}

// ── Cache key ────────────────────────────────────────────────────

/// Composite key for the decision cache: (intention, URL).
///
/// Exact string equality on both fields, no normalization. The same URL
/// may carry different verdicts under different intentions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    intention: String,
    url: String,
}

impl CacheKey {
    /// Build a key from the current intention and the event URL.
    pub fn new(intention: &str, url: &str) -> Self {
        Self {
            intention: intention.to_string(),
            url: url.to_string(),
        }
    }

    /// The intention half of the key.
    pub fn intention(&self) -> &str {
        &self.intention
    }

    /// The URL half of the key.
    pub fn url(&self) -> &str {
        &self.url
    }
}
