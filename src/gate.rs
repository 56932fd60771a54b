//! Navigation gate: decides per page load whether to intercept.
//!
//! State machine per navigation event: Idle → Evaluating → {Blocked,
//! Allowed}, plus Superseded for in-flight results overtaken by a newer
//! navigation in the same tab or by an intention change.
//!
//! ## Design
//! - Hard entry guard: the classifier is never invoked when focus mode is
//!   off, the intention is empty, no API key is configured, the URL is a
//!   privileged scheme, or the URL sits on the block surface's own origin.
//! - Read-through cache: lookup, classify on miss, store before applying.
//! - Every classifier error maps deterministically to the fail-open
//!   fallback verdict; the user never sees a raw error.
//! - Events are independent; the only cross-event state is the session
//!   context (cache, last allowed location, per-tab records).

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::classifier::Classifier;
use crate::config::Settings;
use crate::session::SessionContext;
use crate::verdict::{CacheKey, NavigationEvent, TabId, Verdict};

// ── Navigation surface ───────────────────────────────────────────

/// Operations the gate needs from the externally-owned navigation layer.
#[async_trait]
pub trait NavigationSurface: Send + Sync {
    /// Replace the tab's current location.
    async fn redirect_tab(&self, tab: TabId, url: &str) -> anyhow::Result<()>;

    /// The currently focused tab, if any. Used by the explanation popup.
    async fn active_tab(&self) -> Option<TabId>;
}

// ── Outcomes ─────────────────────────────────────────────────────

/// Why an event was ignored by the entry guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Focus mode is disabled.
    FocusModeOff,
    /// No intention has been set.
    NoIntention,
    /// No API credential is configured.
    NoApiKey,
    /// The URL did not parse as an absolute URI.
    UnparseableUrl,
    /// Internal/privileged scheme (chrome:, about:, devtools:, ...).
    PrivilegedScheme,
    /// The URL belongs to the block surface's own origin.
    OwnOrigin,
}

/// Terminal state of one navigation event.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// Entry guard failed; the event was ignored and nothing was recorded.
    Skipped(SkipReason),
    /// The verdict blocked the page; the tab was redirected.
    Blocked {
        /// Block surface URL the tab was sent to, reason included.
        redirect_url: String,
        verdict: Verdict,
    },
    /// The verdict allowed the page; navigation proceeds unmodified.
    Allowed { verdict: Verdict },
    /// A newer navigation or an intention change overtook this event
    /// while its classification was in flight; the result was discarded.
    Superseded,
}

// ── Gate ─────────────────────────────────────────────────────────

/// Per-navigation interception engine.
pub struct NavigationGate {
    classifier: Arc<dyn Classifier>,
    ctx: Arc<SessionContext>,
}

impl NavigationGate {
    /// Build a gate over a classifier and a session context.
    pub fn new(classifier: Arc<dyn Classifier>, ctx: Arc<SessionContext>) -> Self {
        Self { classifier, ctx }
    }

    /// The session context this gate owns.
    pub fn ctx(&self) -> &Arc<SessionContext> {
        &self.ctx
    }

    /// Handle one completed page load.
    pub async fn on_page_load(
        &self,
        settings: &Settings,
        event: &NavigationEvent,
        surface: &dyn NavigationSurface,
    ) -> GateOutcome {
        // Sync the observed intention first so a change invalidates the
        // cache exactly once, even when the guard then skips the event.
        self.ctx.observe_intention(&settings.intention);

        if let Err(reason) = entry_guard(settings, &event.url) {
            tracing::trace!(url = %event.url, ?reason, "navigation ignored");
            return GateOutcome::Skipped(reason);
        }

        // Evaluating: this navigation supersedes any in-flight one for
        // the same tab.
        let generation = self.ctx.begin_navigation(event.tab_id);
        let epoch = self.ctx.epoch();
        let key = CacheKey::new(&settings.intention, &event.url);

        let verdict = match self.ctx.cache_lookup(&key) {
            Some(hit) => {
                tracing::debug!(url = %event.url, "cache hit");
                hit
            }
            None => {
                let result = self
                    .classifier
                    .classify(&settings.intention, &event.url, &event.title)
                    .await;

                // The classification awaited; a newer navigation in this
                // tab or an intention change makes the result stale.
                if self.ctx.generation(event.tab_id) != generation || self.ctx.epoch() != epoch {
                    tracing::debug!(url = %event.url, tab = %event.tab_id, "verdict superseded");
                    return GateOutcome::Superseded;
                }

                match result {
                    Ok(verdict) => {
                        self.ctx.cache_store(key, verdict.clone(), epoch);
                        verdict
                    }
                    Err(err) => {
                        // Fail open. Fallback verdicts are not cached so a
                        // later visit retries the service.
                        tracing::warn!(url = %event.url, "classification failed, allowing: {err}");
                        Verdict::fallback()
                    }
                }
            }
        };

        // Recorded for both outcomes so the popup can always explain the
        // last decision for this tab.
        self.ctx
            .record_justification(event.tab_id, &verdict.justification);

        if verdict.should_block {
            let redirect_url = format!(
                "{}?reason={}",
                settings.block_page,
                urlencoding::encode(&verdict.justification)
            );
            tracing::info!(url = %event.url, tab = %event.tab_id, "blocked");
            if let Err(err) = surface.redirect_tab(event.tab_id, &redirect_url).await {
                tracing::warn!(tab = %event.tab_id, "redirect to block page failed: {err}");
            }
            GateOutcome::Blocked {
                redirect_url,
                verdict,
            }
        } else {
            self.ctx.record_allowed(&event.url);
            GateOutcome::Allowed { verdict }
        }
    }

    /// Last justification recorded for the currently active tab, for the
    /// externally-owned explanation popup.
    pub async fn explain_active_tab(&self, surface: &dyn NavigationSurface) -> Option<String> {
        let tab = surface.active_tab().await?;
        self.ctx.justification(tab)
    }
}

// ── Entry guard ──────────────────────────────────────────────────

/// Schemes the gate never classifies.
fn is_privileged_scheme(scheme: &str) -> bool {
    scheme.starts_with("chrome")
        || matches!(
            scheme,
            "about" | "edge" | "moz-extension" | "safari-web-extension" | "devtools" | "view-source"
        )
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

/// Hard preconditions; the classifier must never run when any fails.
fn entry_guard(settings: &Settings, raw_url: &str) -> Result<(), SkipReason> {
    if !settings.focus_mode {
        return Err(SkipReason::FocusModeOff);
    }
    if settings.intention.is_empty() {
        return Err(SkipReason::NoIntention);
    }
    if settings.api_key.is_empty() {
        return Err(SkipReason::NoApiKey);
    }

    let url = Url::parse(raw_url).map_err(|_| SkipReason::UnparseableUrl)?;
    if is_privileged_scheme(url.scheme()) {
        return Err(SkipReason::PrivilegedScheme);
    }
    if let Ok(block) = Url::parse(&settings.block_page) {
        if same_origin(&url, &block) {
            return Err(SkipReason::OwnOrigin);
        }
    }
    Ok(())
}
