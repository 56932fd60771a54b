//! Browsing-session context: the shared mutable state of the engine.
//!
//! One `SessionContext` lives for the duration of a browsing session and
//! owns everything the gate, classifier path and block recovery share:
//! the decision cache, the last allowed location, per-tab justifications,
//! per-tab generation counters and the intention epoch.
//!
//! ## Design
//! - Every mutation is a single critical section behind one lock, so an
//!   intention change never interleaves with a half-finished cache store.
//! - The epoch advances on every reset; a cache store carries the epoch
//!   it was computed under and is dropped if the epoch has moved on.
//! - Per-tab generations let the gate discard a slow classification whose
//!   tab has already navigated elsewhere.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::cache::DecisionCache;
use crate::verdict::{CacheKey, TabId, Verdict};

#[derive(Debug, Default)]
struct SessionState {
    intention: String,
    epoch: u64,
    cache: DecisionCache,
    last_allowed: Option<String>,
    justifications: HashMap<TabId, String>,
    generations: HashMap<TabId, u64>,
}

/// Shared engine state for one browsing session.
#[derive(Debug, Default)]
pub struct SessionContext {
    state: Mutex<SessionState>,
}

impl SessionContext {
    /// Fresh context with no intention set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current intention epoch. Captured by the gate before dispatching a
    /// classification; a store or verdict under an older epoch is stale.
    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Observe the current intention value from the settings surface.
    ///
    /// The first observed value seeds the context; any *change* triggers a
    /// full [`reset`](Self::reset), exactly once per change. Returns `true`
    /// when a reset happened.
    pub fn observe_intention(&self, intention: &str) -> bool {
        let mut state = self.state.lock();
        if state.intention == intention {
            return false;
        }
        let first = state.intention.is_empty() && state.epoch == 0 && state.cache.is_empty();
        state.intention = intention.to_string();
        if first {
            return false;
        }
        tracing::info!("intention changed, clearing decision cache");
        reset_locked(&mut state);
        true
    }

    /// Clear every intention-scoped record: cached verdicts, per-tab
    /// justifications and the recovery location. Advances the epoch so
    /// in-flight work under the old intention is discarded on arrival.
    pub fn reset(&self) {
        reset_locked(&mut self.state.lock());
    }

    // ── Navigation bookkeeping ───────────────────────────────────

    /// Mark a new navigation for `tab`, superseding any in-flight one.
    /// Returns the tab's new generation.
    pub fn begin_navigation(&self, tab: TabId) -> u64 {
        let mut state = self.state.lock();
        let gen = state.generations.entry(tab).or_insert(0);
        *gen += 1;
        *gen
    }

    /// The tab's current generation (0 if it never navigated).
    pub fn generation(&self, tab: TabId) -> u64 {
        self.state.lock().generations.get(&tab).copied().unwrap_or(0)
    }

    // ── Decision cache ───────────────────────────────────────────

    /// Cache lookup for the current intention epoch.
    pub fn cache_lookup(&self, key: &CacheKey) -> Option<Verdict> {
        self.state.lock().cache.lookup(key)
    }

    /// Store a verdict computed under `epoch`. Dropped (returning `false`)
    /// when the intention changed while the classification was in flight.
    pub fn cache_store(&self, key: CacheKey, verdict: Verdict, epoch: u64) -> bool {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            tracing::debug!(url = key.url(), "discarding stale cache store");
            return false;
        }
        state.cache.store(key, verdict);
        true
    }

    /// Number of cached verdicts.
    pub fn cache_len(&self) -> usize {
        self.state.lock().cache.len()
    }

    // ── Per-tab justifications ───────────────────────────────────

    /// Record the latest justification produced for `tab`, for both
    /// blocked and allowed outcomes.
    pub fn record_justification(&self, tab: TabId, justification: &str) {
        self.state
            .lock()
            .justifications
            .insert(tab, justification.to_string());
    }

    /// Last justification recorded for `tab`, if any.
    pub fn justification(&self, tab: TabId) -> Option<String> {
        self.state.lock().justifications.get(&tab).cloned()
    }

    // ── Last allowed location ────────────────────────────────────

    /// Record `url` as the most recent allowed location.
    pub fn record_allowed(&self, url: &str) {
        self.state.lock().last_allowed = Some(url.to_string());
    }

    /// Most recent allowed location, read by block recovery.
    pub fn last_allowed(&self) -> Option<String> {
        self.state.lock().last_allowed.clone()
    }
}

fn reset_locked(state: &mut SessionState) {
    state.epoch += 1;
    state.cache.invalidate_all();
    state.justifications.clear();
    state.last_allowed = None;
}
