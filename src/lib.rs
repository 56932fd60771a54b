//! DeepFlow: a browsing-focus assistant core.
//!
//! Given a user-declared intention ("write quarterly report"), DeepFlow
//! decides per navigation whether the destination page is relevant and
//! blocks irrelevant pages with an explanation.
//!
//! ## Architecture
//! - [`classifier`] — asks an external generation service for a
//!   structured relevance verdict.
//! - [`cache`] — memoizes (intention, URL) → verdict for the lifetime of
//!   the current intention.
//! - [`gate`] — per-navigation state machine: entry guard, read-through
//!   cache, verdict application (redirect or allow-and-record).
//! - [`recovery`] — restores the last allowed location from the block
//!   surface.
//! - [`session`] — the explicit context object all of the above share,
//!   reset on intention change.
//!
//! The engine only ever sees (intention, URL, title) triples; it never
//! fetches or renders target pages itself.

pub mod cache;
pub mod classifier;
pub mod config;
pub mod gate;
pub mod recovery;
pub mod session;
pub mod verdict;

pub use classifier::{Classifier, ClassifyError, GeminiClassifier};
pub use config::Settings;
pub use gate::{GateOutcome, NavigationGate, NavigationSurface, SkipReason};
pub use session::SessionContext;
pub use verdict::{CacheKey, NavigationEvent, TabId, Verdict};
