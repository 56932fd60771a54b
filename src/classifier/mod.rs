//! Relevance classifier: asks an external generation service whether a
//! page is relevant to the user's current intention.
//!
//! ## Design
//! - `Classifier` is the async seam the navigation gate calls through;
//!   the production implementation is [`gemini::GeminiClassifier`].
//! - Errors are returned as values, never swallowed here. The gate maps
//!   every variant to the fail-open fallback verdict, so infrastructure
//!   failure is indistinguishable from "allowed" apart from a generic
//!   justification string.

pub mod gemini;
pub mod prompt;

use async_trait::async_trait;
use thiserror::Error;

use crate::verdict::Verdict;

pub use gemini::GeminiClassifier;

/// Failure modes of a classification attempt.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The service answered with a non-success HTTP status.
    #[error("classification service returned status {status}")]
    Upstream { status: u16 },

    /// The response text lacked the expected structured decision block,
    /// or its fields were malformed.
    #[error("could not parse a decision from the response: {0}")]
    Parse(String),

    /// The request never produced a response (DNS, connect, timeout).
    #[error("transport failure reaching the classification service")]
    Transport(#[from] reqwest::Error),
}

/// Async relevance-decision backend.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Decide whether the page at `url` (titled `title`) is relevant to
    /// `intention`. Suspends on network I/O.
    async fn classify(
        &self,
        intention: &str,
        url: &str,
        title: &str,
    ) -> Result<Verdict, ClassifyError>;
}
