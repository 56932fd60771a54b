//! Gemini-backed relevance classifier.
//!
//! Speaks the `generateContent` wire format: a single-turn prompt in,
//! generated text out. The model is asked to wrap its answer in a fenced
//! JSON block with `decision` and `justification` fields; everything else
//! in the response text is ignored.
//!
//! ## Design
//! - Bounded retry with doubling backoff on transient failures
//!   (transport errors, HTTP 429/5xx). Other 4xx are terminal.
//! - Decision mapping is asymmetric on purpose: only an explicit "NO"
//!   blocks. Ambiguity resolves toward allowing navigation.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{prompt::relevance_prompt, Classifier, ClassifyError};
use crate::config::Settings;
use crate::verdict::Verdict;

/// Initial backoff before the first retry; doubles per attempt.
const RETRY_BACKOFF_MS: u64 = 250;

// ── Wire format ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// The structured answer the model is asked to produce.
#[derive(Debug, Deserialize)]
struct RawDecision {
    decision: String,
    justification: String,
}

// ── Client ───────────────────────────────────────────────────────

/// Relevance classifier backed by the Gemini `generateContent` endpoint.
pub struct GeminiClassifier {
    endpoint: String,
    model: String,
    api_key: String,
    word_limit: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl GeminiClassifier {
    /// Build a classifier from the current settings.
    pub fn new(settings: &Settings) -> Self {
        Self {
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            word_limit: settings.word_limit,
            max_retries: settings.max_retries,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(settings.timeout_secs))
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn request_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        )
    }

    /// One request/response cycle, no retry.
    async fn classify_once(&self, prompt: &str) -> Result<Verdict, ClassifyError> {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let resp = self.client.post(self.request_url()).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClassifyError::Upstream {
                status: status.as_u16(),
            });
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| ClassifyError::Parse(format!("response body is not valid JSON: {e}")))?;

        let text = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .ok_or_else(|| ClassifyError::Parse("response carried no candidates".into()))?;

        parse_verdict(&text)
    }

    /// Whether a failure is worth retrying.
    fn is_transient(err: &ClassifyError) -> bool {
        match err {
            ClassifyError::Transport(_) => true,
            ClassifyError::Upstream { status } => *status == 429 || *status >= 500,
            ClassifyError::Parse(_) => false,
        }
    }
}

#[async_trait]
impl Classifier for GeminiClassifier {
    async fn classify(
        &self,
        intention: &str,
        url: &str,
        title: &str,
    ) -> Result<Verdict, ClassifyError> {
        let prompt = relevance_prompt(intention, url, title, self.word_limit);

        let mut attempt = 0;
        loop {
            match self.classify_once(&prompt).await {
                Ok(verdict) => {
                    tracing::debug!(url, should_block = verdict.should_block, "classified");
                    return Ok(verdict.truncated(self.word_limit));
                }
                Err(err) if Self::is_transient(&err) && attempt < self.max_retries => {
                    let backoff = Duration::from_millis(RETRY_BACKOFF_MS << attempt);
                    tracing::warn!(
                        url,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "transient classification failure, retrying: {err}"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

// ── Response parsing ─────────────────────────────────────────────

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```(?:json)?\s*([\s\S]+?)```").expect("fence regex"))
}

/// Extract the JSON payload from the model's answer text.
///
/// The model is asked for a fenced block; some models return the bare
/// object instead, which is accepted as well.
fn extract_json(text: &str) -> Option<&str> {
    if let Some(caps) = fence_regex().captures(text) {
        return caps.get(1).map(|m| m.as_str().trim());
    }
    let trimmed = text.trim();
    trimmed.starts_with('{').then_some(trimmed)
}

/// Parse the answer text into a verdict.
///
/// Mapping: decision "NO" (case-insensitive) blocks; "YES" allows. Any
/// other decision value is treated as unparseable so the gate's fail-open
/// fallback applies, which also resolves to allowing.
pub(crate) fn parse_verdict(text: &str) -> Result<Verdict, ClassifyError> {
    let json = extract_json(text)
        .ok_or_else(|| ClassifyError::Parse("no fenced JSON block in response".into()))?;

    let raw: RawDecision = serde_json::from_str(json)
        .map_err(|e| ClassifyError::Parse(format!("malformed decision JSON: {e}")))?;

    let should_block = if raw.decision.eq_ignore_ascii_case("no") {
        true
    } else if raw.decision.eq_ignore_ascii_case("yes") {
        false
    } else {
        return Err(ClassifyError::Parse(format!(
            "unrecognized decision value: {:?}",
            raw.decision
        )));
    };

    Ok(Verdict {
        should_block,
        justification: raw.justification,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fenced_no_blocks() {
        let text = "Here is my answer:\n```json\n{\"decision\": \"NO\", \"justification\": \"Not related to report writing\"}\n```";
        let v = parse_verdict(text).unwrap();
        assert!(v.should_block);
        assert_eq!(v.justification, "Not related to report writing");
    }

    #[test]
    fn parse_fenced_yes_allows() {
        let text = "```json\n{\"decision\": \"YES\", \"justification\": \"Directly relevant\"}\n```";
        let v = parse_verdict(text).unwrap();
        assert!(!v.should_block);
    }

    #[test]
    fn decision_mapping_is_case_insensitive() {
        let v = parse_verdict("```json\n{\"decision\": \"no\", \"justification\": \"x\"}\n```")
            .unwrap();
        assert!(v.should_block);
        let v = parse_verdict("```json\n{\"decision\": \"Yes\", \"justification\": \"x\"}\n```")
            .unwrap();
        assert!(!v.should_block);
    }

    #[test]
    fn bare_json_object_is_accepted() {
        let v = parse_verdict("{\"decision\": \"NO\", \"justification\": \"off-task\"}").unwrap();
        assert!(v.should_block);
    }

    #[test]
    fn unrecognized_decision_is_a_parse_error() {
        let err = parse_verdict("```json\n{\"decision\": \"maybe\", \"justification\": \"?\"}\n```")
            .unwrap_err();
        assert!(matches!(err, ClassifyError::Parse(_)));
    }

    #[test]
    fn missing_fence_is_a_parse_error() {
        let err = parse_verdict("I think this site is fine to visit.").unwrap_err();
        assert!(matches!(err, ClassifyError::Parse(_)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_verdict("```json\n{\"decision\": \"NO\"\n```").unwrap_err();
        assert!(matches!(err, ClassifyError::Parse(_)));
    }

    #[test]
    fn fence_without_language_tag_parses() {
        let v = parse_verdict("```\n{\"decision\": \"YES\", \"justification\": \"ok\"}\n```")
            .unwrap();
        assert!(!v.should_block);
    }

    #[test]
    fn transient_classification_of_errors() {
        assert!(GeminiClassifier::is_transient(&ClassifyError::Upstream {
            status: 500
        }));
        assert!(GeminiClassifier::is_transient(&ClassifyError::Upstream {
            status: 429
        }));
        assert!(!GeminiClassifier::is_transient(&ClassifyError::Upstream {
            status: 404
        }));
        assert!(!GeminiClassifier::is_transient(&ClassifyError::Parse(
            "x".into()
        )));
    }

    #[test]
    fn request_url_embeds_model_and_key() {
        let settings = Settings {
            endpoint: "https://generativelanguage.googleapis.com/".into(),
            model: "gemini-1.5-flash".into(),
            api_key: "secret".into(),
            ..Settings::default()
        };
        let c = GeminiClassifier::new(&settings);
        assert_eq!(
            c.request_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent?key=secret"
        );
    }
}
