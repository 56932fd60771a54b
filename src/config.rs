//! Configuration surface for DeepFlow.
//!
//! Settings are owned externally (the user edits them through a settings
//! UI or the config file); the core only reads them. Loaded from a TOML
//! file with environment-variable overrides for the secret bits:
//!
//! - `DEEPFLOW_API_KEY` — classification service API key
//! - `DEEPFLOW_MODEL` — model identifier override

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default Gemini API base URL.
const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Default model identifier.
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default advisory word limit for justifications.
const DEFAULT_WORD_LIMIT: usize = 40;

/// Default per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default extra attempts on transient failure.
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default block surface URL the gate redirects blocked tabs to.
const DEFAULT_BLOCK_PAGE: &str = "https://gate.deepflow.dev/block.html";

/// Default recovery destination when no allowed location was recorded yet.
pub const DEFAULT_RECOVERY_URL: &str = "https://www.google.com";

/// User-facing settings read by the core on every navigation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master switch; when off, navigation is never intercepted.
    pub focus_mode: bool,
    /// The user's current task, free text. Empty means "not set".
    pub intention: String,
    /// API key for the classification service. Empty means "not configured".
    pub api_key: String,
    /// Model identifier passed to the generation endpoint.
    pub model: String,
    /// Advisory word limit for justifications (prompt instruction, also
    /// enforced by truncation on the response).
    pub word_limit: usize,
    /// Base URL of the generation service. Overridable for testing.
    pub endpoint: String,
    /// Block surface URL; the justification rides along as `?reason=`.
    pub block_page: String,
    /// Fallback destination for block recovery when nothing was allowed yet.
    pub recovery_url: String,
    /// Per-request timeout for the classification call, in seconds.
    pub timeout_secs: u64,
    /// Extra attempts on transient transport failure or 429/5xx.
    pub max_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            focus_mode: false,
            intention: String::new(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            word_limit: DEFAULT_WORD_LIMIT,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            block_page: DEFAULT_BLOCK_PAGE.to_string(),
            recovery_url: DEFAULT_RECOVERY_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default config path when
    /// `None`. A missing file yields defaults. Environment overrides are
    /// applied last.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path(),
        };

        let mut settings = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            toml::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("invalid config at {}: {e}", path.display()))?
        } else {
            Self::default()
        };

        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Overlay environment variables onto file-sourced values.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("DEEPFLOW_API_KEY") {
            if !key.is_empty() {
                self.api_key = key;
            }
        }
        if let Ok(model) = std::env::var("DEEPFLOW_MODEL") {
            if !model.is_empty() {
                self.model = model;
            }
        }
    }

    /// Whether the gate may invoke the classifier at all: focus mode on,
    /// intention set, credential present.
    pub fn interception_ready(&self) -> bool {
        self.focus_mode && !self.intention.is_empty() && !self.api_key.is_empty()
    }
}

/// Platform config path: `<config dir>/deepflow/config.toml`.
fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("dev", "deepflow", "deepflow")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("deepflow.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_not_interception_ready() {
        let s = Settings::default();
        assert!(!s.interception_ready());
        assert_eq!(s.word_limit, 40);
        assert_eq!(s.max_retries, 2);
    }

    #[test]
    fn interception_ready_needs_all_three() {
        let mut s = Settings {
            focus_mode: true,
            intention: "write report".into(),
            api_key: "key".into(),
            ..Settings::default()
        };
        assert!(s.interception_ready());

        s.focus_mode = false;
        assert!(!s.interception_ready());
        s.focus_mode = true;
        s.intention.clear();
        assert!(!s.interception_ready());
        s.intention = "write report".into();
        s.api_key.clear();
        assert!(!s.interception_ready());
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nope.toml");
        let s = Settings::load(Some(&path)).unwrap();
        assert_eq!(s.model, DEFAULT_MODEL);
        assert!(!s.focus_mode);
    }

    #[test]
    fn load_reads_partial_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "focus_mode = true\nintention = \"write quarterly report\"\nword_limit = 25\n",
        )
        .unwrap();

        let s = Settings::load(Some(&path)).unwrap();
        assert!(s.focus_mode);
        assert_eq!(s.intention, "write quarterly report");
        assert_eq!(s.word_limit, 25);
        // Unspecified fields keep their defaults.
        assert_eq!(s.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn load_rejects_malformed_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "focus_mode = \"definitely\"").unwrap();
        assert!(Settings::load(Some(&path)).is_err());
    }
}
