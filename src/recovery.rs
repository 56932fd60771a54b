//! Block recovery: the "take me back" action on the block surface.

use url::Url;

use crate::config::{Settings, DEFAULT_RECOVERY_URL};
use crate::session::SessionContext;

/// Destination for the user's escape from the block page.
///
/// The most recent allowed location when one exists, else the configured
/// fallback. A privileged or unparseable fallback is replaced with the
/// built-in default so recovery can never land on an internal page and
/// re-trigger the gate in a loop.
pub fn recover(ctx: &SessionContext, settings: &Settings) -> String {
    if let Some(url) = ctx.last_allowed() {
        return url;
    }

    let fallback = settings.recovery_url.as_str();
    match Url::parse(fallback) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {
            fallback.to_string()
        }
        _ => DEFAULT_RECOVERY_URL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_last_allowed_when_set() {
        let ctx = SessionContext::new();
        ctx.record_allowed("https://docs.example.com/report");
        let settings = Settings::default();
        assert_eq!(recover(&ctx, &settings), "https://docs.example.com/report");
    }

    #[test]
    fn falls_back_to_configured_destination() {
        let ctx = SessionContext::new();
        let settings = Settings {
            recovery_url: "https://start.example.com/".into(),
            ..Settings::default()
        };
        assert_eq!(recover(&ctx, &settings), "https://start.example.com/");
    }

    #[test]
    fn privileged_fallback_is_replaced() {
        let ctx = SessionContext::new();
        let settings = Settings {
            recovery_url: "chrome://settings".into(),
            ..Settings::default()
        };
        assert_eq!(recover(&ctx, &settings), DEFAULT_RECOVERY_URL);
    }

    #[test]
    fn unparseable_fallback_is_replaced() {
        let ctx = SessionContext::new();
        let settings = Settings {
            recovery_url: "not a url".into(),
            ..Settings::default()
        };
        assert_eq!(recover(&ctx, &settings), DEFAULT_RECOVERY_URL);
    }

    #[test]
    fn intention_reset_clears_recovery_target() {
        let ctx = SessionContext::new();
        ctx.observe_intention("write report");
        ctx.record_allowed("https://docs.example.com/");
        ctx.observe_intention("learn rust");
        let settings = Settings::default();
        assert_eq!(recover(&ctx, &settings), DEFAULT_RECOVERY_URL);
    }
}
