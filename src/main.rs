//! DeepFlow CLI.
//!
//! Two entry points:
//! - `deepflow classify` — one-shot relevance query, for checking a URL
//!   against an intention from the shell.
//! - `deepflow serve` — native-messaging-style host: JSON events on
//!   stdin, JSON replies on stdout. The browser-side surface feeds page
//!   load events in and applies redirect replies.
//!
//! Logs go to stderr so the stdout protocol stays clean.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};

use deepflow::classifier::{Classifier, GeminiClassifier};
use deepflow::config::Settings;
use deepflow::gate::{NavigationGate, NavigationSurface};
use deepflow::recovery;
use deepflow::session::SessionContext;
use deepflow::verdict::{NavigationEvent, TabId, Verdict};

#[derive(Debug, Parser)]
#[command(name = "deepflow", version, about = "Browsing-focus assistant")]
struct Cli {
    /// Path to the config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decide whether one page is relevant to the current intention.
    Classify {
        /// Absolute URL of the page.
        url: String,
        /// Page title.
        #[arg(default_value = "")]
        title: String,
        /// Override the configured intention for this query.
        #[arg(long)]
        intention: Option<String>,
    },
    /// Run as a stdio host: JSON events in, JSON replies out.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Classify {
            url,
            title,
            intention,
        } => classify_once(settings, &url, &title, intention.as_deref()).await,
        Command::Serve => serve(settings).await,
    }
}

// ── One-shot classification ──────────────────────────────────────

async fn classify_once(
    settings: Settings,
    url: &str,
    title: &str,
    intention_override: Option<&str>,
) -> anyhow::Result<()> {
    let intention = intention_override.unwrap_or(&settings.intention);
    if intention.is_empty() {
        anyhow::bail!("no intention set: pass --intention or set it in the config");
    }
    if settings.api_key.is_empty() {
        anyhow::bail!("no API key configured: set api_key in the config or DEEPFLOW_API_KEY");
    }

    let classifier = GeminiClassifier::new(&settings);
    let verdict = match classifier.classify(intention, url, title).await {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!("classification failed, allowing: {err}");
            Verdict::fallback()
        }
    };

    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(())
}

// ── Stdio host ───────────────────────────────────────────────────

/// Event from the browser-side surface.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum HostEvent {
    /// A page load completed.
    Navigation {
        tab_id: u64,
        url: String,
        title: String,
    },
    /// The user changed their intention.
    SetIntention { intention: String },
    /// The user toggled focus mode.
    FocusMode { enabled: bool },
    /// The block surface asked where to send the user back to.
    Recover,
    /// The popup asked for the last justification of a tab (or the
    /// active tab when omitted).
    Explain {
        #[serde(default)]
        tab_id: Option<u64>,
    },
}

/// Reply to the browser-side surface.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum HostReply {
    Verdict {
        tab_id: TabId,
        should_block: bool,
        justification: String,
    },
    Redirect {
        tab_id: TabId,
        url: String,
    },
    Recovery {
        url: String,
    },
    Explanation {
        tab_id: Option<TabId>,
        justification: Option<String>,
    },
    Error {
        message: String,
    },
}

fn emit(reply: &HostReply) {
    match serde_json::to_string(reply) {
        Ok(line) => println!("{line}"),
        Err(err) => tracing::error!("failed to encode reply: {err}"),
    }
}

/// Navigation surface that speaks the stdout side of the protocol.
#[derive(Default)]
struct StdioSurface {
    active: Mutex<Option<TabId>>,
}

impl StdioSurface {
    fn set_active(&self, tab: TabId) {
        *self.active.lock() = Some(tab);
    }
}

#[async_trait]
impl NavigationSurface for StdioSurface {
    async fn redirect_tab(&self, tab: TabId, url: &str) -> anyhow::Result<()> {
        emit(&HostReply::Redirect {
            tab_id: tab,
            url: url.to_string(),
        });
        Ok(())
    }

    async fn active_tab(&self) -> Option<TabId> {
        *self.active.lock()
    }
}

async fn serve(mut settings: Settings) -> anyhow::Result<()> {
    let ctx = Arc::new(SessionContext::new());
    let classifier = Arc::new(GeminiClassifier::new(&settings));
    let gate = NavigationGate::new(classifier, ctx.clone());
    let surface = StdioSurface::default();

    tracing::info!(model = %settings.model, "deepflow host ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: HostEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(err) => {
                emit(&HostReply::Error {
                    message: format!("unrecognized event: {err}"),
                });
                continue;
            }
        };

        match event {
            HostEvent::Navigation { tab_id, url, title } => {
                let tab = TabId(tab_id);
                surface.set_active(tab);
                let nav = NavigationEvent {
                    tab_id: tab,
                    url,
                    title,
                };
                let outcome = gate.on_page_load(&settings, &nav, &surface).await;
                if let Some(verdict) = outcome_verdict(&outcome) {
                    emit(&HostReply::Verdict {
                        tab_id: tab,
                        should_block: verdict.should_block,
                        justification: verdict.justification.clone(),
                    });
                }
            }
            HostEvent::SetIntention { intention } => {
                settings.intention = intention;
                // Invalidate immediately rather than on the next navigation.
                ctx.observe_intention(&settings.intention);
            }
            HostEvent::FocusMode { enabled } => {
                settings.focus_mode = enabled;
            }
            HostEvent::Recover => {
                emit(&HostReply::Recovery {
                    url: recovery::recover(&ctx, &settings),
                });
            }
            HostEvent::Explain { tab_id } => {
                let (tab, justification) = match tab_id {
                    Some(id) => (Some(TabId(id)), ctx.justification(TabId(id))),
                    None => (
                        surface.active_tab().await,
                        gate.explain_active_tab(&surface).await,
                    ),
                };
                emit(&HostReply::Explanation {
                    tab_id: tab,
                    justification,
                });
            }
        }
    }

    Ok(())
}

fn outcome_verdict(outcome: &deepflow::gate::GateOutcome) -> Option<&Verdict> {
    match outcome {
        deepflow::gate::GateOutcome::Blocked { verdict, .. }
        | deepflow::gate::GateOutcome::Allowed { verdict } => Some(verdict),
        _ => None,
    }
}
