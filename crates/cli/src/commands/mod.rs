//! CLI subcommand implementations.

pub mod ask;
pub mod generate;
pub mod onboard;

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use studyforge_agent::AgentLoop;
use studyforge_config::AppConfig;
use studyforge_core::progress::{ProgressBus, ProgressEvent};
use studyforge_providers::{BraveSearch, HttpScraper, OpenAiCompatModel};

/// Build the agent loop from configuration, wire a progress printer, and
/// hook Ctrl-C up to the cancellation token.
pub fn build_agent(config: &AppConfig) -> anyhow::Result<AgentLoop> {
    let api_key = config
        .api_key
        .clone()
        .context("No model API key configured. Set STUDYFORGE_API_KEY or run `studyforge onboard`.")?;

    let model = OpenAiCompatModel::new("openai_compat", &config.api_url, api_key)?;

    let search = BraveSearch::new(
        &config.search.api_url,
        config.search.api_key.clone().unwrap_or_default(),
        config.search.timeout_secs,
    )?;

    let scraper = HttpScraper::new(config.scraper.timeout_secs, &config.scraper.user_agent)?;

    let progress = Arc::new(ProgressBus::default());
    spawn_progress_printer(progress.clone());

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    Ok(AgentLoop::new(
        Arc::new(model),
        Arc::new(search),
        Arc::new(scraper),
        &config.default_model,
    )
    .with_temperature(config.default_temperature)
    .with_max_tokens(config.default_max_tokens)
    .with_progress(progress)
    .with_cancellation(cancel))
}

/// Print compact progress lines to stderr as the loop works.
fn spawn_progress_printer(progress: Arc<ProgressBus>) {
    let mut rx = progress.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event.as_ref() {
                ProgressEvent::ActionSelected {
                    step,
                    action,
                    detail,
                } => match detail {
                    Some(detail) => eprintln!("  [{step}] {action}: {detail}"),
                    None => eprintln!("  [{step}] {action}"),
                },
                ProgressEvent::ActionOverridden {
                    step,
                    proposed,
                    forced,
                } => eprintln!("  [{step}] {proposed} -> {forced} (bound reached)"),
                ProgressEvent::ErrorOccurred { step, kind, .. } => {
                    eprintln!("  [{step}] error ({kind})");
                }
                ProgressEvent::RecoveryApplied { step, strategy, .. } => {
                    eprintln!("  [{step}] recovering: {strategy}");
                }
                ProgressEvent::MaxStepsReached { step } => {
                    eprintln!("  [{step}] step budget exhausted");
                }
                ProgressEvent::StepStarted { .. } | ProgressEvent::Finished { .. } => {}
            }
        }
    });
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling at the next step boundary...");
            cancel.cancel();
        }
    });
}

/// Resolve an argument that may be inline text or `@path` to a file.
pub fn read_text_arg(arg: &str) -> anyhow::Result<String> {
    if let Some(path) = arg.strip_prefix('@') {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))
    } else {
        Ok(arg.to_string())
    }
}
