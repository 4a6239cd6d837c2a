//! `studyforge generate` — structured mode.

use tracing::info;

use studyforge_agent::{RunHooks, RunRequest, RunResult};
use studyforge_config::AppConfig;

pub async fn run(outline: &str, title: &str, description: &str) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let agent = super::build_agent(&config)?;

    let outline = super::read_text_arg(outline)?;

    let hooks = RunHooks::new()
        .on_finish(|result| {
            if let RunResult::Artifact(artifact) = result {
                info!(
                    content_type = %artifact.content_type(),
                    items = artifact.item_count(),
                    "Content generated"
                );
            }
        })
        .on_error(|error| {
            tracing::error!(%error, "Run failed");
        });

    let result = agent
        .run(
            RunRequest::Structured {
                outline,
                title: title.to_string(),
                description: description.to_string(),
            },
            hooks,
        )
        .await?;

    match result {
        RunResult::Artifact(artifact) => {
            println!("{}", serde_json::to_string_pretty(&artifact)?);
        }
        RunResult::Answer(handle) => {
            // Structured runs terminate with artifacts; cover the arm for
            // completeness.
            let text = handle.collect().await?;
            println!("{text}");
        }
    }

    Ok(())
}
