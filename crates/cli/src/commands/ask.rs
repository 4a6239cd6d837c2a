//! `studyforge ask` — conversational mode.

use std::io::Write;

use studyforge_agent::{RunHooks, RunRequest, RunResult};
use studyforge_config::AppConfig;
use studyforge_core::message::Message;

pub async fn run(question: &str) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let agent = super::build_agent(&config)?;

    let result = agent
        .run(
            RunRequest::Conversational {
                messages: vec![Message::user(question)],
            },
            RunHooks::new(),
        )
        .await?;

    match result {
        RunResult::Answer(mut handle) => {
            if handle.final_attempt {
                eprintln!("(answering with the research gathered so far)");
            }
            let mut stdout = std::io::stdout();
            while let Some(chunk) = handle.stream.recv().await {
                let chunk = chunk?;
                stdout.write_all(chunk.as_bytes())?;
                stdout.flush()?;
            }
            println!();
        }
        RunResult::Artifact(artifact) => {
            // Conversational runs terminate with answers; cover the arm for
            // completeness.
            println!("{}", serde_json::to_string_pretty(&artifact)?);
        }
    }

    Ok(())
}
