//! studyforge CLI — the main entry point.
//!
//! Commands:
//! - `onboard`  — Initialize the config file
//! - `ask`      — Ask a question; the agent researches and streams an answer
//! - `generate` — Turn an outline into a validated quiz/tutorial/flashcard set

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "studyforge",
    about = "studyforge — research-and-generation agent for study content",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the configuration file
    Onboard,

    /// Ask a question and stream the answer
    Ask {
        /// The question to answer
        question: String,
    },

    /// Generate structured study content from an outline
    Generate {
        /// The content outline (inline text, or @path to read a file)
        outline: String,

        /// Title for the generated content
        #[arg(short, long, default_value = "")]
        title: String,

        /// Description of the generated content
        #[arg(short, long, default_value = "")]
        description: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run()?,
        Commands::Ask { question } => commands::ask::run(&question).await?,
        Commands::Generate {
            outline,
            title,
            description,
        } => commands::generate::run(&outline, &title, &description).await?,
    }

    Ok(())
}
