//! Main entry point for Batch Localizer CLI

#![forbid(unsafe_code)]

use batch_localizer::cli::commands::{self, Commands};
use batch_localizer::TranslatorConfig;
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Batch Localizer - rate-aware batch translation tool
#[derive(Parser, Debug)]
#[command(name = "batch-localizer", version, about, long_about = None)]
struct Args {
    /// Configuration file; non-empty env vars override its values
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// API key (optional, defaults to GEMINI_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,

    /// Model name (optional, defaults to GEMINI_MODEL env var)
    #[arg(short, long)]
    model: Option<String>,

    /// Target language
    #[arg(short = 'l', long)]
    language: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("batch_localizer={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = TranslatorConfig::load(&args.config)?;

    // Override config with CLI args if provided
    if let Some(api_key) = args.api_key {
        config.api_key = api_key;
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(language) = args.language {
        config.target_language = language;
    }

    match args.command {
        Some(Commands::Translate {
            input,
            output,
            all,
            selected,
            count,
            dry_run,
        }) => {
            let selection = commands::selection_from_flags(all, selected, count);
            commands::handle_translate(config, input, output, selection, dry_run).await?;
        }
        Some(Commands::Stats { input }) => {
            commands::handle_stats(config, input).await?;
        }
        Some(Commands::ClearCache) => {
            commands::handle_clear_cache(config).await?;
        }
        Some(Commands::Models) => {
            commands::handle_models(config).await?;
        }
        Some(Commands::Profile { model }) => {
            commands::handle_profile(config, model).await?;
        }
        None => {
            println!("Please specify a command. Use --help for more information.");
        }
    }

    Ok(())
}
