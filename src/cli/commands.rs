//! CLI command definitions and handlers

use clap::Subcommand;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::core::cache::ContentCache;
use crate::core::client::GeminiProvider;
use crate::core::config::TranslatorConfig;
use crate::core::mock::MockProvider;
use crate::core::models::{EntryStats, RunReport, RunState, RunStatus, Selection};
use crate::core::observer::{LogLevel, RunObserver, TracingObserver};
use crate::core::planner;
use crate::core::provider::TranslationProvider;
use crate::core::rate_limits::RateProfileRegistry;
use crate::core::runner::RunController;
use crate::store::{self, FileStore};

/// Commands for Batch Localizer
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Translate untranslated entries of a JSON entry file
    Translate {
        /// Entry file (JSON array of {key, source, translation, selected})
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (default: <input>_translated.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Every untranslated entry (the default)
        #[arg(long, conflicts_with_all = ["selected", "count"])]
        all: bool,

        /// Only entries marked as selected
        #[arg(long, conflicts_with = "count")]
        selected: bool,

        /// Only the first N untranslated entries
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Use the offline echo provider instead of the API
        #[arg(long)]
        dry_run: bool,
    },

    /// Show translation progress of an entry file
    Stats {
        /// Entry file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Remove all cached translations
    ClearCache,

    /// List models available to the configured API key
    Models,

    /// Show the rate profile and batch budget of a model
    Profile {
        /// Model name (default: configured model)
        model: Option<String>,
    },
}

/// Map the translate scope flags onto a selection. Clap keeps them exclusive.
pub fn selection_from_flags(all: bool, selected: bool, count: Option<usize>) -> Selection {
    match (all, selected, count) {
        (true, _, _) => Selection::All,
        (false, true, _) => Selection::Selected,
        (false, false, Some(n)) => Selection::FirstUntranslated(n),
        (false, false, None) => Selection::All,
    }
}

/// Drives an indicatif bar from run events
struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    fn new() -> anyhow::Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
                .progress_chars("=>-"),
        );
        Ok(Self { bar })
    }
}

impl RunObserver for ProgressObserver {
    fn on_log(&self, level: LogLevel, message: &str) {
        self.bar.suspend(|| TracingObserver.on_log(level, message));
    }

    fn on_progress(&self, done: usize, total: usize, state: &RunState) {
        self.bar.set_length(total as u64);
        self.bar.set_position(done as u64);
        self.bar.set_message(format!(
            "ok {} | failed {} | ${:.4}",
            state.success_count, state.fail_count, state.cumulative_cost
        ));
    }

    fn on_complete(&self, report: &RunReport) {
        self.bar.finish_with_message(report.status.to_string());
    }
}

/// Handle translate command
pub async fn handle_translate(
    config: TranslatorConfig,
    input: PathBuf,
    output: Option<PathBuf>,
    selection: Selection,
    dry_run: bool,
) -> anyhow::Result<()> {
    let start_time = Instant::now();
    let output = output.unwrap_or_else(|| store::default_output_path(&input));

    let mut config = config;
    let provider: Arc<dyn TranslationProvider> = if dry_run {
        if config.api_key.is_empty() {
            config.api_key = "dry-run".to_string();
        }
        Arc::new(MockProvider::new())
    } else {
        Arc::new(GeminiProvider::new(&config)?)
    };

    info!("Input: {}", input.display());
    info!("Output: {}", output.display());
    info!("Target language: {}", config.target_language);
    info!("Model: {}", config.model);

    let mut entries = store::load_entries(&input)?;
    let cache = Arc::new(ContentCache::load(&config.cache_path)?);
    let restored = cache.prefill(&mut entries);
    info!(
        "Loaded {} cached translations, restored {} entries",
        cache.size(),
        restored
    );

    let persistence = Arc::new(FileStore::new(&config.cache_path, &output));
    let observer = Arc::new(ProgressObserver::new()?);
    let controller = RunController::new(config, provider, cache)
        .with_observer(observer)
        .with_persistence(persistence);

    let control = controller.control();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Cancelling after the current request...");
            control.cancel();
        }
    });

    let report = controller.run(&mut entries, selection).await;
    watcher.abort();
    let report = report?;

    let stats = EntryStats::from_entries(&entries);
    println!("\nTranslation {}", report.status);
    println!("   Translated: {}", report.state.success_count);
    println!("   Failed: {}", report.state.fail_count);
    println!("   From cache: {}", report.state.cache_hit_count);
    println!("   API calls: {}", report.state.api_call_count);
    println!("   Cost: ${:.4}", report.state.cumulative_cost);
    println!("   Progress: {:.1}%", stats.progress());
    println!("   Time: {:?}", start_time.elapsed());
    if report.persisted {
        println!("   Saved to: {}", output.display());
    }

    if report.status == RunStatus::Failed {
        anyhow::bail!("No entries could be translated");
    }
    Ok(())
}

/// Handle stats command
pub async fn handle_stats(config: TranslatorConfig, input: PathBuf) -> anyhow::Result<()> {
    let mut entries = store::load_entries(&input)?;
    let restored = ContentCache::load(&config.cache_path)?.prefill(&mut entries);
    let stats = EntryStats::from_entries(&entries);
    let selected = entries.iter().filter(|e| e.selected).count();

    println!("{}", input.display());
    println!("   Total: {}", stats.total);
    println!("   Translated: {}", stats.translated);
    println!("   Untranslated: {}", stats.untranslated);
    println!("   Selected: {}", selected);
    println!("   Restored from cache: {}", restored);
    println!("   Progress: {:.1}%", stats.progress());
    Ok(())
}

/// Handle clear-cache command
pub async fn handle_clear_cache(config: TranslatorConfig) -> anyhow::Result<()> {
    let cache = ContentCache::load(&config.cache_path)?;
    let cleared = cache.size();
    cache.clear();
    cache.save(&config.cache_path)?;

    info!("Cleared {} cached translations", cleared);
    println!("Cleared {} cached translations from {}", cleared, config.cache_path);
    Ok(())
}

/// Handle models command
pub async fn handle_models(config: TranslatorConfig) -> anyhow::Result<()> {
    let provider = GeminiProvider::new(&config)?;
    let registry = RateProfileRegistry::default();
    let models = provider.list_models().await?;

    if models.is_empty() {
        println!("No models available");
        return Ok(());
    }

    println!("{} models support generateContent:", models.len());
    for model in models {
        println!(
            "   {:<40} in {:>8} / out {:>6}  {}",
            model.name,
            model.input_token_limit,
            model.output_token_limit,
            registry.resolve(&model.name)
        );
    }
    Ok(())
}

/// Handle profile command
pub async fn handle_profile(config: TranslatorConfig, model: Option<String>) -> anyhow::Result<()> {
    let model = model.unwrap_or(config.model);
    let registry = RateProfileRegistry::default();
    let profile = registry.resolve(&model);
    let token_limit = registry.token_limit(&model);
    let source = if registry.known_models().any(|known| known == model) {
        "published"
    } else {
        "estimated"
    };

    println!("{}", model);
    println!("   Quota source: {}", source);
    println!("   Rate limits: {}", profile);
    println!("   Retries per batch: {}", profile.max_retries());
    println!("   Context: {} tokens", token_limit);
    println!(
        "   Batch budget: {} tokens, at most {} entries",
        planner::batch_budget(token_limit),
        planner::MAX_BATCH_ENTRIES
    );
    Ok(())
}
