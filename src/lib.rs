//! Batch Localizer - rate-aware batch translation of localization tables
//!
//! This library groups untranslated entries into token-bounded batches, sends
//! them to a translation provider under per-model rate limits, and keeps a
//! content-addressed cache so repeated texts are never paid for twice.

#![forbid(unsafe_code)]

pub mod cli;
pub mod core;
pub mod store;

// Re-export key types for convenience
pub use core::{
    cache::ContentCache,
    client::GeminiProvider,
    config::TranslatorConfig,
    errors::{ProviderError, TranslationError},
    mock::{MockProvider, MockReply},
    models::{Entry, EntryStats, RateProfile, RunReport, RunState, RunStatus, Selection},
    observer::{LogLevel, RunObserver},
    provider::TranslationProvider,
    runner::{RunControl, RunController, RunPersistence},
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
