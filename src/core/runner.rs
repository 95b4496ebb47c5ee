//! Batch run orchestration
//!
//! [`RunController`] drives one run at a time: plan batches, serve cache hits,
//! call the provider through the retry controller, apply translations, pace
//! requests and persist partial work. [`RunControl`] is the cloneable handle
//! other tasks use to pause, resume or cancel it.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::cache::ContentCache;
use crate::core::config::TranslatorConfig;
use crate::core::cost::{CostEstimator, UsageTracker};
use crate::core::errors::{Result, TranslationError};
use crate::core::models::{Entry, RateProfile, RunReport, RunState, RunStatus, Selection};
use crate::core::observer::{LogLevel, RunObserver, TracingObserver};
use crate::core::pacing::{DelayCalculator, RequestWindow};
use crate::core::parser::parse_response;
use crate::core::planner::{self, Batch};
use crate::core::prompt::PromptBuilder;
use crate::core::provider::TranslationProvider;
use crate::core::rate_limits::RateProfileRegistry;
use crate::core::retry::{cancellable_sleep, RetryController};

/// Saves the cache and the translated entries after a productive run
pub trait RunPersistence: Send + Sync {
    fn save(&self, cache: &ContentCache, entries: &[Entry]) -> Result<()>;
}

#[derive(Debug)]
struct ControlState {
    running: AtomicBool,
    paused: watch::Sender<bool>,
    cancel: Mutex<CancellationToken>,
    status: RwLock<RunStatus>,
    counters: RwLock<RunState>,
}

/// Cloneable pause/resume/cancel handle for a [`RunController`]
#[derive(Debug, Clone)]
pub struct RunControl {
    inner: Arc<ControlState>,
}

impl Default for RunControl {
    fn default() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            inner: Arc::new(ControlState {
                running: AtomicBool::new(false),
                paused,
                cancel: Mutex::new(CancellationToken::new()),
                status: RwLock::new(RunStatus::Idle),
                counters: RwLock::new(RunState::default()),
            }),
        }
    }
}

impl RunControl {
    pub fn status(&self) -> RunStatus {
        *self.inner.status.read()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Request a pause. Takes effect before the next batch. No-op unless running.
    pub fn pause(&self) -> bool {
        let mut status = self.inner.status.write();
        if *status != RunStatus::Running {
            return false;
        }
        *status = RunStatus::Paused;
        self.inner.paused.send_replace(true);
        true
    }

    /// No-op unless paused
    pub fn resume(&self) -> bool {
        let mut status = self.inner.status.write();
        if *status != RunStatus::Paused {
            return false;
        }
        *status = RunStatus::Running;
        self.inner.paused.send_replace(false);
        true
    }

    /// Pause when running, resume when paused
    pub fn toggle_pause(&self) -> bool {
        match self.status() {
            RunStatus::Running => self.pause(),
            RunStatus::Paused => self.resume(),
            _ => false,
        }
    }

    /// Cancel the active run, waking any pending wait. No-op while idle.
    pub fn cancel(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.inner.cancel.lock().cancel();
        true
    }

    /// Counters as of the last finished batch, with live flags
    pub fn snapshot(&self) -> RunState {
        let mut state = self.inner.counters.read().clone();
        state.is_running = self.is_running();
        state.is_paused = self.status() == RunStatus::Paused;
        state.cancellation_requested = state.is_running && self.inner.cancel.lock().is_cancelled();
        state
    }

    fn begin(&self) -> Result<RunGuard> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(TranslationError::AlreadyRunning);
        }
        *self.inner.cancel.lock() = CancellationToken::new();
        *self.inner.counters.write() = RunState::default();
        self.inner.paused.send_replace(false);
        *self.inner.status.write() = RunStatus::Running;
        Ok(RunGuard {
            control: self.clone(),
        })
    }

    fn token(&self) -> CancellationToken {
        self.inner.cancel.lock().clone()
    }

    fn publish(&self, state: &RunState) {
        *self.inner.counters.write() = state.clone();
    }

    fn finish(&self, status: RunStatus) {
        self.inner.paused.send_replace(false);
        *self.inner.status.write() = status;
    }

    /// Block while paused. Fails with `Cancelled` if the token fires first.
    async fn wait_while_paused(&self, cancel: &CancellationToken) -> Result<()> {
        let mut paused = self.inner.paused.subscribe();
        loop {
            if !*paused.borrow_and_update() {
                return Ok(());
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
                changed = paused.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Releases the single-run flag when a run ends, however it ends
struct RunGuard {
    control: RunControl,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut status = self.control.inner.status.write();
        if status.is_active() {
            *status = RunStatus::Idle;
        }
        self.control.inner.running.store(false, Ordering::SeqCst);
    }
}

/// Drives translation runs over an entry list
pub struct RunController {
    config: TranslatorConfig,
    provider: Arc<dyn TranslationProvider>,
    cache: Arc<ContentCache>,
    registry: RateProfileRegistry,
    estimator: CostEstimator,
    usage: Arc<UsageTracker>,
    observer: Arc<dyn RunObserver>,
    persistence: Option<Arc<dyn RunPersistence>>,
    window: Mutex<RequestWindow>,
    control: RunControl,
}

impl RunController {
    pub fn new(
        config: TranslatorConfig,
        provider: Arc<dyn TranslationProvider>,
        cache: Arc<ContentCache>,
    ) -> Self {
        let estimator = CostEstimator::with_overrides(&config.pricing);
        Self {
            config,
            provider,
            cache,
            registry: RateProfileRegistry::default(),
            estimator,
            usage: Arc::new(UsageTracker::new()),
            observer: Arc::new(TracingObserver),
            persistence: None,
            window: Mutex::new(RequestWindow::new()),
            control: RunControl::default(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn RunPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_registry(mut self, registry: RateProfileRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Rate profile the configured model resolves to
    pub fn rate_profile(&self) -> RateProfile {
        self.registry.resolve(&self.config.model)
    }

    /// Empty the translation cache. Rejected while a run is active.
    pub fn clear_cache(&self) -> Result<usize> {
        if self.control.is_running() {
            return Err(TranslationError::AlreadyRunning);
        }
        let cleared = self.cache.size();
        self.cache.clear();
        self.log(LogLevel::Info, &format!("Cleared {} cached translations", cleared));
        Ok(cleared)
    }

    /// Zero the session usage counters. Rejected while a run is active.
    pub fn reset_usage(&self) -> Result<()> {
        if self.control.is_running() {
            return Err(TranslationError::AlreadyRunning);
        }
        self.usage.reset();
        Ok(())
    }

    fn log(&self, level: LogLevel, message: &str) {
        self.observer.on_log(level, message);
    }

    /// Translate the entries picked by `selection`.
    ///
    /// Per-batch failures are counted, not returned. Errors are only returned
    /// for an invalid configuration or a run already in progress.
    pub async fn run(&self, entries: &mut [Entry], selection: Selection) -> Result<RunReport> {
        let _guard = self.control.begin()?;
        let started_at = Utc::now();

        if let Err(e) = self.config.validate() {
            self.control.finish(RunStatus::Idle);
            self.log(LogLevel::Error, &e.to_string());
            return Err(e);
        }

        let model = self.config.model.as_str();
        let profile = self.registry.resolve(model);
        let token_limit = self.registry.token_limit(model);
        let candidates = selection.filter(entries);
        let batches = planner::plan(entries, &candidates, token_limit);
        let planned: usize = batches.iter().map(Batch::len).sum();

        let mut state = RunState {
            is_running: true,
            ..Default::default()
        };

        if batches.is_empty() {
            self.log(LogLevel::Info, "No untranslated entries to process");
            return Ok(self.complete(RunStatus::Completed, state, 0, 0, false, started_at));
        }

        self.log(
            LogLevel::Info,
            &format!(
                "Translating {} entries in {} batches with {} ({}, {} token context)",
                planned,
                batches.len(),
                model,
                profile,
                token_limit
            ),
        );

        if self.estimator.price(model).is_none() {
            self.log(
                LogLevel::Warn,
                &format!(
                    "No known pricing for {}, cost figures use the generic rate and are approximate",
                    model
                ),
            );
        }

        let prompt = PromptBuilder::new(
            self.config.custom_prompt.as_deref(),
            self.config.target_language.as_str(),
            self.config.context.as_str(),
        );
        let calculator = DelayCalculator::new(profile);
        let retry = RetryController::new(self.provider.as_ref(), calculator);
        let cancel = self.control.token();
        let mut done = 0;
        let mut cancelled = false;

        for (n, batch) in batches.iter().enumerate() {
            if cancel.is_cancelled() || self.control.wait_while_paused(&cancel).await.is_err() {
                cancelled = true;
                break;
            }

            if self
                .run_batch(entries, n, batch, &prompt, &retry, &cancel, &mut state)
                .await
                .is_err()
            {
                cancelled = true;
                break;
            }

            done += batch.len();
            state.batches_done += 1;
            self.control.publish(&state);
            self.observer
                .on_progress(done, planned, &self.control.snapshot());
            self.log(LogLevel::Info, &self.usage.summary(self.cache.size()));

            let last = n + 1 == batches.len();
            if last || cancel.is_cancelled() {
                continue;
            }
            let delay = calculator.next_delay(&mut self.window.lock());
            debug!("Waiting {}ms before next batch", delay.as_millis());
            if cancellable_sleep(delay, &cancel).await.is_err() {
                cancelled = true;
                break;
            }
        }

        if !cancelled && cancel.is_cancelled() {
            cancelled = true;
        }

        let status = if cancelled {
            RunStatus::Cancelled
        } else if state.success_count == 0 && state.fail_count > 0 {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };

        let persisted = self.persist(entries, &state);
        Ok(self.complete(status, state, planned, batches.len(), persisted, started_at))
    }

    /// Serve one batch. Only a cancellation is returned as an error.
    #[allow(clippy::too_many_arguments)]
    async fn run_batch(
        &self,
        entries: &mut [Entry],
        n: usize,
        batch: &Batch,
        prompt: &PromptBuilder,
        retry: &RetryController<'_>,
        cancel: &CancellationToken,
        state: &mut RunState,
    ) -> Result<()> {
        let mut misses = Vec::with_capacity(batch.len());
        let mut hits = 0;
        for &index in &batch.indices {
            match self.cache.lookup(&entries[index].source_text) {
                Some(hit) => {
                    entries[index].translation = hit;
                    hits += 1;
                }
                None => misses.push(index),
            }
        }

        if hits > 0 {
            state.cache_hit_count += hits;
            state.success_count += hits;
            self.usage.record_cache_hits(hits);
            debug!("Batch {}: {} cache hits", n + 1, hits);
        }
        if misses.is_empty() {
            return Ok(());
        }

        let request = prompt.build(misses.iter().map(|&i| entries[i].source_text.as_str()));
        let response = match retry
            .call(&request, &self.window, cancel, self.observer.as_ref())
            .await
        {
            Ok(success) => success.response,
            Err(TranslationError::Cancelled) => return Err(TranslationError::Cancelled),
            Err(e) => {
                state.fail_count += misses.len();
                self.log(
                    LogLevel::Error,
                    &format!("Batch {} failed, {} entries left untranslated: {}", n + 1, misses.len(), e),
                );
                return Ok(());
            }
        };

        let parsed = parse_response(&response, misses.len());
        if let Some(reason) = &parsed.error {
            self.log(
                LogLevel::Warn,
                &format!(
                    "Batch {}: {}, recovered {} of {} by line matching",
                    n + 1,
                    TranslationError::MalformedResponse {
                        message: reason.clone()
                    },
                    parsed.len(),
                    misses.len()
                ),
            );
        }

        let mut applied = Vec::with_capacity(misses.len());
        for (position, &index) in misses.iter().enumerate() {
            if let Some(text) = parsed.get(position) {
                applied.push((index, text.to_string()));
            }
        }

        let failed = misses.len() - applied.len();
        for (index, text) in applied {
            self.cache.put(&entries[index].source_text, &text);
            entries[index].translation = text;
            state.success_count += 1;
        }
        if failed > 0 {
            state.fail_count += failed;
            self.log(
                LogLevel::Warn,
                &format!("Batch {}: {} entries had no usable translation", n + 1, failed),
            );
        }

        let input_chars = request.chars().count();
        let output_chars = response.chars().count();
        let cost = self
            .estimator
            .cost(input_chars, output_chars, &self.config.model)
            .amount;
        state.api_call_count += 1;
        state.total_input_chars += input_chars;
        state.total_output_chars += output_chars;
        state.cumulative_cost += cost;
        self.usage.record_call(input_chars, output_chars, cost);

        Ok(())
    }

    /// Save cache and entries when anything was translated
    fn persist(&self, entries: &[Entry], state: &RunState) -> bool {
        if state.success_count == 0 {
            return false;
        }
        let Some(persistence) = &self.persistence else {
            return false;
        };
        match persistence.save(&self.cache, entries) {
            Ok(()) => {
                self.log(
                    LogLevel::Info,
                    &format!("Saved {} translations and {} cache entries", state.success_count, self.cache.size()),
                );
                true
            }
            Err(e) => {
                self.log(LogLevel::Error, &format!("Failed to save results: {}", e));
                false
            }
        }
    }

    fn complete(
        &self,
        status: RunStatus,
        mut state: RunState,
        planned: usize,
        batch_count: usize,
        persisted: bool,
        started_at: chrono::DateTime<Utc>,
    ) -> RunReport {
        state.is_running = false;
        state.is_paused = false;
        state.cancellation_requested = status == RunStatus::Cancelled;
        self.control.publish(&state);
        self.control.finish(status);

        let report = RunReport {
            status,
            state,
            entries_planned: planned,
            batch_count,
            persisted,
            started_at,
            finished_at: Utc::now(),
        };

        if planned > 0 {
            self.log_summary(&report);
        }
        self.observer.on_complete(&report);
        report
    }

    fn log_summary(&self, report: &RunReport) {
        let state = &report.state;
        let level = match report.status {
            RunStatus::Failed => LogLevel::Error,
            RunStatus::Cancelled => LogLevel::Warn,
            _ => LogLevel::Info,
        };
        self.log(
            level,
            &format!(
                "Run {}: {} translated, {} failed, {} from cache, {} API calls, cost ${:.4}",
                report.status,
                state.success_count,
                state.fail_count,
                state.cache_hit_count,
                state.api_call_count,
                state.cumulative_cost
            ),
        );
        self.log(
            LogLevel::Info,
            &format!(
                "Efficiency {:.1}%, batching saved {} API calls",
                report.efficiency(),
                report.calls_saved()
            ),
        );

        if state.fail_count > 0 {
            self.log(
                LogLevel::Warn,
                "Tips to reduce failures: translate in smaller selections, wait for the \
                 per-minute quota to recover, or switch to a model with higher limits",
            );
            self.log(
                LogLevel::Info,
                &format!("Rate limits for {}: {}", self.config.model, self.rate_profile()),
            );
        }
    }
}
