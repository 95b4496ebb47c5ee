//! End-to-end runs against the scripted provider

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use batch_localizer::store::{self, FileStore};
use batch_localizer::{
    ContentCache, Entry, LogLevel, MockProvider, MockReply, RunControl, RunController, RunObserver,
    RunReport, RunState, RunStatus, Selection, TranslationError, TranslatorConfig,
};
use tempfile::tempdir;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

mod common;
use common::RecordingObserver;

fn config() -> TranslatorConfig {
    TranslatorConfig {
        api_key: "test-key".to_string(),
        // 60 rpm, 30720 token context
        model: "gemini-pro".to_string(),
        ..Default::default()
    }
}

fn short_entries(n: usize) -> Vec<Entry> {
    (0..n)
        .map(|i| Entry::new(format!("line.{}", i), format!("Line {}", i)))
        .collect()
}

/// ~10k tokens each, so two fit in one batch
fn large_entries(n: usize) -> Vec<Entry> {
    (0..n)
        .map(|i| Entry::new(format!("doc.{}", i), format!("{} {}", i, "a".repeat(40_000))))
        .collect()
}

fn controller(provider: &MockProvider, observer: Arc<RecordingObserver>) -> RunController {
    RunController::new(config(), Arc::new(provider.clone()), Arc::new(ContentCache::new()))
        .with_observer(observer)
}

/// Cancels the run once `after` batches are done
struct CancelAfter {
    after: usize,
    control: OnceLock<RunControl>,
    inner: RecordingObserver,
}

impl RunObserver for CancelAfter {
    fn on_log(&self, level: LogLevel, message: &str) {
        self.inner.on_log(level, message);
    }

    fn on_progress(&self, done: usize, total: usize, state: &RunState) {
        self.inner.on_progress(done, total, state);
        if state.batches_done >= self.after {
            if let Some(control) = self.control.get() {
                control.cancel();
            }
        }
    }

    fn on_complete(&self, report: &RunReport) {
        self.inner.on_complete(report);
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_cache_hit_makes_no_calls() {
    let provider = MockProvider::new();
    let observer = Arc::new(RecordingObserver::default());
    let controller = controller(&provider, observer.clone());

    let mut entries = short_entries(5);
    for entry in &entries {
        controller
            .cache()
            .put(&entry.source_text, &format!("cached {}", entry.key));
    }

    let report = controller.run(&mut entries, Selection::All).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(provider.calls(), 0);
    assert_eq!(report.state.cumulative_cost, 0.0);
    assert_eq!(report.state.cache_hit_count, 5);
    assert_eq!(report.state.success_count, 5);
    assert_eq!(entries[3].translation, "cached line.3");
    assert_eq!(controller.usage().totals().api_calls, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_first_batch_keeps_partial_results() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.json");
    let cache_path = dir.path().join("cache.json");

    let provider = MockProvider::new();
    let observer = Arc::new(CancelAfter {
        after: 1,
        control: OnceLock::new(),
        inner: RecordingObserver::default(),
    });
    let controller = RunController::new(config(), Arc::new(provider.clone()), Arc::new(ContentCache::new()))
        .with_observer(observer.clone())
        .with_persistence(Arc::new(FileStore::new(&cache_path, &output)));
    observer.control.set(controller.control()).unwrap();

    let mut entries = large_entries(4);
    let report = controller.run(&mut entries, Selection::All).await.unwrap();

    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.batch_count, 2);
    assert_eq!(report.state.success_count, 2);
    assert_eq!(report.state.fail_count, 0);
    assert_eq!(provider.calls(), 1);
    assert!(report.persisted);

    let saved = store::load_entries(&output).unwrap();
    assert!(saved[0].is_translated());
    assert!(saved[1].is_translated());
    assert!(!saved[2].is_translated());
    assert!(!saved[3].is_translated());
    assert_eq!(ContentCache::load(&cache_path).unwrap().size(), 2);
    assert_eq!(controller.control().status(), RunStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_then_success() {
    let provider = MockProvider::new();
    provider.push(MockReply::RateLimited);
    let observer = Arc::new(RecordingObserver::default());
    let controller = controller(&provider, observer.clone());

    let mut entries = short_entries(3);
    let report = controller.run(&mut entries, Selection::All).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.state.success_count, 3);
    assert_eq!(report.state.fail_count, 0);
    assert_eq!(provider.calls(), 2);
    assert!(entries.iter().all(Entry::is_translated));

    let waits: Vec<_> = observer
        .logs()
        .into_iter()
        .filter(|(level, message)| *level == LogLevel::Warn && message.contains("before retry"))
        .collect();
    assert_eq!(waits.len(), 1);
    assert!(observer.contains("succeeded after 1 retries"));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_config_fails_before_planning() {
    let provider = MockProvider::new();
    let controller = RunController::new(
        TranslatorConfig::default(),
        Arc::new(provider.clone()),
        Arc::new(ContentCache::new()),
    );

    let mut entries = short_entries(2);
    let err = assert_err!(controller.run(&mut entries, Selection::All).await);
    assert!(matches!(err, TranslationError::ConfigurationInvalid { .. }));
    assert_eq!(provider.calls(), 0);
    assert!(!controller.control().is_running());
    assert_eq!(controller.control().status(), RunStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_second_run_is_rejected() {
    let provider = MockProvider::new().with_latency(Duration::from_secs(2));
    let controller = Arc::new(controller(&provider, Arc::new(RecordingObserver::default())));

    let worker = {
        let controller = controller.clone();
        tokio::spawn(async move {
            let mut entries = short_entries(2);
            controller.run(&mut entries, Selection::All).await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut other = short_entries(2);
    let err = assert_err!(controller.run(&mut other, Selection::All).await);
    assert!(matches!(err, TranslationError::AlreadyRunning));

    let report = assert_ok!(worker.await.unwrap());
    assert_eq!(report.status, RunStatus::Completed);

    // The flag is released once the first run ends
    let report = assert_ok!(controller.run(&mut other, Selection::All).await);
    assert_eq!(report.state.success_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_pause_holds_before_next_batch() {
    let provider = MockProvider::new().with_latency(Duration::from_secs(1));
    let controller = Arc::new(controller(&provider, Arc::new(RecordingObserver::default())));
    let control = controller.control();

    let worker = {
        let controller = controller.clone();
        tokio::spawn(async move {
            let mut entries = large_entries(4);
            controller.run(&mut entries, Selection::All).await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(control.pause());
    assert_eq!(control.status(), RunStatus::Paused);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(provider.calls(), 1);
    let snapshot = control.snapshot();
    assert!(snapshot.is_paused);
    assert_eq!(snapshot.batches_done, 1);
    assert_eq!(snapshot.success_count, 2);

    assert!(control.resume());
    let report = assert_ok!(worker.await.unwrap());
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.state.success_count, 4);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_paused() {
    let provider = MockProvider::new().with_latency(Duration::from_secs(1));
    let controller = Arc::new(controller(&provider, Arc::new(RecordingObserver::default())));
    let control = controller.control();

    let worker = {
        let controller = controller.clone();
        tokio::spawn(async move {
            let mut entries = large_entries(4);
            controller.run(&mut entries, Selection::All).await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    control.pause();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(control.cancel());

    let report = assert_ok!(worker.await.unwrap());
    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.state.success_count, 2);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_response_uses_line_fallback() {
    let provider = MockProvider::new();
    provider.push(MockReply::Text("1. Satır bir\n2. Satır iki".to_string()));
    let observer = Arc::new(RecordingObserver::default());
    let controller = controller(&provider, observer.clone());

    let mut entries = short_entries(2);
    let report = controller.run(&mut entries, Selection::All).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(entries[0].translation, "Satır bir");
    assert_eq!(entries[1].translation, "Satır iki");
    assert!(observer.contains("Malformed response"));
}

#[tokio::test(start_paused = true)]
async fn test_unusable_responses_fail_the_run() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.json");

    let provider = MockProvider::new();
    provider.push(MockReply::Text(String::new()));
    let observer = Arc::new(RecordingObserver::default());
    let controller = controller(&provider, observer.clone())
        .with_persistence(Arc::new(FileStore::new(dir.path().join("cache.json"), &output)));

    let mut entries = short_entries(3);
    let report = controller.run(&mut entries, Selection::All).await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.state.fail_count, 3);
    assert!(!report.persisted);
    assert!(!output.exists());
    assert!(observer.contains("Tips to reduce failures"));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_skip_batch_and_continue() {
    let provider = MockProvider::new();
    // gemini-pro allows 5 attempts
    for _ in 0..5 {
        provider.push(MockReply::Transport("connection reset".to_string()));
    }
    let observer = Arc::new(RecordingObserver::default());
    let controller = controller(&provider, observer.clone());

    let mut entries = large_entries(4);
    let report = controller.run(&mut entries, Selection::All).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.state.fail_count, 2);
    assert_eq!(report.state.success_count, 2);
    assert_eq!(provider.calls(), 6);
    assert!(!entries[0].is_translated());
    assert!(entries[2].is_translated());
    assert_eq!(observer.progress().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_selection_limits_work() {
    let provider = MockProvider::new();
    let controller = controller(&provider, Arc::new(RecordingObserver::default()));

    let mut entries = short_entries(4);
    entries[2].selected = true;
    let report = controller.run(&mut entries, Selection::Selected).await.unwrap();
    assert_eq!(report.entries_planned, 1);
    assert!(entries[2].is_translated());
    assert!(!entries[0].is_translated());

    let report = controller
        .run(&mut entries, Selection::FirstUntranslated(2))
        .await
        .unwrap();
    assert_eq!(report.entries_planned, 2);
    assert!(entries[0].is_translated());
    assert!(entries[1].is_translated());
    assert!(!entries[3].is_translated());
}

#[tokio::test(start_paused = true)]
async fn test_completed_run_persists_cache_and_output() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.json");
    let cache_path = dir.path().join("cache.json");

    let provider = MockProvider::new().with_prefix("TR:");
    let controller = controller(&provider, Arc::new(RecordingObserver::default()))
        .with_persistence(Arc::new(FileStore::new(&cache_path, &output)));

    let mut entries = short_entries(3);
    let report = controller.run(&mut entries, Selection::All).await.unwrap();
    assert!(report.persisted);

    let saved = store::load_entries(&output).unwrap();
    assert_eq!(saved, entries);
    assert_eq!(saved[0].translation, "TR:Line 0");

    let cache = ContentCache::load(&cache_path).unwrap();
    assert_eq!(cache.lookup("Line 2").as_deref(), Some("TR:Line 2"));
}

#[tokio::test(start_paused = true)]
async fn test_cache_only_batch_still_waits_before_next() {
    let provider = MockProvider::new();
    let controller = controller(&provider, Arc::new(RecordingObserver::default()));

    let mut entries = large_entries(4);
    controller.cache().put(&entries[0].source_text, "first");
    controller.cache().put(&entries[1].source_text, "second");

    let started = Instant::now();
    let report = controller.run(&mut entries, Selection::All).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.batch_count, 2);
    assert_eq!(report.state.cache_hit_count, 2);
    assert_eq!(provider.calls(), 1);
    // 60 rpm spacing is 1000ms with 20% headroom
    assert!(started.elapsed() >= Duration::from_millis(1200));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_provider_call() {
    let provider = MockProvider::new().with_latency(Duration::from_secs(5));
    let controller = Arc::new(controller(&provider, Arc::new(RecordingObserver::default())));
    let control = controller.control();

    let worker = {
        let controller = controller.clone();
        tokio::spawn(async move {
            let mut entries = short_entries(3);
            let report = controller.run(&mut entries, Selection::All).await;
            (report, entries)
        })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(control.cancel());

    let started = Instant::now();
    let (report, entries) = worker.await.unwrap();
    let report = assert_ok!(report);
    assert!(started.elapsed() < Duration::from_secs(4));

    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.state.success_count, 0);
    assert_eq!(report.state.fail_count, 0);
    assert_eq!(report.state.api_call_count, 0);
    assert!(!report.persisted);
    assert!(entries.iter().all(|e| !e.is_translated()));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_inter_batch_delay() {
    let provider = MockProvider::new();
    let controller = Arc::new(controller(&provider, Arc::new(RecordingObserver::default())));
    let control = controller.control();

    let worker = {
        let controller = controller.clone();
        tokio::spawn(async move {
            let mut entries = large_entries(4);
            let report = controller.run(&mut entries, Selection::All).await;
            (report, entries)
        })
    };

    // first batch returns at once, the 1200ms wait is under way
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(provider.calls(), 1);
    assert!(control.cancel());

    let (report, entries) = worker.await.unwrap();
    let report = assert_ok!(report);

    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.state.success_count, 2);
    assert_eq!(report.state.batches_done, 1);
    assert_eq!(provider.calls(), 1);
    assert!(entries[0].is_translated());
    assert!(entries[1].is_translated());
    assert!(!entries[2].is_translated());
    assert!(!entries[3].is_translated());
}

#[tokio::test(start_paused = true)]
async fn test_generic_pricing_reported_once_per_run() {
    let provider = MockProvider::new();
    let observer = Arc::new(RecordingObserver::default());
    let config = TranslatorConfig {
        model: "gemma-2-9b-it".to_string(),
        ..config()
    };
    let generic = RunController::new(config, Arc::new(provider.clone()), Arc::new(ContentCache::new()))
        .with_observer(observer.clone());

    // more than one batch worth of entries
    let mut entries = short_entries(25);
    let report = generic.run(&mut entries, Selection::All).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert!(report.batch_count >= 2);
    assert_eq!(report.state.api_call_count, report.batch_count);
    assert!(report.state.cumulative_cost > 0.0);
    let warnings: Vec<_> = observer
        .logs()
        .into_iter()
        .filter(|(level, message)| *level == LogLevel::Warn && message.contains("No known pricing"))
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].1.contains("gemma-2-9b-it"));

    let known = Arc::new(RecordingObserver::default());
    let controller = controller(&provider, known.clone());
    let mut entries = short_entries(25);
    controller.run(&mut entries, Selection::All).await.unwrap();
    assert!(!known.contains("No known pricing"));
}
