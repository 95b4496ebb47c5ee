//! Shared helpers for integration tests

use parking_lot::Mutex;

use batch_localizer::{LogLevel, RunObserver, RunReport, RunState};

/// Keeps every run event in memory
#[derive(Debug, Default)]
pub struct RecordingObserver {
    logs: Mutex<Vec<(LogLevel, String)>>,
    progress: Mutex<Vec<(usize, usize, RunState)>>,
    reports: Mutex<Vec<RunReport>>,
}

#[allow(dead_code)]
impl RecordingObserver {
    pub fn logs(&self) -> Vec<(LogLevel, String)> {
        self.logs.lock().clone()
    }

    /// Log lines containing `needle`
    pub fn matching(&self, needle: &str) -> usize {
        self.logs.lock().iter().filter(|(_, m)| m.contains(needle)).count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.matching(needle) > 0
    }

    pub fn progress(&self) -> Vec<(usize, usize, RunState)> {
        self.progress.lock().clone()
    }

    pub fn reports(&self) -> Vec<RunReport> {
        self.reports.lock().clone()
    }
}

impl RunObserver for RecordingObserver {
    fn on_log(&self, level: LogLevel, message: &str) {
        self.logs.lock().push((level, message.to_string()));
    }

    fn on_progress(&self, done: usize, total: usize, state: &RunState) {
        self.progress.lock().push((done, total, state.clone()));
    }

    fn on_complete(&self, report: &RunReport) {
        self.reports.lock().push(report.clone());
    }
}
