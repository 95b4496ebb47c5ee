//! Run lifecycle callbacks

#[cfg(test)]
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::core::models::{RunReport, RunState};

/// Severity of a run log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Receives run events synchronously from the worker
pub trait RunObserver: Send + Sync {
    /// A human-readable log line
    fn on_log(&self, _level: LogLevel, _message: &str) {}

    /// Called after every batch with a consistent snapshot
    fn on_progress(&self, _done: usize, _total: usize, _state: &RunState) {}

    /// Called once when the run reaches a terminal state
    fn on_complete(&self, _report: &RunReport) {}
}

/// Forwards log lines to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => info!("{}", message),
            LogLevel::Warn => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
    }
}

/// Keeps log lines and reports in memory for unit tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingObserver {
    logs: Mutex<Vec<(LogLevel, String)>>,
    reports: Mutex<Vec<RunReport>>,
}

#[cfg(test)]
impl RecordingObserver {
    /// Number of log lines at `level`
    pub fn count(&self, level: LogLevel) -> usize {
        self.logs.lock().iter().filter(|(l, _)| *l == level).count()
    }

    pub fn reports(&self) -> Vec<RunReport> {
        self.reports.lock().clone()
    }
}

#[cfg(test)]
impl RunObserver for RecordingObserver {
    fn on_log(&self, level: LogLevel, message: &str) {
        self.logs.lock().push((level, message.to_string()));
    }

    fn on_complete(&self, report: &RunReport) {
        self.reports.lock().push(report.clone());
    }
}
