//! Core data models for translation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One localization row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    #[serde(rename = "source")]
    pub source_text: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub selected: bool,
}

impl Entry {
    pub fn new(key: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            source_text: source_text.into(),
            translation: String::new(),
            selected: false,
        }
    }

    pub fn with_translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = translation.into();
        self
    }

    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }

    pub fn is_translated(&self) -> bool {
        !self.translation.is_empty()
    }

    /// Non-empty source without a translation yet
    pub fn needs_translation(&self) -> bool {
        !self.source_text.is_empty() && self.translation.is_empty()
    }
}

/// Which entries a run starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    /// Only entries flagged `selected`
    Selected,
    /// The first `n` untranslated entries
    FirstUntranslated(usize),
}

impl Selection {
    /// Indices of entries this selection sends to the planner
    pub fn filter(&self, entries: &[Entry]) -> Vec<usize> {
        let candidates = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.needs_translation());

        match *self {
            Selection::All => candidates.map(|(i, _)| i).collect(),
            Selection::Selected => candidates.filter(|(_, e)| e.selected).map(|(i, _)| i).collect(),
            Selection::FirstUntranslated(n) => candidates.take(n).map(|(i, _)| i).collect(),
        }
    }
}

/// Quota description for a model. `-1` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateProfile {
    pub requests_per_minute: i32,
    pub requests_per_day: i32,
    pub tokens_per_minute: i32,
}

impl RateProfile {
    pub const UNBOUNDED: i32 = -1;

    pub const fn new(requests_per_minute: i32, requests_per_day: i32, tokens_per_minute: i32) -> Self {
        Self {
            requests_per_minute,
            requests_per_day,
            tokens_per_minute,
        }
    }

    /// Requests per minute, or `None` when unbounded
    pub fn rpm_limit(&self) -> Option<u32> {
        if self.requests_per_minute > 0 {
            Some(self.requests_per_minute as u32)
        } else {
            None
        }
    }

    /// Retry budget: looser quotas get more attempts
    pub fn max_retries(&self) -> u32 {
        match self.rpm_limit() {
            Some(rpm) => (rpm / 10).clamp(2, 5),
            None => 5,
        }
    }
}

impl fmt::Display for RateProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn dim(v: i32) -> String {
            if v < 0 {
                "unlimited".to_string()
            } else {
                v.to_string()
            }
        }
        write!(
            f,
            "{}/min, {}/day, {} tokens/min",
            dim(self.requests_per_minute),
            dim(self.requests_per_day),
            dim(self.tokens_per_minute)
        )
    }
}

/// Per-model price in currency per 1000 characters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_1k_chars: f64,
    pub output_per_1k_chars: f64,
}

impl ModelPrice {
    pub const fn new(input_per_1k_chars: f64, output_per_1k_chars: f64) -> Self {
        Self {
            input_per_1k_chars,
            output_per_1k_chars,
        }
    }
}

/// Model metadata as reported by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: String,
    pub input_token_limit: u32,
    pub output_token_limit: u32,
}

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Idle,
    Running,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Running | RunStatus::Paused)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Cancelled | RunStatus::Failed
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Paused => "paused",
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Counters and flags of an in-progress run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub is_running: bool,
    pub is_paused: bool,
    pub cancellation_requested: bool,
    pub success_count: usize,
    pub fail_count: usize,
    pub cumulative_cost: f64,
    pub api_call_count: usize,
    pub cache_hit_count: usize,
    pub total_input_chars: usize,
    pub total_output_chars: usize,
    pub batches_done: usize,
}

/// Outcome of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub state: RunState,
    pub entries_planned: usize,
    pub batch_count: usize,
    pub persisted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Percentage of planned entries that were translated
    pub fn efficiency(&self) -> f64 {
        if self.entries_planned == 0 {
            0.0
        } else {
            self.state.success_count as f64 * 100.0 / self.entries_planned as f64
        }
    }

    /// Requests avoided by batching instead of one call per entry
    pub fn calls_saved(&self) -> usize {
        self.entries_planned.saturating_sub(self.batch_count)
    }
}

/// Translation progress of an entry list
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EntryStats {
    pub total: usize,
    pub translated: usize,
    pub untranslated: usize,
}

impl EntryStats {
    pub fn from_entries(entries: &[Entry]) -> Self {
        let translated = entries.iter().filter(|e| e.is_translated()).count();
        Self {
            total: entries.len(),
            translated,
            untranslated: entries.len() - translated,
        }
    }

    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.translated as f64 * 100.0 / self.total as f64
        }
    }
}
