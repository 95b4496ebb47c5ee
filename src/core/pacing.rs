//! Request pacing against per-minute quotas

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::core::models::RateProfile;

/// Length of the sliding request window
pub const WINDOW: Duration = Duration::from_secs(60);

/// Delay used when the model has no per-minute quota
pub const DEFAULT_DELAY: Duration = Duration::from_millis(3000);

pub const MIN_DELAY: Duration = Duration::from_millis(1000);
pub const MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Headroom on top of the even spacing, as a 12/10 ratio
const SPACING_NUM: u64 = 12;
const SPACING_DEN: u64 = 10;

/// Timestamps of recent provider calls, oldest first
#[derive(Debug, Default, Clone)]
pub struct RequestWindow {
    requests: VecDeque<Instant>,
}

impl RequestWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call made now
    pub fn record(&mut self) {
        self.record_at(Instant::now());
    }

    pub fn record_at(&mut self, at: Instant) {
        self.requests.push_back(at);
    }

    /// Drop requests older than the window
    pub fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.requests.front() {
            if now.saturating_duration_since(oldest) >= WINDOW {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }

    /// Requests currently counted (call `prune` first for an exact figure)
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn oldest(&self) -> Option<Instant> {
        self.requests.front().copied()
    }
}

/// Computes the wait before the next provider call
#[derive(Debug, Clone, Copy)]
pub struct DelayCalculator {
    profile: RateProfile,
}

impl DelayCalculator {
    pub fn new(profile: RateProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> RateProfile {
        self.profile
    }

    /// Delay before the next request, measured now
    pub fn next_delay(&self, window: &mut RequestWindow) -> Duration {
        self.next_delay_at(window, Instant::now())
    }

    /// Delay before the next request, measured at `now`
    pub fn next_delay_at(&self, window: &mut RequestWindow, now: Instant) -> Duration {
        window.prune(now);

        let Some(rpm) = self.profile.rpm_limit() else {
            return DEFAULT_DELAY;
        };

        if window.len() >= rpm as usize {
            if let Some(oldest) = window.oldest() {
                let age = now.saturating_duration_since(oldest);
                let wait = WINDOW.saturating_sub(age).max(MIN_DELAY);
                info!(
                    "Rate limit reached ({}/min), waiting {}s",
                    rpm,
                    wait.as_secs()
                );
                return wait;
            }
        }

        let spacing_ms = 60_000u64.div_ceil(rpm as u64);
        let delay = Duration::from_millis(spacing_ms * SPACING_NUM / SPACING_DEN)
            .clamp(MIN_DELAY, MAX_DELAY);

        debug!(
            "Optimal delay {}ms ({} requests remaining this minute)",
            delay.as_millis(),
            (rpm as usize).saturating_sub(window.len())
        );
        delay
    }
}
