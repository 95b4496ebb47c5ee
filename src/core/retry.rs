//! Bounded retries around a single provider call

use parking_lot::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::errors::{Result, TranslationError};
use crate::core::observer::{LogLevel, RunObserver};
use crate::core::pacing::{DelayCalculator, RequestWindow};
use crate::core::provider::TranslationProvider;

/// Sleep that ends early with `Cancelled` when the token fires
pub async fn cancellable_sleep(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(TranslationError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// A provider response obtained within the retry budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySuccess {
    pub response: String,
    pub attempts: u32,
    /// Waits taken between attempts, in order
    pub waits: Vec<Duration>,
}

/// Calls a provider up to `max_attempts` times, pacing with the delay calculator
pub struct RetryController<'a> {
    provider: &'a dyn TranslationProvider,
    calculator: DelayCalculator,
    max_attempts: u32,
}

impl<'a> RetryController<'a> {
    pub fn new(provider: &'a dyn TranslationProvider, calculator: DelayCalculator) -> Self {
        Self {
            provider,
            calculator,
            max_attempts: calculator.profile().max_retries(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Send `prompt`, retrying transient failures.
    ///
    /// Rate-limit signals wait `next_delay * (attempt + 1)`, other failures wait
    /// `next_delay`. No wait follows the final attempt. Returns the last provider
    /// error once the budget is spent, or `Cancelled` if the token fires first.
    pub async fn call(
        &self,
        prompt: &str,
        window: &Mutex<RequestWindow>,
        cancel: &CancellationToken,
        observer: &dyn RunObserver,
    ) -> Result<RetrySuccess> {
        let mut waits = Vec::new();
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(TranslationError::Cancelled);
            }

            window.lock().record();
            debug!(
                "Calling {} (attempt {}/{})",
                self.provider.name(),
                attempt + 1,
                self.max_attempts
            );

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
                outcome = self.provider.translate_batch(prompt) => outcome,
            };

            let err = match outcome {
                Ok(response) => {
                    if attempt > 0 {
                        observer.on_log(
                            LogLevel::Info,
                            &format!("Request succeeded after {} retries", attempt),
                        );
                    }
                    return Ok(RetrySuccess {
                        response,
                        attempts: attempt + 1,
                        waits,
                    });
                }
                Err(err) => err,
            };

            if attempt + 1 >= self.max_attempts {
                observer.on_log(
                    LogLevel::Error,
                    &format!("Request failed after {} attempts: {}", self.max_attempts, err),
                );
                return Err(err.into());
            }

            let base = self.calculator.next_delay(&mut window.lock());
            let delay = if err.is_rate_limited() {
                base * (attempt + 1)
            } else {
                base
            };

            observer.on_log(
                LogLevel::Warn,
                &format!(
                    "{}, waiting {}s before retry {}/{}",
                    err,
                    delay.as_secs(),
                    attempt + 1,
                    self.max_attempts
                ),
            );
            waits.push(delay);
            cancellable_sleep(delay, cancel).await?;
            attempt += 1;
        }
    }
}
