//! Scripted in-memory provider for tests and dry runs
//!
//! By default every call echoes a well-formed `translations` payload built from
//! the numbered list in the prompt. Queue replies with [`MockProvider::push`] to
//! script rate limits, transport failures or raw text.

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::core::errors::ProviderError;
use crate::core::models::ModelInfo;
use crate::core::provider::TranslationProvider;

/// One scripted provider outcome
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Translate every numbered text as `<prefix><text>`
    Echo,
    /// Return this raw text
    Text(String),
    /// Fail with a rate-limit signal
    RateLimited,
    /// Fail with a transport error
    Transport(String),
}

#[derive(Debug, Default)]
struct MockState {
    replies: VecDeque<MockReply>,
    prompts: Vec<String>,
}

/// Provider that replays queued replies, then echoes
#[derive(Debug, Clone)]
pub struct MockProvider {
    prefix: String,
    latency: Duration,
    calls: Arc<AtomicUsize>,
    state: Arc<Mutex<MockState>>,
    models: Vec<ModelInfo>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Echoing provider with `[TR] ` prefix
    pub fn new() -> Self {
        Self {
            prefix: "[TR] ".to_string(),
            latency: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            state: Arc::new(Mutex::new(MockState::default())),
            models: Vec::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Simulated response time of every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_models(mut self, models: Vec<ModelInfo>) -> Self {
        self.models = models;
        self
    }

    /// Queue a reply for the next unanswered call
    pub fn push(&self, reply: MockReply) -> &Self {
        self.state.lock().replies.push_back(reply);
        self
    }

    /// Number of `translate_batch` calls so far (shared between clones)
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in order
    pub fn prompts(&self) -> Vec<String> {
        self.state.lock().prompts.clone()
    }

    /// Expected translation for a source text under this provider's echo
    pub fn echoed(&self, text: &str) -> String {
        format!("{}{}", self.prefix, text)
    }

    fn echo(&self, prompt: &str) -> String {
        let translations: Vec<_> = numbered_texts(prompt)
            .into_iter()
            .map(|(index, text)| json!({ "index": index, "translation": self.echoed(&text) }))
            .collect();
        json!({ "translations": translations }).to_string()
    }
}

/// `(index, text)` pairs from `N. "text"` lines of a prompt
pub fn numbered_texts(prompt: &str) -> Vec<(usize, String)> {
    static LINE: OnceLock<Regex> = OnceLock::new();
    let line = LINE.get_or_init(|| Regex::new(r#"^(\d+)\. "(.*)"$"#).expect("line pattern is valid"));

    prompt
        .lines()
        .filter_map(|l| {
            let caps = line.captures(l.trim())?;
            let index = caps[1].parse().ok()?;
            Some((index, caps[2].to_string()))
        })
        .collect()
}

#[async_trait]
impl TranslationProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn translate_batch(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = {
            let mut state = self.state.lock();
            state.prompts.push(prompt.to_string());
            state.replies.pop_front().unwrap_or(MockReply::Echo)
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match reply {
            MockReply::Echo => Ok(self.echo(prompt)),
            MockReply::Text(text) => Ok(text),
            MockReply::RateLimited => Err(ProviderError::RateLimited { retry_after: None }),
            MockReply::Transport(message) => Err(ProviderError::TransportFailure { message }),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        Ok(self.models.clone())
    }
}
