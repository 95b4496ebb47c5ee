//! Translation provider capability

use async_trait::async_trait;
use std::fmt::Debug;

use crate::core::errors::ProviderError;
use crate::core::models::ModelInfo;

/// Anything that can answer a batch translation prompt.
///
/// Implementations only move text; prompt construction, response parsing,
/// pacing and retries belong to the caller.
#[async_trait]
pub trait TranslationProvider: Send + Sync + Debug {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Send one batch prompt and return the raw response text
    async fn translate_batch(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Models the provider can serve. Providers without discovery return nothing.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        Ok(Vec::new())
    }
}
