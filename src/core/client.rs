//! Gemini `generateContent` provider over reqwest

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::config::TranslatorConfig;
use crate::core::errors::{ProviderError, Result};
use crate::core::models::ModelInfo;
use crate::core::provider::TranslationProvider;

const TEMPERATURE: f64 = 0.3;
const TOP_P: f64 = 0.8;
const TOP_K: u32 = 40;

/// Gemini REST client
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    /// Create a new provider from a validated config
    pub fn new(config: &TranslatorConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .pool_max_idle_per_host(4)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, self.model, self.api_key
        )
    }

    fn models_url(&self) -> String {
        format!("{}/models?key={}", self.api_base, self.api_key)
    }

    /// Map a non-success response, reading `Retry-After` before the body
    async fn failure(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return ProviderError::RateLimited { retry_after };
        }

        let body = response.text().await.unwrap_or_default();
        ProviderError::transport(format!("HTTP {}: {}", status.as_u16(), body.trim()))
    }
}

/// Request body for one prompt
pub fn request_body(prompt: &str) -> Value {
    json!({
        "contents": [{
            "parts": [{ "text": prompt }]
        }],
        "generationConfig": {
            "temperature": TEMPERATURE,
            "topP": TOP_P,
            "topK": TOP_K
        }
    })
}

/// Text of the first candidate
pub fn response_text(body: &Value) -> Option<&str> {
    body["candidates"]
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
}

/// Models that can serve `generateContent`
pub fn parse_models(body: &Value) -> Vec<ModelInfo> {
    let Some(models) = body["models"].as_array() else {
        return Vec::new();
    };

    models
        .iter()
        .filter(|m| {
            m["supportedGenerationMethods"]
                .as_array()
                .is_some_and(|methods| methods.iter().any(|x| x == "generateContent"))
        })
        .filter_map(|m| {
            let name = m["name"].as_str()?;
            let name = name.strip_prefix("models/").unwrap_or(name).to_string();
            Some(ModelInfo {
                display_name: m["displayName"].as_str().unwrap_or(&name).to_string(),
                input_token_limit: m["inputTokenLimit"].as_u64().unwrap_or(0) as u32,
                output_token_limit: m["outputTokenLimit"].as_u64().unwrap_or(0) as u32,
                name,
            })
        })
        .collect()
}

#[async_trait]
impl TranslationProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn translate_batch(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        debug!("POST generateContent for {} ({} chars)", self.model, prompt.len());

        let response = self
            .client
            .post(self.generate_url())
            .json(&request_body(prompt))
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(format!("invalid response body: {}", e)))?;

        match response_text(&body) {
            Some(text) => Ok(text.to_string()),
            None => {
                warn!("Response carried no candidate text");
                // Let the parser decide; an empty string yields no translations
                Ok(String::new())
            }
        }
    }

    async fn list_models(&self) -> std::result::Result<Vec<ModelInfo>, ProviderError> {
        let response = self
            .client
            .get(self.models_url())
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;
        Ok(parse_models(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_include;
    use crate::core::errors::TranslationError;

    fn config() -> TranslatorConfig {
        TranslatorConfig {
            api_key: "k".to_string(),
            api_base: "https://example.test/v1beta/".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_provider_creation() {
        let provider = GeminiProvider::new(&config()).unwrap();
        assert_eq!(
            provider.generate_url(),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent?key=k"
        );
        assert_eq!(provider.models_url(), "https://example.test/v1beta/models?key=k");
    }

    #[test]
    fn test_provider_rejects_invalid_config() {
        let err = GeminiProvider::new(&TranslatorConfig::default()).unwrap_err();
        assert!(matches!(err, TranslationError::ConfigurationInvalid { .. }));
    }

    #[test]
    fn test_request_body_shape() {
        assert_json_include!(
            actual: request_body("hello"),
            expected: json!({
                "contents": [{ "parts": [{ "text": "hello" }] }],
                "generationConfig": { "topK": 40 }
            })
        );
    }

    #[test]
    fn test_response_text_extraction() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"translations\":[]}" }] } }]
        });
        assert_eq!(response_text(&body), Some("{\"translations\":[]}"));
        assert_eq!(response_text(&json!({ "candidates": [] })), None);
    }

    #[test]
    fn test_parse_models_filters_generators() {
        let body = json!({ "models": [
            {
                "name": "models/gemini-1.5-flash",
                "displayName": "Gemini 1.5 Flash",
                "inputTokenLimit": 1048576,
                "outputTokenLimit": 8192,
                "supportedGenerationMethods": ["generateContent", "countTokens"]
            },
            {
                "name": "models/text-embedding-004",
                "supportedGenerationMethods": ["embedContent"]
            }
        ]});

        let models = parse_models(&body);
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "gemini-1.5-flash");
        assert_eq!(models[0].display_name, "Gemini 1.5 Flash");
        assert_eq!(models[0].input_token_limit, 1_048_576);
        assert!(parse_models(&json!({})).is_empty());
    }
}
