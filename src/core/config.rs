//! Configuration management

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::core::errors::{Result, TranslationError};
use crate::core::models::ModelPrice;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_TARGET_LANGUAGE: &str = "Turkish";
pub const DEFAULT_CONTEXT: &str = "game localization";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_CACHE_PATH: &str = "translation_cache.json";
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Configuration for translator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub api_key: String,
    pub model: String,
    pub target_language: String,
    /// Content type named in the prompt
    pub context: String,
    /// Template with `{LANGUAGE}`, `{CONTEXT}` and `{TEXTS}`; blank means built-in
    pub custom_prompt: Option<String>,
    pub api_base: String,
    pub timeout_ms: u64,
    pub cache_path: String,
    /// Per-model price overrides
    pub pricing: HashMap<String, ModelPrice>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
            context: DEFAULT_CONTEXT.to_string(),
            custom_prompt: None,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            cache_path: DEFAULT_CACHE_PATH.to_string(),
            pricing: HashMap::new(),
        }
    }
}

impl TranslatorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Config file when present, then non-empty environment variables on top
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            Self::from_file(path)?
        } else {
            debug!("No configuration file at {}", path.display());
            Self::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Overwrite fields from a variable lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("GEMINI_API_KEY") {
            self.api_key = key;
        }
        if let Some(model) = get("GEMINI_MODEL") {
            self.model = model;
        }
        if let Some(language) = get("TARGET_LANGUAGE") {
            self.target_language = language;
        }
        if let Some(prompt) = get("CUSTOM_PROMPT") {
            self.custom_prompt = Some(prompt);
        }
        if let Some(base) = get("GEMINI_API_BASE") {
            self.api_base = base;
        }
        if let Some(path) = get("CACHE_PATH") {
            self.cache_path = path;
        }
        if let Some(timeout) = get("REQUEST_TIMEOUT_MS") {
            self.timeout_ms = timeout.trim().parse().map_err(|_| {
                TranslationError::config(format!("REQUEST_TIMEOUT_MS is not a number: {}", timeout))
            })?;
        }
        Ok(())
    }

    /// Load from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TranslationError::FileError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(TranslationError::config("API key is required"));
        }

        if self.model.trim().is_empty() {
            return Err(TranslationError::config("Model is required"));
        }

        if self.target_language.trim().is_empty() {
            return Err(TranslationError::config("Target language is required"));
        }

        if self.timeout_ms == 0 {
            return Err(TranslationError::config("timeout_ms must be greater than 0"));
        }

        let usable = |rate: f64| rate.is_finite() && rate >= 0.0;
        for (model, price) in &self.pricing {
            if !usable(price.input_per_1k_chars) || !usable(price.output_per_1k_chars) {
                return Err(TranslationError::config(format!(
                    "Pricing for {} must be finite and not negative",
                    model
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn valid() -> TranslatorConfig {
        TranslatorConfig {
            api_key: "test_key".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_config_validation_missing_key() {
        let config = TranslatorConfig::default();
        assert!(matches!(
            config.validate(),
            Err(TranslationError::ConfigurationInvalid { .. })
        ));
    }

    #[test]
    fn test_config_validation_negative_pricing() {
        let mut config = valid();
        config
            .pricing
            .insert("gemini-pro".to_string(), ModelPrice::new(-0.5, 0.001));
        assert!(matches!(
            config.validate(),
            Err(TranslationError::ConfigurationInvalid { .. })
        ));

        config
            .pricing
            .insert("gemini-pro".to_string(), ModelPrice::new(0.0, 0.001));
        assert!(config.validate().is_ok());

        config
            .pricing
            .insert("custom".to_string(), ModelPrice::new(0.001, f64::INFINITY));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_missing_model() {
        let config = TranslatorConfig {
            model: "  ".to_string(),
            ..valid()
        };
        assert!(matches!(
            config.validate(),
            Err(TranslationError::ConfigurationInvalid { .. })
        ));
    }

    #[test]
    fn test_defaults() {
        let config = TranslatorConfig::default();
        assert_eq!(config.target_language, "Turkish");
        assert_eq!(config.context, "game localization");
        assert_eq!(config.cache_path, "translation_cache.json");
        assert_eq!(config.timeout_ms, 60_000);
    }

    #[test]
    fn test_overrides_skip_empty_values() {
        let vars: HashMap<&str, &str> = [
            ("GEMINI_API_KEY", "secret"),
            ("GEMINI_MODEL", ""),
            ("TARGET_LANGUAGE", "German"),
            ("REQUEST_TIMEOUT_MS", "1500"),
        ]
        .into_iter()
        .collect();

        let mut config = TranslatorConfig::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api_key, "secret");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.target_language, "German");
        assert_eq!(config.timeout_ms, 1500);
    }

    #[test]
    fn test_bad_timeout_is_invalid() {
        let mut config = TranslatorConfig::default();
        let err = config
            .apply_overrides(|name| (name == "REQUEST_TIMEOUT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, TranslationError::ConfigurationInvalid { .. }));
    }

    #[test]
    fn test_file_round_trip_with_partial_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = valid();
        config
            .pricing
            .insert("custom-model".to_string(), ModelPrice::new(0.1, 0.2));
        config.to_file(&path).unwrap();
        assert_eq!(TranslatorConfig::from_file(&path).unwrap(), config);

        std::fs::write(&path, r#"{"api_key":"k","target_language":"French"}"#).unwrap();
        let partial = TranslatorConfig::from_file(&path).unwrap();
        assert_eq!(partial.target_language, "French");
        assert_eq!(partial.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_missing_file_is_file_error() {
        let dir = tempdir().unwrap();
        let err = TranslatorConfig::from_file(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, TranslationError::FileError { .. }));
    }
}
