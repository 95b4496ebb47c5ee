//! Per-model quota and context-size lookup

use tracing::debug;

use crate::core::models::RateProfile;

const U: i32 = RateProfile::UNBOUNDED;

/// Published free-tier quotas: (model, rpm, rpd, tpm)
const DEFAULT_RATE_LIMITS: &[(&str, i32, i32, i32)] = &[
    // Gemini 3
    ("gemini-3-pro-preview", 5, 50, 250_000),
    ("gemini-3-flash-preview", 10, 200, 1_000_000),
    ("gemini-3-flash-thinking", 5, 50, 250_000),
    // Gemini 2.5
    ("gemini-2.5-pro", 2, 50, 250_000),
    ("gemini-2.5-pro-001", 2, 50, 250_000),
    ("gemini-2.5-flash", 15, 1500, 1_000_000),
    ("gemini-2.5-flash-001", 15, 1500, 1_000_000),
    ("gemini-2.5-flash-lite", 30, 2000, 1_000_000),
    ("gemini-2.5-flash-lite-001", 30, 2000, 1_000_000),
    ("gemini-2.5-flash-8b", 30, 2000, 1_000_000),
    // Gemini 2.0
    ("gemini-2.0-pro", 5, 100, 500_000),
    ("gemini-2.0-flash", 15, 1500, 1_000_000),
    ("gemini-2.0-flash-001", 15, 1500, 1_000_000),
    ("gemini-2.0-flash-lite", 30, 1500, 1_000_000),
    ("gemini-2.0-flash-exp", 15, 1500, 1_000_000),
    // Image
    ("gemini-2.5-flash-image", 10, 1500, U),
    ("gemini-2.0-flash-image", 10, 1500, U),
    ("imagen-3.0-generate-002", 2, 100, U),
    ("imagen-3.0-capability-001", 2, 100, U),
    // Audio
    ("gemini-2.5-flash-audio", 5, 500, U),
    ("gemini-live-2.5-flash", 3, U, U),
    // Experimental
    ("gemini-exp-2026", 5, 50, 250_000),
    ("gemini-2.5-pro-exp-0205", 5, 50, 250_000),
    ("gemini-2.0-flash-thinking-exp", 5, 50, 250_000),
    ("learnlm-1.5-pro-experimental", 5, 50, 250_000),
    // Gemma
    ("gemma-2-27b-it", 15, 1500, 250_000),
    ("gemma-2-9b-it", 30, 2000, 500_000),
    ("gemma-2-2b-it", 30, U, 1_000_000),
    // Embeddings
    ("text-embedding-005", 100, 10_000, U),
    ("text-multilingual-embedding-002", 100, 10_000, U),
    // Legacy
    ("gemini-1.5-pro-latest", 2, 50, 32_000),
    ("gemini-1.5-flash-latest", 15, 1500, 1_000_000),
    ("gemini-1.5-flash-8b-latest", 15, 1500, 1_000_000),
    ("gemini-1.5-pro", 2, 50, 32_000),
    ("gemini-1.5-flash", 15, 1500, 1_000_000),
    ("gemini-pro", 60, 1500, 120_000),
    // Special
    ("aqa", 5, 100, U),
    ("med-gemini-preview", 2, 20, 100_000),
    // Aliases
    ("gemini-flash-latest", 15, 1500, 1_000_000),
    ("gemini-flash-lite-latest", 30, 2000, 1_000_000),
    ("gemini-pro-latest", 5, 100, 500_000),
];

/// Input context sizes in tokens
const DEFAULT_TOKEN_LIMITS: &[(&str, u32)] = &[
    ("gemini-3-pro-preview", 2_000_000),
    ("gemini-3-flash-preview", 1_000_000),
    ("gemini-2.5-pro", 2_000_000),
    ("gemini-2.5-flash", 1_000_000),
    ("gemini-2.0-flash", 1_000_000),
    ("gemini-1.5-pro", 2_000_000),
    ("gemini-1.5-flash", 1_000_000),
    ("gemini-pro", 30_720),
];

/// Context size assumed for unknown models
pub const DEFAULT_TOKEN_LIMIT: u32 = 30_720;

/// Profile for names no rule recognizes
pub const CONSERVATIVE_PROFILE: RateProfile = RateProfile::new(2, 20, 10_000);

type Rule = (fn(&str) -> bool, RateProfile);

/// Tier heuristics, checked in order after table lookups fail
const TIER_RULES: &[Rule] = &[
    (|m: &str| m.contains("3-pro") || m.contains("3.0"), RateProfile::new(5, 50, 250_000)),
    (|m: &str| m.contains("3-flash") || m.contains("3-"), RateProfile::new(10, 200, 1_000_000)),
    (|m: &str| m.contains("2.5-pro"), RateProfile::new(2, 50, 250_000)),
    (
        |m: &str| m.contains("2.5-flash-lite") || (m.contains("2.5") && m.contains("lite")),
        RateProfile::new(30, 2000, 1_000_000),
    ),
    (|m: &str| m.contains("2.5-flash") || m.contains("2.5"), RateProfile::new(15, 1500, 1_000_000)),
    (|m: &str| m.contains("2.0-pro"), RateProfile::new(5, 100, 500_000)),
    (
        |m: &str| m.contains("2.0-flash-lite") || (m.contains("2.0") && m.contains("lite")),
        RateProfile::new(30, 1500, 1_000_000),
    ),
    (|m: &str| m.contains("2.0-flash") || m.contains("2.0"), RateProfile::new(15, 1500, 1_000_000)),
    (|m: &str| m.contains("1.5-pro"), RateProfile::new(2, 50, 32_000)),
    (|m: &str| m.contains("1.5-flash"), RateProfile::new(15, 1500, 1_000_000)),
    (|m: &str| m.contains("gemma"), RateProfile::new(30, 2000, 500_000)),
    (
        |m: &str| m.contains("exp") || m.contains("preview") || m.contains("experimental"),
        RateProfile::new(5, 50, 250_000),
    ),
    (|m: &str| m.contains("embedding"), RateProfile::new(100, 10_000, U)),
    (|m: &str| m.contains("image") || m.contains("imagen"), RateProfile::new(10, 1500, U)),
    (|m: &str| m.contains("audio") || m.contains("live"), RateProfile::new(5, 500, U)),
];

/// Immutable model -> quota registry
#[derive(Debug, Clone)]
pub struct RateProfileRegistry {
    profiles: Vec<(String, RateProfile)>,
    token_limits: Vec<(String, u32)>,
}

impl Default for RateProfileRegistry {
    fn default() -> Self {
        Self {
            profiles: DEFAULT_RATE_LIMITS
                .iter()
                .map(|(name, rpm, rpd, tpm)| (name.to_string(), RateProfile::new(*rpm, *rpd, *tpm)))
                .collect(),
            token_limits: DEFAULT_TOKEN_LIMITS
                .iter()
                .map(|(name, limit)| (name.to_string(), *limit))
                .collect(),
        }
    }
}

impl RateProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with an explicit table (tiers and default still apply)
    pub fn with_profiles(profiles: Vec<(String, RateProfile)>) -> Self {
        Self {
            profiles,
            ..Self::default()
        }
    }

    /// Resolve a model name to a quota profile. Never fails.
    pub fn resolve(&self, model: &str) -> RateProfile {
        if let Some((_, profile)) = self.profiles.iter().find(|(name, _)| name == model) {
            return *profile;
        }

        if !model.is_empty() {
            if let Some((name, profile)) = self
                .profiles
                .iter()
                .find(|(name, _)| model.contains(name.as_str()) || name.contains(model))
            {
                debug!("Rate profile for {} matched table entry {}", model, name);
                return *profile;
            }
        }

        if let Some((_, profile)) = TIER_RULES.iter().find(|(matches, _)| matches(model)) {
            debug!("Rate profile for {} estimated from tier rules", model);
            return *profile;
        }

        debug!("Unknown model {}, using conservative rate profile", model);
        CONSERVATIVE_PROFILE
    }

    /// Input context size of a model in tokens
    pub fn token_limit(&self, model: &str) -> u32 {
        if let Some((_, limit)) = self.token_limits.iter().find(|(name, _)| name == model) {
            return *limit;
        }

        if !model.is_empty() {
            if let Some((_, limit)) = self
                .token_limits
                .iter()
                .find(|(name, _)| model.contains(name.as_str()) || name.contains(model))
            {
                return *limit;
            }
        }

        DEFAULT_TOKEN_LIMIT
    }

    /// Names in the built-in table
    pub fn known_models(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|(name, _)| name.as_str())
    }
}
