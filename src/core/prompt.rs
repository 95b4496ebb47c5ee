//! Batch prompt construction

/// Placeholder replaced by the target language name
pub const LANGUAGE_PLACEHOLDER: &str = "{LANGUAGE}";
/// Placeholder replaced by the content type description
pub const CONTEXT_PLACEHOLDER: &str = "{CONTEXT}";
/// Placeholder replaced by the numbered source list
pub const TEXTS_PLACEHOLDER: &str = "{TEXTS}";

pub const DEFAULT_BATCH_PROMPT: &str = r#"You are a professional game localization translator. Translate the following English texts to {LANGUAGE}.

IMPORTANT RULES:
1. Provide ONLY ONE best translation for each text
2. Keep the gaming context and natural flow
3. Use {LANGUAGE} gaming terminology when appropriate
4. Be concise and accurate
5. Return translations in the exact JSON format shown below

Context: {CONTEXT}

Input texts to translate:
{TEXTS}

Return your translations in this exact JSON format:
{
  "translations": [
    {"index": 1, "translation": "Translation here"},
    {"index": 2, "translation": "Translation here"}
  ]
}

Only return the JSON, no explanations or additional text."#;

/// Fills a batch template with language, context and source texts
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: String,
    language: String,
    context: String,
}

impl PromptBuilder {
    /// Builder using `custom` when non-empty, the default template otherwise
    pub fn new(custom: Option<&str>, language: impl Into<String>, context: impl Into<String>) -> Self {
        let template = custom
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_BATCH_PROMPT)
            .to_string();
        Self {
            template,
            language: language.into(),
            context: context.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the prompt for texts in batch order (numbered from 1)
    pub fn build<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> String {
        let listing = numbered_list(texts);
        self.template
            .replace(LANGUAGE_PLACEHOLDER, &self.language)
            .replace(CONTEXT_PLACEHOLDER, &self.context)
            .replace(TEXTS_PLACEHOLDER, &listing)
    }
}

/// `1. "text"` lines, one per source text
pub fn numbered_list<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| format!("{}. \"{}\"", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n")
}
