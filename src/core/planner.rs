//! Greedy token-budget batch planning

use crate::core::models::Entry;

/// Rough estimate: one token per four characters
pub const CHARS_PER_TOKEN: usize = 4;

/// Tokens reserved for the prompt scaffolding of every batch
pub const BATCH_OVERHEAD_TOKENS: usize = 100;

/// Per-entry JSON structure overhead
pub const ENTRY_OVERHEAD_TOKENS: usize = 20;

/// Hard ceiling on entries per request
pub const MAX_BATCH_ENTRIES: usize = 20;

/// Share of the model context a batch may use
pub const BUDGET_RATIO: f64 = 0.7;

/// A group of entries sent in one request, by index into the entry list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub indices: Vec<usize>,
    pub estimated_tokens: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Estimated token count of a text
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Estimated cost of one entry inside a batch prompt
pub fn entry_tokens(text: &str) -> usize {
    estimate_tokens(text) + ENTRY_OVERHEAD_TOKENS
}

/// Token budget for a model with the given context size
pub fn batch_budget(token_limit: u32) -> usize {
    (token_limit as f64 * BUDGET_RATIO) as usize
}

/// Partition `entries` (restricted to `candidates`, in that order) into batches.
///
/// Entries with empty source text are skipped. A single entry larger than the
/// budget still gets a batch of its own.
pub fn plan(entries: &[Entry], candidates: &[usize], token_limit: u32) -> Vec<Batch> {
    let budget = batch_budget(token_limit);
    let mut batches = Vec::new();
    let mut current = Vec::new();
    let mut current_tokens = BATCH_OVERHEAD_TOKENS;

    for &index in candidates {
        let Some(entry) = entries.get(index) else {
            continue;
        };
        if entry.source_text.is_empty() {
            continue;
        }

        let cost = entry_tokens(&entry.source_text);

        if current_tokens + cost > budget && !current.is_empty() {
            batches.push(Batch {
                indices: std::mem::take(&mut current),
                estimated_tokens: current_tokens,
            });
            current_tokens = BATCH_OVERHEAD_TOKENS;
        }

        current.push(index);
        current_tokens += cost;

        if current.len() >= MAX_BATCH_ENTRIES {
            batches.push(Batch {
                indices: std::mem::take(&mut current),
                estimated_tokens: current_tokens,
            });
            current_tokens = BATCH_OVERHEAD_TOKENS;
        }
    }

    if !current.is_empty() {
        batches.push(Batch {
            indices: current,
            estimated_tokens: current_tokens,
        });
    }

    batches
}

/// Plan every entry of the list
pub fn plan_all(entries: &[Entry], token_limit: u32) -> Vec<Batch> {
    let all: Vec<usize> = (0..entries.len()).collect();
    plan(entries, &all, token_limit)
}
