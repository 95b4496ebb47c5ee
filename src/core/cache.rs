//! Content-addressed translation cache

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::core::errors::{Result, TranslationError};
use crate::core::models::Entry;

/// Digest of source text used as the cache key (64 hex chars).
///
/// Only the text is hashed, so identical strings under different keys or files
/// share one cached translation.
pub fn cache_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Unbounded hash -> translation store. Never evicts.
#[derive(Debug, Default)]
pub struct ContentCache {
    entries: RwLock<HashMap<String, String>>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached translation for `text`, if any
    pub fn lookup(&self, text: &str) -> Option<String> {
        self.entries.read().get(&cache_key(text)).cloned()
    }

    /// Remember a translation. Empty translations are ignored.
    pub fn put(&self, text: &str, translation: &str) {
        if translation.is_empty() {
            return;
        }
        self.entries
            .write()
            .insert(cache_key(text), translation.to_string());
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        debug!("Translation cache cleared");
    }

    pub fn size(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Serialize the whole store as a flat JSON object
    pub fn persist(&self) -> Result<Vec<u8>> {
        let entries = self.entries.read();
        Ok(serde_json::to_vec_pretty(&*entries)?)
    }

    /// Replace the store with the contents of a blob produced by `persist`
    pub fn restore(&self, blob: &[u8]) -> Result<()> {
        let loaded: HashMap<String, String> = serde_json::from_slice(blob)?;
        *self.entries.write() = loaded;
        Ok(())
    }

    /// Build a cache from a blob
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        let cache = Self::new();
        cache.restore(blob)?;
        Ok(cache)
    }

    /// Load from a file; a missing file yields an empty cache
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let blob = std::fs::read(path).map_err(|e| TranslationError::FileError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let cache = Self::from_blob(&blob)?;
        info!("Cache loaded - {} entries", cache.size());
        Ok(cache)
    }

    /// Write the whole store to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let blob = self.persist()?;
        std::fs::write(path, blob).map_err(|e| TranslationError::FileError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!("Cache saved to {}", path.display());
        Ok(())
    }

    /// Fill untranslated entries from the store. Returns how many were filled.
    pub fn prefill(&self, entries: &mut [Entry]) -> usize {
        let store = self.entries.read();
        let mut filled = 0;
        for entry in entries.iter_mut().filter(|e| e.needs_translation()) {
            if let Some(hit) = store.get(&cache_key(&entry.source_text)) {
                entry.translation = hit.clone();
                filled += 1;
            }
        }
        if filled > 0 {
            debug!("Prefilled {} entries from cache", filled);
        }
        filled
    }
}
