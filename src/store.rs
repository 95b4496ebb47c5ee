//! JSON files for entry lists and the translation cache

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::cache::ContentCache;
use crate::core::errors::{Result, TranslationError};
use crate::core::models::Entry;
use crate::core::runner::RunPersistence;

fn file_error(path: &Path, e: impl ToString) -> TranslationError {
    TranslationError::FileError {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Read a JSON array of entries
pub fn load_entries<P: AsRef<Path>>(path: P) -> Result<Vec<Entry>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| file_error(path, e))?;
    let entries: Vec<Entry> = serde_json::from_str(&content)?;
    debug!("Loaded {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Write entries as a pretty JSON array
pub fn save_entries<P: AsRef<Path>>(path: P, entries: &[Entry]) -> Result<()> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, content).map_err(|e| file_error(path, e))?;
    Ok(())
}

/// `menu.json` -> `menu_translated.json`
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "entries".to_string());
    let mut out = input.to_path_buf();
    out.set_file_name(format!("{}_translated.json", stem));
    out
}

/// Saves the cache blob and the entry list to fixed paths
#[derive(Debug, Clone)]
pub struct FileStore {
    cache_path: PathBuf,
    output_path: PathBuf,
}

impl FileStore {
    pub fn new(cache_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
            output_path: output_path.into(),
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

impl RunPersistence for FileStore {
    fn save(&self, cache: &ContentCache, entries: &[Entry]) -> Result<()> {
        cache.save(&self.cache_path)?;
        save_entries(&self.output_path, entries)?;
        info!(
            "Saved {} entries to {} and {} cache entries to {}",
            entries.len(),
            self.output_path.display(),
            cache.size(),
            self.cache_path.display()
        );
        Ok(())
    }
}
