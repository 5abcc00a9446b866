use anyhow::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use super::FileSymbols;

const DEFAULT_MAX_MEMORY_ENTRIES: usize = 4096;
const CACHE_DIR_NAME: &str = "typegraph_cache";

/// Cached extraction result, valid while the file's timestamp and size are unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSymbols {
    pub symbols: FileSymbols,
    pub timestamp: u64,
    pub file_size: u64,
}

/// Thread-safe cache of extracted file symbols with best-effort disk storage.
pub struct SymbolCache {
    memory_cache: DashMap<PathBuf, CachedSymbols>,
    cache_dir: Option<PathBuf>,
    max_memory_entries: usize,
}

impl SymbolCache {
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self> {
        let resolved_dir = cache_dir.unwrap_or_else(|| std::env::temp_dir().join(CACHE_DIR_NAME));
        let cache_dir = match fs::create_dir_all(&resolved_dir) {
            Ok(()) => Some(resolved_dir),
            Err(err) => {
                tracing::warn!(
                    dir = %resolved_dir.display(),
                    "failed to initialize disk cache: {err}"
                );
                None
            }
        };

        Ok(Self {
            memory_cache: DashMap::with_capacity(DEFAULT_MAX_MEMORY_ENTRIES),
            cache_dir,
            max_memory_entries: DEFAULT_MAX_MEMORY_ENTRIES,
        })
    }

    /// A cache that never touches the filesystem.
    pub fn in_memory_only() -> Self {
        Self {
            memory_cache: DashMap::with_capacity(DEFAULT_MAX_MEMORY_ENTRIES),
            cache_dir: None,
            max_memory_entries: DEFAULT_MAX_MEMORY_ENTRIES,
        }
    }

    /// Returns the cached symbols for `file_path` if the file is unchanged.
    pub fn get(&self, file_path: &Path) -> Option<FileSymbols> {
        let (timestamp, file_size) = file_stamp(file_path).ok()?;

        if let Some(entry) = self.memory_cache.get(file_path) {
            if entry.timestamp == timestamp && entry.file_size == file_size {
                return Some(entry.symbols.clone());
            }
            return None;
        }

        let cache_path = self.cache_path(file_path)?;
        let entry = self.load_from_disk(&cache_path).ok()?;
        if entry.timestamp != timestamp
            || entry.file_size != file_size
            || entry.symbols.path != file_path
        {
            return None;
        }

        let symbols = entry.symbols.clone();
        if self.memory_cache.len() < self.max_memory_entries {
            self.memory_cache.insert(file_path.to_path_buf(), entry);
        }
        Some(symbols)
    }

    pub fn store(&self, file_path: &Path, symbols: &FileSymbols) -> Result<()> {
        let (timestamp, file_size) = file_stamp(file_path)?;
        let entry = CachedSymbols {
            symbols: symbols.clone(),
            timestamp,
            file_size,
        };

        if self.memory_cache.len() >= self.max_memory_entries {
            if let Some(evicted) = self.memory_cache.iter().next() {
                let key = evicted.key().clone();
                drop(evicted);
                self.memory_cache.remove(&key);
            }
        }

        if let Some(cache_path) = self.cache_path(file_path) {
            self.store_to_disk(&cache_path, &entry)?;
        }
        self.memory_cache.insert(file_path.to_path_buf(), entry);

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.memory_cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory_cache.is_empty()
    }

    fn cache_path(&self, file_path: &Path) -> Option<PathBuf> {
        let cache_dir = self.cache_dir.as_ref()?;

        let mut hasher = DefaultHasher::new();
        file_path.hash(&mut hasher);
        let hash = hasher.finish();

        Some(cache_dir.join(format!("symbols_{:x}.bincode", hash)))
    }

    fn load_from_disk(&self, cache_path: &Path) -> Result<CachedSymbols> {
        let data = fs::read(cache_path)?;
        let entry: CachedSymbols = bincode::deserialize(&data)?;
        Ok(entry)
    }

    fn store_to_disk(&self, cache_path: &Path, entry: &CachedSymbols) -> Result<()> {
        let data = bincode::serialize(entry)?;
        fs::write(cache_path, data)?;
        Ok(())
    }
}

fn file_stamp(file_path: &Path) -> Result<(u64, u64)> {
    let metadata = fs::metadata(file_path)?;
    let timestamp = metadata
        .modified()?
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    Ok((timestamp, metadata.len()))
}
