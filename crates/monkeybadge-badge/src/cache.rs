//! Key/value cache that survives reboots: the token, the badge uuid and the
//! last good state document.

use std::collections::BTreeMap;
use std::path::PathBuf;

pub const TOKEN_KEY: &str = "token";
pub const UUID_KEY: &str = "uuid";
pub const STATE_KEY: &str = "state";

#[derive(Debug)]
pub enum CacheError {
    Io(String),
    Encode(String),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cache io error: {e}"),
            Self::Encode(e) => write!(f, "cache encode error: {e}"),
        }
    }
}

impl std::error::Error for CacheError {}

pub trait LocalCache {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), CacheError>;
    fn remove(&mut self, key: &str) -> Result<(), CacheError>;
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: BTreeMap<String, String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileCache {
    /// Open the cache at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), "Discarding corrupt cache: {e}");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, entries }
    }

    fn flush(&self) -> Result<(), CacheError> {
        let data =
            serde_json::to_string_pretty(&self.entries).map_err(|e| CacheError::Encode(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, data).map_err(|e| CacheError::Io(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| CacheError::Io(e.to_string()))
    }
}

impl LocalCache for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), CacheError> {
        if self.entries.get(key) == Some(&value) {
            return Ok(());
        }
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), CacheError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_cache_get_set_remove() {
        let mut cache = MemoryCache::new();
        assert!(cache.get(TOKEN_KEY).is_none());
        cache.set(TOKEN_KEY, "abc".to_string()).unwrap();
        assert_eq!(cache.get(TOKEN_KEY).as_deref(), Some("abc"));
        cache.remove(TOKEN_KEY).unwrap();
        assert!(cache.get(TOKEN_KEY).is_none());
    }

    #[test]
    fn file_cache_persists() {
        let dir = std::env::temp_dir().join(format!("monkeybadge-cache-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cache.json");

        let mut cache = FileCache::open(&path);
        cache.set(UUID_KEY, "u-1".to_string()).unwrap();
        cache.set(STATE_KEY, "{}".to_string()).unwrap();
        drop(cache);

        let mut reopened = FileCache::open(&path);
        assert_eq!(reopened.get(UUID_KEY).as_deref(), Some("u-1"));
        reopened.remove(STATE_KEY).unwrap();
        assert!(FileCache::open(&path).get(STATE_KEY).is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = std::env::temp_dir().join(format!("monkeybadge-cache-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cache.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(FileCache::open(&path).get(TOKEN_KEY).is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
