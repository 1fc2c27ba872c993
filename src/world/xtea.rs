use lru::LruCache;
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

pub const EMPTY_KEY: XteaKey = XteaKey { key: [0; 4] };

/// Key quadruplet the client needs to decrypt one region's map files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct XteaKey {
    pub key: [i32; 4],
}

impl XteaKey {
    pub fn new(key: [i32; 4]) -> Self {
        Self { key }
    }

    pub fn is_zero(&self) -> bool {
        self.key.iter().all(|&value| value == 0)
    }
}

#[derive(Debug, Deserialize)]
struct KeyEntry {
    region: i32,
    key: [i32; 4],
}

#[derive(Debug, Clone, Default)]
pub struct KeyCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
}

/// Region id to key lookup. Keys come from a YAML list loaded up front and,
/// for everything else, from `<region>.txt` files (four integers, one per
/// line) read on demand through an LRU cache.
pub struct XteaKeyStore {
    fixed: HashMap<i32, XteaKey>,
    cache: LruCache<i32, XteaKey>,
    key_dir: Option<PathBuf>,
    stats: KeyCacheStats,
}

impl std::fmt::Debug for XteaKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XteaKeyStore")
            .field("fixed", &self.fixed.len())
            .field("cached", &self.cache.len())
            .field("key_dir", &self.key_dir)
            .finish()
    }
}

impl Default for XteaKeyStore {
    fn default() -> Self {
        Self::new(64, None)
    }
}

impl XteaKeyStore {
    pub fn new(capacity: usize, key_dir: Option<PathBuf>) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            fixed: HashMap::new(),
            cache: LruCache::new(capacity),
            key_dir,
            stats: KeyCacheStats::default(),
        }
    }

    pub fn load_yaml(&mut self, path: &Path) -> Result<usize, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| format!("failed to read xtea keys {}: {}", path.display(), err))?;
        self.parse_yaml(&content)
            .map_err(|err| format!("xtea keys {}: {}", path.display(), err))
    }

    pub fn parse_yaml(&mut self, content: &str) -> Result<usize, String> {
        let entries: Vec<KeyEntry> =
            serde_yaml::from_str(content).map_err(|err| format!("invalid yaml: {}", err))?;
        let count = entries.len();
        for entry in entries {
            self.fixed.insert(entry.region, XteaKey::new(entry.key));
        }
        Ok(count)
    }

    pub fn insert(&mut self, region: i32, key: XteaKey) {
        self.fixed.insert(region, key);
    }

    /// Missing keys are not an error: unencrypted regions use the zero key.
    pub fn get(&mut self, region: i32) -> XteaKey {
        if let Some(key) = self.fixed.get(&region) {
            return *key;
        }
        if let Some(key) = self.cache.get(&region) {
            self.stats.hits += 1;
            return *key;
        }
        self.stats.misses += 1;
        let key = match self.load_key_file(region) {
            Ok(Some(key)) => key,
            Ok(None) => EMPTY_KEY,
            Err(err) => {
                crate::telemetry::logging::log_error(&err);
                EMPTY_KEY
            }
        };
        self.stats.loads += 1;
        self.cache.put(region, key);
        key
    }

    fn load_key_file(&self, region: i32) -> Result<Option<XteaKey>, String> {
        let Some(dir) = self.key_dir.as_ref() else {
            return Ok(None);
        };
        let path = dir.join(format!("{}.txt", region));
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
        let mut key = [0i32; 4];
        let mut lines = content.lines().map(str::trim).filter(|line| !line.is_empty());
        for (idx, slot) in key.iter_mut().enumerate() {
            let line = lines
                .next()
                .ok_or_else(|| format!("{} missing key part {}", path.display(), idx))?;
            *slot = line
                .parse::<i32>()
                .map_err(|_| format!("{} invalid key part {}: {}", path.display(), idx, line))?;
        }
        Ok(Some(XteaKey::new(key)))
    }

    pub fn stats(&self) -> &KeyCacheStats {
        &self.stats
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
