use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::persist::CacheFormat;

pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 1000;

/// Settings consumed by the route cache. Every field has a default so a partial
/// JSON file (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteCacheConfig {
    /// Location of the persisted route document.
    pub cache_file: PathBuf,
    pub format: CacheFormat,
    /// Request paths start with an `xx-xx` culture segment that is not part of the key.
    pub culture_in_path: bool,
    /// With `culture_in_path`, a culture-shaped first segment naming no configured
    /// culture is a 404 instead of being stripped.
    pub culture_404: bool,
    /// Legacy matching: a stored key matches when it shares the root prefix and
    /// contains the requested segment.
    pub compatibility_match: bool,
    /// Bounded wait for the exclusive lock guarding every mutation.
    pub lock_timeout_ms: u64,
    /// Generated URLs drop their trailing slash. Keys never carry one either way.
    pub trim_trailing_slash: bool,
}

impl Default for RouteCacheConfig {
    fn default() -> Self {
        Self {
            cache_file: PathBuf::from("./data/routecache.json"),
            format: CacheFormat::Json,
            culture_in_path: false,
            culture_404: true,
            compatibility_match: false,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            trim_trailing_slash: false,
        }
    }
}

impl RouteCacheConfig {
    pub fn lock_timeout(&self) -> Duration { Duration::from_millis(self.lock_timeout_ms) }

    pub fn key_options(&self) -> crate::key::KeyOptions {
        crate::key::KeyOptions { culture_in_path: self.culture_in_path }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut f = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
        let mut buf = String::new();
        f.read_to_string(&mut buf)?;
        let config = serde_json::from_str(&buf).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}
