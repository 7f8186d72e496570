use crate::config::RouteCacheConfig;
use crate::index::{RouteEntry, RouteIndex};
use anyhow::{bail, Context, Result};
use bincode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheFormat {
    #[default]
    Json,
    Bincode,
}

impl FromStr for CacheFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "bincode" | "bin" => Ok(Self::Bincode),
            other => bail!("unknown cache format '{other}' (expected json or bincode)"),
        }
    }
}

impl fmt::Display for CacheFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Bincode => f.write_str("bincode"),
        }
    }
}

/// The persisted route tree, nested exactly like the in-memory one.
#[derive(Debug, Serialize, Deserialize)]
pub struct RouteDocument {
    pub version: u32,
    pub saved_at: String,
    pub routes: Vec<RouteEntry>,
}

#[derive(Serialize)]
struct RouteDocumentRef<'a> {
    version: u32,
    saved_at: String,
    routes: &'a [RouteEntry],
}

pub fn encode(format: CacheFormat, index: &RouteIndex) -> Result<Vec<u8>> {
    let doc = RouteDocumentRef {
        version: FORMAT_VERSION,
        saved_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        routes: &index.routes,
    };
    let bytes = match format {
        CacheFormat::Json => serde_json::to_vec_pretty(&doc)?,
        CacheFormat::Bincode => bincode::serialize(&doc)?,
    };
    Ok(bytes)
}

pub fn decode(format: CacheFormat, bytes: &[u8]) -> Result<RouteDocument> {
    let doc: RouteDocument = match format {
        CacheFormat::Json => serde_json::from_slice(bytes)?,
        CacheFormat::Bincode => bincode::deserialize(bytes)?,
    };
    if doc.version != FORMAT_VERSION {
        bail!("unsupported route document version {} (expected {FORMAT_VERSION})", doc.version);
    }
    Ok(doc)
}

/// Location and format of the single route cache file.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
    format: CacheFormat,
}

impl CacheStore {
    pub fn new<P: AsRef<Path>>(path: P, format: CacheFormat) -> Self {
        Self { path: path.as_ref().to_path_buf(), format }
    }

    pub fn from_config(config: &RouteCacheConfig) -> Self { Self::new(&config.cache_file, config.format) }

    pub fn path(&self) -> &Path { &self.path }
    pub fn format(&self) -> CacheFormat { self.format }
    fn tmp_path(&self) -> PathBuf { self.path.with_extension("tmp") }

    /// `Ok(None)` when no file exists yet.
    pub fn load(&self) -> Result<Option<RouteIndex>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut f = File::open(&self.path).with_context(|| format!("opening {}", self.path.display()))?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;
        let doc = decode(self.format, &buf).with_context(|| format!("decoding {}", self.path.display()))?;
        Ok(Some(RouteIndex { routes: doc.routes }))
    }

    /// Write the whole tree to a sibling temp file, then rename it over the cache file.
    pub fn save(&self, index: &RouteIndex) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            create_dir_all(dir)?;
        }
        let bytes = encode(self.format, index)?;
        let tmp = self.tmp_path();
        let mut f = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(&bytes)?;
        f.sync_all()?;
        drop(f);

        #[cfg(target_os = "windows")]
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        fs::rename(&tmp, &self.path).with_context(|| format!("committing {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn nested() -> RouteIndex {
        let mut index = RouteIndex::new();
        index.insert("100", 100, false);
        index.insert("100/a", 1, false);
        index.insert("100/a/b", 2, false);
        index.insert("100/legacy/x", 3, false);
        index.insert("200", 200, false);
        index
    }

    #[test]
    fn round_trips_in_both_formats() {
        let dir = tempdir().unwrap();
        for format in [CacheFormat::Json, CacheFormat::Bincode] {
            let store = CacheStore::new(dir.path().join(format!("routes.{format}")), format);
            let index = nested();
            store.save(&index).unwrap();
            let loaded = store.load().unwrap().unwrap();
            assert_eq!(loaded, index);
        }
    }

    #[test]
    fn json_document_is_nested() {
        let bytes = encode(CacheFormat::Json, &nested()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["routes"][0]["key"], "100");
        assert_eq!(value["routes"][0]["children"][0]["key"], "100/a");
        assert_eq!(value["routes"][0]["children"][0]["children"][0]["content_id"], 2);
    }

    #[test]
    fn missing_file_is_none_and_garbage_is_an_error() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("nested/dir/routes.json"), CacheFormat::Json);
        assert!(store.load().unwrap().is_none());
        fs::create_dir_all(dir.path().join("nested/dir")).unwrap();
        fs::write(store.path(), b"<root><content id=").unwrap();
        assert!(store.load().is_err());
    }

    #[test]
    fn parses_format_names() {
        assert_eq!("JSON".parse::<CacheFormat>().unwrap(), CacheFormat::Json);
        assert_eq!("bincode".parse::<CacheFormat>().unwrap(), CacheFormat::Bincode);
        assert!("xml".parse::<CacheFormat>().is_err());
    }
}
