use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ExtractError;
use crate::gemini::{Extraction, ImageExtractor, read_image};
use crate::record::ExtractionRecord;
use crate::response::parse_reply;

const CACHE_VERSION: u32 = 1;
const CACHE_FILE: &str = "responses.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheFile {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    image: String,
    text: String,
    fetched_at: u64,
}

/// Reuses earlier model replies for screenshots that have already been read.
///
/// Entries are keyed on the image bytes plus the model and prompt, so a new
/// prompt or model never hits an old reply. Only replies that parse into a
/// valid record are stored.
pub struct CachedExtractor {
    inner: Box<dyn ImageExtractor>,
    path: PathBuf,
    namespace: String,
    cache: CacheFile,
}

impl CachedExtractor {
    pub fn new(inner: Box<dyn ImageExtractor>, dir: &Path, model: &str, prompt: &str) -> Self {
        let path = dir.join(CACHE_FILE);
        let cache = load_cache_file(&path);
        Self {
            inner,
            path,
            namespace: format!("{model}\n{prompt}"),
            cache,
        }
    }

    pub fn len(&self) -> usize {
        self.cache.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.entries.is_empty()
    }

    fn key(&self, bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.namespace.as_bytes());
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    fn store(&mut self, key: String, image: &Path, text: &str) {
        self.cache.version = CACHE_VERSION;
        self.cache.entries.insert(
            key,
            CacheEntry {
                image: image.display().to_string(),
                text: text.to_string(),
                fetched_at: system_time_to_secs(SystemTime::now()).unwrap_or_default(),
            },
        );
        if let Err(err) = save_cache_file(&self.path, &self.cache) {
            log::warn!("response cache not saved: {err:#}");
        }
    }
}

impl ImageExtractor for CachedExtractor {
    fn extract(&mut self, image: &Path) -> Result<Extraction, ExtractError> {
        let bytes = read_image(image)?;
        let key = self.key(&bytes);
        if let Some(entry) = self.cache.entries.get(&key) {
            log::info!("{}: using cached response", image.display());
            return Ok(Extraction {
                text: entry.text.clone(),
                usage: None,
                cached: true,
            });
        }

        let extraction = self.inner.extract(image)?;
        let usable = parse_reply(&extraction.text)
            .ok()
            .is_some_and(|reply| ExtractionRecord::from_reply(&reply).is_ok());
        if usable {
            self.store(key, image, &extraction.text);
        }
        Ok(extraction)
    }
}

fn load_cache_file(path: &Path) -> CacheFile {
    let Ok(raw) = fs::read_to_string(path) else {
        return CacheFile::default();
    };
    let cache = serde_json::from_str::<CacheFile>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return CacheFile::default();
    }
    cache
}

fn save_cache_file(path: &Path, cache: &CacheFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(cache).context("serialize response cache")?;
    fs::write(&tmp, json).context("write response cache")?;
    fs::rename(&tmp, path).context("swap response cache")?;
    Ok(())
}

fn system_time_to_secs(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}
