//! File-backed blob store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use super::codec::{decode_json, gunzip, gzip};

/// Suffix shared by every cache file.
const BLOB_SUFFIX: &str = ".js.gz";

/// Logical cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A grid window, keyed by its start in epoch milliseconds.
    GridWindow(i64),
    /// Overview details, keyed by program ID.
    Overview(String),
}

impl CacheKey {
    /// File name of the blob: `{ms}.js.gz` or `O{program_id}.js.gz`.
    #[must_use]
    pub fn file_name(&self) -> String {
        match self {
            Self::GridWindow(start_ms) => format!("{start_ms}{BLOB_SUFFIX}"),
            Self::Overview(program_id) => format!("O{program_id}{BLOB_SUFFIX}"),
        }
    }
}

/// Permanent gzip JSON blob store rooted at one directory.
///
/// There is no expiry: an existing blob is always served as-is.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Opens (or creates) the cache directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create cache directory {}", root.display()))?;
        tracing::debug!(root = %root.display(), "Cache opened");
        Ok(Self { root })
    }

    /// Path of the blob for `key`.
    #[must_use]
    pub fn path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Returns `true` when a blob exists for `key`.
    #[must_use]
    pub fn exists(&self, key: &CacheKey) -> bool {
        self.path(key).is_file()
    }

    /// Compresses and stores raw text under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if compression or the file write fails.
    pub fn write(&self, key: &CacheKey, text: &str) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let compressed = gzip(text.as_bytes())?;
        std::fs::write(&path, &compressed)
            .with_context(|| format!("failed to write cache file {}", path.display()))?;
        tracing::trace!(path = %path.display(), bytes = compressed.len(), "Cache write");
        Ok(())
    }

    /// Reads and decompresses the text stored under `key`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected. Returns `None`
    /// when no blob exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid gzip.
    pub fn read_text(&self, key: &CacheKey) -> Result<Option<String>> {
        let path = self.path(key);
        if !path.is_file() {
            return Ok(None);
        }
        let compressed = std::fs::read(&path)
            .with_context(|| format!("failed to read cache file {}", path.display()))?;
        let raw = gunzip(&compressed)
            .with_context(|| format!("corrupt cache file {}", path.display()))?;
        Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
    }

    /// Reads and decodes the JSON stored under `key`.
    ///
    /// Returns `None` when no blob exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob is unreadable or its JSON is malformed
    /// even after the lenient retry.
    pub fn read_json<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>> {
        let Some(text) = self.read_text(key)? else {
            return Ok(None);
        };
        let value = decode_json(&text)
            .with_context(|| format!("undecodable cache file {}", self.path(key).display()))?;
        Ok(Some(value))
    }
}
