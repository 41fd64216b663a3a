//! Content-addressed disk cache for generated variants.
//!
//! One flat directory, one file per [`VariantId`], file name = the id, content
//! = the encoded image. There is no companion metadata file: on a hit the
//! metadata is recovered by decoding the cached bytes.
//!
//! # Validity
//!
//! A file is a hit only if it exists, is non-empty, can be read and decodes.
//! Anything else (missing, empty, truncated by a killed process, unreadable)
//! is a miss and the variant is regenerated.
//!
//! # Concurrent writers
//!
//! There is no per-id lock. Two requests missing on the same id both run the
//! (deterministic) transform and both write identical bytes. Each write goes
//! to a temporary file in the cache directory and is renamed onto the final
//! name, so a reader never observes a partially written entry.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::format::{verify, ImageMetadata};
use crate::variant::{VariantConfig, VariantId};

/// Default cache directory, relative to the project root.
pub const DEFAULT_CACHE_DIR: &str = "./node_modules/.cache/imagetools";

/// A variant recovered from disk.
#[derive(Debug, Clone)]
pub struct CachedVariant {
    /// Encoded image bytes, exactly as stored
    pub bytes: Bytes,

    /// Metadata decoded from the bytes, with the AVIF correction applied
    pub metadata: ImageMetadata,
}

/// Disk cache of generated variants.
#[derive(Debug)]
pub struct VariantCache {
    /// Cache directory
    dir: PathBuf,

    /// When false, nothing is read from or written to disk
    enabled: bool,

    /// Ids looked up or stored during this run
    touched: RwLock<HashSet<String>>,
}

impl VariantCache {
    /// Open a cache in `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::CreateDir` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::CreateDir {
            dir: dir.display().to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            dir,
            enabled: true,
            touched: RwLock::new(HashSet::new()),
        })
    }

    /// A cache that never persists anything.
    ///
    /// Every lookup misses and every store is a no-op, so variants only live
    /// in memory for the request that produced them.
    pub fn disabled(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            enabled: false,
            touched: RwLock::new(HashSet::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the entry for `id`.
    pub fn path_for(&self, id: &VariantId) -> PathBuf {
        self.dir.join(id.as_str())
    }

    /// Look up a variant.
    ///
    /// The id is recorded as touched whether or not it hits. Read and decode
    /// failures are logged and reported as a miss.
    pub async fn lookup(&self, id: &VariantId, config: &VariantConfig) -> Option<CachedVariant> {
        self.touch(id).await;

        if !self.enabled {
            return None;
        }

        let path = self.path_for(id);
        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(_) => return None,
        };
        if size == 0 {
            debug!(id = %id, "Ignoring empty cache entry");
            return None;
        }

        let bytes = match self.read(id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(id = %id, error = %e, "Cache read failed, regenerating");
                return None;
            }
        };

        let decoded = {
            let bytes = bytes.clone();
            tokio::task::spawn_blocking(move || verify(&bytes)).await
        };

        let mut metadata = match decoded {
            Ok(Ok(metadata)) => metadata,
            Ok(Err(e)) => {
                warn!(id = %id, error = %e, "Cache entry does not decode, regenerating");
                return None;
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Cache validation task failed");
                return None;
            }
        };

        correct_format(config.format(), &mut metadata);

        debug!(id = %id, format = %metadata.format, "Cache hit");
        Some(CachedVariant { bytes, metadata })
    }

    /// Persist the bytes for `id`.
    ///
    /// No-op when the cache is disabled.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Write` if the temporary file cannot be written or
    /// renamed into place.
    pub async fn store(&self, id: &VariantId, bytes: &Bytes) -> Result<(), CacheError> {
        self.touch(id).await;

        if !self.enabled {
            return Ok(());
        }

        let dir = self.dir.clone();
        let path = self.path_for(id);
        let bytes = bytes.clone();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| e.to_string())
        .and_then(|written| written.map_err(|e| e.to_string()))
        .map_err(|message| CacheError::Write {
            id: id.to_string(),
            message,
        })?;

        debug!(id = %id, "Stored variant");
        Ok(())
    }

    /// Read the raw bytes of an entry.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Read` if the file is missing or unreadable.
    pub async fn read(&self, id: &VariantId) -> Result<Bytes, CacheError> {
        tokio::fs::read(self.path_for(id))
            .await
            .map(Bytes::from)
            .map_err(|e| CacheError::Read {
                id: id.to_string(),
                message: e.to_string(),
            })
    }

    /// Record that `id` is in use by the current run.
    pub async fn touch(&self, id: &VariantId) {
        self.touched.write().await.insert(id.to_string());
    }

    /// Whether the file name `name` was touched this run.
    pub async fn is_touched(&self, name: &str) -> bool {
        self.touched.read().await.contains(name)
    }

    /// Snapshot of all ids touched this run.
    pub async fn touched(&self) -> HashSet<String> {
        self.touched.read().await.clone()
    }
}

/// Undo the HEIF re-tagging of AVIF files.
///
/// AVIF is stored in a HEIF container, so decoding a cached AVIF file reports
/// format `heif` with compression `av1`. When the variant was produced as
/// `avif`, report it as `avif` again; it determines content types and file
/// extensions downstream.
pub fn correct_format(requested: Option<&str>, metadata: &mut ImageMetadata) {
    if requested == Some("avif")
        && metadata.format == "heif"
        && metadata.compression.as_deref() == Some("av1")
    {
        metadata.format = "avif".to_string();
    }
}

// =============================================================================
// Tests
// =============================================================================
