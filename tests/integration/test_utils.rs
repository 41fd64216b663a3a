//! Test utilities for integration tests.
//!
//! This module provides a temporary project layout, generated source images,
//! and mock implementations of the transformer and asset emitter seams.

use async_trait::async_trait;
use bytes::Bytes;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::RwLock;

use imagetools::error::{EmitError, TransformError};
use imagetools::{
    AssetEmitter, ImageTools, ImageTransformer, PluginConfig, RunMode, SourceAsset,
    TransformExecutor, TransformOutput, VariantConfig,
};

// =============================================================================
// Generated Images
// =============================================================================

/// Encode a gradient RGB image in `format`.
pub fn image_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    image_bytes(width, height, ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    image_bytes(width, height, ImageFormat::Jpeg)
}

/// Width of an encoded image.
pub fn decoded_width(bytes: &[u8]) -> u32 {
    image::load_from_memory(bytes).unwrap().width()
}

// =============================================================================
// Temporary Project
// =============================================================================

/// A project root with its own cache directory, deleted on drop.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    /// Write a source image relative to the root.
    pub fn write(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, bytes).unwrap();
        path
    }

    /// Default configuration rooted at this project.
    pub fn config(&self, mode: RunMode) -> PluginConfig {
        PluginConfig::default()
            .with_mode(mode)
            .with_root(self.root())
            .with_cache_dir(self.cache_dir())
    }

    /// Files currently in the cache directory.
    pub fn cache_files(&self) -> Vec<String> {
        let mut files: Vec<String> = match std::fs::read_dir(self.cache_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        files.sort();
        files
    }
}

/// Pipeline with a counting transformer and an in-memory emitter.
pub fn tools_with_mocks(
    config: PluginConfig,
) -> (ImageTools, Arc<CountingTransformer>, Arc<MemoryEmitter>) {
    let transformer = Arc::new(CountingTransformer::new());
    let emitter = Arc::new(MemoryEmitter::new());
    let tools = ImageTools::new(config)
        .unwrap()
        .with_transformer(transformer.clone())
        .with_emitter(emitter.clone());
    (tools, transformer, emitter)
}

// =============================================================================
// Counting Transformer
// =============================================================================

/// Wraps the built-in transformer and counts executions.
pub struct CountingTransformer {
    inner: ImageTransformer,
    calls: AtomicUsize,
}

impl CountingTransformer {
    pub fn new() -> Self {
        Self {
            inner: ImageTransformer::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransformExecutor for CountingTransformer {
    async fn execute(
        &self,
        config: &VariantConfig,
        source: &SourceAsset,
        remove_metadata: bool,
    ) -> Result<TransformOutput, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(config, source, remove_metadata).await
    }
}

// =============================================================================
// Memory Emitter
// =============================================================================

/// Records emitted assets instead of writing them.
pub struct MemoryEmitter {
    files: RwLock<Vec<(String, Bytes)>>,
}

impl MemoryEmitter {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(Vec::new()),
        }
    }

    /// Suggested names, in emission order.
    pub async fn names(&self) -> Vec<String> {
        self.files
            .read()
            .await
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub async fn bytes(&self, index: usize) -> Bytes {
        self.files.read().await[index].1.clone()
    }
}

#[async_trait]
impl AssetEmitter for MemoryEmitter {
    async fn emit_file(&self, name: &str, source: Bytes) -> Result<String, EmitError> {
        let mut files = self.files.write().await;
        files.push((name.to_string(), source));
        Ok(format!("h{}", files.len() - 1))
    }
}
