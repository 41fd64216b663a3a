//! Build-mode asset emission.
//!
//! In build mode each variant is handed to the host's asset pipeline, which
//! returns a reference handle. The module text refers to the asset through a
//! placeholder token that the host later replaces with the final public URL.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::EmitError;
use crate::variant::content_digest;

/// Prefix of an asset reference token.
pub const ASSET_TOKEN_PREFIX: &str = "__VITE_ASSET__";

/// Suffix of an asset reference token.
pub const ASSET_TOKEN_SUFFIX: &str = "__";

/// The placeholder a module uses to refer to an emitted asset.
pub fn asset_token(handle: &str) -> String {
    format!("{ASSET_TOKEN_PREFIX}{handle}{ASSET_TOKEN_SUFFIX}")
}

/// Host asset pipeline.
#[async_trait]
pub trait AssetEmitter: Send + Sync {
    /// Emit `source` under the suggested `name` and return a reference handle.
    ///
    /// Handles must not contain `_`, so that tokens can be found in text.
    async fn emit_file(&self, name: &str, source: Bytes) -> Result<String, EmitError>;
}

/// Writes emitted assets into an output directory.
///
/// Files are named `<dir>/<stem>-<hash>.<ext>` after the suggested name, with
/// an 8-character content hash so that different variants of one source never
/// collide. Emitting identical content under the same name twice yields the
/// same handle and writes once.
#[derive(Debug)]
pub struct FsEmitter {
    out_dir: PathBuf,

    /// Handle -> file name relative to `out_dir`
    emitted: RwLock<HashMap<String, String>>,
}

impl FsEmitter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            emitted: RwLock::new(HashMap::new()),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// File name (relative to the output directory) for `handle`.
    pub async fn file_name(&self, handle: &str) -> Option<String> {
        self.emitted.read().await.get(handle).cloned()
    }

    /// All emitted file names, sorted.
    pub async fn files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.emitted.read().await.values().cloned().collect();
        files.sort();
        files
    }

    /// Replace every asset token in `code` with `public_base` + file name.
    ///
    /// Tokens with an unknown handle are left untouched.
    pub async fn resolve_tokens(&self, code: &str, public_base: &str) -> String {
        let emitted = self.emitted.read().await;
        let mut out = String::with_capacity(code.len());
        let mut rest = code;

        while let Some(start) = rest.find(ASSET_TOKEN_PREFIX) {
            out.push_str(&rest[..start]);
            let after = &rest[start + ASSET_TOKEN_PREFIX.len()..];

            let resolved = after.find(ASSET_TOKEN_SUFFIX).and_then(|end| {
                emitted
                    .get(&after[..end])
                    .map(|file| (end, format!("{public_base}{file}")))
            });

            match resolved {
                Some((end, url)) => {
                    out.push_str(&url);
                    rest = &after[end + ASSET_TOKEN_SUFFIX.len()..];
                }
                None => {
                    out.push_str(ASSET_TOKEN_PREFIX);
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }
}

/// Split `name` into its directory, stem and extension.
fn split_name(name: &str) -> (&str, &str, Option<&str>) {
    let (dir, file) = match name.rsplit_once('/') {
        Some((dir, file)) => (dir, file),
        None => ("", name),
    };
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (dir, stem, Some(ext)),
        _ => (dir, file, None),
    }
}

#[async_trait]
impl AssetEmitter for FsEmitter {
    async fn emit_file(&self, name: &str, source: Bytes) -> Result<String, EmitError> {
        let emit_err = |message: String| EmitError::Emit {
            name: name.to_string(),
            message,
        };

        let digest = content_digest(&source);
        let hash = &digest[..8];
        let handle = content_digest(format!("{name}\0{digest}").as_bytes())[..8].to_string();

        if self.emitted.read().await.contains_key(&handle) {
            return Ok(handle);
        }

        let (dir, stem, ext) = split_name(name.trim_start_matches('/'));
        let mut file_name = String::new();
        if !dir.is_empty() {
            file_name.push_str(dir);
            file_name.push('/');
        }
        file_name.push_str(&format!("{stem}-{hash}"));
        if let Some(ext) = ext {
            file_name.push('.');
            file_name.push_str(ext);
        }

        let path = self.out_dir.join(&file_name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| emit_err(e.to_string()))?;
        }
        tokio::fs::write(&path, &source)
            .await
            .map_err(|e| emit_err(e.to_string()))?;

        debug!(name = %name, file = %file_name, handle = %handle, "Emitted asset");
        self.emitted.write().await.insert(handle.clone(), file_name);

        Ok(handle)
    }
}
