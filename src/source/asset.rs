use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::DecodeError;
use crate::format::{probe, ImageMetadata};
use crate::variant::content_digest;

/// A source image, loaded lazily.
///
/// Raw bytes, decoded metadata and the content digest are each computed on
/// first use and memoized for the lifetime of the asset, which is one load
/// request. A request without directives never touches the file.
#[derive(Debug)]
pub struct SourceAsset {
    path: PathBuf,
    bytes: OnceCell<Bytes>,
    metadata: OnceCell<ImageMetadata>,
    digest: OnceCell<String>,
}

impl SourceAsset {
    /// Create an asset that reads `path` from disk on first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            bytes: OnceCell::new(),
            metadata: OnceCell::new(),
            digest: OnceCell::new(),
        }
    }

    /// Create an asset whose bytes are already in memory.
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            bytes: OnceCell::new_with(Some(bytes.into())),
            metadata: OnceCell::new(),
            digest: OnceCell::new(),
        }
    }

    /// Path of the source image.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw encoded bytes of the source.
    pub async fn bytes(&self) -> Result<&Bytes, DecodeError> {
        self.bytes
            .get_or_try_init(|| async {
                debug!(path = %self.path.display(), "Loading source image");
                tokio::fs::read(&self.path)
                    .await
                    .map(Bytes::from)
                    .map_err(|e| DecodeError::Read {
                        path: self.path.display().to_string(),
                        message: e.to_string(),
                    })
            })
            .await
    }

    /// Intrinsic metadata of the source (dimensions, format).
    pub async fn metadata(&self) -> Result<&ImageMetadata, DecodeError> {
        self.metadata
            .get_or_try_init(|| async {
                let bytes = self.bytes().await?;
                probe(bytes)
            })
            .await
    }

    /// Lowercase hex digest of the raw bytes.
    pub async fn digest(&self) -> Result<&str, DecodeError> {
        let digest = self
            .digest
            .get_or_try_init(|| async {
                let bytes = self.bytes().await?;
                Ok::<_, DecodeError>(content_digest(bytes))
            })
            .await?;
        Ok(digest.as_str())
    }
}
