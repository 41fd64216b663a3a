use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::format::ImageMetadata;
use crate::variant::VariantId;

/// A variant the dev server may be asked for.
#[derive(Debug, Clone)]
pub struct RegisteredImage {
    /// In-memory bytes, for variants that were never persisted.
    /// `None` means the bytes live in the cache directory.
    pub bytes: Option<Bytes>,

    /// Metadata of the variant
    pub metadata: ImageMetadata,
}

/// Process-wide map of routed variants, read by the dev middleware.
///
/// Every variant routed during the process lifetime is recorded here, hit or
/// miss, in every run mode. Entries are never removed and never persisted.
/// The map sits behind an async `RwLock`; each operation takes the lock once,
/// so an insert-or-replace is atomic with respect to concurrent readers.
#[derive(Debug, Default)]
pub struct DevRegistry {
    images: RwLock<HashMap<String, RegisteredImage>>,
}

impl DevRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) the entry for `id`.
    pub async fn register(&self, id: &VariantId, image: RegisteredImage) {
        self.images.write().await.insert(id.to_string(), image);
    }

    /// Look up an entry by the id taken from a URL.
    pub async fn get(&self, id: &str) -> Option<RegisteredImage> {
        self.images.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.images.read().await.contains_key(id)
    }

    /// All registered ids.
    pub async fn ids(&self) -> HashSet<String> {
        self.images.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.images.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.images.read().await.is_empty()
    }
}
