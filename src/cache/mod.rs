//! On-disk variant cache.
//!
//! # Components
//!
//! - [`VariantCache`]: content-addressed store with lookup, atomic store and
//!   per-run touch tracking
//! - [`CacheReaper`]: end-of-build sweep of stale, unused entries
//! - [`correct_format`]: the AVIF/HEIF tagging fix applied on every hit
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use imagetools::cache::VariantCache;
//! use imagetools::variant::{content_digest, VariantConfig, VariantId};
//!
//! #[tokio::main]
//! async fn main() {
//!     let dir = tempfile::tempdir().unwrap();
//!     let cache = VariantCache::open(dir.path()).unwrap();
//!
//!     let config = VariantConfig::new().with("w", "400").with("format", "webp");
//!     let id = VariantId::derive(&config, &content_digest(b"source image bytes"));
//!
//!     if cache.lookup(&id, &config).await.is_none() {
//!         // Cache miss: transform, then persist the result
//!         cache.store(&id, &Bytes::from_static(b"...")).await.unwrap();
//!     }
//! }
//! ```

mod reaper;
mod store;

pub use reaper::{CacheReaper, ReapReport};
pub use store::{correct_format, CachedVariant, VariantCache, DEFAULT_CACHE_DIR};
