//! The image pipeline.
//!
//! [`ImageTools`] wires the components together and exposes the two hooks a
//! bundler host calls: [`ImageTools::load`] for every module id, and
//! [`ImageTools::build_end`] once after all loads of a build.
//!
//! ```text
//! load("photo.jpg?w=400;800&format=webp")
//!   │
//!   ├─ RequestFilter        not an image ─────────────▶ Ok(None)
//!   ├─ DirectiveResolver    no directives ────────────▶ Ok(None)
//!   ├─ ConfigExpander       [w=400, w=800]
//!   │
//!   ├─ for each config:
//!   │     VariantCache::lookup ── hit ──┐
//!   │        │ miss                     │
//!   │        ▼                          │
//!   │     TransformExecutor             │
//!   │     VariantCache::store           │
//!   │        │                          │
//!   │        ▼                          ▼
//!   │     DeliveryRouter::route (inline / dev URL / emitted asset)
//!   │
//!   └─ OutputFormats + to_es_module ──────────────────▶ Ok(Some(code))
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheReaper, ReapReport, VariantCache};
use crate::config::{PluginConfig, RunMode};
use crate::delivery::{
    to_es_module, AssetEmitter, DeliveryRouter, DevRegistry, OutputFormats, RoutedVariant,
};
use crate::directives::{DirectiveResolver, AS, INLINE};
use crate::error::{LoadError, ServeError, SetupError};
use crate::format::ImageMetadata;
use crate::source::{ImageRequest, RequestFilter, SourceAsset};
use crate::variant::{
    CartesianExpander, ConfigExpander, ImageTransformer, TransformExecutor, VariantConfig,
    VariantId,
};

/// Everything produced for one image request.
#[derive(Debug, Clone)]
pub struct LoadedModule {
    /// One id per variant, in expansion order
    pub ids: Vec<VariantId>,

    /// Routed metadata, `src` set, in expansion order
    pub images: Vec<ImageMetadata>,

    /// The value chosen by the `as` directive
    pub value: Value,

    /// ES module text exporting `value`
    pub code: String,
}

/// Image-variant pipeline.
pub struct ImageTools {
    config: PluginConfig,
    filter: RequestFilter,
    resolver: DirectiveResolver,
    expander: Arc<dyn ConfigExpander>,
    transformer: Arc<dyn TransformExecutor>,
    output_formats: OutputFormats,
    cache: Arc<VariantCache>,
    registry: Arc<DevRegistry>,
    router: DeliveryRouter,
}

impl std::fmt::Debug for ImageTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageTools")
            .field("config", &self.config)
            .field("output_formats", &self.output_formats)
            .field("cache", &self.cache)
            .field("router", &self.router)
            .finish()
    }
}

impl ImageTools {
    /// Create the pipeline with the built-in expander and transformer.
    ///
    /// # Errors
    ///
    /// - `SetupError::InvalidConfig` if the configuration does not validate
    /// - `SetupError::Cache` if the cache directory cannot be created
    pub fn new(config: PluginConfig) -> Result<Self, SetupError> {
        config.validate().map_err(SetupError::InvalidConfig)?;

        let cache = if config.cache.enabled {
            VariantCache::open(&config.cache.dir)?
        } else {
            VariantCache::disabled(&config.cache.dir)
        };

        let registry = Arc::new(DevRegistry::new());
        let mut router = DeliveryRouter::new(config.mode, config.base_path(), registry.clone())
            .with_root(&config.root);
        if let Some(origin) = &config.origin {
            router = router.with_origin(origin.clone());
        }

        info!(
            mode = ?config.mode,
            cache_enabled = cache.is_enabled(),
            cache_dir = %cache.dir().display(),
            retention_secs = ?config.cache.retention,
            "Image pipeline ready"
        );

        Ok(Self {
            filter: RequestFilter::new(&config.include, &config.exclude),
            resolver: DirectiveResolver::new(config.default_directives.clone()),
            expander: Arc::new(CartesianExpander),
            transformer: Arc::new(ImageTransformer::new()),
            output_formats: OutputFormats::builtin(),
            cache: Arc::new(cache),
            registry,
            router,
            config,
        })
    }

    /// Replace the configuration expander.
    pub fn with_expander(mut self, expander: Arc<dyn ConfigExpander>) -> Self {
        self.expander = expander;
        self
    }

    /// Replace the transform executor.
    pub fn with_transformer(mut self, transformer: Arc<dyn TransformExecutor>) -> Self {
        self.transformer = transformer;
        self
    }

    /// Replace the output-format table.
    pub fn with_output_formats(mut self, formats: OutputFormats) -> Self {
        self.output_formats = formats;
        self
    }

    /// Set the build-mode asset emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn AssetEmitter>) -> Self {
        self.router = self.router.with_emitter(emitter);
        self
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<VariantCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<DevRegistry> {
        &self.registry
    }

    /// The dev route prefix, `<base>/@imagetools/`.
    pub fn base_path(&self) -> &str {
        self.router.base_path()
    }

    /// Load hook: return module text for an image id, or `None` for ids the
    /// pipeline does not handle.
    pub async fn load(&self, id: &str) -> Result<Option<String>, LoadError> {
        Ok(self.load_module(id).await?.map(|module| module.code))
    }

    /// Like [`load`](Self::load), but returns everything produced.
    pub async fn load_module(&self, id: &str) -> Result<Option<LoadedModule>, LoadError> {
        let request = ImageRequest::parse(id);
        if !self.filter.matches(&request, &self.config.root) {
            return Ok(None);
        }

        let source = SourceAsset::new(self.source_path(request.path()));
        let Some(directives) = self.resolver.resolve(&request, &source).await? else {
            return Ok(None);
        };

        let configs = self.expander.expand(&directives, &self.output_formats)?;
        let digest = source.digest().await?.to_string();
        let inline = directives.contains(INLINE);

        debug!(id = %id, variants = configs.len(), "Loading image");

        let mut ids = Vec::with_capacity(configs.len());
        let mut images = Vec::with_capacity(configs.len());
        for config in &configs {
            let variant = self.produce(config, &source, &digest).await?;
            ids.push(variant.id.clone());
            images.push(self.router.route(source.path(), inline, variant).await?);
        }

        let value = self.output_formats.serialize(directives.get(AS), &images)?;
        let code = to_es_module(&value, self.config.named_exports, self.config.compact);

        Ok(Some(LoadedModule {
            ids,
            images,
            value,
            code,
        }))
    }

    /// Cache lookup, and on a miss transform and store.
    ///
    /// A failed store does not fail the request: the variant is kept in
    /// memory and served from the registry instead.
    async fn produce(
        &self,
        config: &VariantConfig,
        source: &SourceAsset,
        digest: &str,
    ) -> Result<RoutedVariant, LoadError> {
        let id = VariantId::derive(config, digest);

        if let Some(hit) = self.cache.lookup(&id, config).await {
            return Ok(RoutedVariant {
                id,
                bytes: hit.bytes,
                metadata: hit.metadata.with_directives(config.iter()),
                persisted: true,
            });
        }

        debug!(id = %id, config = %config.canonical(), "Cache miss, transforming");
        let output = self
            .transformer
            .execute(config, source, self.config.remove_metadata)
            .await?;

        let persisted = if self.cache.is_enabled() {
            match self.cache.store(&id, &output.bytes).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(id = %id, error = %e, "Keeping variant in memory");
                    false
                }
            }
        } else {
            false
        };

        Ok(RoutedVariant {
            id,
            bytes: output.bytes,
            metadata: output.metadata.with_directives(config.iter()),
            persisted,
        })
    }

    fn source_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.root.join(path)
        }
    }

    /// Bytes and metadata of a registered variant, for the dev server.
    ///
    /// # Errors
    ///
    /// - `ServeError::UnknownImage` if `id` was never registered
    /// - `ServeError::Cache` if a disk-only entry cannot be read
    pub async fn serve(&self, id: &str) -> Result<(Bytes, ImageMetadata), ServeError> {
        let unknown = || ServeError::UnknownImage { id: id.to_string() };

        let entry = self.registry.get(id).await.ok_or_else(unknown)?;
        let bytes = match entry.bytes {
            Some(bytes) => bytes,
            None => {
                let variant_id = VariantId::parse(id).ok_or_else(unknown)?;
                self.cache.read(&variant_id).await?
            }
        };

        Ok((bytes, entry.metadata))
    }

    /// Build-end hook: sweep stale cache entries.
    ///
    /// Runs only after a successful build, with the cache enabled and a
    /// retention configured, and never in serve mode. Every variant routed in
    /// this process is protected from deletion. Returns the sweep report, or
    /// `None` if the sweep did not run or could not list the directory.
    pub async fn build_end(&self, failed: bool) -> Option<ReapReport> {
        let retention = self.config.cache.retention?;
        if failed || !self.cache.is_enabled() || self.config.mode == RunMode::Serve {
            debug!(failed, mode = ?self.config.mode, "Skipping cache sweep");
            return None;
        }

        let protected = self.registry.ids().await;
        let reaper = CacheReaper::new(Duration::from_secs(retention));
        match reaper.reap(&self.cache, &protected).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Cache sweep failed");
                None
            }
        }
    }
}
