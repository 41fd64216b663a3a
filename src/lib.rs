//! # imagetools
//!
//! Image-variant generation and caching for bundler image imports.
//!
//! An import such as `photo.jpg?w=400;800&format=webp` names a source image
//! and a set of transformation directives. This library expands the
//! directives into concrete variants, generates each one at most once per
//! source content (caching the result on disk under a content-addressed id),
//! and exposes the variants to the importing module as inline data, dev-server
//! URLs or emitted build assets.
//!
//! ## Features
//!
//! - **Content-addressed cache**: variant ids hash the configuration together
//!   with the source bytes, so edits to a source invalidate its variants
//! - **Upscale clamping**: requested sizes never exceed the source unless
//!   `allowUpscale=true`
//! - **Three delivery modes**: inline data URIs, dev-server URLs, emitted assets
//! - **Stale-cache sweep**: unused cache files older than a retention period
//!   are deleted at the end of a successful build
//! - **Dev server**: axum middleware serving registered variants
//!
//! ## Architecture
//!
//! - [`source`] - Module ids, request filtering, lazily loaded source images
//! - [`directives`] - Directive parsing, defaults and dimension clamping
//! - [`variant`] - Variant configurations, ids, expansion and transformation
//! - [`cache`] - On-disk variant cache and the stale-entry reaper
//! - [`delivery`] - Routing, dev registry, asset emission, output formats
//! - [`mod@format`] - Image format detection and metadata
//! - [`plugin`] - The [`ImageTools`] pipeline tying it all together
//! - [`server`] - Axum-based dev server
//! - [`config`] - Library configuration and CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use imagetools::{ImageTools, PluginConfig, RunMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PluginConfig::default()
//!         .with_mode(RunMode::Serve)
//!         .with_root("./site");
//!     let tools = ImageTools::new(config)?;
//!
//!     if let Some(code) = tools.load("images/photo.jpg?w=400;800&format=webp").await? {
//!         println!("{code}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod delivery;
pub mod directives;
pub mod error;
pub mod format;
pub mod plugin;
pub mod server;
pub mod source;
pub mod variant;

// Re-export commonly used types
pub use cache::{CacheReaper, CachedVariant, ReapReport, VariantCache};
pub use config::{BuildConfig, CacheConfig, Cli, Command, PluginConfig, RunMode, ServeConfig};
pub use delivery::{
    AssetEmitter, DeliveryRouter, DevRegistry, FsEmitter, OutputFormat, OutputFormats,
    RoutedVariant,
};
pub use directives::{DefaultDirectives, DirectiveProvider, DirectiveResolver, DirectiveSet};
pub use error::{
    CacheError, ConfigError, DecodeError, EmitError, LoadError, ReapError, ServeError, SetupError,
    TransformError,
};
pub use format::ImageMetadata;
pub use plugin::{ImageTools, LoadedModule};
pub use server::{create_router, AppState, RouterConfig};
pub use source::{ImageRequest, RequestFilter, SourceAsset};
pub use variant::{
    CartesianExpander, ConfigExpander, ImageTransformer, TransformExecutor, TransformOutput,
    VariantConfig, VariantId,
};
