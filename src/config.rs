//! Configuration for the image pipeline and the `imagetools` binary.
//!
//! Two layers:
//! - [`PluginConfig`]: the library configuration consumed by
//!   [`ImageTools`](crate::ImageTools), resolved once with documented defaults
//! - [`Cli`]: command-line arguments (with `IMAGETOOLS_` environment
//!   variables) for the `serve` and `build` subcommands, converted into a
//!   `PluginConfig`
//!
//! # Example
//!
//! ```
//! use imagetools::config::{PluginConfig, RunMode};
//!
//! let config = PluginConfig::default()
//!     .with_mode(RunMode::Serve)
//!     .with_cache_retention(Some(86_400))
//!     .with_base("/app/");
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.base_path(), "/app/@imagetools/");
//! ```
//!
//! # Environment Variables
//!
//! - `IMAGETOOLS_ROOT` - Project root (default: .)
//! - `IMAGETOOLS_CACHE_DIR` - Cache directory (default: ./node_modules/.cache/imagetools)
//! - `IMAGETOOLS_CACHE_RETENTION` - Seconds an unused cache file is kept (default: unset, never swept)
//! - `IMAGETOOLS_DEFAULT_DIRECTIVES` - Query string applied to every request
//! - `IMAGETOOLS_BASE` - Public base path (default: /)
//! - `IMAGETOOLS_HOST` / `IMAGETOOLS_PORT` - Dev server bind address (default: 127.0.0.1:5173)
//! - `IMAGETOOLS_ORIGIN` - Origin prefixed to dev URLs
//! - `IMAGETOOLS_OUT_DIR` - Build output directory (default: dist)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::cache::DEFAULT_CACHE_DIR;
use crate::delivery::base_path;
use crate::directives::{DefaultDirectives, DirectiveSet};
use crate::source::{DEFAULT_EXCLUDE, DEFAULT_INCLUDE};

// =============================================================================
// Default Values
// =============================================================================

/// Default dev server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default dev server port.
pub const DEFAULT_PORT: u16 = 5173;

/// Default build output directory.
pub const DEFAULT_OUT_DIR: &str = "dist";

// =============================================================================
// Plugin Configuration
// =============================================================================

/// Whether the host is running a dev server or a production build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Dev server: variants are served from memory or the cache directory
    Serve,

    /// Production build: variants are emitted as assets
    #[default]
    Build,
}

/// Disk cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Persist generated variants to disk
    pub enabled: bool,

    /// Cache directory
    pub dir: PathBuf,

    /// Seconds an unused file is kept after its last write.
    /// `None` disables the end-of-build sweep.
    pub retention: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(DEFAULT_CACHE_DIR),
            retention: None,
        }
    }
}

/// Configuration of the image pipeline.
#[derive(Debug, Clone)]
pub struct PluginConfig {
    pub cache: CacheConfig,

    /// Ask the transformer to strip metadata. When unset, the ICC profile
    /// survives re-encoding.
    pub remove_metadata: bool,

    /// Directives applied before each request's own
    pub default_directives: DefaultDirectives,

    /// Export each key of an object result as its own binding
    pub named_exports: bool,

    /// Emit module text without optional whitespace
    pub compact: bool,

    pub mode: RunMode,

    /// Project root; relative source paths resolve against it
    pub root: PathBuf,

    /// Public base path of the app (e.g. "/app/")
    pub base: Option<String>,

    /// Origin prefixed to dev-server URLs (e.g. "http://localhost:5173")
    pub origin: Option<String>,

    /// File extensions handled by the pipeline
    pub include: Vec<String>,

    /// Path prefixes, relative to the root, left to the host
    pub exclude: Vec<String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            remove_metadata: true,
            default_directives: DefaultDirectives::None,
            named_exports: true,
            compact: false,
            mode: RunMode::Build,
            root: PathBuf::from("."),
            base: None,
            origin: None,
            include: DEFAULT_INCLUDE.iter().map(|s| s.to_string()).collect(),
            exclude: DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PluginConfig {
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache.dir = dir.into();
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache.enabled = enabled;
        self
    }

    pub fn with_cache_retention(mut self, retention: Option<u64>) -> Self {
        self.cache.retention = retention;
        self
    }

    pub fn with_remove_metadata(mut self, remove: bool) -> Self {
        self.remove_metadata = remove;
        self
    }

    pub fn with_default_directives(mut self, defaults: DefaultDirectives) -> Self {
        self.default_directives = defaults;
        self
    }

    pub fn with_named_exports(mut self, named_exports: bool) -> Self {
        self.named_exports = named_exports;
        self
    }

    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_include<I, S>(mut self, include: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = include.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude<I, S>(mut self, exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = exclude.into_iter().map(Into::into).collect();
        self
    }

    /// The dev route prefix, `<base>/@imagetools/`.
    pub fn base_path(&self) -> String {
        base_path(self.base.as_deref())
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.enabled && self.cache.dir.as_os_str().is_empty() {
            return Err("cache directory must not be empty when the cache is enabled".to_string());
        }

        if self.include.is_empty() {
            return Err("include must list at least one file extension".to_string());
        }

        if let Some(base) = &self.base {
            if !base.is_empty() && !base.starts_with('/') && !base.contains("://") {
                return Err(format!("base must be an absolute path or URL, got '{base}'"));
            }
        }

        if let Some(origin) = &self.origin {
            if url::Url::parse(origin).is_err() {
                return Err(format!("origin must be a URL, got '{origin}'"));
            }

            // Dev URLs are origin + base, so a URL base already has an origin
            if let Some(base) = self.base.as_deref().filter(|b| b.contains("://")) {
                return Err(format!(
                    "origin '{origin}' cannot be combined with a URL base '{base}'"
                ));
            }
        }

        Ok(())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// imagetools - generate, cache and serve image variants.
#[derive(Parser, Debug, Clone)]
#[command(name = "imagetools")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a dev server that serves generated variants on demand
    Serve(ServeConfig),

    /// Process image requests, emit the variants and print the modules
    Build(BuildConfig),
}

/// Options shared by both subcommands.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Project root; relative image paths resolve against it.
    #[arg(long, default_value = ".", env = "IMAGETOOLS_ROOT")]
    pub root: PathBuf,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Directory for cached variants.
    #[arg(long, default_value = DEFAULT_CACHE_DIR, env = "IMAGETOOLS_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Keep generated variants in memory only.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    /// Seconds an unused cache file survives the end-of-build sweep.
    ///
    /// If not specified, the cache is never swept.
    #[arg(long, env = "IMAGETOOLS_CACHE_RETENTION")]
    pub cache_retention: Option<u64>,

    // =========================================================================
    // Output Configuration
    // =========================================================================
    /// Directives applied to every request, as a query string (e.g. "format=webp").
    #[arg(long, env = "IMAGETOOLS_DEFAULT_DIRECTIVES")]
    pub default_directives: Option<String>,

    /// Keep EXIF and similar metadata in generated images.
    #[arg(long, default_value_t = false)]
    pub keep_metadata: bool,

    /// Export object results only as a default export.
    #[arg(long, default_value_t = false)]
    pub no_named_exports: bool,

    /// Emit module text without optional whitespace.
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Public base path of the app.
    #[arg(long, env = "IMAGETOOLS_BASE")]
    pub base: Option<String>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl PipelineArgs {
    /// Build the library configuration for `mode`.
    pub fn to_plugin_config(&self, mode: RunMode) -> PluginConfig {
        let mut config = PluginConfig::default()
            .with_mode(mode)
            .with_root(&self.root)
            .with_cache_dir(&self.cache_dir)
            .with_cache_enabled(!self.no_cache)
            .with_cache_retention(self.cache_retention)
            .with_remove_metadata(!self.keep_metadata)
            .with_named_exports(!self.no_named_exports)
            .with_compact(self.compact);

        if let Some(query) = &self.default_directives {
            let defaults = DirectiveSet::parse(query.trim_start_matches('?'));
            if !defaults.is_empty() {
                config = config.with_default_directives(DefaultDirectives::Static(defaults));
            }
        }
        if let Some(base) = &self.base {
            config = config.with_base(base.clone());
        }

        config
    }
}

/// Dev server options.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "IMAGETOOLS_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "IMAGETOOLS_PORT")]
    pub port: u16,

    /// Origin prefixed to generated dev URLs (e.g. "http://localhost:5173").
    #[arg(long, env = "IMAGETOOLS_ORIGIN")]
    pub origin: Option<String>,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "IMAGETOOLS_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

impl ServeConfig {
    pub fn to_plugin_config(&self) -> PluginConfig {
        let config = self.pipeline.to_plugin_config(RunMode::Serve);
        match &self.origin {
            Some(origin) => config.with_origin(origin.clone()),
            None => config,
        }
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port must be greater than 0".to_string());
        }
        self.to_plugin_config().validate()
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Build options.
#[derive(Args, Debug, Clone)]
pub struct BuildConfig {
    /// Image ids to process, e.g. "src/photo.jpg?w=400;800&format=webp".
    #[arg(required = true)]
    pub requests: Vec<String>,

    /// Directory emitted assets are written to.
    #[arg(short, long, default_value = DEFAULT_OUT_DIR, env = "IMAGETOOLS_OUT_DIR")]
    pub out_dir: PathBuf,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

impl BuildConfig {
    pub fn to_plugin_config(&self) -> PluginConfig {
        self.pipeline.to_plugin_config(RunMode::Build)
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.out_dir.as_os_str().is_empty() {
            return Err("out_dir must not be empty".to_string());
        }
        self.to_plugin_config().validate()
    }

    /// Public URL prefix for emitted assets.
    pub fn public_base(&self) -> String {
        let base = self.pipeline.base.as_deref().unwrap_or("/");
        format!("{}/", base.trim_end_matches('/'))
    }
}

// =============================================================================
// Tests
// =============================================================================
