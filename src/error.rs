use thiserror::Error;

/// Errors raised while reading or decoding a source image
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The source file could not be read from disk
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    /// The bytes are not an image format we can recognize
    #[error("Unsupported image format: {reason}")]
    UnsupportedFormat { reason: String },

    /// The header was recognized but the image is truncated or corrupt
    #[error("Malformed image: {message}")]
    Malformed { message: String },
}

/// Errors raised while turning directives into variant configurations
/// or while resolving an output format
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Expansion produced no configuration for a non-empty directive set
    #[error("Directives produced no image configuration")]
    NoConfigurations,

    /// A directive value could not be interpreted
    #[error("Invalid value for directive '{key}': {value}")]
    InvalidDirective { key: String, value: String },

    /// The requested output image format cannot be produced
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// An output serializer failed to render the metadata list
    #[error("Output format '{format}' failed: {message}")]
    OutputFormat { format: String, message: String },
}

/// Errors from the on-disk variant cache
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The cache directory could not be created
    #[error("Failed to create cache directory {dir}: {message}")]
    CreateDir { dir: String, message: String },

    /// Reading a cache entry failed
    #[error("Failed to read cache entry {id}: {message}")]
    Read { id: String, message: String },

    /// Writing a cache entry failed
    #[error("Failed to write cache entry {id}: {message}")]
    Write { id: String, message: String },
}

/// Errors from executing a variant transformation
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    /// The source image could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The configuration asks for something the transformer cannot do
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Encoding the output image failed
    #[error("Failed to encode image: {message}")]
    Encode { message: String },
}

/// Errors from handing a variant to the asset emitter
#[derive(Debug, Clone, Error)]
pub enum EmitError {
    /// The emitter rejected or failed to write the asset
    #[error("Failed to emit asset {name}: {message}")]
    Emit { name: String, message: String },
}

/// Errors that abort a single load request
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// Errors that prevent the pipeline from starting
#[derive(Debug, Clone, Error)]
pub enum SetupError {
    /// The configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The cache directory could not be prepared
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Errors from the dev-server middleware
#[derive(Debug, Clone, Error)]
pub enum ServeError {
    /// A URL under the image prefix names an id the router never registered.
    ///
    /// URLs are only ever handed out for registered ids, so reaching this
    /// means the registry is corrupt or there is a logic error.
    #[error("cannot find image with id \"{id}\", this is likely an internal error")]
    UnknownImage { id: String },

    /// The registered variant lives on disk but could not be read
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Errors from the stale cache sweep
#[derive(Debug, Clone, Error)]
pub enum ReapError {
    /// The cache directory could not be listed
    #[error("Failed to read cache directory {dir}: {message}")]
    ReadDir { dir: String, message: String },

    /// A cache file could not be inspected
    #[error("Failed to stat {path}: {message}")]
    Stat { path: String, message: String },

    /// A stale cache file could not be deleted
    #[error("Failed to delete {path}: {message}")]
    Remove { path: String, message: String },
}
