//! Exposing variants to the importing module.
//!
//! # Components
//!
//! - [`DeliveryRouter`]: chooses inline data, dev URL or emitted asset
//! - [`DevRegistry`]: in-process map of routed variants, read by the dev server
//! - [`AssetEmitter`] / [`FsEmitter`]: build-mode asset pipeline
//! - [`OutputFormats`]: serializers selected by the `as` directive
//! - [`to_es_module`]: module text generation
//!
//! ```text
//! RoutedVariant ──▶ DeliveryRouter ──▶ ImageMetadata { src, .. }
//!                        │                       │
//!                        ▼                       ▼
//!                   DevRegistry          OutputFormats ──▶ to_es_module
//! ```

mod emit;
mod module;
mod output;
mod registry;
mod router;

pub use emit::{asset_token, AssetEmitter, FsEmitter, ASSET_TOKEN_PREFIX, ASSET_TOKEN_SUFFIX};
pub use module::{is_legal_identifier, to_es_module};
pub use output::{
    parse_as_directive, ImgFormat, MetadataFormat, OutputFormat, OutputFormats, PictureFormat,
    SrcsetFormat, UrlFormat, DEFAULT_OUTPUT_FORMAT,
};
pub use registry::{DevRegistry, RegisteredImage};
pub use router::{asset_name, data_uri, DeliveryRouter, RoutedVariant};

/// Path segment under which the dev server exposes variants.
pub const DEV_ROUTE_SEGMENT: &str = "@imagetools";

/// The dev route prefix for a public base: `<base without trailing />/@imagetools/`.
///
/// ```
/// use imagetools::delivery::base_path;
///
/// assert_eq!(base_path(None), "/@imagetools/");
/// assert_eq!(base_path(Some("/app/")), "/app/@imagetools/");
/// ```
pub fn base_path(base: Option<&str>) -> String {
    let base = base.unwrap_or("/").trim_end_matches('/');
    format!("{base}/{DEV_ROUTE_SEGMENT}/")
}
