//! Image format detection and metadata probing.
//!
//! Cached variants carry no companion metadata file, so everything the
//! pipeline reports about a cache hit (dimensions, format) is recovered by
//! inspecting the encoded bytes again.
//!
//! # Supported containers
//!
//! - **Raster formats** decodable by the `image` crate: PNG, JPEG, GIF, WebP, TIFF
//! - **AVIF**: container and AV1 sequence header parsing with `avif-parse`,
//!   full decoding with the `avif-decode` feature. Like most HEIF readers,
//!   AVIF files are reported with container format `heif` and compression
//!   `av1`.
//! - **HEIC** is recognized from its brand but cannot be decoded.

pub mod detect;
mod metadata;

pub use detect::{decode, detect_format, probe, verify, DecodedImage, ImageKind};
pub use metadata::ImageMetadata;
