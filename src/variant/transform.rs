//! Variant transformation.
//!
//! The pipeline treats transformation as a black box behind
//! [`TransformExecutor`]. [`ImageTransformer`] is the built-in executor: it
//! decodes the source, optionally resizes it and re-encodes it.
//!
//! # Supported directives
//!
//! - `w`, `h`: target size. With only one of them the aspect ratio is kept.
//! - `format`: `avif`, `png`, `jpeg`/`jpg`, `webp`, `gif`, `tiff`/`tif`.
//!   Defaults to the source format.
//! - `quality`: JPEG and AVIF quality 1-100 (default 80).
//!
//! Re-encoding drops EXIF and other ancillary data. When metadata is kept,
//! the source ICC profile is embedded in the output for every encoder that
//! supports it (GIF does not).

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageEncoder, ImageFormat};
use tracing::debug;

use crate::directives::{HEIGHT, QUALITY, WIDTH};
use crate::error::{ConfigError, TransformError};
use crate::format::{decode, ImageKind, ImageMetadata};
use crate::source::SourceAsset;

use super::VariantConfig;

/// Default JPEG and AVIF quality (1-100).
pub const DEFAULT_QUALITY: u8 = 80;

/// AVIF encoder speed, from 1 (smallest output) to 10 (fastest).
pub const AVIF_SPEED: u8 = 8;

// =============================================================================
// Executor Contract
// =============================================================================

/// Result of transforming a source into one variant.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// Encoded output image
    pub bytes: Bytes,

    /// Metadata of the output image
    pub metadata: ImageMetadata,
}

/// Executes one variant configuration against a source image.
///
/// Must be deterministic: the same configuration and source bytes always
/// produce byte-identical output. Concurrent cache misses for the same
/// variant may both execute, and both results are written to the same file.
#[async_trait]
pub trait TransformExecutor: Send + Sync {
    async fn execute(
        &self,
        config: &VariantConfig,
        source: &SourceAsset,
        remove_metadata: bool,
    ) -> Result<TransformOutput, TransformError>;
}

// =============================================================================
// Output Formats
// =============================================================================

/// Image formats the built-in transformer can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputImageFormat {
    Avif,
    Png,
    Jpeg,
    WebP,
    Gif,
    Tiff,
}

impl OutputImageFormat {
    /// Parse a `format` directive value.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "avif" => Ok(Self::Avif),
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::WebP),
            "gif" => Ok(Self::Gif),
            "tiff" | "tif" => Ok(Self::Tiff),
            _ => Err(ConfigError::UnsupportedFormat(name.to_string())),
        }
    }

    /// Name reported in metadata and used as file extension.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Avif => "avif",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::WebP => "webp",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
        }
    }

}

// =============================================================================
// Built-in Transformer
// =============================================================================

/// Resize and re-encode with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageTransformer;

impl ImageTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Apply `config` to encoded source bytes.
    ///
    /// With `remove_metadata` unset, the source ICC profile is carried over.
    ///
    /// # Errors
    ///
    /// - `TransformError::Decode` if the source cannot be decoded
    /// - `TransformError::Config` for invalid sizes, quality or formats
    /// - `TransformError::Encode` if encoding fails
    pub fn transform(
        &self,
        config: &VariantConfig,
        source: &[u8],
        remove_metadata: bool,
    ) -> Result<TransformOutput, TransformError> {
        let decoded = decode(source, !remove_metadata)?;

        let output_format = match config.format() {
            Some(name) => OutputImageFormat::from_name(name)?,
            None if decoded.kind == (ImageKind::Heif { av1: true }) => OutputImageFormat::Avif,
            None => OutputImageFormat::from_name(decoded.kind.name())?,
        };

        let width = parse_dimension(config, WIDTH)?;
        let height = parse_dimension(config, HEIGHT)?;
        let quality = parse_quality(config)?;

        let img = resize(decoded.image, width, height);
        let bytes = encode(&img, output_format, quality, decoded.icc_profile.as_deref())?;
        let metadata = ImageMetadata::new(img.width(), img.height(), output_format.name());

        Ok(TransformOutput { bytes, metadata })
    }
}

#[async_trait]
impl TransformExecutor for ImageTransformer {
    async fn execute(
        &self,
        config: &VariantConfig,
        source: &SourceAsset,
        remove_metadata: bool,
    ) -> Result<TransformOutput, TransformError> {
        let bytes = source.bytes().await?.clone();
        let config = config.clone();
        let transformer = *self;

        tokio::task::spawn_blocking(move || transformer.transform(&config, &bytes, remove_metadata))
            .await
            .map_err(|e| TransformError::Encode {
                message: format!("transform task failed: {}", e),
            })?
    }
}

fn parse_dimension(config: &VariantConfig, key: &str) -> Result<Option<u32>, ConfigError> {
    match config.get(key) {
        None | Some("") => Ok(None),
        Some(value) => match value.trim().parse::<u32>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(ConfigError::InvalidDirective {
                key: key.to_string(),
                value: value.to_string(),
            }),
        },
    }
}

fn parse_quality(config: &VariantConfig) -> Result<u8, ConfigError> {
    match config.get(QUALITY) {
        None | Some("") => Ok(DEFAULT_QUALITY),
        Some(value) => match value.trim().parse::<u8>() {
            Ok(q) if (1..=100).contains(&q) => Ok(q),
            _ => Err(ConfigError::InvalidDirective {
                key: QUALITY.to_string(),
                value: value.to_string(),
            }),
        },
    }
}

/// Resize to the requested box. A single dimension keeps the aspect ratio.
fn resize(img: DynamicImage, width: Option<u32>, height: Option<u32>) -> DynamicImage {
    let (src_w, src_h) = (img.width().max(1), img.height().max(1));

    let (w, h) = match (width, height) {
        (None, None) => return img,
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scaled(src_h, w, src_w)),
        (None, Some(h)) => (scaled(src_w, h, src_h), h),
    };

    if (w, h) == (img.width(), img.height()) {
        return img;
    }

    img.resize_exact(w, h, FilterType::Lanczos3)
}

/// `value * num / den`, rounded, at least 1.
fn scaled(value: u32, num: u32, den: u32) -> u32 {
    let result = (u64::from(value) * u64::from(num) + u64::from(den) / 2) / u64::from(den);
    result.clamp(1, u64::from(u32::MAX)) as u32
}

fn encode(
    img: &DynamicImage,
    format: OutputImageFormat,
    quality: u8,
    icc_profile: Option<&[u8]>,
) -> Result<Bytes, TransformError> {
    let mut output = Vec::new();

    let result = match format {
        OutputImageFormat::Avif => {
            let encoder = AvifEncoder::new_with_speed_quality(&mut output, AVIF_SPEED, quality);
            DynamicImage::ImageRgba8(img.to_rgba8())
                .write_with_encoder(with_icc(encoder, icc_profile))
        }
        OutputImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut output, quality);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(with_icc(encoder, icc_profile))
        }
        OutputImageFormat::Png => {
            img.write_with_encoder(with_icc(PngEncoder::new(&mut output), icc_profile))
        }
        OutputImageFormat::WebP => {
            let encoder = WebPEncoder::new_lossless(&mut output);
            DynamicImage::ImageRgba8(img.to_rgba8())
                .write_with_encoder(with_icc(encoder, icc_profile))
        }
        OutputImageFormat::Tiff => {
            let encoder = TiffEncoder::new(Cursor::new(&mut output));
            DynamicImage::ImageRgba8(img.to_rgba8())
                .write_with_encoder(with_icc(encoder, icc_profile))
        }
        OutputImageFormat::Gif => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_to(&mut Cursor::new(&mut output), ImageFormat::Gif),
    };

    result.map_err(|e| TransformError::Encode {
        message: e.to_string(),
    })?;

    Ok(Bytes::from(output))
}

/// Hand the ICC profile to an encoder, if there is one to keep.
fn with_icc<E: ImageEncoder>(mut encoder: E, icc_profile: Option<&[u8]>) -> E {
    if let Some(icc) = icc_profile {
        if let Err(e) = encoder.set_icc_profile(icc.to_vec()) {
            debug!(error = %e, "Encoder cannot embed an ICC profile, dropping it");
        }
    }
    encoder
}

// =============================================================================
// Tests
// =============================================================================
