//! Format detection for encoded images.
//!
//! Raster formats are identified through the `image` crate's magic-byte
//! sniffing. HEIF containers are identified from the brands in their `ftyp`
//! box; AVIF files are measured with `avif-parse` from the AV1 sequence
//! header of the primary item.

use std::io::Cursor;

use avif_parse::AvifData;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};

use crate::error::DecodeError;

use super::ImageMetadata;

// =============================================================================
// ImageKind
// =============================================================================

/// Detected encoded image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    WebP,
    Tiff,

    /// HEIF container. `av1` is true for AVIF payloads, false for HEVC (HEIC).
    Heif { av1: bool },
}

impl ImageKind {
    /// Container format name, as reported in metadata.
    pub const fn name(&self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpeg",
            ImageKind::Gif => "gif",
            ImageKind::WebP => "webp",
            ImageKind::Tiff => "tiff",
            ImageKind::Heif { .. } => "heif",
        }
    }

    /// Compression reported by the container, if it has one.
    pub const fn compression(&self) -> Option<&'static str> {
        match self {
            ImageKind::Heif { av1: true } => Some("av1"),
            ImageKind::Heif { av1: false } => Some("hevc"),
            _ => None,
        }
    }

    /// The `image` crate format used to decode this kind, if it can.
    pub const fn image_format(&self) -> Option<ImageFormat> {
        match self {
            ImageKind::Png => Some(ImageFormat::Png),
            ImageKind::Jpeg => Some(ImageFormat::Jpeg),
            ImageKind::Gif => Some(ImageFormat::Gif),
            ImageKind::WebP => Some(ImageFormat::WebP),
            ImageKind::Tiff => Some(ImageFormat::Tiff),
            ImageKind::Heif { .. } => None,
        }
    }
}

// =============================================================================
// Detection
// =============================================================================

/// Brands that mark an AV1-coded HEIF file.
const AV1_BRANDS: [&[u8; 4]; 2] = [b"avif", b"avis"];

/// Brands that mark any other HEIF file.
const HEIF_BRANDS: [&[u8; 4]; 10] = [
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"hevm", b"hevs", b"mif1", b"msf1",
];

/// Detect the format of an encoded image from its leading bytes.
///
/// # Errors
///
/// Returns `DecodeError::UnsupportedFormat` if no known signature matches.
pub fn detect_format(bytes: &[u8]) -> Result<ImageKind, DecodeError> {
    if let Some(av1) = heif_brand(bytes) {
        return Ok(ImageKind::Heif { av1 });
    }

    let format = image::guess_format(bytes).map_err(|e| DecodeError::UnsupportedFormat {
        reason: e.to_string(),
    })?;

    match format {
        ImageFormat::Png => Ok(ImageKind::Png),
        ImageFormat::Jpeg => Ok(ImageKind::Jpeg),
        ImageFormat::Gif => Ok(ImageKind::Gif),
        ImageFormat::WebP => Ok(ImageKind::WebP),
        ImageFormat::Tiff => Ok(ImageKind::Tiff),
        other => Err(DecodeError::UnsupportedFormat {
            reason: format!("{:?} images are not supported", other),
        }),
    }
}

/// Read image metadata from the header only.
///
/// This is cheap and suitable for source images, where the transformer
/// decodes the pixels later anyway.
pub fn probe(bytes: &[u8]) -> Result<ImageMetadata, DecodeError> {
    let kind = detect_format(bytes)?;

    let (width, height) = match kind {
        ImageKind::Heif { av1: true } => avif_dimensions(bytes)?,
        ImageKind::Heif { av1: false } => return Err(undecodable(kind)),
        raster => raster_dimensions(bytes, raster)?,
    };

    Ok(metadata_for(kind, width, height))
}

/// Read image metadata and confirm the whole image is decodable.
///
/// Raster images are fully decoded so a truncated file is rejected. AVIF
/// files are decoded when the `avif-decode` feature is enabled. Without it,
/// the container and the AV1 sequence header of the primary item must parse.
pub fn verify(bytes: &[u8]) -> Result<ImageMetadata, DecodeError> {
    let kind = detect_format(bytes)?;

    if kind == (ImageKind::Heif { av1: true }) && !cfg!(feature = "avif-decode") {
        let (width, height) = avif_dimensions(bytes)?;
        return Ok(metadata_for(kind, width, height));
    }

    let decoded = decode(bytes, false)?;
    Ok(metadata_for(kind, decoded.image.width(), decoded.image.height()))
}

/// A fully decoded image.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub kind: ImageKind,
    pub image: DynamicImage,

    /// Embedded ICC profile, when one was asked for and present
    pub icc_profile: Option<Vec<u8>>,
}

/// Decode the pixels of an encoded image.
///
/// With `keep_icc` the embedded ICC profile is read as well. A profile that
/// cannot be read is dropped, it never fails the decode.
///
/// # Errors
///
/// - `DecodeError::UnsupportedFormat` for unknown formats, HEVC-coded HEIF,
///   and AVIF without the `avif-decode` feature
/// - `DecodeError::Malformed` if the pixel data does not decode
pub fn decode(bytes: &[u8], keep_icc: bool) -> Result<DecodedImage, DecodeError> {
    let kind = detect_format(bytes)?;

    let Some(format) = kind.image_format() else {
        return Ok(DecodedImage {
            kind,
            image: decode_heif(kind, bytes)?,
            icc_profile: None,
        });
    };

    let mut decoder = ImageReader::with_format(Cursor::new(bytes), format)
        .into_decoder()
        .map_err(malformed)?;

    let icc_profile = if keep_icc {
        decoder.icc_profile().ok().flatten()
    } else {
        None
    };

    let image = DynamicImage::from_decoder(decoder).map_err(malformed)?;

    Ok(DecodedImage {
        kind,
        image,
        icc_profile,
    })
}

fn raster_dimensions(bytes: &[u8], kind: ImageKind) -> Result<(u32, u32), DecodeError> {
    let format = kind.image_format().ok_or_else(|| undecodable(kind))?;
    ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(malformed)
}

fn metadata_for(kind: ImageKind, width: u32, height: u32) -> ImageMetadata {
    let meta = ImageMetadata::new(width, height, kind.name());
    match kind.compression() {
        Some(compression) => meta.with_compression(compression),
        None => meta,
    }
}

fn malformed(e: impl std::fmt::Display) -> DecodeError {
    DecodeError::Malformed {
        message: e.to_string(),
    }
}

fn undecodable(kind: ImageKind) -> DecodeError {
    DecodeError::UnsupportedFormat {
        reason: format!(
            "cannot decode {} images with {} compression",
            kind.name(),
            kind.compression().unwrap_or("unknown")
        ),
    }
}

// =============================================================================
// HEIF
// =============================================================================

/// Check the `ftyp` box and return whether the file is AV1-coded HEIF.
///
/// Returns `None` if this is not a HEIF file.
fn heif_brand(bytes: &[u8]) -> Option<bool> {
    if bytes.len() < 16 || &bytes[4..8] != b"ftyp" {
        return None;
    }

    let size = u32::from_be_bytes(bytes[0..4].try_into().ok()?) as usize;
    let end = size.clamp(16, bytes.len());

    // Major brand at 8..12, minor version at 12..16, compatible brands after
    let brands = std::iter::once(&bytes[8..12]).chain(bytes[16..end].chunks_exact(4));

    let mut is_heif = false;
    for brand in brands {
        if AV1_BRANDS.iter().any(|b| brand == &b[..]) {
            return Some(true);
        }
        if HEIF_BRANDS.iter().any(|b| brand == &b[..]) {
            is_heif = true;
        }
    }

    is_heif.then_some(false)
}

/// Parse the AVIF container and the AV1 sequence header of its primary item.
fn avif_dimensions(bytes: &[u8]) -> Result<(u32, u32), DecodeError> {
    let data = AvifData::from_reader(&mut Cursor::new(bytes)).map_err(malformed)?;
    let av1 = data.primary_item_metadata().map_err(malformed)?;
    Ok((av1.max_frame_width.get(), av1.max_frame_height.get()))
}

#[cfg(not(feature = "avif-decode"))]
fn decode_heif(kind: ImageKind, _bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
    Err(undecodable(kind))
}

#[cfg(feature = "avif-decode")]
fn decode_heif(kind: ImageKind, bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
    use avif_decode::{Decoder, Image};

    if kind != (ImageKind::Heif { av1: true }) {
        return Err(undecodable(kind));
    }

    let image = Decoder::from_avif(bytes)
        .and_then(|decoder| decoder.to_image())
        .map_err(malformed)?;

    let size = |w: usize, h: usize| -> Result<(u32, u32), DecodeError> {
        let to_u32 = |v: usize| u32::try_from(v).map_err(malformed);
        Ok((to_u32(w)?, to_u32(h)?))
    };
    let mismatch = || malformed("decoded AVIF buffer does not match its dimensions");

    match image {
        Image::Rgb8(img) => {
            let (w, h) = size(img.width(), img.height())?;
            let buf = img.as_ref().pixels().flat_map(|p| [p.r, p.g, p.b]).collect();
            image::RgbImage::from_vec(w, h, buf)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(mismatch)
        }
        Image::Rgba8(img) => {
            let (w, h) = size(img.width(), img.height())?;
            let buf = img.as_ref().pixels().flat_map(|p| [p.r, p.g, p.b, p.a]).collect();
            image::RgbaImage::from_vec(w, h, buf)
                .map(DynamicImage::ImageRgba8)
                .ok_or_else(mismatch)
        }
        Image::Rgb16(img) => {
            let (w, h) = size(img.width(), img.height())?;
            let buf = img.as_ref().pixels().flat_map(|p| [p.r, p.g, p.b]).collect();
            image::ImageBuffer::from_vec(w, h, buf)
                .map(DynamicImage::ImageRgb16)
                .ok_or_else(mismatch)
        }
        Image::Rgba16(img) => {
            let (w, h) = size(img.width(), img.height())?;
            let buf = img.as_ref().pixels().flat_map(|p| [p.r, p.g, p.b, p.a]).collect();
            image::ImageBuffer::from_vec(w, h, buf)
                .map(DynamicImage::ImageRgba16)
                .ok_or_else(mismatch)
        }
        Image::Gray8(img) => {
            let (w, h) = size(img.width(), img.height())?;
            let buf = img.as_ref().pixels().map(|p| p.value()).collect();
            image::ImageBuffer::from_vec(w, h, buf)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(mismatch)
        }
        Image::Gray16(img) => {
            let (w, h) = size(img.width(), img.height())?;
            let buf = img.as_ref().pixels().map(|p| p.value()).collect();
            image::ImageBuffer::from_vec(w, h, buf)
                .map(DynamicImage::ImageLuma16)
                .ok_or_else(mismatch)
        }
    }
}

#[cfg(test)]
fn make_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

/// A HEIF container with the given major brand and no decodable item.
#[cfg(test)]
pub(crate) fn empty_heif_file(major: &[u8; 4]) -> Vec<u8> {
    let mut ftyp = Vec::new();
    ftyp.extend_from_slice(major);
    ftyp.extend_from_slice(&0u32.to_be_bytes());
    ftyp.extend_from_slice(b"mif1");
    ftyp.extend_from_slice(b"miaf");

    let mut out = make_box(b"ftyp", &ftyp);
    out.extend(make_box(b"mdat", &[0u8; 32]));
    out
}

/// A real AVIF file with a solid color.
#[cfg(test)]
pub(crate) fn avif_test_file(width: u32, height: u32) -> Vec<u8> {
    use image::codecs::avif::AvifEncoder;

    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([30, 120, 220, 255]));
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_with_encoder(AvifEncoder::new_with_speed_quality(&mut out, 10, 80))
        .unwrap();
    out
}

// =============================================================================
// Tests
// =============================================================================
