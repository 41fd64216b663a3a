use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Keys of the fixed fields, never overwritten by directive values.
const FIELD_NAMES: [&str; 5] = ["width", "height", "format", "compression", "src"];

/// Metadata describing one encoded image.
///
/// Produced by probing a source or cached file, or by the transformer for a
/// freshly generated variant. The router fills in `src` once it knows how the
/// variant is exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageMetadata {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Short format name (e.g., "png", "jpeg", "avif")
    pub format: String,

    /// Compression reported by the container, for formats that have one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,

    /// How the variant is exposed: data URI, dev URL or asset token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,

    /// Directive values the variant was produced with, serialized inline.
    /// Integers are stored as numbers.
    #[serde(flatten)]
    pub directives: BTreeMap<String, Value>,
}

impl ImageMetadata {
    /// Create metadata for an image with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: impl Into<String>) -> Self {
        Self {
            width,
            height,
            format: format.into(),
            compression: None,
            src: None,
            directives: BTreeMap::new(),
        }
    }

    /// Set the container compression.
    pub fn with_compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Record the directive values of the variant.
    ///
    /// Keys naming a fixed field (`format`, `width`, ...) are skipped; the
    /// field already reports the produced value.
    pub fn with_directives<'a>(
        mut self,
        directives: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        for (key, value) in directives {
            if FIELD_NAMES.contains(&key) {
                continue;
            }
            let value = match value.parse::<i64>() {
                Ok(n) => Value::from(n),
                Err(_) => Value::from(value),
            };
            self.directives.insert(key.to_string(), value);
        }
        self
    }

    /// The MIME type for this image.
    pub fn content_type(&self) -> String {
        format!("image/{}", self.format)
    }
}
