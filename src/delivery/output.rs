//! Output-format serializers.
//!
//! The `as` directive picks how the list of routed variants is turned into the
//! value a module exports:
//!
//! ```text
//! as=<key>[:<arg>;<arg>...]
//! ```
//!
//! An absent or unknown key falls back to `url`.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::error::ConfigError;
use crate::format::ImageMetadata;

/// Turns the metadata of routed variants into an exportable value.
///
/// `args` are the `;`-separated arguments after the `:` in the `as` directive.
/// Every entry of `images` has its `src` set.
pub trait OutputFormat: Send + Sync {
    fn serialize(&self, args: &[String], images: &[ImageMetadata]) -> Result<Value, ConfigError>;
}

/// Name of the fallback format.
pub const DEFAULT_OUTPUT_FORMAT: &str = "url";

/// Table of output formats, keyed by the name used in the `as` directive.
#[derive(Clone)]
pub struct OutputFormats {
    formats: BTreeMap<String, Arc<dyn OutputFormat>>,
}

impl std::fmt::Debug for OutputFormats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputFormats")
            .field("formats", &self.formats.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for OutputFormats {
    fn default() -> Self {
        Self::builtin()
    }
}

impl OutputFormats {
    /// An empty table. `serialize` fails on it until `url` is registered.
    pub fn empty() -> Self {
        Self {
            formats: BTreeMap::new(),
        }
    }

    /// The built-in formats: `url`, `srcset`, `img`, `picture`, and
    /// `metadata` (also registered as `meta`).
    pub fn builtin() -> Self {
        let metadata: Arc<dyn OutputFormat> = Arc::new(MetadataFormat);
        Self::empty()
            .with("url", UrlFormat)
            .with("srcset", SrcsetFormat)
            .with("img", ImgFormat)
            .with("picture", PictureFormat)
            .with_shared("metadata", metadata.clone())
            .with_shared("meta", metadata)
    }

    /// Register (or replace) a format.
    pub fn register(&mut self, name: impl Into<String>, format: impl OutputFormat + 'static) {
        self.formats.insert(name.into(), Arc::new(format));
    }

    pub fn with(mut self, name: impl Into<String>, format: impl OutputFormat + 'static) -> Self {
        self.register(name, format);
        self
    }

    fn with_shared(mut self, name: &str, format: Arc<dyn OutputFormat>) -> Self {
        self.formats.insert(name.to_string(), format);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn OutputFormat>> {
        self.formats.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.formats.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.formats.keys().map(String::as_str)
    }

    /// Serialize `images` according to the `as` directive value.
    pub fn serialize(
        &self,
        as_directive: Option<&str>,
        images: &[ImageMetadata],
    ) -> Result<Value, ConfigError> {
        let (key, args) = match as_directive {
            Some(value) => parse_as_directive(value),
            None => (DEFAULT_OUTPUT_FORMAT.to_string(), Vec::new()),
        };

        let (name, args) = match self.formats.get(&key) {
            Some(_) => (key, args),
            None => (DEFAULT_OUTPUT_FORMAT.to_string(), Vec::new()),
        };

        let format = self
            .formats
            .get(&name)
            .ok_or_else(|| ConfigError::OutputFormat {
                format: name.clone(),
                message: "no such output format".to_string(),
            })?;

        format.serialize(&args, images)
    }
}

/// Split `key:arg;arg` into the key and its arguments.
pub fn parse_as_directive(value: &str) -> (String, Vec<String>) {
    match value.split_once(':') {
        Some((key, args)) if !args.is_empty() => (
            key.to_string(),
            args.split(';').map(str::to_string).collect(),
        ),
        Some((key, _)) => (key.to_string(), Vec::new()),
        None => (value.to_string(), Vec::new()),
    }
}

// =============================================================================
// Built-in formats
// =============================================================================

fn src_of(image: &ImageMetadata) -> Value {
    image.src.clone().map(Value::String).unwrap_or(Value::Null)
}

fn srcset_of<'a>(images: impl IntoIterator<Item = &'a ImageMetadata>) -> String {
    images
        .into_iter()
        .map(|m| format!("{} {}w", m.src.as_deref().unwrap_or_default(), m.width))
        .collect::<Vec<_>>()
        .join(", ")
}

fn widest<'a>(images: impl IntoIterator<Item = &'a ImageMetadata>) -> Option<&'a ImageMetadata> {
    let mut best: Option<&ImageMetadata> = None;
    for image in images {
        if image.width > best.map(|b| b.width).unwrap_or(0) {
            best = Some(image);
        }
    }
    best
}

/// A single URL, or an array of URLs when there are several variants.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlFormat;

impl OutputFormat for UrlFormat {
    fn serialize(&self, _args: &[String], images: &[ImageMetadata]) -> Result<Value, ConfigError> {
        Ok(match images {
            [single] => src_of(single),
            _ => Value::Array(images.iter().map(src_of).collect()),
        })
    }
}

/// A `srcset` attribute value: `"<src> <width>w, ..."`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SrcsetFormat;

impl OutputFormat for SrcsetFormat {
    fn serialize(&self, _args: &[String], images: &[ImageMetadata]) -> Result<Value, ConfigError> {
        Ok(Value::String(srcset_of(images)))
    }
}

/// The metadata objects themselves.
///
/// Arguments, when given, whitelist the keys to keep. A single variant is
/// exported as an object, several as an array.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataFormat;

impl OutputFormat for MetadataFormat {
    fn serialize(&self, args: &[String], images: &[ImageMetadata]) -> Result<Value, ConfigError> {
        let whitelist: HashSet<&str> = args.iter().map(String::as_str).collect();

        let mut values = Vec::with_capacity(images.len());
        for image in images {
            let value = serde_json::to_value(image).map_err(|e| ConfigError::OutputFormat {
                format: "metadata".to_string(),
                message: e.to_string(),
            })?;

            let value = match value {
                Value::Object(map) if !whitelist.is_empty() => Value::Object(
                    map.into_iter()
                        .filter(|(key, _)| whitelist.contains(key.as_str()))
                        .collect(),
                ),
                other => other,
            };
            values.push(value);
        }

        Ok(match values.len() {
            1 => values.swap_remove(0),
            _ => Value::Array(values),
        })
    }
}

/// Attributes for an `<img>` element.
///
/// `src`, `w` and `h` come from the widest variant; `srcset` is added when
/// there is more than one variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImgFormat;

impl OutputFormat for ImgFormat {
    fn serialize(&self, _args: &[String], images: &[ImageMetadata]) -> Result<Value, ConfigError> {
        let mut result = img_attributes(widest(images));
        if images.len() >= 2 {
            result.insert("srcset".to_string(), Value::String(srcset_of(images)));
        }
        Ok(Value::Object(result))
    }
}

fn img_attributes(image: Option<&ImageMetadata>) -> Map<String, Value> {
    let mut map = Map::new();
    match image {
        Some(image) => {
            map.insert("src".to_string(), src_of(image));
            map.insert("w".to_string(), json!(image.width));
            map.insert("h".to_string(), json!(image.height));
        }
        None => {
            map.insert("src".to_string(), Value::Null);
            map.insert("w".to_string(), Value::Null);
            map.insert("h".to_string(), Value::Null);
        }
    }
    map
}

/// Data for a `<picture>` element.
///
/// The fallback format is the last distinct format in request order; the
/// widest image of that format becomes the `<img>`. Every other format gets a
/// `srcset` under `sources`. The fallback format also gets one when it has more
/// than one variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct PictureFormat;

impl OutputFormat for PictureFormat {
    fn serialize(&self, _args: &[String], images: &[ImageMetadata]) -> Result<Value, ConfigError> {
        let mut formats: Vec<&str> = Vec::new();
        for image in images {
            if !formats.contains(&image.format.as_str()) {
                formats.push(&image.format);
            }
        }
        let fallback = formats.last().copied();

        let fallback_images: Vec<&ImageMetadata> = images
            .iter()
            .filter(|m| Some(m.format.as_str()) == fallback)
            .collect();

        let mut sources = Map::new();
        for format in &formats {
            if Some(*format) == fallback && fallback_images.len() <= 1 {
                continue;
            }
            let srcset = srcset_of(images.iter().filter(|m| m.format == *format));
            sources.insert(format.to_string(), Value::String(srcset));
        }

        let img = img_attributes(widest(fallback_images.iter().copied()));
        Ok(json!({ "sources": sources, "img": img }))
    }
}
