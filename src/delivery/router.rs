use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use bytes::Bytes;
use tracing::debug;

use crate::config::RunMode;
use crate::error::EmitError;
use crate::format::ImageMetadata;
use crate::variant::VariantId;

use super::emit::{asset_token, AssetEmitter};
use super::registry::{DevRegistry, RegisteredImage};

/// A generated (or cached) variant ready to be exposed.
#[derive(Debug, Clone)]
pub struct RoutedVariant {
    pub id: VariantId,

    /// Encoded image bytes
    pub bytes: Bytes,

    /// Metadata of the encoded image, without `src`
    pub metadata: ImageMetadata,

    /// Whether `bytes` are also in the cache directory under `id`
    pub persisted: bool,
}

/// Decides how each variant is exposed to the importing module.
///
/// Priority, per variant:
///
/// ```text
/// inline directive ──▶ data:image/<format>;base64,...
/// serve mode       ──▶ <origin><base>/@imagetools/<id>
/// build mode       ──▶ emitted asset, referenced by a token
/// ```
///
/// Every variant is also registered with the [`DevRegistry`], whatever the
/// mode, before it is exposed.
pub struct DeliveryRouter {
    mode: RunMode,
    base_path: String,
    origin: String,
    root: PathBuf,
    registry: Arc<DevRegistry>,
    emitter: Option<Arc<dyn AssetEmitter>>,
}

impl std::fmt::Debug for DeliveryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryRouter")
            .field("mode", &self.mode)
            .field("base_path", &self.base_path)
            .field("origin", &self.origin)
            .field("root", &self.root)
            .field("emitter", &self.emitter.is_some())
            .finish()
    }
}

impl DeliveryRouter {
    pub fn new(mode: RunMode, base_path: impl Into<String>, registry: Arc<DevRegistry>) -> Self {
        Self {
            mode,
            base_path: base_path.into(),
            origin: String::new(),
            root: PathBuf::from("."),
            registry,
            emitter: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into().trim_end_matches('/').to_string();
        self
    }

    /// Root against which emitted asset names are made relative.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn AssetEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn registry(&self) -> &Arc<DevRegistry> {
        &self.registry
    }

    /// The dev-server URL of a variant.
    pub fn dev_url(&self, id: &VariantId) -> String {
        format!("{}{}{}", self.origin, self.base_path, id)
    }

    /// Register `variant` and return its metadata with `src` set.
    ///
    /// # Errors
    ///
    /// Returns an `EmitError` in build mode if there is no emitter or the
    /// emitter fails.
    pub async fn route(
        &self,
        source_path: &Path,
        inline: bool,
        variant: RoutedVariant,
    ) -> Result<ImageMetadata, EmitError> {
        let RoutedVariant {
            id,
            bytes,
            mut metadata,
            persisted,
        } = variant;

        let registered = RegisteredImage {
            bytes: (!persisted).then(|| bytes.clone()),
            metadata: metadata.clone(),
        };
        self.registry.register(&id, registered).await;

        let src = if inline {
            data_uri(&metadata.format, &bytes)
        } else {
            match self.mode {
                RunMode::Serve => self.dev_url(&id),
                RunMode::Build => {
                    let name = asset_name(&self.root, source_path, &metadata.format);
                    let emitter = self.emitter.as_ref().ok_or_else(|| EmitError::Emit {
                        name: name.clone(),
                        message: "no asset emitter configured".to_string(),
                    })?;
                    let handle = emitter.emit_file(&name, bytes).await?;
                    asset_token(&handle)
                }
            }
        };

        debug!(id = %id, inline, mode = ?self.mode, "Routed variant");
        metadata.src = Some(src);
        Ok(metadata)
    }
}

/// `data:image/<format>;base64,<bytes>`
pub fn data_uri(format: &str, bytes: &[u8]) -> String {
    format!(
        "data:image/{format};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Name suggested to the emitter: `<dir relative to root>/<stem>.<format>`.
///
/// The directory part and its slash are omitted when the source sits
/// directly in the root.
pub fn asset_name(root: &Path, source_path: &Path, format: &str) -> String {
    let dir = source_path.parent().unwrap_or(Path::new(""));
    let relative = dir.strip_prefix(root).unwrap_or(dir);

    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect();

    let stem = source_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if segments.is_empty() {
        format!("{stem}.{format}")
    } else {
        format!("{}/{stem}.{format}", segments.join("/"))
    }
}
