use std::path::{Path, PathBuf};

use crate::directives::DirectiveSet;

/// File extensions treated as images by default.
pub const DEFAULT_INCLUDE: [&str; 8] = ["avif", "gif", "heif", "jpeg", "jpg", "png", "tiff", "webp"];

/// Path prefixes (relative to the project root) never treated as images.
pub const DEFAULT_EXCLUDE: [&str; 1] = ["public"];

// =============================================================================
// ImageRequest
// =============================================================================

/// A module id split into source path and directive query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    /// The id exactly as the host passed it
    id: String,

    /// Percent-decoded path of the source image
    path: PathBuf,

    /// Raw query string, without the leading `?`
    query: String,
}

impl ImageRequest {
    /// Parse a module id of the form `<path>[?<query>]`.
    pub fn parse(id: impl Into<String>) -> Self {
        let id = id.into();
        let (raw_path, query) = match id.split_once('?') {
            Some((path, query)) => (path, query),
            None => (id.as_str(), ""),
        };

        let path = urlencoding::decode(raw_path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| raw_path.to_string());

        Self {
            path: PathBuf::from(path),
            query: query.to_string(),
            id,
        }
    }

    /// The id as originally received.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The decoded source path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The raw query string.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Directives carried by the query string.
    pub fn directives(&self) -> DirectiveSet {
        DirectiveSet::parse(&self.query)
    }
}

// =============================================================================
// RequestFilter
// =============================================================================

/// Decides which module ids the pipeline handles.
#[derive(Debug, Clone)]
pub struct RequestFilter {
    /// Lowercase file extensions that are handled
    include: Vec<String>,

    /// Path prefixes, relative to the project root, that are skipped
    exclude: Vec<PathBuf>,
}

impl RequestFilter {
    /// Create a filter from extension and prefix lists.
    pub fn new<I, E>(include: I, exclude: E) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<Path>,
    {
        Self {
            include: include
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            exclude: exclude
                .into_iter()
                .map(|p| p.as_ref().to_path_buf())
                .collect(),
        }
    }

    /// Whether `request` should be processed, given the project root.
    pub fn matches(&self, request: &ImageRequest, root: &Path) -> bool {
        let path = request.path();

        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        if !self.include.iter().any(|inc| *inc == ext) {
            return false;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        !self.exclude.iter().any(|prefix| relative.starts_with(prefix))
    }
}

impl Default for RequestFilter {
    fn default() -> Self {
        Self::new(DEFAULT_INCLUDE, DEFAULT_EXCLUDE)
    }
}
