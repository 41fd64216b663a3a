use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::DecodeError;
use crate::source::{ImageRequest, SourceAsset};

use super::{DirectiveSet, ALLOW_UPSCALE, CANDIDATE_SEPARATOR, HEIGHT, WIDTH};

// =============================================================================
// Default Directives
// =============================================================================

/// Computes default directives per request.
///
/// The provider gets the request and the source asset; calling
/// [`SourceAsset::metadata`] loads and memoizes the source metadata, so a
/// provider that never asks for it never touches the file.
#[async_trait]
pub trait DirectiveProvider: Send + Sync {
    async fn directives(
        &self,
        request: &ImageRequest,
        source: &SourceAsset,
    ) -> Result<DirectiveSet, DecodeError>;
}

/// Directives applied to every request before the request's own.
#[derive(Clone, Default)]
pub enum DefaultDirectives {
    /// No defaults
    #[default]
    None,

    /// The same set for every request
    Static(DirectiveSet),

    /// Computed per request
    Dynamic(Arc<dyn DirectiveProvider>),
}

impl fmt::Debug for DefaultDirectives {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultDirectives::None => f.write_str("None"),
            DefaultDirectives::Static(set) => f.debug_tuple("Static").field(set).finish(),
            DefaultDirectives::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Merges default and request directives and clamps dimensions.
#[derive(Debug, Clone, Default)]
pub struct DirectiveResolver {
    defaults: DefaultDirectives,
}

impl DirectiveResolver {
    pub fn new(defaults: DefaultDirectives) -> Self {
        Self { defaults }
    }

    /// Resolve the effective directives for a request.
    ///
    /// Returns `Ok(None)` when neither defaults nor the request carry any
    /// directive: the id is not an image request and is left to the host.
    ///
    /// Unless `allowUpscale=true` is set, every `w`/`h` candidate larger than
    /// the source is replaced by the intrinsic dimension and duplicates are
    /// dropped. This happens before variant configurations exist, so clamped
    /// values are what ends up in the cache key.
    ///
    /// # Errors
    ///
    /// Returns a `DecodeError` if the source must be inspected and cannot be
    /// read or decoded.
    pub async fn resolve(
        &self,
        request: &ImageRequest,
        source: &SourceAsset,
    ) -> Result<Option<DirectiveSet>, DecodeError> {
        let defaults = match &self.defaults {
            DefaultDirectives::None => DirectiveSet::new(),
            DefaultDirectives::Static(set) => set.clone(),
            DefaultDirectives::Dynamic(provider) => provider.directives(request, source).await?,
        };

        let mut directives = DirectiveSet::merge(&defaults, &request.directives());
        if directives.is_empty() {
            return Ok(None);
        }

        let width = non_empty(directives.get(WIDTH));
        let height = non_empty(directives.get(HEIGHT));

        if directives.get(ALLOW_UPSCALE) != Some("true") && (width.is_some() || height.is_some())
        {
            let metadata = source.metadata().await?;

            if let Some(width) = width {
                let clamped = clamp_candidates(&width, metadata.width);
                if clamped != width {
                    debug!(requested = %width, clamped = %clamped, "Clamped width to source");
                }
                directives.insert(WIDTH, clamped);
            }
            if let Some(height) = height {
                let clamped = clamp_candidates(&height, metadata.height);
                if clamped != height {
                    debug!(requested = %height, clamped = %clamped, "Clamped height to source");
                }
                directives.insert(HEIGHT, clamped);
            }
        }

        Ok(Some(directives))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Clamp each `;`-separated candidate to `intrinsic` and drop duplicates.
///
/// A candidate is kept verbatim when its leading integer is at most
/// `intrinsic`; otherwise (including when it has no leading integer) it
/// becomes `intrinsic`. First occurrences win.
///
/// ```
/// use imagetools::directives::clamp_candidates;
///
/// assert_eq!(clamp_candidates("200;600;9999", 500), "200;500");
/// ```
pub fn clamp_candidates(value: &str, intrinsic: u32) -> String {
    let intrinsic_str = intrinsic.to_string();
    let mut seen: Vec<&str> = Vec::new();

    for candidate in value.split(CANDIDATE_SEPARATOR) {
        let kept = match leading_integer(candidate) {
            Some(n) if n <= i64::from(intrinsic) => candidate,
            _ => intrinsic_str.as_str(),
        };
        if !seen.contains(&kept) {
            seen.push(kept);
        }
    }

    seen.join(&CANDIDATE_SEPARATOR.to_string())
}

/// Parse an optionally signed integer prefix, ignoring leading whitespace.
fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end]
        .parse::<i64>()
        .ok()
        .map(|n| n * sign)
        .or(Some(i64::MAX))
}

// =============================================================================
// Tests
// =============================================================================
