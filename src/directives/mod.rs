//! Directive parsing and resolution.
//!
//! Directives are the query-string instructions attached to an image import:
//! `photo.jpg?w=400;800&format=webp` carries a `w` directive with two
//! candidates and a `format` directive with one.
//!
//! - [`DirectiveSet`]: ordered key/value pairs with `;`-separated candidates
//! - [`DirectiveResolver`]: merges plugin defaults with the request and clamps
//!   requested dimensions to the source's intrinsic size

mod resolver;
mod set;

pub use resolver::{clamp_candidates, DefaultDirectives, DirectiveProvider, DirectiveResolver};
pub use set::DirectiveSet;

/// Target width, possibly several `;`-separated candidates.
pub const WIDTH: &str = "w";

/// Target height, possibly several `;`-separated candidates.
pub const HEIGHT: &str = "h";

/// Output image format.
pub const FORMAT: &str = "format";

/// Encoder quality.
pub const QUALITY: &str = "quality";

/// When `true`, dimensions larger than the source are kept.
pub const ALLOW_UPSCALE: &str = "allowUpscale";

/// Expose variants as base64 data URIs.
pub const INLINE: &str = "inline";

/// Selects the output serializer, e.g. `as=srcset` or `as=meta:width;height`.
pub const AS: &str = "as";

/// Separator between candidate values of one directive.
pub const CANDIDATE_SEPARATOR: char = ';';
