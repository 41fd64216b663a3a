//! Variant configurations, identities and transformation.
//!
//! A resolved [`DirectiveSet`](crate::directives::DirectiveSet) is expanded
//! into one [`VariantConfig`] per output image. Each configuration, together
//! with the source's content digest, yields a [`VariantId`]: the
//! content-addressed key under which the variant is cached and served.
//!
//! ```text
//! directives ──▶ ConfigExpander ──▶ [VariantConfig, ...]
//!                                        │
//!                        source digest ──┤
//!                                        ▼
//!                                    VariantId ──▶ cache lookup
//!                                                     │ miss
//!                                                     ▼
//!                                             TransformExecutor
//! ```

mod config;
mod expand;
mod id;
mod transform;

pub use config::VariantConfig;
pub use expand::{CartesianExpander, ConfigExpander};
pub use id::{content_digest, VariantId};
pub use transform::{
    ImageTransformer, OutputImageFormat, TransformExecutor, TransformOutput, AVIF_SPEED,
    DEFAULT_QUALITY,
};
