use crate::delivery::OutputFormats;
use crate::directives::{DirectiveSet, AS, INLINE};
use crate::error::ConfigError;

use super::VariantConfig;

/// Turns resolved directives into the variants to produce.
///
/// Implementations must return a finite, ordered list that is non-empty when
/// the directives are non-empty. Distinct configurations must have distinct
/// canonical serializations: the cache key relies on it.
pub trait ConfigExpander: Send + Sync {
    fn expand(
        &self,
        directives: &DirectiveSet,
        formats: &OutputFormats,
    ) -> Result<Vec<VariantConfig>, ConfigError>;
}

/// Cartesian product of all directive candidates.
///
/// `w=100;200&format=webp;png` yields four configurations. Key order is
/// preserved in every configuration and the first key varies slowest.
/// `as` and `inline` only affect how variants are exposed, so they are left
/// out of the configurations.
#[derive(Debug, Clone, Copy, Default)]
pub struct CartesianExpander;

impl ConfigExpander for CartesianExpander {
    fn expand(
        &self,
        directives: &DirectiveSet,
        _formats: &OutputFormats,
    ) -> Result<Vec<VariantConfig>, ConfigError> {
        let mut configs = vec![VariantConfig::new()];

        for (key, _) in directives.iter() {
            if key == AS || key == INLINE {
                continue;
            }

            let candidates: Vec<&str> = directives
                .candidates(key)
                .into_iter()
                .filter(|c| !c.is_empty())
                .collect();

            if candidates.is_empty() {
                continue;
            }

            configs = configs
                .iter()
                .flat_map(|config| {
                    candidates
                        .iter()
                        .map(move |candidate| config.clone().with(key, *candidate))
                })
                .collect();
        }

        // Exposure-only directives still describe one (unmodified) image,
        // but an empty set describes none
        if directives.is_empty() {
            return Err(ConfigError::NoConfigurations);
        }

        Ok(configs)
    }
}
