use std::fmt;

use sha2::{Digest, Sha256};

use super::VariantConfig;

/// Lowercase hex SHA-256 of a byte slice.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Content-addressed identity of a (source, configuration) pair.
///
/// `sha256(canonical(config) ‖ digest(source))`, lowercase hex. The id is
/// also the cache file name and the dev-server URL suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantId(String);

impl VariantId {
    /// Derive the id for `config` applied to a source with `source_digest`.
    pub fn derive(config: &VariantConfig, source_digest: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(config.canonical().as_bytes());
        hasher.update(source_digest.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Accept a string as an id if it looks like one.
    ///
    /// Used for names coming from the outside (URL paths, directory entries)
    /// so that they can never escape the cache directory.
    pub fn parse(s: &str) -> Option<Self> {
        let valid = s.len() == 64
            && s
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VariantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
