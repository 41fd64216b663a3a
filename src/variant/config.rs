use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::directives::FORMAT;

/// Canonical description of one desired output image.
///
/// An ordered map of directive name to a single value. The canonical
/// serialization is a compact JSON object in insertion order; two configs are
/// the same variant exactly when their canonical serializations match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VariantConfig {
    entries: Vec<(String, String)>,
}

impl VariantConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append or replace a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Requested output format, if any.
    pub fn format(&self) -> Option<&str> {
        self.get(FORMAT)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compact JSON object in insertion order, e.g. `{"w":"400","format":"webp"}`.
    pub fn canonical(&self) -> String {
        // Serializing string pairs into a String cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl Serialize for VariantConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariantConfig {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut config = Self::new();
        for (key, value) in iter {
            config.set(key, value);
        }
        config
    }
}
