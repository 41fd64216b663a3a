use url::form_urlencoded;

use super::CANDIDATE_SEPARATOR;

/// Ordered set of directives.
///
/// Each key appears once. Re-inserting a key replaces its value but keeps the
/// position where the key first appeared, so merging defaults with a request
/// preserves the defaults' key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveSet {
    entries: Vec<(String, String)>,
}

impl DirectiveSet {
    /// Create an empty directive set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a query string (`w=400;800&format=webp`).
    ///
    /// Keys and values are form-decoded. A repeated key keeps its last value.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut set = Self::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            set.insert(key.into_owned(), value.into_owned());
        }
        set
    }

    /// Merge request directives over defaults.
    ///
    /// Request values override default values for the same key.
    pub fn merge(defaults: &DirectiveSet, request: &DirectiveSet) -> Self {
        let mut merged = defaults.clone();
        for (key, value) in request.iter() {
            merged.insert(key, value);
        }
        merged
    }

    /// Set `key` to `value`, replacing any previous value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Raw value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether `key` is present, whatever its value.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Candidate values of `key`, in order.
    pub fn candidates(&self, key: &str) -> Vec<&str> {
        self.get(key)
            .map(|v| v.split(CANDIDATE_SEPARATOR).collect())
            .unwrap_or_default()
    }

    /// Iterate over `(key, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set has no keys at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize back to a query string.
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.entries.iter())
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DirectiveSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (key, value) in iter {
            set.insert(key, value);
        }
        set
    }
}
