//! Cache key definitions.
//!
//! `CacheKey` names a stored fragment; `Dependency` tags what a fragment was
//! built from so the backing store can invalidate it later.

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Key under which a rendered fragment is stored.
///
/// A key is a base identifier plus any number of vary-by contexts supplied by
/// the caller (culture, tenant, query string, ...). Contexts are kept sorted by
/// name so the same set always produces the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    base: String,
    contexts: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            contexts: BTreeMap::new(),
        }
    }

    /// Add a vary-by context. A later value for the same name replaces the earlier one.
    pub fn vary_by(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.contexts.insert(name.into(), value.into());
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn contexts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.contexts
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Short stable fingerprint, used in log fields.
    pub fn fingerprint(&self) -> u64 {
        hash_value(self)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        for (name, value) in &self.contexts {
            write!(f, ";{name}={value}")?;
        }
        Ok(())
    }
}

/// Something a cached fragment was built from.
///
/// Opaque to the orchestrator; the backing store uses it to evict entries when
/// the underlying data changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dependency(String);

impl Dependency {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Dependency {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Compute a hash for any hashable value.
pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_are_rendered_sorted_by_name() {
        let key = CacheKey::new("menu")
            .vary_by("tenant", "acme")
            .vary_by("culture", "fr-FR");

        assert_eq!(key.to_string(), "menu;culture=fr-FR;tenant=acme");
    }

    #[test]
    fn insertion_order_does_not_change_equality() {
        let first = CacheKey::new("menu")
            .vary_by("a", "1")
            .vary_by("b", "2");
        let second = CacheKey::new("menu")
            .vary_by("b", "2")
            .vary_by("a", "1");

        assert_eq!(first, second);
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn later_context_value_wins() {
        let key = CacheKey::new("menu")
            .vary_by("culture", "en")
            .vary_by("culture", "de");

        assert_eq!(key.to_string(), "menu;culture=de");
    }

    #[test]
    fn different_contexts_produce_different_keys() {
        let en = CacheKey::new("footer").vary_by("culture", "en");
        let de = CacheKey::new("footer").vary_by("culture", "de");

        assert_ne!(en, de);
        assert_ne!(hash_value(&en), hash_value(&de));
    }
}
