//! Cache descriptors.
//!
//! A descriptor declares that one component instance is cacheable. Equality
//! and hashing use the descriptor's identity, not its key: two components in
//! the same traversal may share a key and still be tracked as separate scopes.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use uuid::Uuid;

use super::keys::{CacheKey, Dependency};

/// Identity of a single descriptor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(Uuid);

impl DescriptorId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Declares a component's cache eligibility.
///
/// Cloning keeps the identity; constructing a new descriptor always yields a
/// fresh one, even for an equal key.
#[derive(Debug, Clone)]
pub struct CacheDescriptor {
    id: DescriptorId,
    key: CacheKey,
    expires_after: Option<Duration>,
    dependencies: BTreeSet<Dependency>,
}

impl CacheDescriptor {
    pub fn new(key: CacheKey) -> Self {
        Self {
            id: DescriptorId::new(),
            key,
            expires_after: None,
            dependencies: BTreeSet::new(),
        }
    }

    /// Lifetime hint for the backing store. The orchestrator never reads it.
    pub fn with_expiry(mut self, expires_after: Duration) -> Self {
        self.expires_after = Some(expires_after);
        self
    }

    pub fn with_dependency(mut self, dependency: impl Into<Dependency>) -> Self {
        self.dependencies.insert(dependency.into());
        self
    }

    pub fn with_dependencies<I, D>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Dependency>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    pub fn id(&self) -> DescriptorId {
        self.id
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn expires_after(&self) -> Option<Duration> {
        self.expires_after
    }

    pub fn dependencies(&self) -> &BTreeSet<Dependency> {
        &self.dependencies
    }
}

impl PartialEq for CacheDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CacheDescriptor {}

impl Hash for CacheDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn equal_keys_are_distinct_descriptors() {
        let first = CacheDescriptor::new(CacheKey::new("widget"));
        let second = CacheDescriptor::new(CacheKey::new("widget"));

        assert_eq!(first.key(), second.key());
        assert_ne!(first, second);

        let set: HashSet<_> = [first, second].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn clone_keeps_identity() {
        let descriptor = CacheDescriptor::new(CacheKey::new("widget"));
        let copy = descriptor.clone();

        assert_eq!(descriptor, copy);
        assert_eq!(descriptor.id(), copy.id());
    }

    #[test]
    fn builder_collects_dependencies() {
        let descriptor = CacheDescriptor::new(CacheKey::new("menu"))
            .with_dependency("navigation")
            .with_dependencies(["site", "navigation"])
            .with_expiry(Duration::from_secs(60));

        let deps: Vec<_> = descriptor
            .dependencies()
            .iter()
            .map(Dependency::as_str)
            .collect();
        assert_eq!(deps, vec!["navigation", "site"]);
        assert_eq!(descriptor.expires_after(), Some(Duration::from_secs(60)));
    }
}
