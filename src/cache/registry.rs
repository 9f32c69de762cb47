//! Bidirectional dependency index.
//!
//! Tracks which stored fragments were built from which dependencies so a
//! change to one dependency can evict every fragment that used it.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::keys::{CacheKey, Dependency};

/// Tracks dependency → keys and key → dependencies.
///
/// Not synchronised on its own; the owning store keeps it under the same lock
/// as its entries so both views change together.
#[derive(Debug, Default)]
pub struct DependencyRegistry {
    dependency_to_keys: HashMap<Dependency, HashSet<CacheKey>>,
    key_to_dependencies: HashMap<CacheKey, BTreeSet<Dependency>>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the dependencies of a stored key, replacing any previous set.
    pub fn register(&mut self, key: CacheKey, dependencies: BTreeSet<Dependency>) {
        self.unregister(&key);

        for dependency in &dependencies {
            self.dependency_to_keys
                .entry(dependency.clone())
                .or_default()
                .insert(key.clone());
        }
        self.key_to_dependencies.insert(key, dependencies);
    }

    pub fn dependencies_for(&self, key: &CacheKey) -> BTreeSet<Dependency> {
        self.key_to_dependencies
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Forget a key, pruning dependencies that no longer map to anything.
    pub fn unregister(&mut self, key: &CacheKey) {
        let Some(dependencies) = self.key_to_dependencies.remove(key) else {
            return;
        };

        for dependency in dependencies {
            if let Some(keys) = self.dependency_to_keys.get_mut(&dependency) {
                keys.remove(key);
                if keys.is_empty() {
                    self.dependency_to_keys.remove(&dependency);
                }
            }
        }
    }

    /// Remove every key built from `dependency` and return them.
    pub fn take_dependents(&mut self, dependency: &Dependency) -> HashSet<CacheKey> {
        let keys = self
            .dependency_to_keys
            .get(dependency)
            .cloned()
            .unwrap_or_default();
        for key in &keys {
            self.unregister(key);
        }
        keys
    }

    pub fn clear(&mut self) {
        self.dependency_to_keys.clear();
        self.key_to_dependencies.clear();
    }

    pub fn dependency_count(&self) -> usize {
        self.dependency_to_keys.len()
    }

    pub fn key_count(&self) -> usize {
        self.key_to_dependencies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(tags: &[&str]) -> BTreeSet<Dependency> {
        tags.iter().copied().map(Dependency::from).collect()
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = DependencyRegistry::new();
        let key = CacheKey::new("menu");

        registry.register(key.clone(), deps(&["navigation", "site"]));

        assert_eq!(registry.dependencies_for(&key), deps(&["navigation", "site"]));
        assert_eq!(registry.dependency_count(), 2);
        assert_eq!(registry.key_count(), 1);
    }

    #[test]
    fn reregister_replaces_previous_dependencies() {
        let mut registry = DependencyRegistry::new();
        let key = CacheKey::new("menu");

        registry.register(key.clone(), deps(&["navigation"]));
        registry.register(key.clone(), deps(&["site"]));

        assert!(registry.take_dependents(&Dependency::from("navigation")).is_empty());
        assert_eq!(registry.dependency_count(), 1);
        assert_eq!(registry.key_count(), 1);
    }

    #[test]
    fn unregister_cleans_up_mappings() {
        let mut registry = DependencyRegistry::new();
        let key = CacheKey::new("menu");

        registry.register(key.clone(), deps(&["navigation"]));
        registry.unregister(&key);

        assert_eq!(registry.key_count(), 0);
        assert_eq!(registry.dependency_count(), 0);
    }

    #[test]
    fn unregister_unknown_key_is_no_op() {
        let mut registry = DependencyRegistry::new();
        registry.unregister(&CacheKey::new("missing"));
        assert_eq!(registry.key_count(), 0);
    }

    #[test]
    fn take_dependents_returns_affected_keys() {
        let mut registry = DependencyRegistry::new();
        let header = CacheKey::new("header");
        let footer = CacheKey::new("footer");
        let sidebar = CacheKey::new("sidebar");

        registry.register(header.clone(), deps(&["site"]));
        registry.register(footer.clone(), deps(&["site", "legal"]));
        registry.register(sidebar.clone(), deps(&["tags"]));

        let affected = registry.take_dependents(&Dependency::from("site"));
        assert_eq!(affected.len(), 2);
        assert!(affected.contains(&header));
        assert!(affected.contains(&footer));

        assert!(registry.take_dependents(&Dependency::from("legal")).is_empty());
        assert_eq!(registry.key_count(), 1);
    }
}
