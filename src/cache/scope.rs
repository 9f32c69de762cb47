//! Cache scope tracking for one traversal.
//!
//! A scope spans the generation of one cacheable component. Scopes nest while
//! a parent renders its children, but they are closed by descriptor identity,
//! never by popping the most recent one.

use std::collections::BTreeSet;

use tracing::trace;

use super::descriptor::{CacheDescriptor, DescriptorId};
use super::keys::Dependency;

/// Bookkeeping hooks the orchestrator calls around cacheable generation.
pub trait ScopeManager: Send + Sync {
    /// Generation for `descriptor` has started.
    fn enter_scope(&mut self, descriptor: &CacheDescriptor);

    /// Generation for `descriptor` has concluded. Unknown descriptors are ignored.
    fn exit_scope(&mut self, descriptor: &CacheDescriptor);

    /// `descriptor` was served from the store, which reported these dependencies
    /// for the stored fragment. Called while its scope is open.
    fn record_dependencies(
        &mut self,
        _descriptor: &CacheDescriptor,
        _dependencies: &BTreeSet<Dependency>,
    ) {
    }

    /// Dependencies to store alongside `descriptor`'s content.
    fn dependencies(&self, descriptor: &CacheDescriptor) -> BTreeSet<Dependency> {
        descriptor.dependencies().clone()
    }
}

#[derive(Debug)]
struct OpenScope {
    id: DescriptorId,
    dependencies: BTreeSet<Dependency>,
}

/// Default scope manager: aggregates dependencies upward.
///
/// Open scopes are kept in the order they were entered. When a scope closes,
/// whatever it collected is merged into every scope that was opened before it
/// and is still open, so a parent's entry ends up depending on everything its
/// cacheable descendants depended on.
#[derive(Debug, Default)]
pub struct DependencyScopes {
    open: Vec<OpenScope>,
}

impl DependencyScopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn is_open(&self, descriptor: &CacheDescriptor) -> bool {
        self.position(descriptor.id()).is_some()
    }

    fn position(&self, id: DescriptorId) -> Option<usize> {
        self.open.iter().position(|scope| scope.id == id)
    }
}

impl ScopeManager for DependencyScopes {
    fn enter_scope(&mut self, descriptor: &CacheDescriptor) {
        if self.is_open(descriptor) {
            return;
        }
        trace!(scope = %descriptor.id(), depth = self.open.len(), "enter scope");
        self.open.push(OpenScope {
            id: descriptor.id(),
            dependencies: descriptor.dependencies().clone(),
        });
    }

    fn record_dependencies(
        &mut self,
        descriptor: &CacheDescriptor,
        dependencies: &BTreeSet<Dependency>,
    ) {
        let Some(index) = self.position(descriptor.id()) else {
            return;
        };
        self.open[index]
            .dependencies
            .extend(dependencies.iter().cloned());
    }

    fn exit_scope(&mut self, descriptor: &CacheDescriptor) {
        let Some(index) = self.position(descriptor.id()) else {
            return;
        };
        let closed = self.open.remove(index);
        trace!(scope = %closed.id, remaining = self.open.len(), "exit scope");

        for ancestor in &mut self.open[..index] {
            ancestor
                .dependencies
                .extend(closed.dependencies.iter().cloned());
        }
    }

    fn dependencies(&self, descriptor: &CacheDescriptor) -> BTreeSet<Dependency> {
        match self.position(descriptor.id()) {
            Some(index) => self.open[index].dependencies.clone(),
            None => descriptor.dependencies().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::CacheKey;

    fn descriptor(name: &str, deps: &[&str]) -> CacheDescriptor {
        CacheDescriptor::new(CacheKey::new(name)).with_dependencies(deps.iter().copied())
    }

    fn tags(set: &BTreeSet<Dependency>) -> Vec<&str> {
        set.iter().map(Dependency::as_str).collect()
    }

    #[test]
    fn child_dependencies_flow_into_parent() {
        let mut scopes = DependencyScopes::new();
        let page = descriptor("page", &["site"]);
        let menu = descriptor("menu", &["navigation"]);

        scopes.enter_scope(&page);
        scopes.enter_scope(&menu);
        scopes.exit_scope(&menu);

        assert_eq!(tags(&scopes.dependencies(&page)), vec!["navigation", "site"]);
        assert_eq!(scopes.open_count(), 1);
    }

    #[test]
    fn exit_out_of_entry_order_only_closes_named_scope() {
        let mut scopes = DependencyScopes::new();
        let outer = descriptor("outer", &[]);
        let inner = descriptor("inner", &["tags"]);

        scopes.enter_scope(&outer);
        scopes.enter_scope(&inner);
        scopes.exit_scope(&outer);

        assert!(!scopes.is_open(&outer));
        assert!(scopes.is_open(&inner));

        // Closing the later scope must not leak into the already-closed one.
        scopes.exit_scope(&inner);
        assert_eq!(scopes.open_count(), 0);
    }

    #[test]
    fn siblings_do_not_share_dependencies() {
        let mut scopes = DependencyScopes::new();
        let parent = descriptor("parent", &[]);
        let first = descriptor("first", &["a"]);
        let second = descriptor("second", &["b"]);

        scopes.enter_scope(&parent);
        scopes.enter_scope(&first);
        scopes.exit_scope(&first);
        scopes.enter_scope(&second);

        assert_eq!(tags(&scopes.dependencies(&second)), vec!["b"]);
        scopes.exit_scope(&second);
        assert_eq!(tags(&scopes.dependencies(&parent)), vec!["a", "b"]);
    }

    #[test]
    fn equal_keys_are_tracked_separately() {
        let mut scopes = DependencyScopes::new();
        let first = descriptor("widget", &[]);
        let second = descriptor("widget", &[]);

        scopes.enter_scope(&first);
        scopes.enter_scope(&second);
        scopes.exit_scope(&second);

        assert!(scopes.is_open(&first));
        assert_eq!(scopes.open_count(), 1);
    }

    #[test]
    fn exit_is_idempotent() {
        let mut scopes = DependencyScopes::new();
        let menu = descriptor("menu", &[]);

        scopes.exit_scope(&menu);
        scopes.enter_scope(&menu);
        scopes.exit_scope(&menu);
        scopes.exit_scope(&menu);

        assert_eq!(scopes.open_count(), 0);
    }

    #[test]
    fn redundant_enter_keeps_one_scope() {
        let mut scopes = DependencyScopes::new();
        let menu = descriptor("menu", &[]);

        scopes.enter_scope(&menu);
        scopes.enter_scope(&menu);

        assert_eq!(scopes.open_count(), 1);
    }

    #[test]
    fn served_dependencies_reach_the_parent() {
        let mut scopes = DependencyScopes::new();
        let page = descriptor("page", &["site"]);
        let menu = descriptor("menu", &["navigation"]);
        let stored: BTreeSet<Dependency> = ["links", "navigation"]
            .into_iter()
            .map(Dependency::from)
            .collect();

        scopes.enter_scope(&page);
        scopes.enter_scope(&menu);
        scopes.record_dependencies(&menu, &stored);
        scopes.exit_scope(&menu);

        assert_eq!(
            tags(&scopes.dependencies(&page)),
            vec!["links", "navigation", "site"]
        );
    }

    #[test]
    fn recording_for_a_closed_scope_is_ignored() {
        let mut scopes = DependencyScopes::new();
        let menu = descriptor("menu", &[]);
        let stored: BTreeSet<Dependency> = [Dependency::from("links")].into_iter().collect();

        scopes.record_dependencies(&menu, &stored);

        assert_eq!(scopes.open_count(), 0);
        assert!(scopes.dependencies(&menu).is_empty());
    }

    #[test]
    fn closed_scope_falls_back_to_declared_dependencies() {
        let scopes = DependencyScopes::new();
        let menu = descriptor("menu", &["navigation"]);

        assert_eq!(tags(&scopes.dependencies(&menu)), vec!["navigation"]);
    }
}
