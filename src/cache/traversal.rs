//! Per-traversal cache bookkeeping.

use std::collections::HashSet;

use super::descriptor::{CacheDescriptor, DescriptorId};
use super::keys::CacheKey;

/// State owned by one render pass. Never shared between passes.
#[derive(Debug, Default)]
pub struct TraversalState {
    served_from_cache: HashSet<DescriptorId>,
    open_scopes: HashSet<DescriptorId>,
    written: HashSet<CacheKey>,
}

impl TraversalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_served(&mut self, descriptor: &CacheDescriptor) {
        self.served_from_cache.insert(descriptor.id());
    }

    pub fn was_served(&self, descriptor: &CacheDescriptor) -> bool {
        self.served_from_cache.contains(&descriptor.id())
    }

    /// Returns false if the scope was already open.
    pub fn open(&mut self, descriptor: &CacheDescriptor) -> bool {
        self.open_scopes.insert(descriptor.id())
    }

    /// Returns true only when the scope was open. Closing twice is a no-op.
    pub fn close(&mut self, descriptor: &CacheDescriptor) -> bool {
        self.open_scopes.remove(&descriptor.id())
    }

    pub fn is_open(&self, descriptor: &CacheDescriptor) -> bool {
        self.open_scopes.contains(&descriptor.id())
    }

    /// Claim the descriptor's key for a store write. Returns false if the key
    /// was already written during this traversal.
    pub fn claim_write(&mut self, descriptor: &CacheDescriptor) -> bool {
        self.written.insert(descriptor.key().clone())
    }

    pub fn open_count(&self) -> usize {
        self.open_scopes.len()
    }

    pub fn served_count(&self) -> usize {
        self.served_from_cache.len()
    }
}
