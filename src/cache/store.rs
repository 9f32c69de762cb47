//! Backing store contract and the in-memory implementation.
//!
//! The orchestrator only ever talks to `dyn CacheStore`. `MemoryStore` is a
//! bounded LRU used by the binary and the tests.

use std::collections::BTreeSet;
use std::sync::RwLock;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use super::config::CacheConfig;
use super::descriptor::CacheDescriptor;
use super::keys::{CacheKey, Dependency};
use super::lock::recover;
use super::registry::DependencyRegistry;

const METRIC_STORE_EVICT: &str = "fragcache_store_evict_total";

/// Result of a store read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Previously stored, fully materialized content and the dependencies it
    /// was stored with.
    Hit {
        content: String,
        dependencies: BTreeSet<Dependency>,
    },
    /// Nothing stored under the descriptor's key.
    Absent,
}

impl Lookup {
    /// Hit without recorded dependencies.
    pub fn hit(content: impl Into<String>) -> Self {
        Self::Hit {
            content: content.into(),
            dependencies: BTreeSet::new(),
        }
    }
}

/// Content handed to the store after a fresh render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub content: String,
    /// Declared dependencies plus those of cacheable descendants.
    pub dependencies: BTreeSet<Dependency>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store cannot be reached right now. Reads degrade to a miss.
    #[error("cache store unavailable: {reason}")]
    Unavailable { reason: String },
    /// The store was reached but the operation failed.
    #[error("cache store operation failed: {reason}")]
    Failed { reason: String },
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Key/value store holding rendered fragments.
///
/// Implementations own eviction, expiry and cross-traversal consistency. A
/// `get` must return promptly; the orchestrator additionally bounds it with a
/// timeout.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, descriptor: &CacheDescriptor) -> Result<Lookup, StoreError>;

    async fn set(&self, descriptor: &CacheDescriptor, entry: CacheEntry) -> Result<(), StoreError>;
}

struct StoredEntry {
    content: String,
    expires_at: Option<OffsetDateTime>,
}

impl StoredEntry {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

struct MemoryState {
    entries: LruCache<CacheKey, StoredEntry>,
    registry: DependencyRegistry,
}

/// Process-wide in-memory fragment store with LRU eviction.
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                entries: LruCache::new(config.memory_store_limit_non_zero()),
                registry: DependencyRegistry::new(),
            }),
        }
    }

    /// Remove one key.
    pub fn invalidate(&self, key: &CacheKey) {
        let mut state = recover(self.state.write(), "invalidate");
        state.entries.pop(key);
        state.registry.unregister(key);
    }

    /// Remove every fragment built from `dependency`. Returns how many were dropped.
    pub fn invalidate_dependency(&self, dependency: &Dependency) -> usize {
        let mut state = recover(self.state.write(), "invalidate_dependency");
        let keys = state.registry.take_dependents(dependency);
        for key in &keys {
            state.entries.pop(key);
        }
        debug!(
            cache = "memory",
            dependency = %dependency,
            removed = keys.len(),
            tracked_keys = state.registry.key_count(),
            tracked_dependencies = state.registry.dependency_count(),
            "invalidated dependents"
        );
        keys.len()
    }

    pub fn clear(&self) {
        let mut state = recover(self.state.write(), "clear");
        state.entries.clear();
        state.registry.clear();
    }

    /// Stored content for `key`, ignoring expiry and recency.
    pub fn peek(&self, key: &CacheKey) -> Option<String> {
        recover(self.state.read(), "peek")
            .entries
            .peek(key)
            .map(|entry| entry.content.clone())
    }

    pub fn dependencies_of(&self, key: &CacheKey) -> BTreeSet<Dependency> {
        recover(self.state.read(), "dependencies_of")
            .registry
            .dependencies_for(key)
    }

    pub fn len(&self) -> usize {
        recover(self.state.read(), "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, descriptor: &CacheDescriptor) -> Result<Lookup, StoreError> {
        let key = descriptor.key();
        let mut state = recover(self.state.write(), "get");

        match state.entries.get(key) {
            None => return Ok(Lookup::Absent),
            Some(entry) if !entry.is_expired(OffsetDateTime::now_utc()) => {
                let content = entry.content.clone();
                let dependencies = state.registry.dependencies_for(key);
                return Ok(Lookup::Hit {
                    content,
                    dependencies,
                });
            }
            Some(_) => {}
        }

        state.entries.pop(key);
        state.registry.unregister(key);
        debug!(cache = "memory", key = %key, "dropped expired fragment");
        Ok(Lookup::Absent)
    }

    async fn set(&self, descriptor: &CacheDescriptor, entry: CacheEntry) -> Result<(), StoreError> {
        let expires_at = match descriptor.expires_after() {
            None => None,
            Some(after) => {
                let after = time::Duration::try_from(after)
                    .map_err(|err| StoreError::failed(format!("invalid expiry: {err}")))?;
                let at = OffsetDateTime::now_utc()
                    .checked_add(after)
                    .ok_or_else(|| StoreError::failed("expiry overflows the calendar"))?;
                Some(at)
            }
        };

        let key = descriptor.key().clone();
        let mut state = recover(self.state.write(), "set");
        let evicted = state.entries.push(
            key.clone(),
            StoredEntry {
                content: entry.content,
                expires_at,
            },
        );
        if let Some((evicted_key, _)) = evicted {
            if evicted_key != key {
                state.registry.unregister(&evicted_key);
                counter!(METRIC_STORE_EVICT).increment(1);
            }
        }
        state.registry.register(key, entry.dependencies);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::time::Duration;

    use super::*;

    fn entry(content: &str, deps: &[&str]) -> CacheEntry {
        CacheEntry {
            content: content.to_string(),
            dependencies: deps.iter().copied().map(Dependency::from).collect(),
        }
    }

    #[tokio::test]
    async fn roundtrip_by_key() {
        let store = MemoryStore::new(&CacheConfig::default());
        let writer = CacheDescriptor::new(CacheKey::new("menu"));

        assert_eq!(store.get(&writer).await, Ok(Lookup::Absent));
        store
            .set(&writer, entry("<nav/>", &[]))
            .await
            .expect("set succeeds");

        // A different descriptor instance with an equal key reads the same entry.
        let reader = CacheDescriptor::new(CacheKey::new("menu"));
        assert_eq!(store.get(&reader).await, Ok(Lookup::hit("<nav/>")));
    }

    #[tokio::test]
    async fn lru_eviction_unregisters_dependencies() {
        let config = CacheConfig {
            memory_store_limit: 2,
            ..Default::default()
        };
        let store = MemoryStore::new(&config);

        for name in ["a", "b", "c"] {
            let descriptor = CacheDescriptor::new(CacheKey::new(name));
            store
                .set(&descriptor, entry(name, &["site"]))
                .await
                .expect("set succeeds");
        }

        assert_eq!(store.len(), 2);
        assert!(store.peek(&CacheKey::new("a")).is_none());
        assert!(store.dependencies_of(&CacheKey::new("a")).is_empty());
        assert_eq!(store.invalidate_dependency(&Dependency::from("site")), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn overwrite_same_key_keeps_one_entry() {
        let store = MemoryStore::new(&CacheConfig::default());
        let descriptor = CacheDescriptor::new(CacheKey::new("menu"));

        store.set(&descriptor, entry("v1", &["nav"])).await.unwrap();
        store.set(&descriptor, entry("v2", &["site"])).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.peek(descriptor.key()).as_deref(), Some("v2"));
        assert_eq!(
            store.dependencies_of(descriptor.key()),
            [Dependency::from("site")].into_iter().collect()
        );
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let store = MemoryStore::new(&CacheConfig::default());
        let descriptor =
            CacheDescriptor::new(CacheKey::new("clock")).with_expiry(Duration::ZERO);

        store.set(&descriptor, entry("12:00", &[])).await.unwrap();

        assert_eq!(store.get(&descriptor).await, Ok(Lookup::Absent));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn invalidate_dependency_only_touches_dependents() {
        let store = MemoryStore::new(&CacheConfig::default());
        let header = CacheDescriptor::new(CacheKey::new("header"));
        let tags = CacheDescriptor::new(CacheKey::new("tags"));

        store.set(&header, entry("h", &["site"])).await.unwrap();
        store.set(&tags, entry("t", &["tags"])).await.unwrap();

        assert_eq!(store.invalidate_dependency(&Dependency::from("site")), 1);
        assert_eq!(store.get(&header).await, Ok(Lookup::Absent));
        assert_eq!(
            store.get(&tags).await,
            Ok(Lookup::Hit {
                content: "t".into(),
                dependencies: [Dependency::from("tags")].into_iter().collect(),
            })
        );
    }

    #[tokio::test]
    async fn hit_reports_stored_dependencies() {
        let store = MemoryStore::new(&CacheConfig::default());
        let writer = CacheDescriptor::new(CacheKey::new("menu")).with_dependency("navigation");
        store
            .set(&writer, entry("<nav/>", &["links", "navigation"]))
            .await
            .expect("set succeeds");

        let reader = CacheDescriptor::new(CacheKey::new("menu"));
        let Ok(Lookup::Hit { dependencies, .. }) = store.get(&reader).await else {
            panic!("expected a hit");
        };
        let tags: Vec<&str> = dependencies.iter().map(Dependency::as_str).collect();
        assert_eq!(tags, ["links", "navigation"]);
    }

    #[tokio::test]
    async fn invalidate_and_clear() {
        let store = MemoryStore::new(&CacheConfig::default());
        let menu = CacheDescriptor::new(CacheKey::new("menu"));
        let footer = CacheDescriptor::new(CacheKey::new("footer"));

        store.set(&menu, entry("m", &[])).await.unwrap();
        store.set(&footer, entry("f", &[])).await.unwrap();

        store.invalidate(menu.key());
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn recovers_from_poisoned_lock() {
        let store = MemoryStore::new(&CacheConfig::default());

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.state.write().expect("state lock should be acquired");
            panic!("poison state lock");
        }));

        let descriptor = CacheDescriptor::new(CacheKey::new("menu"));
        store.set(&descriptor, entry("m", &[])).await.unwrap();
        assert_eq!(store.get(&descriptor).await, Ok(Lookup::hit("m")));
    }
}
