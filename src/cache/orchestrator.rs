//! Render cache orchestrator.
//!
//! The rendering pipeline calls three hooks around every component instance:
//!
//! 1. [`Orchestrator::will_render`] opens the component's scope and serves
//!    cached content when the store has it.
//! 2. [`Orchestrator::did_render`] materializes the content and, for a fresh
//!    render, writes it to the store once.
//! 3. [`Orchestrator::finalized`] closes the scope if one was opened.
//!
//! [`RenderCache`] is the process-wide handle that owns the store; each
//! traversal gets its own [`Orchestrator`] so concurrent renders never see each
//! other's bookkeeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::domain::Component;

use super::config::CacheConfig;
use super::descriptor::CacheDescriptor;
use super::marker;
use super::scope::{DependencyScopes, ScopeManager};
use super::store::{CacheEntry, CacheStore, Lookup, StoreError};
use super::traversal::TraversalState;

const METRIC_HIT: &str = "fragcache_render_cache_hit_total";
const METRIC_MISS: &str = "fragcache_render_cache_miss_total";
const METRIC_UNAVAILABLE: &str = "fragcache_render_cache_unavailable_total";
const METRIC_WRITE: &str = "fragcache_render_cache_write_total";
const METRIC_WRITE_FAILURE: &str = "fragcache_render_cache_write_failure_total";
const METRIC_READ_MS: &str = "fragcache_render_cache_read_ms";

/// A store read failed for a reason other than unavailability.
///
/// Returned from `will_render` so the pipeline can tell cache faults apart from
/// generation faults.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read `{key}` from the cache store")]
    Read {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// Settings a single traversal runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalOptions {
    pub enabled: bool,
    pub diagnostic_mode: bool,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl From<&CacheConfig> for TraversalOptions {
    fn from(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            diagnostic_mode: config.diagnostic_mode,
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
        }
    }
}

/// Counters for one traversal. `misses` includes unavailable reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    pub hits: u64,
    pub misses: u64,
    pub unavailable: u64,
    pub writes: u64,
    pub write_failures: u64,
}

/// Shared entry point: owns the backing store and hands out traversals.
#[derive(Clone)]
pub struct RenderCache {
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
}

impl RenderCache {
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn options(&self) -> TraversalOptions {
        TraversalOptions::from(&self.config)
    }

    /// Start a traversal with the configured options.
    pub fn begin_traversal(&self) -> Orchestrator<DependencyScopes> {
        self.begin_traversal_with(self.options(), DependencyScopes::new())
    }

    pub fn begin_traversal_with<M: ScopeManager>(
        &self,
        options: TraversalOptions,
        scopes: M,
    ) -> Orchestrator<M> {
        Orchestrator {
            store: Arc::clone(&self.store),
            options,
            state: TraversalState::new(),
            scopes,
            stats: TraversalStats::default(),
        }
    }
}

/// Lifecycle hooks for one traversal.
pub struct Orchestrator<M: ScopeManager = DependencyScopes> {
    store: Arc<dyn CacheStore>,
    options: TraversalOptions,
    state: TraversalState,
    scopes: M,
    stats: TraversalStats,
}

impl<M: ScopeManager> Orchestrator<M> {
    pub fn options(&self) -> &TraversalOptions {
        &self.options
    }

    pub fn state(&self) -> &TraversalState {
        &self.state
    }

    pub fn scopes(&self) -> &M {
        &self.scopes
    }

    pub fn stats(&self) -> TraversalStats {
        self.stats
    }

    /// Open the component's scope and try to serve it from the store.
    ///
    /// On a hit the content slot receives the stored text as-is and the
    /// pipeline skips generation. On a miss the slot stays empty. Content that
    /// is already present, or a component without a descriptor, is left alone.
    #[instrument(skip_all, fields(component = %component.name()))]
    pub async fn will_render(&mut self, component: &mut Component) -> Result<(), CacheError> {
        if component.has_content() {
            debug!("content already present, skipping cache lookup");
            return Ok(());
        }
        let Some(descriptor) = self.cacheable(component) else {
            return Ok(());
        };

        if self.state.open(&descriptor) {
            self.scopes.enter_scope(&descriptor);
        }

        match self.read(&descriptor).await {
            Ok(Lookup::Hit {
                content,
                dependencies,
            }) => {
                self.state.mark_served(&descriptor);
                self.scopes.record_dependencies(&descriptor, &dependencies);
                component.set_content(content);
                self.stats.hits += 1;
                counter!(METRIC_HIT).increment(1);
                debug!(
                    cache = "render",
                    outcome = "hit",
                    key = %descriptor.key(),
                    fingerprint = descriptor.key().fingerprint(),
                    "serving cached fragment"
                );
                Ok(())
            }
            Ok(Lookup::Absent) => {
                self.record_miss(component, &descriptor);
                Ok(())
            }
            Err(error) if error.is_unavailable() => {
                self.stats.unavailable += 1;
                counter!(METRIC_UNAVAILABLE).increment(1);
                warn!(
                    cache = "render",
                    outcome = "unavailable",
                    key = %descriptor.key(),
                    error = %error,
                    "cache store unavailable, rendering uncached"
                );
                self.record_miss(component, &descriptor);
                Ok(())
            }
            Err(source) => Err(CacheError::Read {
                key: descriptor.key().to_string(),
                source,
            }),
        }
    }

    /// Materialize the component's content and store fresh renders.
    ///
    /// Only content generated after a miss in this traversal is stored; served
    /// and prerendered content is not. Never fails: a store write error is
    /// logged and the render goes on.
    #[instrument(skip_all, fields(component = %component.name()))]
    pub async fn did_render(&mut self, component: &mut Component) {
        let descriptor = self.cacheable(component);
        let generated = component.has_content();
        let content = component.materialize();

        let Some(descriptor) = descriptor.filter(|descriptor| {
            generated && self.state.is_open(descriptor) && !self.state.was_served(descriptor)
        }) else {
            return;
        };
        if !self.state.claim_write(&descriptor) {
            debug!(
                cache = "render",
                key = %descriptor.key(),
                "key already stored during this traversal"
            );
            return;
        }

        let entry = CacheEntry {
            content: content.to_owned(),
            dependencies: self.scopes.dependencies(&descriptor),
        };
        self.write(&descriptor, entry).await;
    }

    /// Close the component's scope. Safe to call whatever ran before.
    pub fn finalized(&mut self, component: &Component) {
        let Some(descriptor) = component.descriptor() else {
            return;
        };
        if self.state.close(descriptor) {
            self.scopes.exit_scope(descriptor);
        }
    }

    fn cacheable(&self, component: &Component) -> Option<CacheDescriptor> {
        if !self.options.enabled {
            return None;
        }
        component.descriptor().cloned()
    }

    fn record_miss(&mut self, component: &mut Component, descriptor: &CacheDescriptor) {
        self.stats.misses += 1;
        counter!(METRIC_MISS).increment(1);
        debug!(
            cache = "render",
            outcome = "miss",
            key = %descriptor.key(),
            fingerprint = descriptor.key().fingerprint(),
            "rendering fragment"
        );
        if marker::mark_uncached(component, self.options.diagnostic_mode) {
            debug!(wrapper = marker::FALLBACK_WRAPPER, "marked cache miss");
        }
    }

    async fn read(&self, descriptor: &CacheDescriptor) -> Result<Lookup, StoreError> {
        let started = Instant::now();
        let result = match timeout(self.options.read_timeout, self.store.get(descriptor)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::unavailable(format!(
                "read timed out after {}ms",
                self.options.read_timeout.as_millis()
            ))),
        };
        histogram!(METRIC_READ_MS).record(started.elapsed().as_secs_f64() * 1000.0);
        result
    }

    async fn write(&mut self, descriptor: &CacheDescriptor, entry: CacheEntry) {
        let result = match timeout(self.options.write_timeout, self.store.set(descriptor, entry)).await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::unavailable(format!(
                "write timed out after {}ms",
                self.options.write_timeout.as_millis()
            ))),
        };

        match result {
            Ok(()) => {
                self.stats.writes += 1;
                counter!(METRIC_WRITE).increment(1);
                debug!(cache = "render", key = %descriptor.key(), "stored fragment");
            }
            Err(error) => {
                self.stats.write_failures += 1;
                counter!(METRIC_WRITE_FAILURE).increment(1);
                warn!(
                    cache = "render",
                    key = %descriptor.key(),
                    error = %error,
                    "failed to store fragment"
                );
            }
        }
    }
}
