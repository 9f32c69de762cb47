//! Fragment render cache.
//!
//! Decides, per component of a render tree, whether to serve stored output,
//! let the pipeline generate it, and store freshly generated output:
//!
//! - **Descriptors** declare that a component instance is cacheable under a key
//! - **Scopes** track which cacheable components are mid-generation
//! - **Orchestrator** runs the `will_render` / `did_render` / `finalized` hooks
//! - **Store** is the backing key/value store (`MemoryStore` in-process)
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `fragcache.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! diagnostic_mode = false
//! read_timeout_ms = 250
//! # ... see config.rs for all options
//! ```

mod config;
mod descriptor;
mod keys;
mod lock;
pub mod marker;
mod orchestrator;
mod registry;
mod scope;
mod store;
mod traversal;

pub use config::CacheConfig;
pub(crate) use config::{
    DEFAULT_MEMORY_STORE_LIMIT, DEFAULT_READ_TIMEOUT_MS, DEFAULT_WRITE_TIMEOUT_MS,
};
pub use descriptor::{CacheDescriptor, DescriptorId};
pub use keys::{CacheKey, Dependency, hash_value};
pub use orchestrator::{CacheError, Orchestrator, RenderCache, TraversalOptions, TraversalStats};
pub use registry::DependencyRegistry;
pub use scope::{DependencyScopes, ScopeManager};
pub use store::{CacheEntry, CacheStore, Lookup, MemoryStore, StoreError};
pub use traversal::TraversalState;
