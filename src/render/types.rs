use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::cache::{CacheDescriptor, CacheError, CacheKey, TraversalStats};
use crate::domain::RenderOutput;

/// Declarative description of one component and its children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentSpec {
    pub name: String,
    /// Element wrapping the component's own text and its children.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Content already known before rendering; the cache is not consulted.
    #[serde(default)]
    pub prerendered: Option<String>,
    #[serde(default)]
    pub cache: Option<CacheSpec>,
    #[serde(default)]
    pub children: Vec<ComponentSpec>,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn prerendered(mut self, content: impl Into<String>) -> Self {
        self.prerendered = Some(content.into());
        self
    }

    pub fn cached(mut self, cache: CacheSpec) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn child(mut self, child: ComponentSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// Cache eligibility declared by a component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSpec {
    pub key: String,
    #[serde(default)]
    pub vary_by: BTreeMap<String, String>,
    #[serde(default)]
    pub expires_after_secs: Option<u64>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl CacheSpec {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn vary_by(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vary_by.insert(name.into(), value.into());
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn expires_after_secs(mut self, secs: u64) -> Self {
        self.expires_after_secs = Some(secs);
        self
    }

    /// Build a fresh descriptor. Every call yields a new identity.
    pub fn descriptor(&self) -> CacheDescriptor {
        let key = self
            .vary_by
            .iter()
            .fold(CacheKey::new(self.key.as_str()), |key, (name, value)| {
                key.vary_by(name.as_str(), value.as_str())
            });
        let descriptor = CacheDescriptor::new(key)
            .with_dependencies(self.dependencies.iter().map(String::as_str));
        match self.expires_after_secs {
            Some(secs) => descriptor.with_expiry(Duration::from_secs(secs)),
            None => descriptor,
        }
    }
}

/// Top-level document read by the `render` command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderTree {
    pub root: ComponentSpec,
}

impl RenderTree {
    pub fn from_toml(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation failed: {message}")]
    Failed { message: String },
}

impl GenerationError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Errors surfaced by a render traversal. Cache faults and generation faults
/// stay distinguishable.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("component `{component}` failed to render")]
    Generation {
        component: String,
        #[source]
        source: GenerationError,
    },
}

/// Produces a component's content from its spec and its rendered children.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        spec: &ComponentSpec,
        children: Vec<String>,
    ) -> Result<RenderOutput, GenerationError>;
}

/// Output of one traversal together with its cache counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderReport {
    pub output: String,
    pub stats: TraversalStats,
}
