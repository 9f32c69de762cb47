//! Reference render pipeline.
//!
//! Walks a `ComponentSpec` tree and drives the orchestrator hooks in the order
//! the cache expects: `will_render`, generation (children first), `did_render`,
//! then `finalized`, which runs even when an earlier step failed.

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, instrument};

use crate::cache::marker::{self, FALLBACK_WRAPPER};
use crate::cache::{Orchestrator, RenderCache, ScopeManager};
use crate::domain::{Component, RenderOutput};
use crate::domain::output::escape_attribute;

use super::types::{ComponentSpec, Generator, RenderError, RenderReport};

pub struct Renderer<G> {
    cache: RenderCache,
    generator: G,
}

impl<G: Generator> Renderer<G> {
    pub fn new(cache: RenderCache, generator: G) -> Self {
        Self { cache, generator }
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// Render `root` in a fresh traversal.
    pub async fn render(&self, root: &ComponentSpec) -> Result<String, RenderError> {
        Ok(self.render_with_report(root).await?.output)
    }

    #[instrument(skip_all, fields(root = %root.name))]
    pub async fn render_with_report(&self, root: &ComponentSpec) -> Result<RenderReport, RenderError> {
        let mut traversal = self.cache.begin_traversal();
        let output = self.render_in(&mut traversal, root).await?;
        let stats = traversal.stats();
        debug!(
            hits = stats.hits,
            misses = stats.misses,
            writes = stats.writes,
            served = traversal.state().served_count(),
            "traversal complete"
        );
        Ok(RenderReport { output, stats })
    }

    /// Render `root` inside a traversal the caller owns.
    pub async fn render_in<M: ScopeManager>(
        &self,
        traversal: &mut Orchestrator<M>,
        root: &ComponentSpec,
    ) -> Result<String, RenderError> {
        self.render_component(traversal, root).await
    }

    fn render_component<'a, M: ScopeManager>(
        &'a self,
        traversal: &'a mut Orchestrator<M>,
        spec: &'a ComponentSpec,
    ) -> BoxFuture<'a, Result<String, RenderError>> {
        async move {
            let mut component = Component::new(spec.name.as_str());
            if let Some(cache) = &spec.cache {
                component = component.with_descriptor(cache.descriptor());
            }
            if let Some(content) = &spec.prerendered {
                component.set_content(content.as_str());
            }

            let resolved = self.resolve(traversal, spec, &mut component).await;
            traversal.finalized(&component);
            resolved?;

            Ok(deliver(component))
        }
        .boxed()
    }

    async fn resolve<M: ScopeManager>(
        &self,
        traversal: &mut Orchestrator<M>,
        spec: &ComponentSpec,
        component: &mut Component,
    ) -> Result<(), RenderError> {
        if !component.has_content() {
            traversal.will_render(component).await?;
        }

        if !component.has_content() {
            let mut children = Vec::with_capacity(spec.children.len());
            for child in &spec.children {
                children.push(self.render_component(traversal, child).await?);
            }
            let output = self
                .generator
                .generate(spec, children)
                .await
                .map_err(|source| RenderError::Generation {
                    component: spec.name.clone(),
                    source,
                })?;
            component.set_content(output);
        }

        traversal.did_render(component).await;
        Ok(())
    }
}

/// Final text handed to the parent: the materialized content with the
/// component's wrappers applied, first wrapper innermost.
fn deliver(mut component: Component) -> String {
    let key = component.descriptor().map(|descriptor| descriptor.key().clone());
    let wrappers = component.wrappers().to_vec();
    let mut text = component
        .take_content()
        .map(RenderOutput::into_text)
        .unwrap_or_default();

    for wrapper in &wrappers {
        text = match (wrapper.as_str(), &key) {
            (FALLBACK_WRAPPER, Some(key)) => marker::decorate(key, &text),
            (name, _) => format!(
                "<div data-wrapper=\"{}\">{text}</div>",
                escape_attribute(name)
            ),
        };
    }
    text
}
