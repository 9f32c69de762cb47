use async_trait::async_trait;

use crate::domain::{Fragment, Node, RenderOutput};

use super::types::{ComponentSpec, Generator, GenerationError};

/// Builds a markup tree: the component's text followed by its children,
/// inside `tag` when one is set. Output is left unmaterialized.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupGenerator;

#[async_trait]
impl Generator for MarkupGenerator {
    async fn generate(
        &self,
        spec: &ComponentSpec,
        children: Vec<String>,
    ) -> Result<RenderOutput, GenerationError> {
        let mut nodes = Vec::with_capacity(children.len() + 1);
        if let Some(text) = &spec.text {
            nodes.push(Node::text(text.as_str()));
        }
        nodes.extend(children.into_iter().map(Node::Raw));

        let fragment = match &spec.tag {
            Some(tag) => Fragment::from(vec![
                Node::element(tag.as_str(), nodes).with_attribute("data-component", &spec.name),
            ]),
            None => Fragment::from(nodes),
        };
        Ok(RenderOutput::Tree(fragment))
    }
}
