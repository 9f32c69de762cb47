//! The renderable unit the orchestrator hooks into.

use crate::cache::CacheDescriptor;

use super::output::RenderOutput;

/// One component instance within a traversal.
///
/// Holds an optional cache descriptor, the content slot the pipeline and the
/// orchestrator both write to, and the presentation wrappers to apply when the
/// content is delivered.
#[derive(Debug, Clone)]
pub struct Component {
    name: String,
    descriptor: Option<CacheDescriptor>,
    content: Option<RenderOutput>,
    wrappers: Vec<String>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: None,
            content: None,
            wrappers: Vec::new(),
        }
    }

    pub fn with_descriptor(mut self, descriptor: CacheDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> Option<&CacheDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    pub fn content(&self) -> Option<&RenderOutput> {
        self.content.as_ref()
    }

    pub fn set_content(&mut self, content: impl Into<RenderOutput>) {
        self.content = Some(content.into());
    }

    pub fn take_content(&mut self) -> Option<RenderOutput> {
        self.content.take()
    }

    /// Materialized content, if the slot holds text.
    pub fn text(&self) -> Option<&str> {
        self.content.as_ref().and_then(RenderOutput::as_text)
    }

    /// Ensure the slot holds text, substituting empty text when nothing was produced.
    pub fn materialize(&mut self) -> &str {
        self.content
            .get_or_insert_with(RenderOutput::empty)
            .materialize()
    }

    pub fn wrappers(&self) -> &[String] {
        &self.wrappers
    }

    pub fn has_wrapper(&self, name: &str) -> bool {
        self.wrappers.iter().any(|wrapper| wrapper == name)
    }

    pub fn add_wrapper(&mut self, name: impl Into<String>) {
        self.wrappers.push(name.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::output::{Fragment, Node};

    #[test]
    fn materialize_fills_empty_slot() {
        let mut component = Component::new("empty");
        assert_eq!(component.materialize(), "");
        assert_eq!(component.text(), Some(""));
    }

    #[test]
    fn materialize_flattens_tree() {
        let mut component = Component::new("list");
        component.set_content(Fragment::from(vec![Node::element(
            "ul",
            vec![Node::element("li", vec![Node::text("one")])],
        )]));

        assert_eq!(component.text(), None);
        assert_eq!(component.materialize(), "<ul><li>one</li></ul>");
        assert_eq!(component.text(), Some("<ul><li>one</li></ul>"));
    }

    #[test]
    fn wrappers_keep_insertion_order() {
        let mut component = Component::new("card");
        component.add_wrapper("outer");
        component.add_wrapper("inner");

        assert_eq!(component.wrappers(), ["outer", "inner"]);
        assert!(component.has_wrapper("inner"));
        assert!(!component.has_wrapper("missing"));
    }
}
