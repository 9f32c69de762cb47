//! Render output in its two shapes: a markup tree still to be written, or
//! flat text ready to cache and deliver.

/// One node of an unmaterialized markup tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Text content, escaped when written.
    Text(String),
    /// Markup emitted verbatim (typically an already rendered child).
    Raw(String),
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<Node>,
    },
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn raw(value: impl Into<String>) -> Self {
        Self::Raw(value.into())
    }

    pub fn element(tag: impl Into<String>, children: Vec<Node>) -> Self {
        Self::Element {
            tag: tag.into(),
            attributes: Vec::new(),
            children,
        }
    }

    /// Add an attribute; only meaningful on elements.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Element { attributes, .. } = &mut self {
            attributes.push((name.into(), value.into()));
        }
        self
    }

    fn write_to(&self, out: &mut String) {
        match self {
            Self::Text(text) => push_escaped_text(out, text),
            Self::Raw(markup) => out.push_str(markup),
            Self::Element {
                tag,
                attributes,
                children,
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
                out.push('>');
                for child in children {
                    child.write_to(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

/// Sequence of sibling nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    nodes: Vec<Node>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.write_to(&mut out);
        }
        out
    }
}

impl From<Vec<Node>> for Fragment {
    fn from(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }
}

impl FromIterator<Node> for Fragment {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

/// Content of a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutput {
    Tree(Fragment),
    Text(String),
}

impl RenderOutput {
    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    pub fn is_materialized(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Tree(_) => None,
        }
    }

    /// Write a tree out to text in place. Text is left untouched, so calling
    /// this again returns the same snapshot.
    pub fn materialize(&mut self) -> &str {
        if let Self::Tree(fragment) = self {
            *self = Self::Text(fragment.to_markup());
        }
        self.as_text().unwrap_or_default()
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Tree(fragment) => fragment.to_markup(),
        }
    }
}

impl From<String> for RenderOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RenderOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Fragment> for RenderOutput {
    fn from(fragment: Fragment) -> Self {
        Self::Tree(fragment)
    }
}

fn push_escaped_text(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

pub(crate) fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\n' | '\r' | '\t' => escaped.push(' '),
            _ => escaped.push(ch),
        }
    }
    escaped
}
