use std::sync::Arc;

/// Element namespaces produced by HTML tree construction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementNamespace {
    Html,
    Svg,
    MathMl,
    Other(Arc<str>),
}

impl ElementNamespace {
    pub const HTML_URL: &'static str = "http://www.w3.org/1999/xhtml";
    pub const SVG_URL: &'static str = "http://www.w3.org/2000/svg";
    pub const MATHML_URL: &'static str = "http://www.w3.org/1998/Math/MathML";

    pub fn from_url(url: &str) -> Self {
        match url {
            Self::HTML_URL => ElementNamespace::Html,
            Self::SVG_URL => ElementNamespace::Svg,
            Self::MATHML_URL => ElementNamespace::MathMl,
            other => ElementNamespace::Other(Arc::from(other)),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            ElementNamespace::Html => Self::HTML_URL,
            ElementNamespace::Svg => Self::SVG_URL,
            ElementNamespace::MathMl => Self::MATHML_URL,
            ElementNamespace::Other(url) => url,
        }
    }

    /// Prefix used by html5lib-style tree dumps; `None` for HTML.
    pub fn dump_prefix(&self) -> Option<&str> {
        match self {
            ElementNamespace::Html => None,
            ElementNamespace::Svg => Some("svg"),
            ElementNamespace::MathMl => Some("math"),
            ElementNamespace::Other(url) => Some(url),
        }
    }
}

/// Owned, tree-shaped snapshot used to compare and serialize scratch and
/// destination trees independently of their arenas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// A child list without a node of its own: a stream root or template contents.
    Fragment { children: Vec<Node> },
    Element {
        name: Arc<str>,
        namespace: ElementNamespace,
        attributes: Vec<(Arc<str>, String)>,
        /// Present for `<template>` elements only.
        contents: Option<Vec<Node>>,
        children: Vec<Node>,
    },
    Text { text: String },
    Comment { text: String },
}

impl Node {
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Fragment { children } | Node::Element { children, .. } => children,
            Node::Text { .. } | Node::Comment { .. } => &[],
        }
    }

    pub fn is_html_element(&self, local: &str) -> bool {
        matches!(
            self,
            Node::Element { name, namespace: ElementNamespace::Html, .. } if &**name == local
        )
    }

    /// Concatenated text of all descendant text nodes, excluding template contents.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Node::Text { text } => out.push_str(text),
                Node::Comment { .. } => {}
                Node::Fragment { children } | Node::Element { children, .. } => {
                    stack.extend(children.iter().rev());
                }
            }
        }
        out
    }

    /// Number of nodes in this subtree, template contents included.
    pub fn node_count(&self) -> usize {
        let mut count = 0usize;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            match node {
                Node::Element {
                    contents, children, ..
                } => {
                    stack.extend(children.iter());
                    if let Some(contents) = contents {
                        stack.extend(contents.iter());
                    }
                }
                Node::Fragment { children } => stack.extend(children.iter()),
                Node::Text { .. } | Node::Comment { .. } => {}
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(name: &str, children: Vec<Node>) -> Node {
        Node::Element {
            name: Arc::from(name),
            namespace: ElementNamespace::Html,
            attributes: Vec::new(),
            contents: None,
            children,
        }
    }

    #[test]
    fn text_content_is_in_tree_order() {
        let tree = Node::Fragment {
            children: vec![
                Node::Text { text: "a".into() },
                element(
                    "p",
                    vec![
                        Node::Text { text: "b".into() },
                        Node::Comment { text: "x".into() },
                        Node::Text { text: "c".into() },
                    ],
                ),
                Node::Text { text: "d".into() },
            ],
        };
        assert_eq!(tree.text_content(), "abcd");
        assert_eq!(tree.node_count(), 7);
    }

    #[test]
    fn namespace_urls_round_trip() {
        for ns in [
            ElementNamespace::Html,
            ElementNamespace::Svg,
            ElementNamespace::MathMl,
        ] {
            assert_eq!(ElementNamespace::from_url(ns.url()), ns);
        }
        assert_eq!(
            ElementNamespace::from_url("urn:x"),
            ElementNamespace::Other(Arc::from("urn:x"))
        );
    }
}
