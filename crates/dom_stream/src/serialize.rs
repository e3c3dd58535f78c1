//! HTML fragment serialization (`innerHTML`) of snapshot nodes.

use crate::types::{ElementNamespace, Node};
use memchr::{memchr, memchr2, memchr3};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];

// Scripting is off in the scratch document, so <noscript> is ordinary markup.
const RAW_TEXT_PARENTS: &[&str] = &[
    "style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

/// Serialize the children of `node` (template contents for a template).
pub fn inner_html(node: &Node) -> String {
    let mut out = String::new();
    match node {
        Node::Element {
            contents: Some(contents),
            ..
        } => serialize_children(&mut out, node, contents),
        _ => serialize_children(&mut out, node, node.children()),
    }
    out
}

pub fn outer_html(node: &Node) -> String {
    let mut out = String::new();
    serialize_node(&mut out, None, node);
    out
}

fn serialize_children(out: &mut String, parent: &Node, children: &[Node]) {
    for child in children {
        serialize_node(out, Some(parent), child);
    }
}

fn serialize_node(out: &mut String, parent: Option<&Node>, node: &Node) {
    match node {
        Node::Fragment { children } => serialize_children(out, node, children),
        Node::Element {
            name,
            namespace,
            attributes,
            contents,
            children,
        } => {
            out.push('<');
            out.push_str(name);
            for (attr, value) in attributes {
                out.push(' ');
                out.push_str(attr);
                out.push_str("=\"");
                escape_into(out, value, true);
                out.push('"');
            }
            out.push('>');
            if *namespace == ElementNamespace::Html && VOID_ELEMENTS.contains(&&**name) {
                return;
            }
            match contents {
                Some(contents) => serialize_children(out, node, contents),
                None => serialize_children(out, node, children),
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        Node::Text { text } => {
            let raw = parent.is_some_and(|parent| {
                RAW_TEXT_PARENTS
                    .iter()
                    .any(|raw_parent| parent.is_html_element(raw_parent))
            });
            if raw {
                out.push_str(text);
            } else {
                escape_into(out, text, false);
            }
        }
        Node::Comment { text } => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
    }
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    let bytes = text.as_bytes();
    let special = if attribute {
        memchr2(b'&', b'"', bytes)
    } else {
        memchr3(b'&', b'<', b'>', bytes)
    };
    // 0xA0 is the last byte of U+00A0; other characters may share it.
    let needs_escape = special.is_some() || memchr(0xA0, bytes).is_some();
    if !needs_escape {
        out.push_str(text);
        return;
    }
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '\u{A0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn el(name: &str, attributes: &[(&str, &str)], children: Vec<Node>) -> Node {
        Node::Element {
            name: Arc::from(name),
            namespace: ElementNamespace::Html,
            attributes: attributes
                .iter()
                .map(|(n, v)| (Arc::from(*n), v.to_string()))
                .collect(),
            contents: None,
            children,
        }
    }

    fn text(data: &str) -> Node {
        Node::Text { text: data.into() }
    }

    #[test]
    fn escapes_text_and_attributes() {
        let tree = Node::Fragment {
            children: vec![
                el("a", &[("title", "\"x\" & <y>")], vec![text("1 < 2 & 3 > 0\u{A0}")]),
                el("br", &[], vec![]),
            ],
        };
        assert_eq!(
            inner_html(&tree),
            "<a title=\"&quot;x&quot; &amp; <y>\">1 &lt; 2 &amp; 3 &gt; 0&nbsp;</a><br>"
        );
    }

    #[test]
    fn no_break_space_escapes_in_text_and_attributes_alike() {
        let tree = Node::Fragment {
            children: vec![el("b", &[("title", "a\u{A0}b")], vec![text("c\u{A0}d")])],
        };
        assert_eq!(
            inner_html(&tree),
            "<b title=\"a&nbsp;b\">c&nbsp;d</b>"
        );

        // U+00E0 also ends in byte 0xA0 and stays as is.
        let tree = Node::Fragment {
            children: vec![el("b", &[("title", "\u{E0}")], vec![text("\u{E0}")])],
        };
        assert_eq!(inner_html(&tree), "<b title=\"\u{E0}\">\u{E0}</b>");
    }

    #[test]
    fn raw_text_children_are_verbatim() {
        let tree = Node::Fragment {
            children: vec![el("script", &[], vec![text("if (a < b && c) {}")])],
        };
        assert_eq!(inner_html(&tree), "<script>if (a < b && c) {}</script>");
    }

    #[test]
    fn template_serializes_its_contents() {
        let template = Node::Element {
            name: Arc::from("template"),
            namespace: ElementNamespace::Html,
            attributes: Vec::new(),
            contents: Some(vec![text("b"), Node::Comment { text: "c".into() }]),
            children: Vec::new(),
        };
        assert_eq!(inner_html(&template), "b<!--c-->");
        assert_eq!(outer_html(&template), "<template>b<!--c--></template>");
    }

    #[test]
    fn foreign_elements_always_close() {
        let tree = Node::Element {
            name: Arc::from("br"),
            namespace: ElementNamespace::Svg,
            attributes: Vec::new(),
            contents: None,
            children: Vec::new(),
        };
        assert_eq!(outer_html(&tree), "<br></br>");
    }
}
