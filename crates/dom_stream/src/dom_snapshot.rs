use crate::types::Node;
use std::fmt::{self, Write};

/// Deterministic tree dump and equality rules for stream parity tests.
/// Not a stable format; meant for test comparisons only.
///
/// Equivalence rules:
/// - Node kinds, element names and namespaces must match.
/// - Attribute order is significant; names and values must match.
/// - Template contents are compared like children.
/// - Adjacent text nodes are merged first (when `merge_adjacent_text` is
///   set), since a stream may split text the one-shot parse keeps whole.
/// - Empty text nodes are dropped under the same option.
#[derive(Clone, Copy, Debug)]
pub struct DomSnapshotOptions {
    pub merge_adjacent_text: bool,
}

impl Default for DomSnapshotOptions {
    fn default() -> Self {
        Self {
            merge_adjacent_text: true,
        }
    }
}

#[derive(Debug)]
pub struct DomSnapshot {
    lines: Vec<String>,
}

impl DomSnapshot {
    pub fn new(root: &Node, options: DomSnapshotOptions) -> Self {
        let lines = flatten_root(root, options)
            .into_iter()
            .map(|entry| entry.line)
            .collect();
        Self { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for DomSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// First differing dump line, with the tree path leading to it.
#[derive(Debug)]
pub struct DomMismatch {
    path: String,
    line: usize,
    expected: String,
    actual: String,
    context: Vec<(String, String)>,
}

impl DomMismatch {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Zero-based index of the differing dump line.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl fmt::Display for DomMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DOM mismatch at {} (dump line {})", self.path, self.line + 1)?;
        writeln!(f, "expected: {}", self.expected)?;
        writeln!(f, "actual:   {}", self.actual)?;
        for (expected, actual) in &self.context {
            writeln!(f, "  - {expected}")?;
            writeln!(f, "  + {actual}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DomMismatch {}

pub fn assert_dom_eq(expected: &Node, actual: &Node, options: DomSnapshotOptions) {
    if let Err(mismatch) = compare_dom(expected, actual, options) {
        panic!("{mismatch}");
    }
}

pub fn compare_dom(
    expected: &Node,
    actual: &Node,
    options: DomSnapshotOptions,
) -> Result<(), Box<DomMismatch>> {
    const CONTEXT: usize = 2;
    const MAX_LINE: usize = 160;

    let expected = flatten_root(expected, options);
    let actual = flatten_root(actual, options);
    let total = expected.len().max(actual.len());
    let Some(at) = (0..total).find(|&i| {
        expected.get(i).map(|entry| &entry.line) != actual.get(i).map(|entry| &entry.line)
    }) else {
        return Ok(());
    };

    let path = expected
        .get(at)
        .or_else(|| actual.get(at))
        .map(|entry| entry.path.clone())
        .unwrap_or_default();
    let context = (at + 1..(at + 1 + CONTEXT).min(total))
        .map(|i| (line_at(&expected, i), line_at(&actual, i)))
        .collect();
    Err(Box::new(DomMismatch {
        path,
        line: at,
        expected: truncate_line(line_at(&expected, at), MAX_LINE),
        actual: truncate_line(line_at(&actual, at), MAX_LINE),
        context,
    }))
}

/// One dump line and the path of the node it describes.
struct Entry {
    path: String,
    line: String,
}

fn line_at(entries: &[Entry], i: usize) -> String {
    entries.get(i).map_or_else(
        || "<missing>".to_string(),
        |entry| entry.line.trim_start().to_string(),
    )
}

fn flatten_root(root: &Node, options: DomSnapshotOptions) -> Vec<Entry> {
    let mut out = Vec::new();
    flatten(root, 0, format!("/{}", node_label(root)), options, &mut out);
    out
}

fn flatten(
    node: &Node,
    depth: usize,
    path: String,
    options: DomSnapshotOptions,
    out: &mut Vec<Entry>,
) {
    let mut line = indent(depth);
    write_node_line(&mut line, node);
    out.push(Entry {
        path: path.clone(),
        line,
    });
    if let Node::Element {
        contents: Some(contents),
        ..
    } = node
    {
        let content_path = format!("{path}/content");
        out.push(Entry {
            path: content_path.clone(),
            line: format!("{}content", indent(depth + 1)),
        });
        flatten_children(contents, depth + 2, &content_path, options, out);
    }
    flatten_children(node.children(), depth + 1, &path, options, out);
}

/// Adjacent text runs are merged and empty text dropped when
/// `merge_adjacent_text` is set, so indices count the merged children.
fn flatten_children(
    children: &[Node],
    depth: usize,
    parent: &str,
    options: DomSnapshotOptions,
    out: &mut Vec<Entry>,
) {
    let mut index = 0usize;
    let mut iter = children.iter().peekable();
    while let Some(child) = iter.next() {
        if options.merge_adjacent_text
            && let Node::Text { text } = child
        {
            let mut merged = text.clone();
            while let Some(Node::Text { text }) = iter.peek() {
                merged.push_str(text);
                iter.next();
            }
            if merged.is_empty() {
                continue;
            }
            let merged = Node::Text { text: merged };
            flatten(&merged, depth, format!("{parent}/#text[{index}]"), options, out);
        } else {
            let path = format!("{parent}/{}[{index}]", node_label(child));
            flatten(child, depth, path, options, out);
        }
        index += 1;
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

fn node_label(node: &Node) -> String {
    match node {
        Node::Fragment { .. } => "#fragment".to_string(),
        Node::Element {
            name, attributes, ..
        } => {
            let mut label = name.to_string();
            if let Some((_, id)) = attributes
                .iter()
                .find(|(key, value)| &**key == "id" && !value.is_empty())
            {
                label.push('#');
                write_escaped(&mut label, id);
            }
            label
        }
        Node::Text { .. } => "#text".to_string(),
        Node::Comment { .. } => "#comment".to_string(),
    }
}

fn truncate_line(mut line: String, max_len: usize) -> String {
    if line.len() > max_len {
        let mut cut = max_len.saturating_sub(3);
        while !line.is_char_boundary(cut) {
            cut -= 1;
        }
        line.truncate(cut);
        line.push_str("...");
    }
    line
}

fn write_node_line(out: &mut String, node: &Node) {
    match node {
        Node::Fragment { .. } => out.push_str("#fragment"),
        Node::Element {
            name,
            namespace,
            attributes,
            ..
        } => {
            out.push('<');
            if let Some(prefix) = namespace.dump_prefix() {
                out.push_str(prefix);
                out.push(' ');
            }
            out.push_str(name);
            for (attr, value) in attributes {
                let _ = write!(out, " {attr}=\"");
                write_escaped(out, value);
                out.push('"');
            }
            out.push('>');
        }
        Node::Text { text } => {
            out.push('"');
            write_escaped(out, text);
            out.push('"');
        }
        Node::Comment { text } => {
            out.push_str("<!-- ");
            write_escaped(out, text);
            out.push_str(" -->");
        }
    }
}

fn write_escaped(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ if ch.is_ascii() => out.push(ch),
            _ => {
                let _ = write!(out, "\\u{{{:X}}}", ch as u32);
            }
        }
    }
}
