//! Off-screen tree mutated by the external HTML tree builder.
//!
//! Nodes live in an arena and are addressed by `ScratchId`; an id stays valid
//! for the life of the tree even after the node is detached, so relocations
//! keep their identity. Every child-list mutation whose target lies inside an
//! observed root is recorded as a `MutationRecord`; records accumulate until
//! the owner takes them as one batch.

mod driver;
mod feed;
mod sink;

pub use driver::{Html5everBuilder, ScratchDriver, TreeConstruction, STREAM_PREAMBLE};
pub use feed::MutationRecord;

use crate::types::{ElementNamespace, Node};
use html5ever::tree_builder::QuirksMode;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScratchId(pub usize);

impl ScratchId {
    pub const DOCUMENT: ScratchId = ScratchId(0);

    fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub struct ScratchElement {
    pub name: QualName,
    pub attributes: Vec<Attribute>,
    pub template_contents: Option<ScratchId>,
    pub mathml_annotation_xml_integration_point: bool,
    /// Set once the scratch document has "prepared" a script element. Scratch
    /// scripts never run, but the flag is part of the element's state.
    pub already_started: bool,
}

impl ScratchElement {
    pub fn is_html(&self, local: &str) -> bool {
        &*self.name.ns == ElementNamespace::HTML_URL && &*self.name.local == local
    }

    pub fn is_script(&self) -> bool {
        &*self.name.local == "script"
            && (&*self.name.ns == ElementNamespace::HTML_URL
                || &*self.name.ns == ElementNamespace::SVG_URL)
    }
}

#[derive(Debug)]
pub enum ScratchData {
    Document,
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    /// Template contents; `host` is the owning template element.
    Fragment { host: Option<ScratchId> },
    Element(ScratchElement),
    Text {
        text: String,
        /// Sealed text was already handed downstream; further character data
        /// at this position starts a new node.
        sealed: bool,
    },
    Comment(String),
}

#[derive(Debug)]
pub struct ScratchNode {
    pub data: ScratchData,
    parent: Option<ScratchId>,
    /// Position in the parent's child list; meaningless while detached.
    index: usize,
    children: Vec<ScratchId>,
}

#[derive(Debug)]
pub struct ScratchTree {
    nodes: Vec<ScratchNode>,
    observed: Vec<ScratchId>,
    records: Vec<MutationRecord>,
    quirks_mode: QuirksMode,
    parse_errors: usize,
    // Returned by `elem_name` for non-elements, which the tree builder never asks about.
    placeholder_name: QualName,
}

impl Default for ScratchTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScratchTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![ScratchNode {
                data: ScratchData::Document,
                parent: None,
                index: 0,
                children: Vec::new(),
            }],
            observed: Vec::new(),
            records: Vec::new(),
            quirks_mode: QuirksMode::NoQuirks,
            parse_errors: 0,
            placeholder_name: QualName::new(None, Namespace::from(""), LocalName::from("")),
        }
    }

    pub fn document(&self) -> ScratchId {
        ScratchId::DOCUMENT
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn quirks_mode(&self) -> QuirksMode {
        self.quirks_mode
    }

    pub fn parse_errors(&self) -> usize {
        self.parse_errors
    }

    pub fn node(&self, id: ScratchId) -> &ScratchNode {
        &self.nodes[id.index()]
    }

    pub fn data(&self, id: ScratchId) -> &ScratchData {
        &self.nodes[id.index()].data
    }

    pub fn parent(&self, id: ScratchId) -> Option<ScratchId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: ScratchId) -> &[ScratchId] {
        &self.nodes[id.index()].children
    }

    /// Position of `id` among its parent's children.
    pub fn index_in_parent(&self, id: ScratchId) -> Option<usize> {
        let node = &self.nodes[id.index()];
        node.parent.map(|_| node.index)
    }

    pub fn next_sibling(&self, id: ScratchId) -> Option<ScratchId> {
        let parent = self.parent(id)?;
        let index = self.nodes[id.index()].index;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_sibling(&self, id: ScratchId) -> Option<ScratchId> {
        let parent = self.parent(id)?;
        let index = self.nodes[id.index()].index.checked_sub(1)?;
        self.children(parent).get(index).copied()
    }

    pub fn element(&self, id: ScratchId) -> Option<&ScratchElement> {
        match &self.nodes[id.index()].data {
            ScratchData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_text(&self, id: ScratchId) -> bool {
        matches!(self.nodes[id.index()].data, ScratchData::Text { .. })
    }

    pub fn text(&self, id: ScratchId) -> Option<&str> {
        match &self.nodes[id.index()].data {
            ScratchData::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn template_contents(&self, id: ScratchId) -> Option<ScratchId> {
        self.element(id).and_then(|element| element.template_contents)
    }

    /// Template element owning `id`, when `id` is a template contents fragment.
    pub fn fragment_host(&self, id: ScratchId) -> Option<ScratchId> {
        match self.nodes[id.index()].data {
            ScratchData::Fragment { host } => host,
            _ => None,
        }
    }

    /// Freeze a text node's current content: later character data appended
    /// next to it becomes a new text node.
    pub fn seal_text(&mut self, id: ScratchId) {
        if let ScratchData::Text { sealed, .. } = &mut self.nodes[id.index()].data {
            *sealed = true;
        }
    }

    /// Start recording child-list mutations in the subtree rooted at `root`.
    pub fn observe(&mut self, root: ScratchId) {
        if !self.observed.contains(&root) {
            log::trace!(target: "dom_stream.scratch", "observe {root:?}");
            self.observed.push(root);
        }
    }

    pub fn is_observed_root(&self, id: ScratchId) -> bool {
        self.observed.contains(&id)
    }

    /// True when `id` is an inclusive descendant of an observed root.
    pub fn in_observed_scope(&self, id: ScratchId) -> bool {
        if self.observed.is_empty() {
            return false;
        }
        let mut current = Some(id);
        while let Some(node) = current {
            if self.is_observed_root(node) {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    pub fn has_pending_records(&self) -> bool {
        !self.records.is_empty()
    }

    /// Drain the records accumulated since the last call, in mutation order.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    /// First `<body>` child of the document's `<html>` element.
    pub fn find_body(&self) -> Option<ScratchId> {
        let html = self.children(self.document()).iter().copied().find(|&id| {
            self.element(id)
                .is_some_and(|element| element.is_html("html"))
        })?;
        self.children(html).iter().copied().find(|&id| {
            self.element(id)
                .is_some_and(|element| element.is_html("body"))
        })
    }

    /// Owned snapshot of `root`'s children, rendered as a fragment.
    pub fn snapshot(&self, root: ScratchId) -> Node {
        Node::Fragment {
            children: self.snapshot_children(root),
        }
    }

    fn snapshot_children(&self, parent: ScratchId) -> Vec<Node> {
        self.children(parent)
            .iter()
            .filter_map(|&child| self.snapshot_node(child))
            .collect()
    }

    fn snapshot_node(&self, id: ScratchId) -> Option<Node> {
        match &self.node(id).data {
            ScratchData::Element(element) => Some(Node::Element {
                name: Arc::from(&*element.name.local),
                namespace: ElementNamespace::from_url(&element.name.ns),
                attributes: element
                    .attributes
                    .iter()
                    .map(|attr| (attribute_name(&attr.name), attr.value.to_string()))
                    .collect(),
                contents: element
                    .template_contents
                    .map(|fragment| self.snapshot_children(fragment)),
                children: self.snapshot_children(id),
            }),
            ScratchData::Text { text, .. } => Some(Node::Text { text: text.clone() }),
            ScratchData::Comment(text) => Some(Node::Comment { text: text.clone() }),
            ScratchData::Fragment { .. } => Some(self.snapshot(id)),
            ScratchData::Document | ScratchData::Doctype { .. } => None,
        }
    }

    fn push_node(&mut self, data: ScratchData) -> ScratchId {
        let id = ScratchId(self.nodes.len());
        self.nodes.push(ScratchNode {
            data,
            parent: None,
            index: 0,
            children: Vec::new(),
        });
        id
    }

    fn record(&mut self, record: MutationRecord) {
        if self.in_observed_scope(record.target) {
            self.records.push(record);
        }
    }

    /// Detach `id` from its parent, recording the removal.
    fn detach(&mut self, id: ScratchId) {
        let Some(parent) = self.nodes[id.index()].parent.take() else {
            return;
        };
        let index = self.nodes[id.index()].index;
        let siblings = &mut self.nodes[parent.index()].children;
        if siblings.get(index) != Some(&id) {
            debug_assert!(false, "{id:?} missing from parent {parent:?}");
            return;
        }
        siblings.remove(index);
        let next_sibling = siblings.get(index).copied();
        self.renumber(parent, index);
        self.record(MutationRecord::removed(parent, vec![id], next_sibling));
    }

    /// Refresh stored positions of `parent`'s children from `from` on.
    fn renumber(&mut self, parent: ScratchId, from: usize) {
        for index in from..self.nodes[parent.index()].children.len() {
            let child = self.nodes[parent.index()].children[index];
            self.nodes[child.index()].index = index;
        }
    }

    /// Child-list position `before` occupies in `parent`, if it is a child there.
    fn position_of(&self, parent: ScratchId, before: Option<ScratchId>) -> Option<usize> {
        let before = before?;
        (self.parent(before) == Some(parent)).then(|| self.nodes[before.index()].index)
    }

    /// Insert `child` into `parent` before `before` (or at the end).
    fn insert(&mut self, parent: ScratchId, child: ScratchId, before: Option<ScratchId>) {
        self.detach(child);
        let index = self
            .position_of(parent, before)
            .unwrap_or(self.nodes[parent.index()].children.len());
        self.nodes[parent.index()].children.insert(index, child);
        self.nodes[child.index()].parent = Some(parent);
        self.renumber(parent, index);
        self.record(MutationRecord::added(parent, vec![child], before));
    }

    /// Grow the unsealed text node `candidate` in place; false when a new node is needed.
    fn try_extend_text(&mut self, candidate: Option<ScratchId>, more: &str) -> bool {
        let Some(candidate) = candidate else {
            return false;
        };
        match &mut self.nodes[candidate.index()].data {
            ScratchData::Text { text, sealed: false } => {
                text.push_str(more);
                true
            }
            _ => false,
        }
    }

    fn insert_text(&mut self, parent: ScratchId, text: &str, before: Option<ScratchId>) {
        let previous = match before {
            Some(before) if self.parent(before) == Some(parent) => self.previous_sibling(before),
            Some(_) => None,
            None => self.children(parent).last().copied(),
        };
        if self.try_extend_text(previous, text) {
            return;
        }
        let node = self.push_node(ScratchData::Text {
            text: text.to_string(),
            sealed: false,
        });
        self.insert(parent, node, before);
    }

    fn move_children(&mut self, from: ScratchId, to: ScratchId) {
        let moved = std::mem::take(&mut self.nodes[from.index()].children);
        if moved.is_empty() {
            return;
        }
        let base = self.nodes[to.index()].children.len();
        for (offset, &child) in moved.iter().enumerate() {
            let node = &mut self.nodes[child.index()];
            node.parent = Some(to);
            node.index = base + offset;
        }
        self.nodes[to.index()].children.extend(moved.iter().copied());
        self.record(MutationRecord::removed(from, moved.clone(), None));
        self.record(MutationRecord::added(to, moved, None));
    }
}

/// Qualified attribute name as it appears in markup (`xlink:href`).
pub(crate) fn attribute_name(name: &QualName) -> Arc<str> {
    match &name.prefix {
        Some(prefix) => Arc::from(format!("{}:{}", &**prefix, &*name.local)),
        None => Arc::from(&*name.local),
    }
}
