//! Scratch node -> destination clone identity.
//!
//! Keys are handed out the first time a scratch node is seen and are never
//! reassigned, so a relocated node keeps pointing at its original clone.

use crate::scratch::{ScratchData, ScratchElement, ScratchId, ScratchTree, attribute_name};
use crate::types::ElementNamespace;
use std::sync::Arc;

/// Destination-side identity of a cloned scratch node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CloneKey(pub usize);

impl CloneKey {
    /// Reserved sentinel; never handed out.
    pub const INVALID: CloneKey = CloneKey(0);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementClone {
    pub name: Arc<str>,
    pub namespace: ElementNamespace,
    pub attributes: Vec<(Arc<str>, String)>,
    pub already_started: bool,
}

impl ElementClone {
    pub fn new(name: impl Into<Arc<str>>, namespace: ElementNamespace) -> Self {
        Self {
            name: name.into(),
            namespace,
            attributes: Vec::new(),
            already_started: false,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr, _)| &**attr == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set or replace one attribute, keeping first-seen order.
    pub fn set_attribute(&mut self, name: Arc<str>, value: String) {
        match self.attributes.iter_mut().find(|(attr, _)| *attr == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn is_html(&self, local: &str) -> bool {
        self.namespace == ElementNamespace::Html && &*self.name == local
    }

    pub fn is_template(&self) -> bool {
        self.is_html("template")
    }

    pub fn is_script(&self) -> bool {
        &*self.name == "script"
            && matches!(self.namespace, ElementNamespace::Html | ElementNamespace::Svg)
    }
}

/// A structurally independent copy of one scratch node, without children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloneNode {
    Element(ElementClone),
    Text(String),
    Comment(String),
}

impl CloneNode {
    pub fn as_element(&self) -> Option<&ElementClone> {
        match self {
            CloneNode::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, CloneNode::Text(_))
    }
}

/// Shallow copy of a scratch node as it is right now.
///
/// Script elements are rebuilt from name and attributes instead of copied, so
/// the copy starts out not "already started" and runs once in the destination.
pub fn clone_scratch_node(tree: &ScratchTree, id: ScratchId) -> Option<CloneNode> {
    match tree.data(id) {
        ScratchData::Element(element) if element.is_script() => {
            Some(CloneNode::Element(fresh_element(element)))
        }
        ScratchData::Element(element) => Some(CloneNode::Element(copy_element(element))),
        ScratchData::Text { text, .. } => Some(CloneNode::Text(text.clone())),
        ScratchData::Comment(text) => Some(CloneNode::Comment(text.clone())),
        ScratchData::Document | ScratchData::Doctype { .. } | ScratchData::Fragment { .. } => {
            None
        }
    }
}

fn copy_element(element: &ScratchElement) -> ElementClone {
    ElementClone {
        name: Arc::from(&*element.name.local),
        namespace: ElementNamespace::from_url(&element.name.ns),
        attributes: element
            .attributes
            .iter()
            .map(|attr| (attribute_name(&attr.name), attr.value.to_string()))
            .collect(),
        already_started: element.already_started,
    }
}

fn fresh_element(element: &ScratchElement) -> ElementClone {
    let mut clone = ElementClone::new(
        &*element.name.local,
        ElementNamespace::from_url(&element.name.ns),
    );
    for attr in &element.attributes {
        clone.set_attribute(attribute_name(&attr.name), attr.value.to_string());
    }
    clone
}

#[derive(Clone, Copy, Debug, Default)]
struct CloneEntry {
    key: Option<CloneKey>,
    /// Scratch parent the last instruction for this node placed it under.
    placed_in: Option<ScratchId>,
}

/// Side table indexed by scratch id; entries are created lazily and never removed.
#[derive(Debug)]
pub struct CloneMap {
    entries: Vec<CloneEntry>,
    next_key: usize,
}

impl Default for CloneMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CloneMap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_key: 1,
        }
    }

    /// Number of clones created so far.
    pub fn len(&self) -> usize {
        self.next_key - 1
    }

    pub fn is_empty(&self) -> bool {
        self.next_key == 1
    }

    pub fn get(&self, id: ScratchId) -> Option<CloneKey> {
        self.entries.get(id.0).and_then(|entry| entry.key)
    }

    pub fn contains(&self, id: ScratchId) -> bool {
        self.get(id).is_some()
    }

    /// Key for `id`, cloning the node on first sight. The clone payload is
    /// returned only on that first call.
    pub fn get_or_clone(
        &mut self,
        tree: &ScratchTree,
        id: ScratchId,
    ) -> Option<(CloneKey, Option<CloneNode>)> {
        if let Some(key) = self.get(id) {
            return Some((key, None));
        }
        let clone = clone_scratch_node(tree, id)?;
        let key = CloneKey(self.next_key);
        self.next_key += 1;
        self.entry_mut(id).key = Some(key);
        Some((key, Some(clone)))
    }

    pub fn placed_in(&self, id: ScratchId) -> Option<ScratchId> {
        self.entries.get(id.0).and_then(|entry| entry.placed_in)
    }

    pub fn record_placement(&mut self, id: ScratchId, parent: ScratchId) {
        self.entry_mut(id).placed_in = Some(parent);
    }

    fn entry_mut(&mut self, id: ScratchId) -> &mut CloneEntry {
        let index = id.0;
        if index >= self.entries.len() {
            self.entries.resize(index + 1, CloneEntry::default());
        }
        &mut self.entries[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::{Html5everBuilder, ScratchDriver};

    fn first_element(tree: &ScratchTree, root: ScratchId, local: &str) -> ScratchId {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if tree.element(id).is_some_and(|element| element.is_html(local)) {
                return id;
            }
            stack.extend(tree.children(id).iter().rev());
        }
        panic!("no <{local}> under {root:?}");
    }

    #[test]
    fn keys_are_assigned_once() {
        let mut driver = ScratchDriver::<Html5everBuilder>::new();
        driver.write("<p class=a>x</p>");
        let root = driver.root();
        let p = first_element(driver.tree(), root, "p");
        let mut map = CloneMap::new();

        let (key, clone) = map.get_or_clone(driver.tree(), p).expect("element clones");
        assert_ne!(key, CloneKey::INVALID);
        let element = clone.expect("first sight carries the clone");
        assert_eq!(element.as_element().and_then(|e| e.attribute("class")), Some("a"));

        let (again, clone) = map.get_or_clone(driver.tree(), p).expect("known node");
        assert_eq!(again, key);
        assert!(clone.is_none());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn script_clone_drops_already_started() {
        let mut driver = ScratchDriver::<Html5everBuilder>::new();
        driver.write("<script src=a.js defer></script><b id=x></b>");
        let root = driver.root();
        let script = first_element(driver.tree(), root, "script");
        assert!(
            driver.tree().element(script).is_some_and(|e| e.already_started),
            "scratch script should be prepared by its end tag"
        );

        let Some(CloneNode::Element(clone)) = clone_scratch_node(driver.tree(), script) else {
            panic!("script should clone as an element");
        };
        assert!(!clone.already_started);
        assert_eq!(clone.attribute("src"), Some("a.js"));
        assert_eq!(clone.attribute("defer"), Some(""));
        assert_eq!(
            clone.attributes.iter().map(|(n, _)| &**n).collect::<Vec<_>>(),
            ["src", "defer"]
        );
    }

    #[test]
    fn document_level_nodes_do_not_clone() {
        let driver = ScratchDriver::<Html5everBuilder>::new();
        let tree = driver.tree();
        assert!(clone_scratch_node(tree, tree.document()).is_none());
        let doctype = tree.children(tree.document())[0];
        assert!(clone_scratch_node(tree, doctype).is_none());
    }

    #[test]
    fn placement_defaults_to_unknown() {
        let mut map = CloneMap::new();
        assert_eq!(map.placed_in(ScratchId(7)), None);
        map.record_placement(ScratchId(7), ScratchId(2));
        assert_eq!(map.placed_in(ScratchId(7)), Some(ScratchId(2)));
        assert!(!map.contains(ScratchId(7)));
    }
}
