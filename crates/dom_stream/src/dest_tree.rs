//! In-memory destination tree.
//!
//! Models the parts of a live document the replay protocol interacts with:
//! ordered child lists, template contents kept outside the tree, and script
//! elements that run once when they become connected with something to run.

use crate::clone_map::{CloneNode, ElementClone};
use crate::replay::{Destination, DestinationError};
use crate::serialize;
use crate::types::Node;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestId(pub usize);

impl DestId {
    pub const ROOT: DestId = DestId(0);

    fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug)]
enum DestData {
    Root,
    Fragment {
        host: DestId,
    },
    Element {
        element: ElementClone,
        contents: Option<DestId>,
    },
    Text(String),
    Comment(String),
}

#[derive(Clone, Debug)]
struct DestNode {
    data: DestData,
    parent: Option<DestId>,
    children: Vec<DestId>,
}

/// A script that ran in the destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptRun {
    pub node: DestId,
    pub src: Option<String>,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct DestinationTree {
    nodes: Vec<DestNode>,
    scripts: Vec<ScriptRun>,
}

impl Default for DestinationTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DestinationTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![DestNode {
                data: DestData::Root,
                parent: None,
                children: Vec::new(),
            }],
            scripts: Vec::new(),
        }
    }

    pub fn root(&self) -> DestId {
        DestId::ROOT
    }

    pub fn children(&self, id: DestId) -> &[DestId] {
        self.nodes
            .get(id.index())
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, id: DestId) -> Option<DestId> {
        self.nodes.get(id.index()).and_then(|node| node.parent)
    }

    pub fn element(&self, id: DestId) -> Option<&ElementClone> {
        match &self.nodes.get(id.index())?.data {
            DestData::Element { element, .. } => Some(element),
            _ => None,
        }
    }

    pub fn text(&self, id: DestId) -> Option<&str> {
        match &self.nodes.get(id.index())?.data {
            DestData::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Nodes ever created, connected or not, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    pub fn executed_scripts(&self) -> &[ScriptRun] {
        &self.scripts
    }

    /// Reachable from the root without passing through template contents.
    pub fn is_connected(&self, id: DestId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == DestId::ROOT {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    pub fn snapshot(&self) -> Node {
        Node::Fragment {
            children: self.snapshot_children(DestId::ROOT),
        }
    }

    pub fn inner_html(&self) -> String {
        serialize::inner_html(&self.snapshot())
    }

    fn snapshot_children(&self, id: DestId) -> Vec<Node> {
        self.children(id)
            .iter()
            .map(|&child| self.snapshot_node(child))
            .collect()
    }

    fn snapshot_node(&self, id: DestId) -> Node {
        match &self.nodes[id.index()].data {
            DestData::Element { element, contents } => Node::Element {
                name: element.name.clone(),
                namespace: element.namespace.clone(),
                attributes: element.attributes.clone(),
                contents: contents.map(|fragment| self.snapshot_children(fragment)),
                children: self.snapshot_children(id),
            },
            DestData::Text(text) => Node::Text { text: text.clone() },
            DestData::Comment(text) => Node::Comment { text: text.clone() },
            DestData::Root | DestData::Fragment { .. } => Node::Fragment {
                children: self.snapshot_children(id),
            },
        }
    }

    fn push(&mut self, data: DestData) -> DestId {
        let id = DestId(self.nodes.len());
        self.nodes.push(DestNode {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn check(&self, id: DestId) -> Result<(), DestinationError> {
        if id.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(DestinationError::UnknownHandle)
        }
    }

    /// `node` is `target` or one of its ancestors, following template hosts.
    fn is_host_including_ancestor(&self, node: DestId, target: DestId) -> bool {
        let mut current = Some(target);
        while let Some(id) = current {
            if id == node {
                return true;
            }
            current = match self.nodes[id.index()].data {
                DestData::Fragment { host } => Some(host),
                _ => self.nodes[id.index()].parent,
            };
        }
        false
    }

    fn detach(&mut self, id: DestId) {
        if let Some(parent) = self.nodes[id.index()].parent.take() {
            self.nodes[parent.index()].children.retain(|&child| child != id);
        }
    }

    fn run_connected_scripts(&mut self, inserted: DestId) {
        let mut stack = vec![inserted];
        while let Some(id) = stack.pop() {
            self.prepare_script(id);
            stack.extend(self.nodes[id.index()].children.iter().rev());
        }
    }

    fn prepare_script(&mut self, id: DestId) {
        let DestData::Element { element, .. } = &self.nodes[id.index()].data else {
            return;
        };
        if !element.is_script() || element.already_started || !runnable_type(element) {
            return;
        }
        if !self.is_connected(id) {
            return;
        }
        let src = element.attribute("src").map(str::to_string);
        let text: String = self.nodes[id.index()]
            .children
            .iter()
            .filter_map(|&child| self.text(child))
            .collect();
        if src.is_none() && text.is_empty() {
            return;
        }
        if let DestData::Element { element, .. } = &mut self.nodes[id.index()].data {
            element.already_started = true;
        }
        log::debug!(target: "dom_stream.dest", "script {id:?} runs (src={src:?})");
        self.scripts.push(ScriptRun { node: id, src, text });
    }
}

fn runnable_type(element: &ElementClone) -> bool {
    let Some(kind) = element.attribute("type") else {
        return true;
    };
    let kind = kind.trim().to_ascii_lowercase();
    matches!(
        kind.as_str(),
        "" | "module"
            | "text/javascript"
            | "application/javascript"
            | "text/ecmascript"
            | "application/ecmascript"
    )
}

impl Destination for DestinationTree {
    type Handle = DestId;

    fn create(&mut self, node: CloneNode) -> DestId {
        match node {
            CloneNode::Element(element) => {
                let is_template = element.is_template();
                let id = self.push(DestData::Element {
                    element,
                    contents: None,
                });
                if is_template {
                    let fragment = self.push(DestData::Fragment { host: id });
                    if let DestData::Element { contents, .. } = &mut self.nodes[id.index()].data {
                        *contents = Some(fragment);
                    }
                }
                id
            }
            CloneNode::Text(text) => self.push(DestData::Text(text)),
            CloneNode::Comment(text) => self.push(DestData::Comment(text)),
        }
    }

    fn template_contents(&mut self, template: &DestId) -> Result<DestId, DestinationError> {
        self.check(*template)?;
        match &self.nodes[template.index()].data {
            DestData::Element {
                contents: Some(fragment),
                ..
            } => Ok(*fragment),
            _ => Err(DestinationError::NotTemplate),
        }
    }

    fn insert_before(
        &mut self,
        parent: Option<&DestId>,
        node: &DestId,
        before: Option<&DestId>,
    ) -> Result<(), DestinationError> {
        let parent = parent.copied().unwrap_or(DestId::ROOT);
        let node = *node;
        self.check(parent)?;
        self.check(node)?;
        if matches!(
            self.nodes[parent.index()].data,
            DestData::Text(_) | DestData::Comment(_)
        ) {
            return Err(DestinationError::InvalidParent);
        }
        if matches!(
            self.nodes[node.index()].data,
            DestData::Root | DestData::Fragment { .. }
        ) {
            return Err(DestinationError::InvalidNode);
        }
        let mut reference = match before {
            Some(&before) => {
                self.check(before)?;
                if self.nodes[before.index()].parent != Some(parent) {
                    return Err(DestinationError::InvalidSibling);
                }
                Some(before)
            }
            None => None,
        };
        if self.is_host_including_ancestor(node, parent) {
            return Err(DestinationError::Cycle);
        }
        if reference == Some(node) {
            let siblings = &self.nodes[parent.index()].children;
            reference = siblings
                .iter()
                .position(|&child| child == node)
                .and_then(|index| siblings.get(index + 1).copied());
        }

        self.detach(node);
        let siblings = &mut self.nodes[parent.index()].children;
        let index = reference
            .and_then(|reference| siblings.iter().position(|&child| child == reference))
            .unwrap_or(siblings.len());
        siblings.insert(index, node);
        self.nodes[node.index()].parent = Some(parent);

        if self.is_connected(parent) {
            self.run_connected_scripts(node);
            // Children changed: an inline script may now have text.
            self.prepare_script(parent);
        }
        Ok(())
    }

    fn preceding_text(
        &self,
        parent: Option<&DestId>,
        before: Option<&DestId>,
    ) -> Option<(DestId, usize)> {
        let parent = parent.copied().unwrap_or(DestId::ROOT);
        let siblings = self.children(parent);
        let index = match before {
            Some(before) => siblings.iter().position(|child| child == before)?,
            None => siblings.len(),
        };
        let previous = *siblings.get(index.checked_sub(1)?)?;
        self.text(previous).map(|text| (previous, text.len()))
    }

    fn append_text(&mut self, text: &DestId, data: &str) -> Result<(), DestinationError> {
        self.check(*text)?;
        match &mut self.nodes[text.index()].data {
            DestData::Text(existing) => {
                existing.push_str(data);
                Ok(())
            }
            _ => Err(DestinationError::NotText),
        }
    }

    fn split_text(&mut self, text: &DestId, offset: usize) -> Result<DestId, DestinationError> {
        self.check(*text)?;
        let tail = match &mut self.nodes[text.index()].data {
            DestData::Text(existing) => {
                if offset > existing.len() || !existing.is_char_boundary(offset) {
                    return Err(DestinationError::InvalidOffset {
                        offset,
                        len: existing.len(),
                    });
                }
                existing.split_off(offset)
            }
            _ => return Err(DestinationError::NotText),
        };
        let tail = self.push(DestData::Text(tail));
        if let Some(parent) = self.nodes[text.index()].parent {
            let siblings = &mut self.nodes[parent.index()].children;
            let index = siblings
                .iter()
                .position(|&child| child == *text)
                .map_or(siblings.len(), |index| index + 1);
            siblings.insert(index, tail);
            self.nodes[tail.index()].parent = Some(parent);
        }
        Ok(tail)
    }

    fn clear_root(&mut self) {
        let children = std::mem::take(&mut self.nodes[DestId::ROOT.index()].children);
        for child in children {
            self.nodes[child.index()].parent = None;
        }
    }
}
