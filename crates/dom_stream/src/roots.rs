use crate::clone_map::CloneMap;
use crate::instruction::InsertionParent;
use crate::scratch::{ScratchId, ScratchTree};
use std::collections::HashSet;

/// Roots with their own observation scope: the stream body and every template
/// contents fragment activated so far. Entries live as long as the stream.
#[derive(Debug)]
pub struct RootSet {
    main: ScratchId,
    fragments: HashSet<ScratchId>,
}

impl RootSet {
    pub fn new(main: ScratchId) -> Self {
        Self {
            main,
            fragments: HashSet::new(),
        }
    }

    pub fn main(&self) -> ScratchId {
        self.main
    }

    /// Register a template contents fragment; false if it was already tracked.
    pub fn track(&mut self, fragment: ScratchId) -> bool {
        fragment != self.main && self.fragments.insert(fragment)
    }

    pub fn is_tracked(&self, id: ScratchId) -> bool {
        id == self.main || self.fragments.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.fragments.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Clone-space parent for a node inserted under scratch `parent`, or
    /// `None` while that parent has no clone yet.
    pub fn resolve_parent(
        &self,
        tree: &ScratchTree,
        clones: &CloneMap,
        parent: ScratchId,
    ) -> Option<InsertionParent> {
        if parent == self.main() {
            return Some(InsertionParent::Root);
        }
        if let Some(host) = tree.fragment_host(parent) {
            return clones.get(host).map(InsertionParent::TemplateContents);
        }
        clones.get(parent).map(InsertionParent::Node)
    }

    /// True when `node` hangs below a tracked root, or inside the contents of
    /// a template whose clone exists but whose fragment is not tracked yet.
    pub fn is_reachable(&self, tree: &ScratchTree, clones: &CloneMap, node: ScratchId) -> bool {
        let mut current = node;
        loop {
            if self.is_tracked(current) {
                return true;
            }
            current = match (tree.parent(current), tree.fragment_host(current)) {
                (Some(parent), _) => parent,
                (None, Some(host)) if clones.contains(host) => host,
                _ => return false,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::ScratchDriver;

    #[test]
    fn body_resolves_to_root_and_detached_nodes_are_unreachable() {
        let mut driver = ScratchDriver::new();
        driver.write("<div><span>x</span></div>");
        let body = driver.root();
        let roots = RootSet::new(body);
        let tree = driver.tree();
        let clones = CloneMap::new();

        assert_eq!(
            roots.resolve_parent(tree, &clones, body),
            Some(InsertionParent::Root)
        );
        let div = tree.children(body)[0];
        let span = tree.children(div)[0];
        assert!(roots.is_reachable(tree, &clones, span));
        assert_eq!(roots.resolve_parent(tree, &clones, div), None);

        let head = tree.children(tree.parent(body).expect("html"))[0];
        assert!(!roots.is_reachable(tree, &clones, head));
    }

    #[test]
    fn template_contents_resolve_through_the_host_clone() {
        let mut driver = ScratchDriver::new();
        driver.write("<template><i>y</i></template>");
        let body = driver.root();
        let tree = driver.tree();
        let template = tree.children(body)[0];
        let contents = tree.template_contents(template).expect("template contents");
        let italic = tree.children(contents)[0];

        let mut roots = RootSet::new(body);
        let mut clones = CloneMap::new();
        assert!(!roots.is_reachable(tree, &clones, italic));
        assert_eq!(roots.resolve_parent(tree, &clones, contents), None);

        let (host_key, _) = clones.get_or_clone(tree, template).expect("template clones");
        assert!(roots.is_reachable(tree, &clones, italic), "through the host clone");
        assert!(!roots.is_tracked(contents));
        assert!(roots.track(contents));
        assert!(!roots.track(contents));
        assert!(!roots.track(body));
        assert!(roots.is_tracked(contents));
        assert_eq!(
            roots.resolve_parent(tree, &clones, contents),
            Some(InsertionParent::TemplateContents(host_key))
        );
        assert_eq!(roots.len(), 2);
    }
}
