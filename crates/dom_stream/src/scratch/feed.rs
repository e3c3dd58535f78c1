use super::ScratchId;

/// One child-list mutation of the scratch tree.
///
/// `next_sibling` is the node that followed the added (or removed) nodes at
/// the time of the mutation; `None` means they sat at the end of `target`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: ScratchId,
    pub added: Vec<ScratchId>,
    pub removed: Vec<ScratchId>,
    pub next_sibling: Option<ScratchId>,
}

impl MutationRecord {
    pub fn added(target: ScratchId, nodes: Vec<ScratchId>, next_sibling: Option<ScratchId>) -> Self {
        Self {
            target,
            added: nodes,
            removed: Vec::new(),
            next_sibling,
        }
    }

    pub fn removed(
        target: ScratchId,
        nodes: Vec<ScratchId>,
        next_sibling: Option<ScratchId>,
    ) -> Self {
        Self {
            target,
            added: Vec::new(),
            removed: nodes,
            next_sibling,
        }
    }
}
