//! Change feed -> ordered insertion instructions.
//!
//! A batch is processed record by record: removed nodes go into a batch-local
//! removal set, added nodes leave it again and are handled where they sit now.
//! Whatever is still in the set afterwards was either truly deleted or moved
//! somewhere the feed did not report (for example into an element built while
//! detached); repeated sweeps place the reachable ones once their parent and
//! next sibling are settled.
//!
//! Positions are always taken from the current scratch tree. A node is
//! inserted before the first following sibling whose destination position is
//! known to be current: one placed during this batch, or one no record of the
//! batch touched. Records describe history, so the sibling they report may
//! already have moved on.
//!
//! Handling a node may uncover structure the feed never reported: children
//! attached while an ancestor was detached, and the contents of a template
//! seen for the first time. Those are walked depth-first with an explicit work
//! stack, and a template's contents fragment becomes a tracked root once its
//! existing contents are instructed.

use crate::clone_map::CloneMap;
use crate::instruction::{InsertionInstruction, InstructionSink};
use crate::roots::RootSet;
use crate::scratch::{MutationRecord, ScratchId, ScratchTree};
use crate::text_buffer::{PendingText, TextBuffer};
use std::collections::{HashMap, HashSet};

/// Nodes reported removed in the current batch and not yet seen again.
#[derive(Debug, Default)]
pub struct RemovalSet {
    order: Vec<ScratchId>,
    members: HashSet<ScratchId>,
}

impl RemovalSet {
    pub fn insert(&mut self, id: ScratchId) {
        if self.members.insert(id) {
            self.order.push(id);
        }
    }

    pub fn remove(&mut self, id: ScratchId) -> bool {
        if !self.members.remove(&id) {
            return false;
        }
        if let Some(index) = self.order.iter().position(|&member| member == id) {
            self.order.remove(index);
        }
        true
    }

    pub fn contains(&self, id: ScratchId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn snapshot(&self) -> Vec<ScratchId> {
        self.order.clone()
    }
}

/// Per-batch bookkeeping.
#[derive(Debug, Default)]
struct Batch {
    removed: RemovalSet,
    /// Every node some record of the batch added or removed.
    touched: HashSet<ScratchId>,
    /// Nodes instructed during the batch, at their current position.
    placed: HashSet<ScratchId>,
    /// Per parent, the index from which no child can serve as an insertion
    /// reference yet. Children only ever become usable during a batch, by
    /// being placed, so the run shrinks from the front.
    unusable_tail: HashMap<ScratchId, usize>,
}

impl Batch {
    fn from_records(records: &[MutationRecord]) -> Self {
        let touched = records
            .iter()
            .flat_map(|record| record.added.iter().chain(&record.removed))
            .copied()
            .collect();
        Self {
            touched,
            ..Self::default()
        }
    }

    /// The destination holds `id` at a position consistent with the current tree.
    fn is_settled(&self, id: ScratchId) -> bool {
        self.placed.contains(&id) || !self.touched.contains(&id)
    }

    fn mark_placed(&mut self, tree: &ScratchTree, id: ScratchId) {
        self.placed.insert(id);
        if let Some(parent) = tree.parent(id)
            && let Some(index) = tree.index_in_parent(id)
            && let Some(tail) = self.unusable_tail.get_mut(&parent)
            && index >= *tail
        {
            *tail = index + 1;
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Visit {
    Node { node: ScratchId, parent: ScratchId },
    /// Start observing a template contents fragment once its contents are out.
    Activate { fragment: ScratchId, host: ScratchId },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcilerStats {
    pub batches: usize,
    pub instructions: usize,
    pub relocations: usize,
    pub dropped_removals: usize,
    pub skipped: usize,
}

/// Turns scratch-tree mutation batches into insertion instructions.
///
/// Owns the clone map, pending text entry and root set of one stream.
#[derive(Debug)]
pub struct Reconciler {
    clones: CloneMap,
    text: TextBuffer,
    roots: RootSet,
    stats: ReconcilerStats,
}

impl Reconciler {
    pub fn new(root: ScratchId) -> Self {
        Self {
            clones: CloneMap::new(),
            text: TextBuffer::new(),
            roots: RootSet::new(root),
            stats: ReconcilerStats::default(),
        }
    }

    pub fn clones(&self) -> &CloneMap {
        &self.clones
    }

    pub fn roots(&self) -> &RootSet {
        &self.roots
    }

    pub fn stats(&self) -> ReconcilerStats {
        self.stats
    }

    pub fn has_pending_text(&self) -> bool {
        !self.text.is_empty()
    }

    pub fn process_batch(
        &mut self,
        tree: &mut ScratchTree,
        records: Vec<MutationRecord>,
        sink: &mut impl InstructionSink,
    ) {
        if records.is_empty() {
            return;
        }
        self.stats.batches += 1;
        log::trace!(
            target: "dom_stream.reconciler",
            "batch #{} with {} records",
            self.stats.batches,
            records.len()
        );

        let mut batch = Batch::from_records(&records);
        for record in records {
            for node in record.removed {
                batch.removed.insert(node);
            }
            for node in record.added {
                batch.removed.remove(node);
                if batch.placed.contains(&node) {
                    continue;
                }
                let Some(parent) = tree.parent(node) else {
                    // Removed again later in the batch.
                    batch.removed.insert(node);
                    continue;
                };
                if parent != record.target {
                    log::trace!(
                        target: "dom_stream.reconciler",
                        "{node:?} reported under {:?}, now under {parent:?}",
                        record.target
                    );
                }
                // Unresolved parents are handled later and walk their children.
                if !self.roots.is_reachable(tree, &self.clones, node)
                    || self.roots.resolve_parent(tree, &self.clones, parent).is_none()
                {
                    continue;
                }
                self.handle_added_node(tree, node, parent, &mut batch, sink);
            }
        }
        self.sweep(tree, &mut batch, sink);
    }

    /// Emit the pending text entry, if any. Called once input has ended.
    pub fn flush(&mut self, tree: &mut ScratchTree, sink: &mut impl InstructionSink) {
        self.finalize_pending_text(tree, &mut Batch::default(), sink);
    }

    fn sweep(&mut self, tree: &mut ScratchTree, batch: &mut Batch, sink: &mut impl InstructionSink) {
        let mut round = 0usize;
        while !batch.removed.is_empty() {
            round += 1;
            let mut progressed = false;
            for node in batch.removed.snapshot() {
                if batch.placed.contains(&node) {
                    batch.removed.remove(node);
                    progressed = true;
                    continue;
                }
                if !self.roots.is_reachable(tree, &self.clones, node) {
                    log::trace!(target: "dom_stream.reconciler", "{node:?} deleted");
                    batch.removed.remove(node);
                    self.stats.dropped_removals += 1;
                    progressed = true;
                    continue;
                }
                let Some(parent) = tree.parent(node) else {
                    continue;
                };
                let next = tree.next_sibling(node);
                if batch.removed.contains(parent)
                    || next.is_some_and(|next| batch.removed.contains(next))
                {
                    continue;
                }
                if self.roots.resolve_parent(tree, &self.clones, parent).is_none() {
                    continue;
                }
                batch.removed.remove(node);
                progressed = true;
                if self.text.pending_node() == Some(node) {
                    // Already queued; it is emitted where it sits once finalized.
                    continue;
                }
                self.handle_added_node(tree, node, parent, batch, sink);
            }
            log::trace!(
                target: "dom_stream.reconciler",
                "sweep round {round}: {} removals left",
                batch.removed.len()
            );
            if !progressed {
                log::debug!(
                    target: "dom_stream.reconciler",
                    "{} removals never resolved: {:?}",
                    batch.removed.len(),
                    batch.removed.snapshot()
                );
                break;
            }
        }
    }

    fn handle_added_node(
        &mut self,
        tree: &mut ScratchTree,
        node: ScratchId,
        parent: ScratchId,
        batch: &mut Batch,
        sink: &mut impl InstructionSink,
    ) {
        let mut stack = vec![Visit::Node { node, parent }];
        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Activate { fragment, host } => {
                    if self.roots.track(fragment) {
                        log::trace!(
                            target: "dom_stream.reconciler",
                            "tracking template contents {fragment:?} of {host:?}"
                        );
                        tree.observe(fragment);
                    }
                }
                Visit::Node { node, parent } => {
                    if batch.placed.contains(&node) {
                        continue;
                    }
                    if self.text.pending_node() != Some(node) {
                        self.finalize_pending_text(tree, batch, sink);
                    }
                    if tree.is_text(node) {
                        let next_sibling = tree.next_sibling(node);
                        self.text.replace(PendingText {
                            node,
                            parent,
                            next_sibling,
                        });
                        continue;
                    }
                    let first_sight = !self.clones.contains(node);
                    if !self.flush_node(tree, node, parent, batch, sink) {
                        continue;
                    }
                    if first_sight && let Some(fragment) = tree.template_contents(node) {
                        stack.push(Visit::Activate {
                            fragment,
                            host: node,
                        });
                        self.push_unplaced_children(tree, fragment, batch, &mut stack);
                    }
                    self.push_unplaced_children(tree, node, batch, &mut stack);
                }
            }
        }
    }

    /// Queue children of `container` the destination does not hold at their
    /// current position, so they pop in tree order.
    fn push_unplaced_children(
        &self,
        tree: &ScratchTree,
        container: ScratchId,
        batch: &Batch,
        stack: &mut Vec<Visit>,
    ) {
        let pending_text = self.text.pending_node();
        for &child in tree.children(container).iter().rev() {
            if pending_text == Some(child) || batch.placed.contains(&child) {
                continue;
            }
            if self.clones.placed_in(child) == Some(container) && !batch.touched.contains(&child) {
                continue;
            }
            stack.push(Visit::Node {
                node: child,
                parent: container,
            });
        }
    }

    /// The destination holds `sibling` in `parent`, settled.
    fn is_reference(&self, sibling: ScratchId, parent: ScratchId, batch: &Batch) -> bool {
        self.clones.placed_in(sibling) == Some(parent)
            && self.clones.contains(sibling)
            && batch.is_settled(sibling)
    }

    /// First sibling after `node` that can serve as its insertion reference.
    fn first_placed_sibling(
        &self,
        tree: &ScratchTree,
        node: ScratchId,
        parent: ScratchId,
        batch: &mut Batch,
    ) -> Option<ScratchId> {
        if tree.parent(node) != Some(parent) {
            return None;
        }
        let start = tree.index_in_parent(node)? + 1;
        let siblings = tree.children(parent);
        let cached = batch.unusable_tail.get(&parent).copied();
        let tail = match cached {
            Some(tail) => tail,
            None => {
                let tail = siblings
                    .iter()
                    .rposition(|&sibling| self.is_reference(sibling, parent, batch))
                    .map_or(0, |index| index + 1);
                batch.unusable_tail.insert(parent, tail);
                tail
            }
        };
        siblings
            .get(start..tail.max(start))?
            .iter()
            .copied()
            .find(|&sibling| self.is_reference(sibling, parent, batch))
    }

    /// Emit the pending text node where it sits now. A text node whose parent
    /// has no clone (or that fell out of every tracked root) is left for
    /// whichever handling reaches it next.
    fn finalize_pending_text(
        &mut self,
        tree: &mut ScratchTree,
        batch: &mut Batch,
        sink: &mut impl InstructionSink,
    ) {
        let Some(entry) = self.text.take() else {
            return;
        };
        let movable = tree.parent(entry.node).filter(|&parent| {
            self.roots.is_reachable(tree, &self.clones, parent)
                && self.roots.resolve_parent(tree, &self.clones, parent).is_some()
        });
        let Some(parent) = movable else {
            log::trace!(
                target: "dom_stream.reconciler",
                "pending text {:?} out of reach; dropped from the buffer",
                entry.node
            );
            return;
        };
        if parent != entry.parent {
            log::trace!(
                target: "dom_stream.reconciler",
                "pending text {:?} moved from {:?} to {parent:?}",
                entry.node,
                entry.parent
            );
        }
        self.flush_node(tree, entry.node, parent, batch, sink);
    }

    /// Clone `node` if needed and emit its instruction. False when the parent
    /// has no clone to insert into, in which case nothing is emitted.
    fn flush_node(
        &mut self,
        tree: &mut ScratchTree,
        node: ScratchId,
        parent: ScratchId,
        batch: &mut Batch,
        sink: &mut impl InstructionSink,
    ) -> bool {
        let Some(insert_parent) = self.roots.resolve_parent(tree, &self.clones, parent) else {
            log::warn!(
                target: "dom_stream.reconciler",
                "no clone for parent {parent:?} of {node:?}; skipped"
            );
            self.stats.skipped += 1;
            return false;
        };
        let next_sibling = self
            .first_placed_sibling(tree, node, parent, batch)
            .and_then(|sibling| self.clones.get(sibling));
        let Some((key, clone)) = self.clones.get_or_clone(tree, node) else {
            self.stats.skipped += 1;
            return false;
        };
        if tree.is_text(node) {
            tree.seal_text(node);
        }
        if clone.is_none() {
            self.stats.relocations += 1;
        }
        self.clones.record_placement(node, parent);
        batch.mark_placed(tree, node);
        self.stats.instructions += 1;
        sink.push(InsertionInstruction {
            key,
            clone,
            parent: insert_parent,
            next_sibling,
        });
        true
    }
}
