//! Ordered insertion protocol between the reconciler and a replay sink.
//!
//! Invariants:
//! - Instructions are applied strictly in emission order.
//! - The first instruction for a key carries its clone; later ones relocate
//!   the existing clone and carry none.
//! - `parent` and `next_sibling` only name keys that earlier instructions
//!   already introduced.

use crate::clone_map::{CloneKey, CloneNode};

/// Where an instruction inserts its node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InsertionParent {
    /// Directly under the destination's root.
    Root,
    Node(CloneKey),
    /// Under the contents of the given template clone.
    TemplateContents(CloneKey),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsertionInstruction {
    pub key: CloneKey,
    pub clone: Option<CloneNode>,
    pub parent: InsertionParent,
    /// `None` appends at the end of `parent`.
    pub next_sibling: Option<CloneKey>,
}

impl InsertionInstruction {
    pub fn is_relocation(&self) -> bool {
        self.clone.is_none()
    }
}

pub trait InstructionSink {
    fn push(&mut self, instruction: InsertionInstruction);
}

impl InstructionSink for Vec<InsertionInstruction> {
    fn push(&mut self, instruction: InsertionInstruction) {
        Vec::push(self, instruction);
    }
}

/// Counts instructions without keeping them.
#[derive(Debug, Default)]
pub struct CountingSink {
    pub instructions: usize,
    pub clones: usize,
}

impl InstructionSink for CountingSink {
    fn push(&mut self, instruction: InsertionInstruction) {
        self.instructions += 1;
        if instruction.clone.is_some() {
            self.clones += 1;
        }
    }
}
