//! Streaming HTML into a live tree.
//!
//! Markup chunks are parsed into an off-screen scratch document by a real
//! HTML tree builder. Every child-list change inside the stream root is
//! recorded, and the reconciler turns each batch of records into ordered
//! insertion instructions over clones of the scratch nodes. A [`ReplaySink`]
//! applies the instructions to any [`Destination`], so the destination grows
//! as the markup arrives and ends up equivalent to a one-shot parse.

pub mod clone_map;
pub mod dest_tree;
#[cfg(any(test, feature = "dom-snapshot"))]
pub mod dom_snapshot;
pub mod instruction;
pub mod reconciler;
pub mod replay;
pub mod roots;
pub mod scratch;
pub mod serialize;
pub mod stream;
pub mod text_buffer;

mod types;

pub use crate::clone_map::{CloneKey, CloneMap, CloneNode, ElementClone};
pub use crate::dest_tree::{DestId, DestinationTree, ScriptRun};
pub use crate::instruction::{
    CountingSink, InsertionInstruction, InsertionParent, InstructionSink,
};
pub use crate::reconciler::{Reconciler, ReconcilerStats};
pub use crate::replay::{
    ApplyingSink, Destination, DestinationError, Monitor, ReplayConfig, ReplayError, ReplaySink,
    replay_all,
};
pub use crate::scratch::{ScratchDriver, ScratchId, ScratchTree, TreeConstruction};
pub use crate::serialize::{inner_html, outer_html};
pub use crate::stream::{
    DomParserStream, StreamStats, one_shot_inner_html, one_shot_snapshot, stream_chunks,
};
pub use crate::types::{ElementNamespace, Node};
