//! Applies insertion instructions to a caller-supplied destination tree.

use crate::clone_map::{CloneKey, CloneNode};
use crate::instruction::{InsertionInstruction, InsertionParent, InstructionSink};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DestinationError {
    UnknownHandle,
    /// The parent cannot hold children (text, comment).
    InvalidParent,
    /// The reference node is not a child of the parent.
    InvalidSibling,
    /// Inserting would make a node its own ancestor.
    Cycle,
    /// Only element, text and comment nodes can be inserted.
    InvalidNode,
    NotText,
    NotTemplate,
    InvalidOffset { offset: usize, len: usize },
}

impl fmt::Display for DestinationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationError::UnknownHandle => write!(f, "unknown destination handle"),
            DestinationError::InvalidParent => write!(f, "parent cannot have children"),
            DestinationError::InvalidSibling => write!(f, "reference node is not a child of parent"),
            DestinationError::Cycle => write!(f, "insertion would create a cycle"),
            DestinationError::InvalidNode => write!(f, "node kind cannot be inserted"),
            DestinationError::NotText => write!(f, "node is not a text node"),
            DestinationError::NotTemplate => write!(f, "node is not a template element"),
            DestinationError::InvalidOffset { offset, len } => {
                write!(f, "offset {offset} out of bounds for text of length {len}")
            }
        }
    }
}

impl std::error::Error for DestinationError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplayError {
    UnknownKey(CloneKey),
    /// A second instruction tried to introduce a clone for an existing key.
    DuplicateClone(CloneKey),
    Destination(DestinationError),
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::UnknownKey(key) => write!(f, "instruction references unknown key {}", key.0),
            ReplayError::DuplicateClone(key) => write!(f, "key {} was already introduced", key.0),
            ReplayError::Destination(err) => write!(f, "destination rejected instruction: {err}"),
        }
    }
}

impl std::error::Error for ReplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReplayError::Destination(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DestinationError> for ReplayError {
    fn from(err: DestinationError) -> Self {
        ReplayError::Destination(err)
    }
}

/// A live tree that receives replayed insertions.
///
/// `None` as a parent means the destination's root; `None` as a reference
/// node means "append".
pub trait Destination {
    type Handle: Clone + Eq + Hash + fmt::Debug;

    fn create(&mut self, node: CloneNode) -> Self::Handle;

    fn template_contents(&mut self, template: &Self::Handle)
    -> Result<Self::Handle, DestinationError>;

    fn insert_before(
        &mut self,
        parent: Option<&Self::Handle>,
        node: &Self::Handle,
        before: Option<&Self::Handle>,
    ) -> Result<(), DestinationError>;

    /// The text node directly before the insertion point, with its byte length.
    fn preceding_text(
        &self,
        parent: Option<&Self::Handle>,
        before: Option<&Self::Handle>,
    ) -> Option<(Self::Handle, usize)>;

    fn append_text(&mut self, text: &Self::Handle, data: &str) -> Result<(), DestinationError>;

    /// Split a text node at a byte offset; the tail becomes a new node right after it.
    fn split_text(
        &mut self,
        text: &Self::Handle,
        offset: usize,
    ) -> Result<Self::Handle, DestinationError>;

    /// Detach every child of the root.
    fn clear_root(&mut self);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayConfig {
    /// Merge a new text node into an adjacent preceding text node instead of
    /// inserting a sibling. The merge is undone if a later instruction needs
    /// one of the merged nodes on its own.
    pub coalesce_text: bool,
}

pub type Monitor = Box<dyn FnMut(&InsertionInstruction) + Send>;

pub struct ReplaySink<D: Destination> {
    destination: D,
    config: ReplayConfig,
    handles: HashMap<CloneKey, D::Handle>,
    keys_by_handle: HashMap<D::Handle, CloneKey>,
    // Host text key -> (key, byte length) of every text merged into it, host first.
    runs: HashMap<CloneKey, Vec<(CloneKey, usize)>>,
    aliases: HashMap<CloneKey, CloneKey>,
    monitor: Option<Monitor>,
    applied: usize,
    merged: usize,
}

impl<D: Destination> ReplaySink<D> {
    pub fn new(destination: D) -> Self {
        Self::with_config(destination, ReplayConfig::default())
    }

    pub fn with_config(destination: D, config: ReplayConfig) -> Self {
        Self {
            destination,
            config,
            handles: HashMap::new(),
            keys_by_handle: HashMap::new(),
            runs: HashMap::new(),
            aliases: HashMap::new(),
            monitor: None,
            applied: 0,
            merged: 0,
        }
    }

    /// Observe every instruction before it is applied, while a fresh clone
    /// is still detached from the live tree.
    pub fn set_monitor(&mut self, monitor: Monitor) {
        self.monitor = Some(monitor);
    }

    pub fn clear_monitor(&mut self) {
        self.monitor = None;
    }

    pub fn config(&self) -> ReplayConfig {
        self.config
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    pub fn destination_mut(&mut self) -> &mut D {
        &mut self.destination
    }

    pub fn into_destination(self) -> D {
        self.destination
    }

    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Text insertions absorbed into an existing text node.
    pub fn merged_text(&self) -> usize {
        self.merged
    }

    pub fn handle(&self, key: CloneKey) -> Option<&D::Handle> {
        self.handles.get(&key)
    }

    /// Empty the destination root and forget every key, ready for a new stream.
    pub fn reset(&mut self) {
        self.destination.clear_root();
        self.handles.clear();
        self.keys_by_handle.clear();
        self.runs.clear();
        self.aliases.clear();
        self.applied = 0;
        self.merged = 0;
    }

    pub fn apply(&mut self, instruction: InsertionInstruction) -> Result<(), ReplayError> {
        if let Some(monitor) = self.monitor.as_mut() {
            monitor(&instruction);
        }
        let InsertionInstruction {
            key,
            clone,
            parent,
            next_sibling,
        } = instruction;

        if clone.is_none() {
            self.dissolve_run(key)?;
        }
        if let Some(next) = next_sibling {
            self.dissolve_run(next)?;
        }
        let parent_handle = match parent {
            InsertionParent::Root => None,
            InsertionParent::Node(parent) => {
                self.dissolve_run(parent)?;
                Some(self.lookup(parent)?)
            }
            InsertionParent::TemplateContents(template) => {
                let template = self.lookup(template)?;
                Some(self.destination.template_contents(&template)?)
            }
        };
        let before = next_sibling.map(|next| self.lookup(next)).transpose()?;

        let handle = match clone {
            Some(node) => {
                if self.handles.contains_key(&key) || self.aliases.contains_key(&key) {
                    return Err(ReplayError::DuplicateClone(key));
                }
                if self.config.coalesce_text
                    && let CloneNode::Text(text) = &node
                    && self.try_merge_text(key, text, parent_handle.as_ref(), before.as_ref())?
                {
                    self.applied += 1;
                    return Ok(());
                }
                let handle = self.destination.create(node);
                self.handles.insert(key, handle.clone());
                self.keys_by_handle.insert(handle.clone(), key);
                handle
            }
            None => self.lookup(key)?,
        };
        self.destination
            .insert_before(parent_handle.as_ref(), &handle, before.as_ref())?;
        self.applied += 1;
        Ok(())
    }

    fn lookup(&self, key: CloneKey) -> Result<D::Handle, ReplayError> {
        self.handles
            .get(&key)
            .cloned()
            .ok_or(ReplayError::UnknownKey(key))
    }

    fn try_merge_text(
        &mut self,
        key: CloneKey,
        text: &str,
        parent: Option<&D::Handle>,
        before: Option<&D::Handle>,
    ) -> Result<bool, ReplayError> {
        let Some((host_handle, host_len)) = self.destination.preceding_text(parent, before) else {
            return Ok(false);
        };
        let Some(&host) = self.keys_by_handle.get(&host_handle) else {
            return Ok(false);
        };
        self.destination.append_text(&host_handle, text)?;
        self.runs
            .entry(host)
            .or_insert_with(|| vec![(host, host_len)])
            .push((key, text.len()));
        self.aliases.insert(key, host);
        self.merged += 1;
        Ok(true)
    }

    /// Give every text merged with `key` its own destination node again.
    fn dissolve_run(&mut self, key: CloneKey) -> Result<(), ReplayError> {
        let host = self.aliases.get(&key).copied().unwrap_or(key);
        let Some(run) = self.runs.remove(&host) else {
            return Ok(());
        };
        let host_handle = self.lookup(host)?;
        let mut offset = 0usize;
        let mut starts = Vec::with_capacity(run.len());
        for &(member, len) in &run {
            starts.push((member, offset));
            offset += len;
        }
        // Split from the end so earlier offsets stay valid.
        for &(member, start) in starts.iter().skip(1).rev() {
            let handle = self.destination.split_text(&host_handle, start)?;
            self.aliases.remove(&member);
            self.handles.insert(member, handle.clone());
            self.keys_by_handle.insert(handle, member);
        }
        log::trace!(target: "dom_stream.replay", "split text run of {} nodes", run.len());
        Ok(())
    }
}

impl<D: Destination> fmt::Debug for ReplaySink<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplaySink")
            .field("config", &self.config)
            .field("applied", &self.applied)
            .field("merged", &self.merged)
            .field("keys", &self.handles.len())
            .finish_non_exhaustive()
    }
}

/// Replays in order, stopping at the first error.
pub fn replay_all<D: Destination>(
    sink: &mut ReplaySink<D>,
    instructions: impl IntoIterator<Item = InsertionInstruction>,
) -> Result<usize, ReplayError> {
    let mut count = 0usize;
    for instruction in instructions {
        sink.apply(instruction)?;
        count += 1;
    }
    Ok(count)
}

/// Adapter applying instructions as they are pushed; the first error is
/// kept and later instructions are dropped.
pub struct ApplyingSink<'a, D: Destination> {
    sink: &'a mut ReplaySink<D>,
    error: Option<ReplayError>,
}

impl<'a, D: Destination> ApplyingSink<'a, D> {
    pub fn new(sink: &'a mut ReplaySink<D>) -> Self {
        Self { sink, error: None }
    }

    pub fn finish(self) -> Result<(), ReplayError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<D: Destination> InstructionSink for ApplyingSink<'_, D> {
    fn push(&mut self, instruction: InsertionInstruction) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.sink.apply(instruction) {
            self.error = Some(err);
        }
    }
}
