use crate::scratch::ScratchId;

/// A text insertion held back because the text may still grow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingText {
    pub node: ScratchId,
    pub parent: ScratchId,
    pub next_sibling: Option<ScratchId>,
}

/// Holds at most one pending text insertion; text is always one step behind.
#[derive(Debug, Default)]
pub struct TextBuffer {
    pending: Option<PendingText>,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `entry`, handing back whatever it supersedes.
    pub fn replace(&mut self, entry: PendingText) -> Option<PendingText> {
        self.pending.replace(entry)
    }

    pub fn take(&mut self) -> Option<PendingText> {
        self.pending.take()
    }

    pub fn pending_node(&self) -> Option<ScratchId> {
        self.pending.map(|entry| entry.node)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(node: usize) -> PendingText {
        PendingText {
            node: ScratchId(node),
            parent: ScratchId(1),
            next_sibling: None,
        }
    }

    #[test]
    fn replace_returns_superseded_entry() {
        let mut buffer = TextBuffer::new();
        assert!(buffer.replace(entry(5)).is_none());
        assert_eq!(buffer.pending_node(), Some(ScratchId(5)));
        assert_eq!(buffer.replace(entry(6)), Some(entry(5)));
        assert_eq!(buffer.take(), Some(entry(6)));
        assert!(buffer.is_empty());
        assert!(buffer.take().is_none());
    }
}
