use super::{MutationRecord, ScratchId, ScratchTree};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::{ParseOpts, Parser};

/// Markup written ahead of every stream so the content lands in `<body>`.
pub const STREAM_PREAMBLE: &str = "<!DOCTYPE html><body>";

/// An incremental tree builder that mutates a [`ScratchTree`].
///
/// The HTML tree-construction rules live entirely behind this interface.
pub trait TreeConstruction {
    fn feed(&mut self, text: &str);
    /// Signal end of input; the builder runs its end-of-file steps.
    fn close(&mut self);
    fn is_closed(&self) -> bool;
    fn tree(&self) -> &ScratchTree;
    fn tree_mut(&mut self) -> &mut ScratchTree;
}

enum BuilderState {
    Open(Box<Parser<ScratchTree>>),
    Closed(ScratchTree),
}

/// [`TreeConstruction`] backed by html5ever's document parser.
pub struct Html5everBuilder {
    state: BuilderState,
}

impl Default for Html5everBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Html5everBuilder {
    pub fn new() -> Self {
        let opts = ParseOpts {
            tree_builder: TreeBuilderOpts {
                // The scratch document is inert, like a parsed document without a browsing context.
                scripting_enabled: false,
                ..TreeBuilderOpts::default()
            },
            ..ParseOpts::default()
        };
        let parser = html5ever::parse_document(ScratchTree::new(), opts);
        Self {
            state: BuilderState::Open(Box::new(parser)),
        }
    }
}

impl TreeConstruction for Html5everBuilder {
    fn feed(&mut self, text: &str) {
        match &mut self.state {
            BuilderState::Open(parser) => parser.process(StrTendril::from_slice(text)),
            BuilderState::Closed(_) => {
                log::warn!(target: "dom_stream.scratch", "feed after close dropped {} bytes", text.len());
            }
        }
    }

    fn close(&mut self) {
        let state = std::mem::replace(&mut self.state, BuilderState::Closed(ScratchTree::new()));
        self.state = match state {
            BuilderState::Open(parser) => BuilderState::Closed((*parser).finish()),
            closed @ BuilderState::Closed(_) => closed,
        };
    }

    fn is_closed(&self) -> bool {
        matches!(self.state, BuilderState::Closed(_))
    }

    fn tree(&self) -> &ScratchTree {
        match &self.state {
            BuilderState::Open(parser) => &parser.tokenizer.sink.sink,
            BuilderState::Closed(tree) => tree,
        }
    }

    fn tree_mut(&mut self) -> &mut ScratchTree {
        match &mut self.state {
            BuilderState::Open(parser) => &mut parser.tokenizer.sink.sink,
            BuilderState::Closed(tree) => tree,
        }
    }
}

/// Feeds text chunks into a tree builder against a scratch document whose
/// `<body>` is the observed stream root.
pub struct ScratchDriver<B = Html5everBuilder> {
    builder: B,
    root: ScratchId,
}

impl ScratchDriver<Html5everBuilder> {
    pub fn new() -> Self {
        Self::with_builder(Html5everBuilder::new())
    }
}

impl Default for ScratchDriver<Html5everBuilder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: TreeConstruction> ScratchDriver<B> {
    pub fn with_builder(mut builder: B) -> Self {
        builder.feed(STREAM_PREAMBLE);
        let tree = builder.tree_mut();
        let root = tree.find_body().unwrap_or_else(|| {
            log::warn!(target: "dom_stream.scratch", "preamble produced no body; observing the document");
            tree.document()
        });
        tree.take_records();
        tree.observe(root);
        Self { builder, root }
    }

    pub fn root(&self) -> ScratchId {
        self.root
    }

    pub fn write(&mut self, text: &str) {
        if !text.is_empty() {
            self.builder.feed(text);
        }
    }

    pub fn close(&mut self) {
        self.builder.close();
    }

    pub fn is_closed(&self) -> bool {
        self.builder.is_closed()
    }

    pub fn tree(&self) -> &ScratchTree {
        self.builder.tree()
    }

    pub fn tree_mut(&mut self) -> &mut ScratchTree {
        self.builder.tree_mut()
    }

    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        self.builder.tree_mut().take_records()
    }
}
