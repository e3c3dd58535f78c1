//! Chunked markup in, insertion instructions out.

use crate::instruction::InstructionSink;
use crate::reconciler::{Reconciler, ReconcilerStats};
use crate::scratch::{Html5everBuilder, ScratchDriver, TreeConstruction};
use crate::serialize;
use crate::types::Node;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub chunks: usize,
    pub bytes: usize,
    pub deliveries: usize,
    pub clones: usize,
    pub parse_errors: usize,
    pub reconciler: ReconcilerStats,
}

/// Incremental parse of one markup stream into insertion instructions.
///
/// Change records are handed to the reconciler after every `deliver_every`
/// writes and once more when the stream finishes; in between they pile up in
/// the scratch tree as one batch.
pub struct DomParserStream<B = Html5everBuilder> {
    driver: ScratchDriver<B>,
    reconciler: Reconciler,
    deliver_every: usize,
    writes_since_delivery: usize,
    stats: StreamStats,
    finished: bool,
}

impl DomParserStream<Html5everBuilder> {
    pub fn new() -> Self {
        Self::with_delivery(ScratchDriver::new(), 1)
    }
}

impl Default for DomParserStream<Html5everBuilder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: TreeConstruction> DomParserStream<B> {
    /// `deliver_every` of zero is treated as one.
    pub fn with_delivery(driver: ScratchDriver<B>, deliver_every: usize) -> Self {
        let reconciler = Reconciler::new(driver.root());
        Self {
            driver,
            reconciler,
            deliver_every: deliver_every.max(1),
            writes_since_delivery: 0,
            stats: StreamStats::default(),
            finished: false,
        }
    }

    pub fn write(&mut self, chunk: &str, sink: &mut impl InstructionSink) {
        if self.finished {
            log::warn!(target: "dom_stream.stream", "write after finish ignored");
            return;
        }
        if chunk.is_empty() {
            return;
        }
        self.stats.chunks += 1;
        self.stats.bytes += chunk.len();
        self.driver.write(chunk);
        self.writes_since_delivery += 1;
        if self.writes_since_delivery >= self.deliver_every {
            self.deliver(sink);
        }
    }

    /// Hand the records gathered so far to the reconciler.
    pub fn deliver(&mut self, sink: &mut impl InstructionSink) {
        self.writes_since_delivery = 0;
        let records = self.driver.take_records();
        if records.is_empty() {
            return;
        }
        self.stats.deliveries += 1;
        self.reconciler
            .process_batch(self.driver.tree_mut(), records, sink);
    }

    /// End of input: close the tree builder, deliver what it did on close, and
    /// emit the held-back text node.
    pub fn finish(&mut self, sink: &mut impl InstructionSink) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.driver.close();
        self.deliver(sink);
        self.reconciler.flush(self.driver.tree_mut(), sink);
        log::debug!(
            target: "dom_stream.stream",
            "stream finished: {} chunks, {} clones, {} instructions",
            self.stats.chunks,
            self.reconciler.clones().len(),
            self.reconciler.stats().instructions
        );
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            clones: self.reconciler.clones().len(),
            parse_errors: self.driver.tree().parse_errors(),
            reconciler: self.reconciler.stats(),
            ..self.stats
        }
    }

    pub fn driver(&self) -> &ScratchDriver<B> {
        &self.driver
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Current scratch content under the stream root.
    pub fn scratch_snapshot(&self) -> Node {
        self.driver.tree().snapshot(self.driver.root())
    }
}

/// Parse `markup` in one piece without reconciling: the reference tree a
/// stream of the same markup must converge to.
pub fn one_shot_snapshot(markup: &str) -> Node {
    let mut driver = ScratchDriver::new();
    driver.write(markup);
    driver.close();
    driver.tree().snapshot(driver.root())
}

pub fn one_shot_inner_html(markup: &str) -> String {
    serialize::inner_html(&one_shot_snapshot(markup))
}

/// Run `chunks` through a fresh stream, collecting every instruction.
pub fn stream_chunks<'a>(
    chunks: impl IntoIterator<Item = &'a str>,
    deliver_every: usize,
    sink: &mut impl InstructionSink,
) -> StreamStats {
    let mut stream = DomParserStream::with_delivery(ScratchDriver::new(), deliver_every);
    for chunk in chunks {
        stream.write(chunk, sink);
    }
    stream.finish(sink);
    stream.stats()
}
