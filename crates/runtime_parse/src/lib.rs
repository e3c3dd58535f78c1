//! Threaded streaming pipeline.
//!
//! ```text
//! source thread --text--> parse thread --instructions--> caller (replay)
//! ```
//!
//! Both queues are bounded, so a slow destination holds back the parser and
//! a slow parser holds back the reader. Instructions are applied one at a
//! time on the caller's thread, in emission order.

use std::fmt;
use std::io;
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bus::{ParseEvent, SourceEvent, StreamBus};
use core_types::{AbortSignal, RequestId};
use dom_stream::{
    Destination, DomParserStream, InsertionInstruction, InstructionSink, ReplayError, ReplaySink,
    ScratchDriver, StreamStats,
};
use runtime_net::{SourceInput, start_source_runtime};

const ABORT_POLL: Duration = Duration::from_millis(20);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// Instructions buffered between the parse thread and the replay.
    pub queue_capacity: usize,
    /// Decoded text chunks buffered between the source and the parse thread.
    pub text_queue_capacity: usize,
    /// Text chunks fed to the parser per change-feed delivery.
    pub deliver_every: usize,
    pub read_chunk_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            text_queue_capacity: 16,
            deliver_every: 1,
            read_chunk_size: 8 * 1024,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    /// Stopped by the abort signal; what was applied so far stays applied.
    Aborted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamSummary {
    pub outcome: StreamOutcome,
    /// Instructions applied to the destination by this call.
    pub applied: usize,
    pub url: Option<String>,
    pub content_type: Option<String>,
    pub bytes: usize,
    /// Parser-side numbers; only known once the stream completed.
    pub stats: Option<StreamStats>,
}

#[derive(Debug)]
pub enum StreamError {
    Source(io::Error),
    Replay(ReplayError),
    /// A pipeline thread could not start or went away without a result.
    Runtime(&'static str),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Source(err) => write!(f, "source error: {err}"),
            StreamError::Replay(err) => write!(f, "replay error: {err}"),
            StreamError::Runtime(what) => write!(f, "pipeline error: {what}"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Source(err) => Some(err),
            StreamError::Replay(err) => Some(err),
            StreamError::Runtime(_) => None,
        }
    }
}

impl From<ReplayError> for StreamError {
    fn from(err: ReplayError) -> Self {
        StreamError::Replay(err)
    }
}

/// Feeds the stream's instructions into the bounded queue; stops forwarding
/// once the receiver is gone or the stream is aborted.
struct ChannelSink<'a> {
    request_id: RequestId,
    tx: &'a SyncSender<ParseEvent>,
    abort: &'a AbortSignal,
    closed: bool,
}

impl ChannelSink<'_> {
    fn is_closed(&self) -> bool {
        self.closed || self.abort.is_aborted()
    }
}

impl InstructionSink for ChannelSink<'_> {
    fn push(&mut self, instruction: InsertionInstruction) {
        if self.is_closed() {
            return;
        }
        let event = ParseEvent::Instruction {
            request_id: self.request_id,
            instruction,
        };
        if self.tx.send(event).is_err() {
            self.closed = true;
        }
    }
}

/// Run the parser on its own thread, fed by `text_rx`.
///
/// The tree builder is created on the new thread and never leaves it.
pub fn start_parse_runtime(
    request_id: RequestId,
    deliver_every: usize,
    text_rx: Receiver<SourceEvent>,
    evt_tx: SyncSender<ParseEvent>,
    abort: AbortSignal,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("parse-{request_id}"))
        .spawn(move || {
            let mut stream = DomParserStream::with_delivery(ScratchDriver::new(), deliver_every);
            let mut sink = ChannelSink {
                request_id,
                tx: &evt_tx,
                abort: &abort,
                closed: false,
            };
            while let Ok(event) = text_rx.recv() {
                if sink.is_closed() {
                    log::trace!(target: "runtime_parse", "request {request_id} stopped feeding");
                    return;
                }
                match event {
                    SourceEvent::Started {
                        url, content_type, ..
                    } => {
                        let started = ParseEvent::Started {
                            request_id,
                            url,
                            content_type,
                        };
                        if evt_tx.send(started).is_err() {
                            return;
                        }
                    }
                    SourceEvent::Text { text, .. } => stream.write(&text, &mut sink),
                    SourceEvent::Done { bytes, .. } => {
                        stream.finish(&mut sink);
                        if sink.is_closed() {
                            return;
                        }
                        let _ = evt_tx.send(ParseEvent::Finished {
                            request_id,
                            bytes,
                            stats: stream.stats(),
                        });
                        return;
                    }
                    SourceEvent::Failed { error, .. } => {
                        let _ = evt_tx.send(ParseEvent::SourceFailed { request_id, error });
                        return;
                    }
                }
            }
            log::debug!(target: "runtime_parse", "request {request_id}: source hung up");
        })
}

/// Aborts the pipeline threads when the replay loop exits for any reason.
struct PipelineGuard(AbortSignal);

impl Drop for PipelineGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Stream `input` into `replay`, blocking until the stream completes, fails
/// or `abort` fires.
///
/// Cancellation is not an error: the summary reports
/// [`StreamOutcome::Aborted`] and the destination keeps exactly the
/// instructions applied before the abort was seen.
pub fn stream_into<D: Destination>(
    request_id: RequestId,
    input: SourceInput,
    replay: &mut ReplaySink<D>,
    config: &StreamConfig,
    abort: &AbortSignal,
) -> Result<StreamSummary, StreamError> {
    let pipeline = abort.child();
    let _guard = PipelineGuard(pipeline.clone());
    let StreamBus {
        source_tx,
        source_rx,
        parse_tx,
        parse_rx,
    } = StreamBus::bounded(config.text_queue_capacity, config.queue_capacity);

    start_source_runtime(
        request_id,
        input,
        config.read_chunk_size,
        source_tx,
        pipeline.clone(),
    )
    .map_err(|_| StreamError::Runtime("source thread failed to start"))?;
    start_parse_runtime(
        request_id,
        config.deliver_every,
        source_rx,
        parse_tx,
        pipeline,
    )
    .map_err(|_| StreamError::Runtime("parse thread failed to start"))?;

    let mut summary = StreamSummary {
        outcome: StreamOutcome::Aborted,
        applied: 0,
        url: None,
        content_type: None,
        bytes: 0,
        stats: None,
    };
    loop {
        if abort.is_aborted() {
            log::debug!(
                target: "runtime_parse",
                "request {request_id} aborted after {} instructions",
                summary.applied
            );
            return Ok(summary);
        }
        let event = match parse_rx.recv_timeout(ABORT_POLL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(StreamError::Runtime("parse thread stopped without a result"));
            }
        };
        match event {
            ParseEvent::Started {
                url, content_type, ..
            } => {
                summary.url = (!url.is_empty()).then_some(url);
                summary.content_type = content_type;
            }
            ParseEvent::Instruction { instruction, .. } => {
                replay.apply(instruction)?;
                summary.applied += 1;
            }
            ParseEvent::Finished { bytes, stats, .. } => {
                summary.outcome = StreamOutcome::Completed;
                summary.bytes = bytes;
                summary.stats = Some(stats);
                log::debug!(
                    target: "runtime_parse",
                    "request {request_id} complete: {bytes} bytes, {} instructions",
                    summary.applied
                );
                return Ok(summary);
            }
            ParseEvent::SourceFailed { error, .. } => return Err(StreamError::Source(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom_stream::DestinationTree;
    use html_test_support::{ChunkPlan, ChunkedReader};

    #[test]
    fn channel_sink_stops_after_abort() {
        let (tx, rx) = std::sync::mpsc::sync_channel(8);
        let abort = AbortSignal::new();
        let mut out = Vec::new();
        let mut stream = DomParserStream::new();
        stream.write("<p>a</p><p>b</p>", &mut out);
        let mut sink = ChannelSink {
            request_id: 1,
            tx: &tx,
            abort: &abort,
            closed: false,
        };
        sink.push(out[0].clone());
        abort.abort();
        sink.push(out[1].clone());
        drop(tx);
        assert_eq!(rx.iter().count(), 1);
    }

    #[test]
    fn reader_input_streams_to_completion() {
        let markup = "<ul><li>one<li>two</ul>";
        let reader = ChunkedReader::new(markup, &ChunkPlan::fixed(3));
        let mut replay = ReplaySink::new(DestinationTree::new());
        let summary = stream_into(
            1,
            SourceInput::Reader(Box::new(reader)),
            &mut replay,
            &StreamConfig::default(),
            &AbortSignal::new(),
        )
        .unwrap();
        assert_eq!(summary.outcome, StreamOutcome::Completed);
        assert_eq!(summary.bytes, markup.len());
        assert_eq!(summary.url, None);
        let stats = summary.stats.unwrap();
        assert_eq!(stats.reconciler.instructions, summary.applied);
        assert_eq!(
            replay.destination().inner_html(),
            "<ul><li>one</li><li>two</li></ul>"
        );
    }

    #[test]
    fn an_already_aborted_signal_applies_nothing() {
        let abort = AbortSignal::new();
        abort.abort();
        let reader = ChunkedReader::new("<p>x</p>", &ChunkPlan::fixed(1));
        let mut replay = ReplaySink::new(DestinationTree::new());
        let summary = stream_into(
            1,
            SourceInput::Reader(Box::new(reader)),
            &mut replay,
            &StreamConfig::default(),
            &abort,
        )
        .unwrap();
        assert_eq!(summary.outcome, StreamOutcome::Aborted);
        assert_eq!(summary.applied, 0);
        assert_eq!(replay.destination().inner_html(), "");
    }
}
