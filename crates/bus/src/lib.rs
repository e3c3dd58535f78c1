use core_types::RequestId;
use dom_stream::{InsertionInstruction, StreamStats};
use std::io;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

#[derive(Debug)]
pub enum SourceEvent {
    // Source -> parser
    Started {
        request_id: RequestId,
        url: String,
        content_type: Option<String>,
    },
    Text {
        request_id: RequestId,
        text: String,
    },
    Done {
        request_id: RequestId,
        bytes: usize,
    },
    Failed {
        request_id: RequestId,
        error: io::Error,
    },
}

#[derive(Debug)]
pub enum ParseEvent {
    // Parser -> replay
    Started {
        request_id: RequestId,
        url: String,
        content_type: Option<String>,
    },
    Instruction {
        request_id: RequestId,
        instruction: InsertionInstruction,
    },
    Finished {
        request_id: RequestId,
        bytes: usize,
        stats: StreamStats,
    },
    SourceFailed {
        request_id: RequestId,
        error: io::Error,
    },
}

/// Bounded channels between the source, parse and replay stages of one
/// stream. A full queue blocks the producing stage.
pub struct StreamBus {
    pub source_tx: SyncSender<SourceEvent>,
    pub source_rx: Receiver<SourceEvent>,
    pub parse_tx: SyncSender<ParseEvent>,
    pub parse_rx: Receiver<ParseEvent>,
}

impl StreamBus {
    /// Capacities of zero are raised to one.
    pub fn bounded(text_capacity: usize, instruction_capacity: usize) -> Self {
        let (source_tx, source_rx) = sync_channel(text_capacity.max(1));
        let (parse_tx, parse_rx) = sync_channel(instruction_capacity.max(1));
        Self {
            source_tx,
            source_rx,
            parse_tx,
            parse_rx,
        }
    }
}
