// crates/runtime_net/src/lib.rs
use std::io::{self, Read};
use std::sync::mpsc::SyncSender;
use std::thread::{self, JoinHandle};

use bus::SourceEvent;
use core_types::{AbortSignal, RequestId};
use net::{FetchOptions, is_html, open_source};
use tools::utf8::Utf8StreamDecoder;

/// Where a stream's bytes come from.
pub enum SourceInput {
    Reader(Box<dyn Read + Send>),
    /// Opened on the source thread, so connecting does not block the caller.
    Url { url: String, options: FetchOptions },
}

impl std::fmt::Debug for SourceInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceInput::Reader(_) => f.write_str("SourceInput::Reader"),
            SourceInput::Url { url, .. } => write!(f, "SourceInput::Url({url})"),
        }
    }
}

/// Read `input` on a new thread, decode it as UTF-8 and send the text in
/// order. The thread stops at end of input, on the first error, once `abort`
/// fires, or when the receiving side hangs up.
pub fn start_source_runtime(
    request_id: RequestId,
    input: SourceInput,
    read_chunk_size: usize,
    evt_tx: SyncSender<SourceEvent>,
    abort: AbortSignal,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("source-{request_id}"))
        .spawn(move || {
            let (url, content_type, mut body) = match input {
                SourceInput::Reader(reader) => (String::new(), None, reader),
                SourceInput::Url { url, options } => match open_source(&url, &options) {
                    Ok(source) => (source.url, source.content_type, source.body),
                    Err(err) => {
                        log::debug!(target: "runtime_net", "open {url} failed: {err}");
                        let _ = evt_tx.send(SourceEvent::Failed {
                            request_id,
                            error: io::Error::other(err),
                        });
                        return;
                    }
                },
            };
            if let Some(kind) = content_type.as_deref()
                && !is_html(Some(kind))
            {
                log::debug!(target: "runtime_net", "{url} is {kind}; parsed as HTML anyway");
            }
            if abort.is_aborted() {
                return;
            }
            if evt_tx
                .send(SourceEvent::Started {
                    request_id,
                    url,
                    content_type,
                })
                .is_err()
            {
                return;
            }
            pump(request_id, &mut body, read_chunk_size.max(1), &evt_tx, &abort);
        })
}

fn pump(
    request_id: RequestId,
    body: &mut dyn Read,
    read_chunk_size: usize,
    evt_tx: &SyncSender<SourceEvent>,
    abort: &AbortSignal,
) {
    let mut decoder = Utf8StreamDecoder::new();
    let mut buf = vec![0u8; read_chunk_size];
    let mut bytes = 0usize;
    loop {
        if abort.is_aborted() {
            log::trace!(target: "runtime_net", "request {request_id} aborted after {bytes} bytes");
            return;
        }
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                let _ = evt_tx.send(SourceEvent::Failed {
                    request_id,
                    error: err,
                });
                return;
            }
        };
        bytes += n;
        let text = decoder.decode(&buf[..n]);
        if text.is_empty() {
            continue;
        }
        if evt_tx.send(SourceEvent::Text { request_id, text }).is_err() {
            return;
        }
    }

    let tail = decoder.finish();
    if !tail.is_empty() && evt_tx.send(SourceEvent::Text { request_id, text: tail }).is_err() {
        return;
    }
    log::trace!(target: "runtime_net", "request {request_id} done: {bytes} bytes");
    let _ = evt_tx.send(SourceEvent::Done { request_id, bytes });
}
