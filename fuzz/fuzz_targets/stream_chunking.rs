#![no_main]

use dom_stream::{ApplyingSink, DestinationTree, ReplaySink, one_shot_inner_html, stream_chunks};
use libfuzzer_sys::fuzz_target;

// The first byte picks the delivery cadence, the next few pick split points,
// the rest is the markup.
fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let deliver_every = usize::from(data[0] % 4) + 1;
    let cuts = &data[1..4];
    let Ok(markup) = std::str::from_utf8(&data[4..]) else {
        return;
    };

    let mut chunks = Vec::new();
    let mut start = 0usize;
    for cut in cuts {
        let mut end = start + usize::from(*cut) % (markup.len() - start + 1);
        while !markup.is_char_boundary(end) {
            end += 1;
        }
        chunks.push(&markup[start..end]);
        start = end;
    }
    chunks.push(&markup[start..]);

    let mut replay = ReplaySink::new(DestinationTree::new());
    let mut sink = ApplyingSink::new(&mut replay);
    stream_chunks(chunks, deliver_every, &mut sink);
    if let Err(err) = sink.finish() {
        panic!("replay failed: {err}");
    }
    assert_eq!(replay.destination().inner_html(), one_shot_inner_html(markup));
});
