use dom_stream::{
    ApplyingSink, CloneNode, DestinationTree, DomParserStream, InsertionInstruction, ReplayConfig,
    ReplaySink,
};

fn stream_into_tree(chunks: &[&str], config: ReplayConfig) -> ReplaySink<DestinationTree> {
    let mut replay = ReplaySink::with_config(DestinationTree::new(), config);
    let mut stream = DomParserStream::new();
    {
        let mut sink = ApplyingSink::new(&mut replay);
        for chunk in chunks {
            stream.write(chunk, &mut sink);
        }
        stream.finish(&mut sink);
        sink.finish().unwrap_or_else(|err| panic!("replay failed: {err}"));
    }
    replay
}

fn text_instruction(instruction: &InsertionInstruction) -> Option<&str> {
    match instruction.clone.as_ref()? {
        CloneNode::Text(text) => Some(text),
        _ => None,
    }
}

#[test]
fn growing_script_text_is_emitted_once_complete() {
    let mut stream = DomParserStream::new();
    let mut out = Vec::new();
    stream.write("<script>x=1;", &mut out);
    assert_eq!(out.len(), 1);
    assert!(out.iter().all(|instruction| text_instruction(instruction).is_none()));

    stream.write("</script>", &mut out);
    stream.finish(&mut out);
    let texts: Vec<&str> = out.iter().filter_map(text_instruction).collect();
    assert_eq!(texts, ["x=1;"]);
}

#[test]
fn streamed_inline_script_runs_exactly_once_with_its_full_text() {
    let replay = stream_into_tree(
        &["<p>a</p><scr", "ipt>var x", " = 1;</scr", "ipt><p>b</p>"],
        ReplayConfig::default(),
    );
    let tree = replay.destination();
    let runs = tree.executed_scripts();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].text, "var x = 1;");
    assert_eq!(runs[0].src, None);
    assert!(tree.is_connected(runs[0].node));
    assert!(tree.element(runs[0].node).is_some_and(|element| element.already_started));
}

#[test]
fn script_clones_never_start_out_as_started() {
    let mut stream = DomParserStream::new();
    let mut out = Vec::new();
    stream.write("<script src=a.js></script><script>1</script>", &mut out);
    stream.finish(&mut out);
    let scripts: Vec<_> = out
        .iter()
        .filter_map(|instruction| instruction.clone.as_ref()?.as_element())
        .filter(|element| element.is_script())
        .collect();
    assert_eq!(scripts.len(), 2);
    assert!(scripts.iter().all(|element| !element.already_started));
    assert_eq!(scripts[0].attribute("src"), Some("a.js"));
}

#[test]
fn external_and_inert_scripts() {
    let replay = stream_into_tree(
        &[
            "<script src=a.js></script>",
            "<script type=text/plain>not code</script>",
            "<template><script>inert()</script></template>",
        ],
        ReplayConfig::default(),
    );
    let runs = replay.destination().executed_scripts();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].src.as_deref(), Some("a.js"));
}

#[test]
fn coalesced_replay_serializes_like_plain_replay() {
    let chunks = ["<p>one ", "<b>two</b>", " three", "<table>x<tr><td>y</table>"];
    let plain = stream_into_tree(&chunks, ReplayConfig::default());
    let coalesced = stream_into_tree(
        &chunks,
        ReplayConfig {
            coalesce_text: true,
        },
    );
    assert_eq!(
        plain.destination().inner_html(),
        coalesced.destination().inner_html()
    );
}

#[test]
fn foster_parented_text_split_by_a_delivery_stays_one_node() {
    let chunks = ["<table>x<tr><td>1</td></tr>", "y</table>"];
    let plain = stream_into_tree(&chunks, ReplayConfig::default());
    let coalesced = stream_into_tree(
        &chunks,
        ReplayConfig {
            coalesce_text: true,
        },
    );
    let expected = "xy<table><tbody><tr><td>1</td></tr></tbody></table>";
    assert_eq!(plain.destination().inner_html(), expected);
    assert_eq!(coalesced.destination().inner_html(), expected);

    let root_children = |replay: &ReplaySink<DestinationTree>| {
        let tree = replay.destination();
        tree.children(tree.root()).len()
    };
    // "x" is still the pending text when "y" arrives, so both grow one node.
    assert_eq!(root_children(&plain), 2);
    assert_eq!(root_children(&coalesced), 2);
    assert_eq!(coalesced.merged_text(), 0);
    let text_of = |replay: &ReplaySink<DestinationTree>| {
        let tree = replay.destination();
        tree.text(tree.children(tree.root())[0]).map(str::to_owned)
    };
    assert_eq!(text_of(&plain).as_deref(), Some("xy"));
    assert_eq!(text_of(&coalesced).as_deref(), Some("xy"));
}
