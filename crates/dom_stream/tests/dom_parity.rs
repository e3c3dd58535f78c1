#![cfg(feature = "dom-snapshot")]

use dom_stream::dom_snapshot::{DomSnapshot, DomSnapshotOptions, assert_dom_eq, compare_dom};
use dom_stream::{
    DestinationTree, DomParserStream, InsertionInstruction, Node, ReplaySink, ScratchDriver,
    inner_html, one_shot_snapshot, replay_all,
};
use html_test_support::{ChunkPlan, diff_lines, tree_construction_cases};

fn streamed(chunks: &[String], deliver_every: usize) -> (Node, DomParserStream) {
    let mut stream = DomParserStream::with_delivery(ScratchDriver::new(), deliver_every);
    let mut out: Vec<InsertionInstruction> = Vec::new();
    for chunk in chunks {
        stream.write(chunk, &mut out);
    }
    stream.finish(&mut out);
    let mut sink = ReplaySink::new(DestinationTree::new());
    replay_all(&mut sink, out).unwrap_or_else(|err| panic!("replay failed: {err}"));
    (sink.destination().snapshot(), stream)
}

fn char_chunks(markup: &str) -> Vec<String> {
    ChunkPlan::fixed(1).str_chunks(markup)
}

#[test]
fn destination_matches_one_shot_parse_for_every_fixture() {
    for case in tree_construction_cases() {
        let expected = one_shot_snapshot(&case.input);
        for chunks in [vec![case.input.clone()], char_chunks(&case.input)] {
            let (actual, _) = streamed(&chunks, 1);
            if let Err(mismatch) = compare_dom(&expected, &actual, DomSnapshotOptions::default()) {
                panic!("{} ({} chunks): {mismatch}", case.name, chunks.len());
            }
        }
    }
}

#[test]
fn scratch_tree_converges_to_the_one_shot_tree() {
    for case in tree_construction_cases() {
        let (_, stream) = streamed(&char_chunks(&case.input), 2);
        assert_dom_eq(
            &one_shot_snapshot(&case.input),
            &stream.scratch_snapshot(),
            DomSnapshotOptions::default(),
        );
    }
}

#[test]
fn misnested_formatting_matches_whole_and_char_input() {
    let markup = "<b><p>Bold </b> Not bold</p>Also not bold.";
    let (whole, _) = streamed(&[markup.to_string()], 1);
    let (chars, _) = streamed(&char_chunks(markup), 1);
    let options = DomSnapshotOptions::default();
    let expected = DomSnapshot::new(&whole, options);
    let actual = DomSnapshot::new(&chars, options);
    assert!(
        expected.as_lines() == actual.as_lines(),
        "{}",
        diff_lines(expected.as_lines(), actual.as_lines())
    );
    assert_eq!(
        inner_html(&chars),
        "<b></b><p><b>Bold </b> Not bold</p>Also not bold."
    );
}

#[test]
fn nested_templates_keep_three_scopes_in_order() {
    let markup = "a<template>b<template>c</template>d</template>e";
    for chunks in [vec![markup.to_string()], char_chunks(markup)] {
        let (tree, stream) = streamed(&chunks, 1);
        assert_eq!(stream.reconciler().roots().len(), 3);

        let children = tree.children();
        assert_eq!(children.len(), 3);
        let Node::Element {
            contents: Some(outer),
            children: outer_children,
            ..
        } = &children[1]
        else {
            panic!("expected the outer template, got {:?}", children[1]);
        };
        assert!(outer_children.is_empty());
        assert_eq!(outer.len(), 3);
        assert_eq!(inner_html(&children[1]), "b<template>c</template>d");
        assert_eq!(inner_html(&outer[1]), "c");

        let snapshot = DomSnapshot::new(&tree, DomSnapshotOptions::default());
        assert_eq!(
            snapshot.as_lines(),
            [
                "#fragment",
                "  \"a\"",
                "  <template>",
                "    content",
                "      \"b\"",
                "      <template>",
                "        content",
                "          \"c\"",
                "      \"d\"",
                "  \"e\"",
            ]
        );
    }
}

#[test]
fn mismatches_report_the_differing_path() {
    let left = one_shot_snapshot("<div id=x><p>one</p></div>");
    let right = one_shot_snapshot("<div id=x><p>two</p></div>");
    let mismatch = compare_dom(&left, &right, DomSnapshotOptions::default())
        .expect_err("text differs");
    assert!(mismatch.path().contains("div#x"), "{}", mismatch.path());
    assert!(mismatch.to_string().contains("one"));
}
