use dom_stream::{
    CloneKey, DestinationTree, InsertionInstruction, InsertionParent, ReplaySink,
    one_shot_inner_html, replay_all, stream_chunks,
};
use html_test_support::{ChunkerConfig, build_chunk_plans, diff_lines, tree_construction_cases};
use std::collections::HashSet;
use std::env;

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn fuzz_budget() -> (usize, u64) {
    let runs = env_u64("STREAM_FUZZ_RUNS", 4) as usize;
    let seed = env_u64("STREAM_FUZZ_SEED", 0xC0FFEE);
    (runs, seed)
}

fn stream(chunks: &[String], deliver_every: usize) -> Vec<InsertionInstruction> {
    let mut out = Vec::new();
    stream_chunks(chunks.iter().map(String::as_str), deliver_every, &mut out);
    out
}

fn replay(instructions: Vec<InsertionInstruction>) -> String {
    let mut sink = ReplaySink::new(DestinationTree::new());
    replay_all(&mut sink, instructions).unwrap_or_else(|err| panic!("replay failed: {err}"));
    sink.destination().inner_html()
}

/// Every key is introduced once, and only keys introduced earlier are referenced.
fn assert_well_formed(instructions: &[InsertionInstruction], context: &str) {
    let mut introduced: HashSet<CloneKey> = HashSet::new();
    for (index, instruction) in instructions.iter().enumerate() {
        match instruction.parent {
            InsertionParent::Root => {}
            InsertionParent::Node(key) | InsertionParent::TemplateContents(key) => assert!(
                introduced.contains(&key),
                "{context}: instruction {index} names unknown parent {key:?}"
            ),
        }
        if let Some(next) = instruction.next_sibling {
            assert!(
                introduced.contains(&next),
                "{context}: instruction {index} names unknown sibling {next:?}"
            );
        }
        if instruction.clone.is_some() {
            assert!(
                introduced.insert(instruction.key),
                "{context}: key {:?} cloned twice",
                instruction.key
            );
        } else {
            assert!(
                introduced.contains(&instruction.key),
                "{context}: relocation of unknown key {:?}",
                instruction.key
            );
        }
    }
}

#[test]
fn fixtures_match_expected_and_one_shot_output() {
    for case in tree_construction_cases() {
        let one_shot = one_shot_inner_html(&case.input);
        assert_eq!(one_shot, case.inner_html, "{}: one-shot reference", case.name);
        let streamed = replay(stream(&[case.input.clone()], 1));
        assert_eq!(streamed, case.inner_html, "{}: single chunk", case.name);
    }
}

#[test]
fn fixtures_are_insensitive_to_chunk_boundaries() {
    let (fuzz_runs, fuzz_seed) = fuzz_budget();
    for case in tree_construction_cases() {
        let expected = one_shot_inner_html(&case.input);
        for plan in build_chunk_plans(&case.input, fuzz_runs, fuzz_seed, ChunkerConfig::utf8()) {
            let chunks = plan.plan.str_chunks(&case.input);
            for deliver_every in [1, 3] {
                let context = format!("{} [{}] deliver_every={deliver_every}", case.name, plan.label);
                let instructions = stream(&chunks, deliver_every);
                assert_well_formed(&instructions, &context);
                let actual = replay(instructions);
                if actual != expected {
                    panic!(
                        "{context}\n{}",
                        diff_lines(&[expected.clone()], &[actual])
                    );
                }
            }
        }
    }
}

#[test]
fn one_character_chunks_yield_the_same_instructions_as_one_chunk() {
    let markup = "<b>hi</b>";
    let whole = stream(&[markup.to_string()], 1);
    let chars: Vec<String> = markup.chars().map(String::from).collect();
    assert_eq!(chars.len(), 9);
    assert_eq!(stream(&chars, 1), whole);
}

#[test]
fn every_prefix_of_the_stream_replays_cleanly() {
    let markup = "<b><p>Bold </b> Not bold</p>Also not bold.<table>x<tr><td>1</table>";
    let chars: Vec<String> = markup.chars().map(String::from).collect();
    let instructions = stream(&chars, 1);
    for n in 0..=instructions.len() {
        let prefix = instructions[..n].to_vec();
        let mut sink = ReplaySink::new(DestinationTree::new());
        let applied = replay_all(&mut sink, prefix)
            .unwrap_or_else(|err| panic!("prefix {n} failed: {err}"));
        assert_eq!(applied, n);
    }
}
