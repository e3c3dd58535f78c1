//! Shared helpers for streaming parser tests: chunk plans, chunked readers,
//! tree construction fixtures, and line diffs for readable failures.

pub mod chunking;
pub mod fixtures;
pub mod reader;

use std::fmt::Write;

pub use chunking::{BoundaryPolicy, ChunkPlan, ChunkPlanCase, ChunkerConfig, build_chunk_plans};
pub use fixtures::{TreeConstructionCase, tree_construction_cases};
pub use reader::{ChunkedReader, FailingReader};

/// Two line lists side by side around the first difference.
pub fn diff_lines(expected: &[String], actual: &[String]) -> String {
    const MISSING: &str = "<missing>";
    let line = |lines: &[String], i: usize| lines.get(i).map_or(MISSING, String::as_str).to_string();
    let total = expected.len().max(actual.len());
    let mut out = String::new();

    match (0..total).find(|&i| line(expected, i) != line(actual, i)) {
        Some(first) => {
            let _ = writeln!(&mut out, "lines differ from line {}:", first + 1);
            for i in first.saturating_sub(2)..(first + 3).min(total) {
                let mark = if i == first { '>' } else { ' ' };
                let _ = writeln!(&mut out, "{mark} {:>4} - {}", i + 1, line(expected, i));
                let _ = writeln!(&mut out, "{mark} {:>4} + {}", i + 1, line(actual, i));
            }
        }
        None => {
            let _ = writeln!(&mut out, "no differing line");
        }
    }
    let _ = write!(
        &mut out,
        "expected {} lines, got {}",
        expected.len(),
        actual.len()
    );
    out
}
