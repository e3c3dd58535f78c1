//! Deterministic and seeded chunk plans for streaming coverage.
//!
//! A plan says where an input is cut before it is fed to a streaming
//! consumer. Fixed sizes and markup-aware boundaries are always produced;
//! fuzz plans are derived from a seed so a failing run can be reproduced.

use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BoundaryPolicy {
    /// Every cut lands on a UTF-8 character boundary.
    Utf8Aligned,
    /// Cuts may split a multi-byte sequence; the consumer must carry bytes.
    ByteStream,
}

impl fmt::Display for BoundaryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryPolicy::Utf8Aligned => f.write_str("utf8"),
            BoundaryPolicy::ByteStream => f.write_str("bytes"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChunkPlan {
    Fixed {
        size: usize,
        policy: BoundaryPolicy,
    },
    Sizes {
        sizes: Vec<usize>,
        policy: BoundaryPolicy,
    },
    Boundaries {
        indices: Vec<usize>,
        policy: BoundaryPolicy,
    },
}

impl ChunkPlan {
    pub fn fixed(size: usize) -> Self {
        Self::Fixed {
            size,
            policy: BoundaryPolicy::Utf8Aligned,
        }
    }

    pub fn fixed_unaligned(size: usize) -> Self {
        Self::Fixed {
            size,
            policy: BoundaryPolicy::ByteStream,
        }
    }

    pub fn sizes(sizes: impl Into<Vec<usize>>) -> Self {
        Self::Sizes {
            sizes: sizes.into(),
            policy: BoundaryPolicy::Utf8Aligned,
        }
    }

    pub fn boundaries(indices: impl Into<Vec<usize>>) -> Self {
        Self::Boundaries {
            indices: indices.into(),
            policy: BoundaryPolicy::Utf8Aligned,
        }
    }

    pub fn boundaries_unaligned(indices: impl Into<Vec<usize>>) -> Self {
        Self::Boundaries {
            indices: indices.into(),
            policy: BoundaryPolicy::ByteStream,
        }
    }

    pub fn policy(&self) -> BoundaryPolicy {
        match self {
            ChunkPlan::Fixed { policy, .. }
            | ChunkPlan::Sizes { policy, .. }
            | ChunkPlan::Boundaries { policy, .. } => *policy,
        }
    }

    /// Interior cut offsets, ascending and unique.
    ///
    /// Aligned fixed plans stretch a chunk to the next character boundary;
    /// aligned size plans must already land on one. Explicit boundaries
    /// outside the input, or inside a character under the aligned policy,
    /// are ignored. Leftover input after a size plan forms one last chunk.
    pub fn cut_points(&self, input: &str) -> Vec<usize> {
        let len = input.len();
        let aligned = self.policy() == BoundaryPolicy::Utf8Aligned;
        let mut cuts = Vec::new();
        match self {
            ChunkPlan::Fixed { size, .. } => {
                assert!(*size > 0, "chunk size must be > 0");
                let mut end = 0usize;
                loop {
                    end = (end + size).min(len);
                    while aligned && !input.is_char_boundary(end) {
                        end += 1;
                    }
                    if end >= len {
                        break;
                    }
                    cuts.push(end);
                }
            }
            ChunkPlan::Sizes { sizes, .. } => {
                let mut end = 0usize;
                for size in sizes {
                    assert!(*size > 0, "chunk size must be > 0");
                    end += size;
                    if end >= len {
                        break;
                    }
                    assert!(
                        !aligned || input.is_char_boundary(end),
                        "size plan splits a character at {end}"
                    );
                    cuts.push(end);
                }
            }
            ChunkPlan::Boundaries { indices, .. } => {
                cuts = usable_cuts(input, indices.iter().copied(), self.policy());
            }
        }
        cuts
    }

    pub fn for_each_chunk(&self, input: &str, mut f: impl FnMut(&[u8])) {
        let bytes = input.as_bytes();
        let mut start = 0usize;
        for cut in self.cut_points(input) {
            f(&bytes[start..cut]);
            start = cut;
        }
        if start < bytes.len() {
            f(&bytes[start..]);
        }
    }

    /// Chunks as owned strings. Only meaningful for UTF-8 aligned plans.
    pub fn str_chunks(&self, input: &str) -> Vec<String> {
        assert_eq!(
            self.policy(),
            BoundaryPolicy::Utf8Aligned,
            "string chunks need aligned cuts"
        );
        let mut out = Vec::new();
        self.for_each_chunk(input, |chunk| {
            out.push(String::from_utf8_lossy(chunk).into_owned());
        });
        out
    }

    pub fn byte_chunks(&self, input: &str) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        self.for_each_chunk(input, |chunk| out.push(chunk.to_vec()));
        out
    }
}

/// Sorted, deduplicated interior offsets the policy allows.
fn usable_cuts(
    input: &str,
    candidates: impl Iterator<Item = usize>,
    policy: BoundaryPolicy,
) -> Vec<usize> {
    let mut cuts: Vec<usize> = candidates
        .filter(|&idx| idx > 0 && idx < input.len())
        .filter(|&idx| policy == BoundaryPolicy::ByteStream || input.is_char_boundary(idx))
        .collect();
    cuts.sort_unstable();
    cuts.dedup();
    cuts
}

#[derive(Clone, Debug)]
pub struct ChunkPlanCase {
    pub label: String,
    pub plan: ChunkPlan,
}

#[derive(Clone, Copy, Debug)]
pub struct ChunkerConfig {
    pub policy: BoundaryPolicy,
}

impl ChunkerConfig {
    pub fn utf8() -> Self {
        Self {
            policy: BoundaryPolicy::Utf8Aligned,
        }
    }

    pub fn byte_stream() -> Self {
        Self {
            policy: BoundaryPolicy::ByteStream,
        }
    }
}

/// Build deterministic and fuzz chunk plans for `input`.
///
/// Deterministic plans cover fixed sizes and cuts around `<`, `</`, `>` and
/// quotes. Fuzz plans pick up to 32 cut points with an LCG seeded from
/// `fuzz_seed + run`.
pub fn build_chunk_plans(
    input: &str,
    fuzz_runs: usize,
    fuzz_seed: u64,
    config: ChunkerConfig,
) -> Vec<ChunkPlanCase> {
    let policy = config.policy;
    let mut plans: Vec<ChunkPlanCase> = [1usize, 2, 3, 5, 8, 16, 64]
        .into_iter()
        .map(|size| ChunkPlanCase {
            label: format!("fixed size={size} {policy}"),
            plan: ChunkPlan::Fixed { size, policy },
        })
        .collect();

    let token_boundaries = token_boundary_indices(input, policy);
    if !token_boundaries.is_empty() {
        plans.push(ChunkPlanCase {
            label: format!("token boundaries x{} {policy}", token_boundaries.len()),
            plan: ChunkPlan::Boundaries {
                indices: token_boundaries,
                policy,
            },
        });
    }

    // Token boundaries are a subset of the character boundaries.
    let candidates = char_boundaries(input, policy);
    plans.extend((0..fuzz_runs as u64).map(|run| {
        let seed = fuzz_seed.wrapping_add(run);
        let plan = if candidates.is_empty() {
            ChunkPlan::Fixed { size: 1, policy }
        } else {
            let mut rng = Lcg::new(seed);
            let mut picks = candidates.clone();
            rng.shuffle(&mut picks);
            picks.truncate(1 + rng.gen_range(picks.len().min(32)));
            picks.sort_unstable();
            ChunkPlan::Boundaries {
                indices: picks,
                policy,
            }
        };
        ChunkPlanCase {
            label: format!("fuzz seed=0x{seed:016x} {policy}"),
            plan,
        }
    }));

    plans
}

/// Cuts on either side of markup delimiters, plus right after `</`.
fn token_boundary_indices(input: &str, policy: BoundaryPolicy) -> Vec<usize> {
    let bytes = input.as_bytes();
    let around = bytes.iter().enumerate().flat_map(|(i, &b)| {
        let delimiter = matches!(b, b'<' | b'>' | b'"' | b'\'' | b'&');
        let end_tag = b == b'<' && bytes.get(i + 1) == Some(&b'/');
        [
            delimiter.then_some(i),
            delimiter.then_some(i + 1),
            end_tag.then_some(i + 2),
        ]
        .into_iter()
        .flatten()
    });
    usable_cuts(input, around, policy)
}

fn char_boundaries(input: &str, policy: BoundaryPolicy) -> Vec<usize> {
    match policy {
        BoundaryPolicy::Utf8Aligned => {
            usable_cuts(input, input.char_indices().map(|(i, _)| i), policy)
        }
        BoundaryPolicy::ByteStream => usable_cuts(input, 0..input.len(), policy),
    }
}

/// Seeded linear congruential generator.
struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        self.state
    }

    fn gen_range(&mut self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }
        (self.next_u64() >> 32) as usize % upper
    }

    fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.gen_range(i + 1);
            items.swap(i, j);
        }
    }
}
