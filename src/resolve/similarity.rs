//! String similarity scoring.

use std::collections::HashMap;

/// A similarity measure in `[0, 1]`, higher is closer.
pub trait Similarity {
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Longest-matching-block ratio: `2M / T`.
///
/// `T` is the combined length of both strings and `M` the total size of the matching
/// blocks found by repeatedly taking the longest common contiguous block and recursing
/// on both sides of it. For sequences of 200+ characters, characters making up more
/// than 1% of `b` are not used to seed a match.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchingBlocksRatio;

impl Similarity for MatchingBlocksRatio {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();

        let total = a.len() + b.len();
        if total == 0 {
            return 1.0;
        }

        let matched = BlockMatcher::new(&a, &b).matched_len();
        2.0 * matched as f64 / total as f64
    }
}

/// A contiguous run `a[a_start..a_start + len] == b[b_start..b_start + len]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    a_start: usize,
    b_start: usize,
    len: usize,
}

struct BlockMatcher<'a> {
    a: &'a [char],
    b: &'a [char],
    /// Positions of each character in `b`, ascending
    b_index: HashMap<char, Vec<usize>>,
}

impl<'a> BlockMatcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b_index: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b_index.entry(*c).or_default().push(j);
        }

        if b.len() >= 200 {
            let limit = b.len() / 100 + 1;
            b_index.retain(|_, positions| positions.len() <= limit);
        }

        Self { a, b, b_index }
    }

    /// Longest block inside `a[alo..ahi]` x `b[blo..bhi]`.
    ///
    /// Ties go to the block starting earliest in `a`, then earliest in `b`.
    fn longest_block(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> Block {
        let (mut best_i, mut best_j, mut best_len) = (alo, blo, 0);

        // run length of the match ending at b[j], for the previous row of a
        let mut run_ending: HashMap<usize, usize> = HashMap::new();
        for i in alo..ahi {
            let mut next_run: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b_index.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = if j > 0 {
                        run_ending.get(&(j - 1)).copied().unwrap_or(0)
                    } else {
                        0
                    } + 1;
                    next_run.insert(j, k);
                    if k > best_len {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_len = k;
                    }
                }
            }
            run_ending = next_run;
        }

        // Extend over characters left out of the index
        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_len += 1;
        }
        while best_i + best_len < ahi
            && best_j + best_len < bhi
            && self.a[best_i + best_len] == self.b[best_j + best_len]
        {
            best_len += 1;
        }

        Block {
            a_start: best_i,
            b_start: best_j,
            len: best_len,
        }
    }

    fn matching_blocks(&self) -> Vec<Block> {
        let mut pending = vec![(0, self.a.len(), 0, self.b.len())];
        let mut blocks = Vec::new();

        while let Some((alo, ahi, blo, bhi)) = pending.pop() {
            let block = self.longest_block(alo, ahi, blo, bhi);
            if block.len == 0 {
                continue;
            }
            if alo < block.a_start && blo < block.b_start {
                pending.push((alo, block.a_start, blo, block.b_start));
            }
            if block.a_start + block.len < ahi && block.b_start + block.len < bhi {
                pending.push((block.a_start + block.len, ahi, block.b_start + block.len, bhi));
            }
            blocks.push(block);
        }

        blocks.sort_by_key(|b| (b.a_start, b.b_start));
        blocks
    }

    fn matched_len(&self) -> usize {
        self.matching_blocks().iter().map(|b| b.len).sum()
    }
}
