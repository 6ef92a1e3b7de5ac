//! Sequence-alignment gating for the `match=` merge parameter.
//!
//! `bio::alignment::pairwise::Aligner` doesn't expose a raw affine-gap
//! score with a pluggable match/mismatch/gap-open/gap-extend tuple the way
//! `svpoplib.aligner.ScoreAligner` does, so the scorer here is written
//! directly, grounded in that API's terminology rather than reusing it.
//! The resolver only depends on the [`SequenceAligner`] trait, treating
//! the concrete implementation as a replaceable collaborator.

use std::collections::HashMap;

use crate::strucvars::merge::params::AlignParams;

/// A pairwise sequence aligner producing a raw affine-gap alignment score.
pub trait SequenceAligner {
    fn score(&self, a: &[u8], b: &[u8]) -> f64;
}

/// Gotoh affine-gap global alignment: three-matrix recurrence (match/
/// mismatch, gap-in-a, gap-in-b), `O(n*m)` time and space.
#[derive(Debug, Clone, Copy)]
pub struct GotohAligner {
    pub match_score: f64,
    pub mismatch: f64,
    pub gap_open: f64,
    pub gap_extend: f64,
}

impl GotohAligner {
    pub fn new(match_score: f64, mismatch: f64, gap_open: f64, gap_extend: f64) -> Self {
        Self {
            match_score,
            mismatch,
            gap_open,
            gap_extend,
        }
    }
}

impl SequenceAligner for GotohAligner {
    fn score(&self, a: &[u8], b: &[u8]) -> f64 {
        let n = a.len();
        let m = b.len();
        const NEG_INF: f64 = f64::NEG_INFINITY;

        let mut h = vec![vec![0.0f64; m + 1]; n + 1];
        let mut ex = vec![vec![NEG_INF; m + 1]; n + 1];
        let mut ey = vec![vec![NEG_INF; m + 1]; n + 1];

        for i in 1..=n {
            ex[i][0] = self.gap_open + (i - 1) as f64 * self.gap_extend;
            h[i][0] = ex[i][0];
        }
        for j in 1..=m {
            ey[0][j] = self.gap_open + (j - 1) as f64 * self.gap_extend;
            h[0][j] = ey[0][j];
        }

        for i in 1..=n {
            for j in 1..=m {
                let s = if a[i - 1].eq_ignore_ascii_case(&b[j - 1]) {
                    self.match_score
                } else {
                    self.mismatch
                };
                let diag = h[i - 1][j - 1] + s;

                ex[i][j] = (h[i - 1][j] + self.gap_open).max(ex[i - 1][j] + self.gap_extend);
                ey[i][j] = (h[i][j - 1] + self.gap_open).max(ey[i][j - 1] + self.gap_extend);

                h[i][j] = diag.max(ex[i][j]).max(ey[i][j]);
            }
        }

        h[n][m]
    }
}

/// k-mer multiset Jaccard index, `sum(min(count_a, count_b)) /
/// sum(max(count_a, count_b))` over overlapping k-mers. Used as a fallback
/// when either sequence exceeds the configured `map-limit`.
pub fn jaccard_index(a: &[u8], b: &[u8], k: usize) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let kmers = |seq: &[u8]| -> HashMap<&[u8], usize> {
        let mut counts = HashMap::new();
        if seq.len() < k {
            *counts.entry(seq).or_insert(0) += 1;
        } else {
            for w in seq.windows(k) {
                *counts.entry(w).or_insert(0) += 1;
            }
        }
        counts
    };

    let ca = kmers(a);
    let cb = kmers(b);

    let mut inter = 0usize;
    let mut union = 0usize;
    let mut seen = std::collections::HashSet::new();
    for (kmer, &count_a) in &ca {
        let count_b = *cb.get(kmer).unwrap_or(&0);
        inter += count_a.min(count_b);
        union += count_a.max(count_b);
        seen.insert(*kmer);
    }
    for (kmer, &count_b) in &cb {
        if !seen.contains(kmer) {
            union += count_b;
        }
    }

    if union == 0 {
        0.0
    } else {
        inter as f64 / union as f64
    }
}

/// Proportion of the alignment's theoretical best score achieved, or the
/// Jaccard fallback when either sequence exceeds `map_limit`. Pinned
/// denominator: `match_score * max(1, min(len_a, len_b))`, i.e. the best
/// possible score the shorter sequence could achieve fully matched against
/// a same-length substring of the longer one. A "duplicate head-to-tail"
/// denominator variant was considered and rejected as out of scope.
pub fn match_proportion(aligner: &dyn SequenceAligner, a: &[u8], b: &[u8], params: &AlignParams) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    if let Some(limit) = params.map_limit {
        if a.len() > limit || b.len() > limit {
            return jaccard_index(a, b, params.jaccard_k);
        }
    }

    let score = aligner.score(a, b);
    let denom = params.match_score * (a.len().min(b.len()).max(1)) as f64;
    (score / denom).clamp(0.0, 1.0)
}
