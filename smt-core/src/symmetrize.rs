//! Symmetrization of two directional Viterbi alignments.

use std::collections::BTreeSet;

use log::debug;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::alignment::{train, AlignmentModel, TrainOptions};
use crate::errors::{Result, SmtError};
use crate::text::{Corpus, SentencePair};
use crate::types::*;

pub type Link = (Position, Position);

/// Many-to-many word alignment as 1-based (source, target) links.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Alignment {
    links: BTreeSet<Link>,
}

impl Alignment {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn insert(&mut self, source: Position, target: Position) -> bool {
        self.links.insert((source, target))
    }

    #[inline]
    pub fn contains(&self, source: Position, target: Position) -> bool {
        self.links.contains(&(source, target))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Links in (source, target) order.
    pub fn iter(&self) -> impl Iterator<Item = Link> + '_ {
        self.links.iter().copied()
    }

    /// Links from a target-to-source Viterbi alignment.
    pub fn from_forward(links: &[Position]) -> Self {
        links
            .iter()
            .enumerate()
            .filter(|&(_, &i)| i != 0)
            .map(|(j0, &i)| (i, j0 + 1))
            .collect()
    }

    /// Links from a source-to-target Viterbi alignment.
    pub fn from_reverse(links: &[Position]) -> Self {
        links
            .iter()
            .enumerate()
            .filter(|&(_, &j)| j != 0)
            .map(|(i0, &j)| (i0 + 1, j))
            .collect()
    }

    pub fn intersection(&self, other: &Alignment) -> Alignment {
        self.links.intersection(&other.links).copied().collect()
    }

    pub fn union(&self, other: &Alignment) -> Alignment {
        self.links.union(&other.links).copied().collect()
    }

    fn check_bounds(&self, source_len: usize, target_len: usize) -> Result<()> {
        for &(i, j) in &self.links {
            if i == 0 || i > source_len || j == 0 || j > target_len {
                return Err(SmtError::invalid_argument(
                    "alignment",
                    format!("link ({i}, {j}) outside {source_len}x{target_len}"),
                ));
            }
        }
        Ok(())
    }
}

impl FromIterator<Link> for Alignment {
    fn from_iter<I: IntoIterator<Item = Link>>(iter: I) -> Self {
        Alignment {
            links: iter.into_iter().collect(),
        }
    }
}

const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, 0),
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

// Which positions already carry a link.
struct Occupancy {
    source: Vec<bool>,
    target: Vec<bool>,
}

impl Occupancy {
    fn of(alignment: &Alignment, source_len: usize, target_len: usize) -> Self {
        let mut occ = Occupancy {
            source: vec![false; source_len + 1],
            target: vec![false; target_len + 1],
        };
        for (i, j) in alignment.iter() {
            occ.mark(i, j);
        }
        occ
    }

    #[inline]
    fn mark(&mut self, i: Position, j: Position) {
        self.source[i] = true;
        self.target[j] = true;
    }

    // Admit a link if either of its words is still unaligned.
    #[inline]
    fn admits(&self, i: Position, j: Position) -> bool {
        !self.source[i] || !self.target[j]
    }
}

/// Merge two directional alignments with the grow-diag-final heuristic.
///
/// - A = forward ∩ reverse, U = forward ∪ reverse.
/// - Grow: each pass looks at the 8-neighbourhood of every link of a frozen
///   snapshot of A and collects neighbours that are in U, not in A, and whose
///   source or target word is unaligned in the snapshot. The collected links
///   are merged after the pass; passes repeat until one adds nothing.
/// - Final: sweep all (source, target) cells in row-major order and add each
///   link of U that passes the same test against the current A.
///
/// Both inputs use (source, target) coordinates.
pub fn grow_diag_final(
    source_len: usize,
    target_len: usize,
    forward: &Alignment,
    reverse: &Alignment,
) -> Result<Alignment> {
    forward.check_bounds(source_len, target_len)?;
    reverse.check_bounds(source_len, target_len)?;

    let union = forward.union(reverse);
    let mut alignment = forward.intersection(reverse);

    let mut passes = 0;
    loop {
        let occ = Occupancy::of(&alignment, source_len, target_len);
        let mut pending: BTreeSet<Link> = BTreeSet::new();
        for (i, j) in alignment.iter() {
            for &(di, dj) in &NEIGHBOURS {
                let ci = i as isize + di;
                let cj = j as isize + dj;
                if ci < 1 || cj < 1 {
                    continue;
                }
                let (i2, j2) = (ci as usize, cj as usize);
                if i2 > source_len || j2 > target_len {
                    continue;
                }
                if !alignment.contains(i2, j2) && union.contains(i2, j2) && occ.admits(i2, j2) {
                    pending.insert((i2, j2));
                }
            }
        }
        passes += 1;
        if pending.is_empty() {
            break;
        }
        alignment.links.extend(pending);
    }
    debug!("grow: {} passes, {} links", passes, alignment.len());

    let mut occ = Occupancy::of(&alignment, source_len, target_len);
    for i in 1..=source_len {
        for j in 1..=target_len {
            if union.contains(i, j) && !alignment.contains(i, j) && occ.admits(i, j) {
                alignment.insert(i, j);
                occ.mark(i, j);
            }
        }
    }

    Ok(alignment)
}

/// Directional models trained once on a corpus, reused for every pair.
#[derive(Clone, Debug)]
pub struct Symmetrizer {
    /// p(target | source), aligns every target word to a source word.
    pub forward: AlignmentModel,
    /// p(source | target), trained on the swapped corpus.
    pub reverse: AlignmentModel,
}

impl Symmetrizer {
    pub fn train(corpus: &Corpus, opts: &TrainOptions) -> Self {
        let forward = train(corpus, opts);
        let reverse = train(&corpus.swapped(), opts);
        Symmetrizer { forward, reverse }
    }

    pub fn symmetrize_tokens(&self, source: &[Token], target: &[Token]) -> Result<Alignment> {
        let forward = Alignment::from_forward(&self.forward.align(source, target));
        let reverse = Alignment::from_reverse(&self.reverse.align(target, source));
        grow_diag_final(source.len(), target.len(), &forward, &reverse)
    }

    pub fn symmetrize_pair(&self, pair: &SentencePair) -> Result<Alignment> {
        self.symmetrize_tokens(&pair.source.tokens, &pair.target.tokens)
    }

    /// One alignment per corpus pair, in corpus order.
    pub fn symmetrize_corpus(&self, corpus: &Corpus) -> Result<Vec<Alignment>> {
        #[cfg(feature = "parallel")]
        let alignments: Result<Vec<Alignment>> = corpus
            .pairs
            .par_iter()
            .map(|pair| self.symmetrize_pair(pair))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let alignments: Result<Vec<Alignment>> = corpus.pairs.iter().map(|pair| self.symmetrize_pair(pair)).collect();
        alignments
    }
}

/// Train both directions on `corpus` and symmetrize one sentence pair.
pub fn symmetrize<S: AsRef<str>>(
    source: &[S],
    target: &[S],
    corpus: &Corpus,
    opts: &TrainOptions,
) -> Result<Alignment> {
    let symmetrizer = Symmetrizer::train(corpus, opts);
    let source = corpus.source_vocab.encode(source);
    let target = corpus.target_vocab.encode(target);
    symmetrizer.symmetrize_tokens(&source, &target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(pairs: &[Link]) -> Alignment {
        pairs.iter().copied().collect()
    }

    #[test]
    fn identical_directions_are_kept() {
        let a = links(&[(1, 1), (2, 2), (3, 3)]);
        let merged = grow_diag_final(3, 3, &a, &a).unwrap();
        assert_eq!(merged, a);
    }

    #[test]
    fn grows_along_the_diagonal() {
        let forward = links(&[(1, 1), (3, 3)]);
        let reverse = links(&[(1, 1), (2, 2)]);
        let merged = grow_diag_final(3, 3, &forward, &reverse).unwrap();
        assert_eq!(merged, links(&[(1, 1), (2, 2), (3, 3)]));
    }

    #[test]
    fn empty_intersection_falls_back_to_final_sweep() {
        // the sweep is row-major and admits a link while either word is free
        let forward = links(&[(2, 1), (1, 2)]);
        let reverse = links(&[(1, 1), (2, 2)]);
        let merged = grow_diag_final(2, 2, &forward, &reverse).unwrap();
        assert_eq!(merged, links(&[(1, 1), (1, 2), (2, 1)]));
    }

    #[test]
    fn merges_michael_fixture() {
        let e2f = links(&[(1, 1), (2, 2), (2, 3), (2, 4), (3, 6), (4, 7), (7, 8), (9, 9), (6, 10)]);
        let f2e = links(&[(1, 1), (2, 2), (3, 6), (4, 7), (7, 8), (8, 8), (9, 9), (5, 10), (6, 10)]);
        let merged = grow_diag_final(9, 10, &e2f, &f2e).unwrap();
        let expected = links(&[
            (1, 1),
            (2, 2),
            (2, 3),
            (2, 4),
            (3, 6),
            (4, 7),
            (5, 10),
            (6, 10),
            (7, 8),
            (8, 8),
            (9, 9),
        ]);
        assert_eq!(merged, expected);
    }

    #[test]
    fn rejects_out_of_range_links() {
        let bad = links(&[(4, 1)]);
        let ok = links(&[(1, 1)]);
        assert!(matches!(
            grow_diag_final(3, 3, &bad, &ok),
            Err(SmtError::InvalidArgument { .. })
        ));
    }

    fn japanese_corpus() -> Corpus {
        Corpus::from_pairs(&[
            ("僕 は 男 です", "I am a man"),
            ("私 は 女 です", "I am a girl"),
            ("私 は 先生 です", "I am a teacher"),
            ("彼女 は 先生 です", "She is a teacher"),
            ("彼 は 先生 です", "He is a teacher"),
        ])
    }

    #[test]
    fn symmetrizes_trained_corpus() {
        let corpus = japanese_corpus();
        let opts = TrainOptions::with_iterations(1000, 1000);
        let source: Vec<&str> = "私 は 先生 です".split_whitespace().collect();
        let target: Vec<&str> = "I am a teacher".split_whitespace().collect();
        let merged = symmetrize(&source, &target, &corpus, &opts).unwrap();
        assert_eq!(merged, links(&[(1, 1), (1, 2), (2, 3), (3, 4), (4, 3)]));
    }

    #[test]
    fn corpus_alignments_follow_corpus_order() {
        let corpus = japanese_corpus();
        let symmetrizer = Symmetrizer::train(&corpus, &TrainOptions::with_iterations(20, 20));
        let all = symmetrizer.symmetrize_corpus(&corpus).unwrap();
        assert_eq!(all.len(), corpus.len());
        assert_eq!(all[2], symmetrizer.symmetrize_pair(&corpus.pairs[2]).unwrap());
        for (k, a) in all.iter().enumerate() {
            // every target word is force-aligned in the forward direction
            let covered: BTreeSet<Position> = a.iter().map(|(_, j)| j).collect();
            assert_eq!(covered.len(), corpus.pairs[k].target.len());
        }
    }
}
