//! Future-cost estimates for every input span, in log space.

use fixedbitset::FixedBitSet;
use hashbrown::HashMap;

use crate::errors::{Result, SmtError};
use crate::phrase_table::PhraseLookup;
use crate::types::*;

/// Log score of translating an input span `(start, end)` in one step.
pub type SpanScores = HashMap<(Position, Position), f64>;

/// Best log score for every span `(start, end)` of a sentence, allowing the
/// span to be covered by any sequence of adjacent phrases.
#[derive(Clone, Debug, PartialEq)]
pub struct FutureCostTable {
    len: usize,
    costs: Vec<f64>,
}

impl FutureCostTable {
    #[inline]
    fn index(&self, start: Position, end: Position) -> usize {
        (start - 1) * self.len + (end - 1)
    }

    /// Dynamic program over spans of increasing width.
    ///
    /// Every single-position span needs a score. A wider span takes the best
    /// split into two adjacent parts, or its own score if that is higher.
    pub fn estimate(len: usize, scores: &SpanScores) -> Result<Self> {
        let mut table = FutureCostTable {
            len,
            costs: vec![f64::NEG_INFINITY; len * len],
        };
        for width in 1..=len {
            for start in 1..=len + 1 - width {
                let end = start + width - 1;
                let cost = if width == 1 {
                    *scores
                        .get(&(start, end))
                        .ok_or(SmtError::ArgumentNotSatisfied { start, end })?
                } else {
                    let mut best = f64::NEG_INFINITY;
                    for k in start..end {
                        let split = table.costs[table.index(start, k)] + table.costs[table.index(k + 1, end)];
                        if split > best {
                            best = split;
                        }
                    }
                    match scores.get(&(start, end)) {
                        Some(&direct) if direct > best => direct,
                        _ => best,
                    }
                };
                let idx = table.index(start, end);
                table.costs[idx] = cost;
            }
        }
        Ok(table)
    }

    /// [`estimate`](Self::estimate) after filling missing single positions
    /// with `default`.
    pub fn with_default(len: usize, scores: &SpanScores, default: f64) -> Result<Self> {
        Self::estimate(len, &fill_diagonal(len, scores, default))
    }

    /// Span scores from the best translation option of each known phrase.
    pub fn from_lookup<S, L>(sentence: &[S], lookup: &L, default: f64) -> Result<Self>
    where
        S: AsRef<str>,
        L: PhraseLookup + ?Sized,
    {
        let len = sentence.len();
        let mut scores = SpanScores::new();
        for start in 1..=len {
            for end in start..=len {
                let text = phrase_text(Span::new(start, end).slice(sentence));
                if let Some(best) = lookup.candidates(&text, 1).first() {
                    scores.insert((start, end), best.prob.ln());
                }
            }
        }
        Self::with_default(len, &scores, default)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, start: Position, end: Position) -> Option<f64> {
        if start == 0 || start > end || end > self.len {
            return None;
        }
        Some(self.costs[self.index(start, end)])
    }

    /// Sum of the costs of the maximal uncovered runs. Bit `p - 1` marks
    /// position `p` as covered.
    pub fn uncovered(&self, coverage: &FixedBitSet) -> f64 {
        let mut total = 0.0;
        let mut run_start: Option<Position> = None;
        for p in 1..=self.len {
            if coverage.contains(p - 1) {
                if let Some(s) = run_start.take() {
                    total += self.costs[self.index(s, p - 1)];
                }
            } else if run_start.is_none() {
                run_start = Some(p);
            }
        }
        if let Some(s) = run_start {
            total += self.costs[self.index(s, self.len)];
        }
        total
    }
}

/// Copy of `scores` with every missing single-position span set to `default`.
pub fn fill_diagonal(len: usize, scores: &SpanScores, default: f64) -> SpanScores {
    let mut filled = scores.clone();
    for p in 1..=len {
        filled.entry((p, p)).or_insert(default);
    }
    filled
}
