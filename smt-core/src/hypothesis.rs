//! Partial translations and the arena that owns them.

use std::ops::Index;

use fixedbitset::FixedBitSet;

use crate::types::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HypothesisId(usize);

/// One partial translation. Children point back at their parent so the full
/// output can be recovered by backtracking.
#[derive(Clone, Debug)]
pub struct Hypothesis {
    pub parent: Option<HypothesisId>,
    /// Input span translated by the last step; `None` for the empty hypothesis.
    pub input: Option<Span>,
    /// Output tokens produced by the last step.
    pub output: Vec<String>,
    /// Bit `p - 1` is set once input position `p` is translated.
    pub coverage: FixedBitSet,
    /// The last n-1 output tokens, padded with sentence-start markers.
    pub context: Vec<String>,
    /// Last input position of the last translated span, 0 at the start.
    pub end: Position,
    pub score: Prob,
    /// Score used for pruning; equals `score` unless future costs are on.
    pub estimate: Prob,
    /// Phrase spans still translatable without overlapping `coverage`.
    pub remaining: Vec<Span>,
}

impl Hypothesis {
    pub fn empty(len: usize, ngram_order: usize, remaining: Vec<Span>) -> Self {
        Hypothesis {
            parent: None,
            input: None,
            output: Vec::new(),
            coverage: FixedBitSet::with_capacity(len),
            context: vec![SENTENCE_START.to_string(); ngram_order.saturating_sub(1)],
            end: 0,
            score: 1.0,
            estimate: 1.0,
            remaining,
        }
    }

    /// Number of translated input positions.
    #[inline]
    pub fn covered(&self) -> usize {
        self.coverage.count_ones(..)
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.covered() == self.coverage.len()
    }

    /// Context after appending `output`, keeping the same width.
    pub fn extend_context(&self, output: &[String]) -> Vec<String> {
        let width = self.context.len();
        let mut context: Vec<String> = self.context.iter().chain(output).cloned().collect();
        let drop = context.len() - width;
        context.drain(..drop);
        context
    }

    /// Key under which two hypotheses are interchangeable for the future.
    pub fn recombination_key(&self) -> (&[String], Position) {
        (&self.context, self.end)
    }
}

/// Owns every hypothesis created while decoding one sentence. Records that
/// leave the search are released: their payload is dropped, while parent,
/// span and scores stay readable.
#[derive(Clone, Debug, Default)]
pub struct HypothesisArena {
    hypotheses: Vec<Hypothesis>,
    released: FixedBitSet,
}

impl HypothesisArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hypothesis: Hypothesis) -> HypothesisId {
        let id = HypothesisId(self.hypotheses.len());
        self.hypotheses.push(hypothesis);
        self.released.grow(self.hypotheses.len());
        id
    }

    /// Drop the output, context, coverage and remaining spans of `id`.
    /// Only hypotheses without children may be released.
    pub fn release(&mut self, id: HypothesisId) {
        if self.released.put(id.0) {
            return;
        }
        let h = &mut self.hypotheses[id.0];
        h.output = Vec::new();
        h.context = Vec::new();
        h.coverage = FixedBitSet::new();
        h.remaining = Vec::new();
    }

    #[inline]
    pub fn is_released(&self, id: HypothesisId) -> bool {
        self.released.contains(id.0)
    }

    /// Records not yet released.
    #[inline]
    pub fn live(&self) -> usize {
        self.hypotheses.len() - self.released.count_ones(..)
    }

    #[inline]
    pub fn get(&self, id: HypothesisId) -> Option<&Hypothesis> {
        self.hypotheses.get(id.0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.hypotheses.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hypotheses.is_empty()
    }

    /// Ids from the empty hypothesis down to `id`.
    pub fn backtrace(&self, id: HypothesisId) -> Vec<HypothesisId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.hypotheses[current.0].parent {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Output tokens of every step leading to `id`, in order.
    pub fn translation(&self, id: HypothesisId) -> Vec<String> {
        self.backtrace(id)
            .into_iter()
            .flat_map(|h| self.hypotheses[h.0].output.iter().cloned())
            .collect()
    }
}

impl Index<HypothesisId> for HypothesisArena {
    type Output = Hypothesis;

    #[inline]
    fn index(&self, id: HypothesisId) -> &Hypothesis {
        &self.hypotheses[id.0]
    }
}
