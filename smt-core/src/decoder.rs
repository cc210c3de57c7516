//! Multi-stack beam decoder over a phrase table.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SmtError};
use crate::future_cost::FutureCostTable;
use crate::hypothesis::{Hypothesis, HypothesisArena, HypothesisId};
use crate::phrase::{available_phrases, PhraseVocabulary};
use crate::phrase_table::PhraseLookup;
use crate::stack::{Insertion, Stack, StackOptions};
use crate::types::*;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Histogram limit per stack.
    pub beam_size: usize,
    /// Translation options tried per input span.
    pub candidates_per_span: usize,
    pub reordering_alpha: Prob,
    /// Order of the output context kept for recombination and the language
    /// model; contexts hold `ngram_order - 1` tokens.
    pub ngram_order: usize,
    pub histogram_pruning: bool,
    pub threshold_pruning: bool,
    pub threshold_epsilon: Prob,
    /// Rank hypotheses by score times the estimated cost of the rest.
    pub future_cost: bool,
    /// Log score for input positions that no phrase covers.
    pub future_cost_default: f64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            beam_size: BEAM_SIZE,
            candidates_per_span: CANDIDATES_PER_SPAN,
            reordering_alpha: REORDERING_ALPHA,
            ngram_order: NGRAM_ORDER,
            histogram_pruning: true,
            threshold_pruning: false,
            threshold_epsilon: THRESHOLD_EPSILON,
            future_cost: false,
            future_cost_default: UNSEEN_PHRASE_PROB.ln(),
        }
    }
}

impl DecoderConfig {
    fn stack_options(&self) -> StackOptions {
        StackOptions {
            beam_size: self.beam_size,
            histogram_pruning: self.histogram_pruning,
            threshold_pruning: self.threshold_pruning,
            threshold_epsilon: self.threshold_epsilon,
        }
    }
}

/// An n-gram language model over output tokens.
pub trait LanguageModel {
    /// ln p(word | context), where `context` holds the preceding tokens,
    /// oldest first.
    fn log_prob(&self, context: &[String], word: &str) -> f64;
}

/// Distortion penalty alpha^|distance|.
#[inline]
pub fn reordering_penalty(alpha: Prob, distance: isize) -> Prob {
    alpha.powf(distance.unsigned_abs() as f64)
}

// Input-side phrase availability of a lookup.
struct Inputs<'l, L: ?Sized>(&'l L);

impl<L: PhraseLookup + ?Sized> PhraseVocabulary for Inputs<'_, L> {
    fn contains_phrase(&self, phrase: &str) -> bool {
        self.0.has_input(phrase)
    }
}

/// Decoder over a phrase lookup. The lookup fixes the translation
/// direction, e.g. [`PhraseTable::directed`](crate::PhraseTable::directed).
pub struct StackDecoder<'a, L> {
    lookup: L,
    config: DecoderConfig,
    language_model: Option<&'a dyn LanguageModel>,
}

impl<'a, L: PhraseLookup> StackDecoder<'a, L> {
    pub fn new(lookup: L, config: DecoderConfig) -> Self {
        StackDecoder {
            lookup,
            config,
            language_model: None,
        }
    }

    pub fn with_language_model(mut self, language_model: &'a dyn LanguageModel) -> Self {
        self.language_model = Some(language_model);
        self
    }

    /// Decode `sentence` into N + 1 stacks, where stack k holds hypotheses
    /// covering k input positions.
    pub fn decode<S: AsRef<str>>(&self, sentence: &[S]) -> Result<Decoding> {
        if sentence.is_empty() {
            return Err(SmtError::EmptySentence);
        }
        if self.config.beam_size == 0 {
            return Err(SmtError::InvalidBeamSize);
        }
        let input: Vec<String> = sentence.iter().map(|w| w.as_ref().to_string()).collect();
        let len = input.len();

        let future_costs = if self.config.future_cost {
            Some(FutureCostTable::from_lookup(
                &input,
                &self.lookup,
                self.config.future_cost_default,
            )?)
        } else {
            None
        };

        let phrases: Vec<Span> = available_phrases(&input, &Inputs(&self.lookup)).into_iter().collect();
        debug!("{} input phrases available for {} words", phrases.len(), len);

        let mut arena = HypothesisArena::new();
        let mut stacks: Vec<Stack> = (0..=len).map(|_| Stack::new(self.config.stack_options())).collect();
        let mut empty = Hypothesis::empty(len, self.config.ngram_order, phrases);
        if let Some(fc) = &future_costs {
            empty.estimate = fc.uncovered(&empty.coverage).exp();
        }
        let root = arena.push(empty);
        stacks[0].insert(root, &arena);

        for k in 0..len {
            let (mut added, mut recombined, mut dropped) = (0usize, 0usize, 0usize);
            for parent in stacks[k].ordered(&arena) {
                let remaining = arena[parent].remaining.clone();
                for span in remaining {
                    let text = phrase_text(span.slice(&input));
                    for candidate in self.lookup.candidates(&text, self.config.candidates_per_span) {
                        let target = k + span.len();
                        let expansion = self.expand(
                            &arena,
                            &stacks[target],
                            parent,
                            span,
                            &text,
                            candidate.output,
                            future_costs.as_ref(),
                        );
                        let Some(child) = expansion else {
                            dropped += 1;
                            continue;
                        };
                        let id = arena.push(child);
                        match stacks[target].insert(id, &arena) {
                            Insertion::Added => added += 1,
                            Insertion::Recombined { .. } => recombined += 1,
                            Insertion::Rejected | Insertion::Pruned => dropped += 1,
                        }
                        for gone in stacks[target].take_evicted() {
                            arena.release(gone);
                        }
                    }
                }
            }
            debug!(
                "stack {}: {} hypotheses expanded, {} added, {} recombined, {} dropped",
                k,
                stacks[k].len(),
                added,
                recombined,
                dropped
            );
        }

        let decoding = Decoding { input, arena, stacks };
        match decoding.best() {
            Some(best) => info!(
                "best of {} hypotheses ({} kept) covers {} words with score {:e}",
                decoding.arena.len(),
                decoding.arena.live(),
                decoding.arena[best].covered(),
                decoding.arena[best].score
            ),
            None => info!("no hypothesis beyond the empty one"),
        }
        Ok(decoding)
    }

    // The child of `parent_id` translating `span` as `output`, or `None` when
    // the target stack would not keep it.
    #[allow(clippy::too_many_arguments)]
    fn expand(
        &self,
        arena: &HypothesisArena,
        stack: &Stack,
        parent_id: HypothesisId,
        span: Span,
        input: &str,
        output: Vec<String>,
        future_costs: Option<&FutureCostTable>,
    ) -> Option<Hypothesis> {
        let parent = &arena[parent_id];
        let distance = span.start as isize - parent.end as isize;
        let mut score = parent.score
            * reordering_penalty(self.config.reordering_alpha, distance)
            * self.lookup.score(input, &phrase_text(&output));
        if let Some(lm) = self.language_model {
            let mut context = parent.context.clone();
            let mut log_prob = 0.0;
            for word in &output {
                log_prob += lm.log_prob(&context, word);
                if !context.is_empty() {
                    context.remove(0);
                    context.push(word.clone());
                }
            }
            score *= log_prob.exp();
        }

        let mut coverage = parent.coverage.clone();
        coverage.insert_range(span.start - 1..span.end);
        let estimate = match future_costs {
            Some(fc) => score * fc.uncovered(&coverage).exp(),
            None => score,
        };
        let context = parent.extend_context(&output);
        if !stack.admits(&context, span.end, score, estimate, arena) {
            return None;
        }
        Some(Hypothesis {
            parent: Some(parent_id),
            input: Some(span),
            context,
            output,
            coverage,
            end: span.end,
            score,
            estimate,
            remaining: parent
                .remaining
                .iter()
                .copied()
                .filter(|s| !s.overlaps(&span))
                .collect(),
        })
    }
}

/// Result of decoding one sentence.
#[derive(Clone, Debug)]
pub struct Decoding {
    input: Vec<String>,
    arena: HypothesisArena,
    stacks: Vec<Stack>,
}

impl Decoding {
    pub fn input(&self) -> &[String] {
        &self.input
    }

    /// N + 1 stacks for an N-word input.
    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    /// Ids held by stack `k`, best estimate first.
    pub fn stack(&self, k: usize) -> Vec<HypothesisId> {
        self.stacks.get(k).map(|s| s.ordered(&self.arena)).unwrap_or_default()
    }

    pub fn arena(&self) -> &HypothesisArena {
        &self.arena
    }

    #[inline]
    pub fn hypothesis(&self, id: HypothesisId) -> &Hypothesis {
        &self.arena[id]
    }

    /// Highest-scoring hypothesis of the fullest non-empty stack, excluding
    /// the empty hypothesis.
    pub fn best(&self) -> Option<HypothesisId> {
        self.stacks
            .iter()
            .skip(1)
            .rev()
            .find(|s| !s.is_empty())
            .and_then(|s| s.best(&self.arena))
    }

    pub fn translation(&self, id: HypothesisId) -> Vec<String> {
        self.arena.translation(id)
    }

    pub fn best_translation(&self) -> Option<Vec<String>> {
        self.best().map(|id| self.translation(id))
    }
}
