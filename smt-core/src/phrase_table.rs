//! Relative-frequency phrase table and the lookup interface the decoder uses.

use std::cmp::Ordering;

use hashbrown::{HashMap, HashSet};
use log::{debug, info};

use crate::alignment::TrainOptions;
use crate::errors::{Result, SmtError};
use crate::phrase::{phrase_extract, ExtractOptions, PhraseVocabulary};
use crate::symmetrize::{Alignment, Symmetrizer};
use crate::text::Corpus;
use crate::types::*;

/// Both conditional directions of one phrase pair.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhraseProbs {
    /// p(target | source)
    pub forward: Prob,
    /// p(source | target)
    pub backward: Prob,
}

/// Phrase pairs keyed by their space-joined source and target text.
#[derive(Clone, Debug, Default)]
pub struct PhraseTable {
    by_source: HashMap<String, HashMap<String, PhraseProbs>>,
    by_target: HashMap<String, HashSet<String>>,
    len: usize,
}

impl PhraseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: &str, target: &str, probs: PhraseProbs) {
        let targets = self.by_source.entry(source.to_string()).or_default();
        if targets.insert(target.to_string(), probs).is_none() {
            self.len += 1;
        }
        self.by_target
            .entry(target.to_string())
            .or_default()
            .insert(source.to_string());
    }

    #[inline]
    pub fn get(&self, source: &str, target: &str) -> Option<PhraseProbs> {
        self.by_source.get(source)?.get(target).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Every entry, ordered by source then target text.
    pub fn sorted_entries(&self) -> Vec<(&str, &str, PhraseProbs)> {
        let mut entries: Vec<(&str, &str, PhraseProbs)> = self
            .by_source
            .iter()
            .flat_map(|(s, targets)| targets.iter().map(move |(t, &p)| (s.as_str(), t.as_str(), p)))
            .collect();
        entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        entries
    }

    /// View of the table with `direction`'s input side as the lookup key.
    pub fn directed(&self, direction: Direction) -> DirectedPhraseTable<'_> {
        DirectedPhraseTable {
            table: self,
            direction,
            unseen: UNSEEN_PHRASE_PROB,
        }
    }

    /// Align `corpus` in both directions, symmetrize, and count the
    /// consistent phrase pairs of every sentence.
    pub fn train(corpus: &Corpus, train_opts: &TrainOptions, extract_opts: &ExtractOptions) -> Result<Self> {
        let symmetrizer = Symmetrizer::train(corpus, train_opts);
        let alignments = symmetrizer.symmetrize_corpus(corpus)?;
        let mut builder = PhraseTableBuilder::new(extract_opts.clone());
        for (k, alignment) in alignments.iter().enumerate() {
            builder.add(&corpus.source_words(k), &corpus.target_words(k), alignment)?;
        }
        let table = builder.build();
        info!("phrase table: {} pairs from {} sentences", table.len(), corpus.len());
        Ok(table)
    }
}

/// Accumulates phrase-pair counts sentence by sentence.
#[derive(Clone, Debug, Default)]
pub struct PhraseTableBuilder {
    opts: ExtractOptions,
    pair_counts: HashMap<(String, String), f64>,
    source_counts: HashMap<String, f64>,
    target_counts: HashMap<String, f64>,
}

impl PhraseTableBuilder {
    pub fn new(opts: ExtractOptions) -> Self {
        PhraseTableBuilder {
            opts,
            ..Default::default()
        }
    }

    /// Count each distinct pair extracted from one sentence once.
    pub fn add<S: AsRef<str>>(&mut self, source: &[S], target: &[S], alignment: &Alignment) -> Result<()> {
        for (i, j) in alignment.iter() {
            if i == 0 || i > source.len() || j == 0 || j > target.len() {
                return Err(SmtError::invalid_argument(
                    "alignment",
                    format!("link ({i}, {j}) outside {}x{}", source.len(), target.len()),
                ));
            }
        }
        for (s, t) in phrase_extract(source, target, alignment, &self.opts) {
            let s = phrase_text(&s);
            let t = phrase_text(&t);
            *self.source_counts.entry(s.clone()).or_default() += 1.0;
            *self.target_counts.entry(t.clone()).or_default() += 1.0;
            *self.pair_counts.entry((s, t)).or_default() += 1.0;
        }
        Ok(())
    }

    pub fn build(self) -> PhraseTable {
        debug!(
            "building phrase table: {} source phrases, {} target phrases",
            self.source_counts.len(),
            self.target_counts.len()
        );
        let mut table = PhraseTable::new();
        for ((s, t), c) in &self.pair_counts {
            let probs = PhraseProbs {
                forward: c / self.source_counts[s],
                backward: c / self.target_counts[t],
            };
            table.insert(s, t, probs);
        }
        table
    }
}

/// One translation option for an input phrase.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub output: Vec<String>,
    pub prob: Prob,
}

/// What the decoder needs from a phrase model.
pub trait PhraseLookup {
    /// Channel probability of `input` given `output`, or the unseen default.
    fn score(&self, input: &str, output: &str) -> Prob;

    /// At most `limit` translations of `input`, best first, ties broken by
    /// output text.
    fn candidates(&self, input: &str, limit: usize) -> Vec<Candidate>;

    fn has_input(&self, input: &str) -> bool;
}

/// [`PhraseTable`] read in one translation direction.
#[derive(Clone, Copy, Debug)]
pub struct DirectedPhraseTable<'a> {
    table: &'a PhraseTable,
    direction: Direction,
    unseen: Prob,
}

impl DirectedPhraseTable<'_> {
    /// Replace the probability reported for unseen pairs.
    pub fn with_unseen(mut self, unseen: Prob) -> Self {
        self.unseen = unseen;
        self
    }

    fn lookup(&self, input: &str, output: &str) -> Option<Prob> {
        match self.direction {
            Direction::SourceToTarget => self.table.get(input, output).map(|p| p.backward),
            Direction::TargetToSource => self.table.get(output, input).map(|p| p.forward),
        }
    }
}

fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.prob
        .partial_cmp(&a.prob)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.output.cmp(&b.output))
}

impl PhraseLookup for DirectedPhraseTable<'_> {
    fn score(&self, input: &str, output: &str) -> Prob {
        self.lookup(input, output).unwrap_or(self.unseen)
    }

    fn candidates(&self, input: &str, limit: usize) -> Vec<Candidate> {
        let mut out: Vec<Candidate> = match self.direction {
            Direction::SourceToTarget => match self.table.by_source.get(input) {
                Some(targets) => targets
                    .iter()
                    .map(|(t, p)| Candidate {
                        output: t.split(' ').map(String::from).collect(),
                        prob: p.backward,
                    })
                    .collect(),
                None => Vec::new(),
            },
            Direction::TargetToSource => match self.table.by_target.get(input) {
                Some(sources) => sources
                    .iter()
                    .filter_map(|s| {
                        self.table.get(s, input).map(|p| Candidate {
                            output: s.split(' ').map(String::from).collect(),
                            prob: p.forward,
                        })
                    })
                    .collect(),
                None => Vec::new(),
            },
        };
        out.sort_by(rank);
        out.truncate(limit);
        out
    }

    fn has_input(&self, input: &str) -> bool {
        match self.direction {
            Direction::SourceToTarget => self.table.by_source.contains_key(input),
            Direction::TargetToSource => self.table.by_target.contains_key(input),
        }
    }
}

impl PhraseVocabulary for DirectedPhraseTable<'_> {
    fn contains_phrase(&self, phrase: &str) -> bool {
        self.has_input(phrase)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::phrase::available_phrases;

    fn probs(forward: Prob, backward: Prob) -> PhraseProbs {
        PhraseProbs { forward, backward }
    }

    fn small_table() -> PhraseTable {
        let mut table = PhraseTable::new();
        table.insert("das", "the", probs(0.7, 0.6));
        table.insert("das", "that", probs(0.3, 0.9));
        table.insert("das Haus", "the house", probs(1.0, 1.0));
        table.insert("Haus", "house", probs(1.0, 0.8));
        table.insert("dies", "the", probs(1.0, 0.4));
        table
    }

    #[test]
    fn scores_follow_the_noisy_channel() {
        let table = small_table();
        let s2t = table.directed(Direction::SourceToTarget);
        assert_eq!(s2t.score("das", "the"), 0.6);
        assert_eq!(s2t.score("das", "house"), UNSEEN_PHRASE_PROB);
        let t2s = table.directed(Direction::TargetToSource);
        assert_eq!(t2s.score("the", "das"), 0.7);
        assert_eq!(t2s.with_unseen(0.0).score("the", "Haus"), 0.0);
    }

    #[test]
    fn candidates_are_ranked_and_truncated() {
        let table = small_table();
        let s2t = table.directed(Direction::SourceToTarget);
        let c = s2t.candidates("das", 10);
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].output, vec!["that"]);
        assert_eq!(c[1].output, vec!["the"]);
        assert_eq!(s2t.candidates("das", 1).len(), 1);
        assert!(s2t.candidates("Auto", 10).is_empty());

        let t2s = table.directed(Direction::TargetToSource);
        let c = t2s.candidates("the", 10);
        assert_eq!(c[0], Candidate { output: vec!["dies".into()], prob: 1.0 });
        assert_eq!(c[1].output, vec!["das"]);
    }

    #[test]
    fn ties_break_on_output_text() {
        let mut table = PhraseTable::new();
        table.insert("a", "z", probs(0.5, 0.5));
        table.insert("a", "b", probs(0.5, 0.5));
        let c = table.directed(Direction::SourceToTarget).candidates("a", 10);
        assert_eq!(c[0].output, vec!["b"]);
        assert_eq!(c[1].output, vec!["z"]);
    }

    #[test]
    fn directed_table_is_a_phrase_vocabulary() {
        let table = small_table();
        let s2t = table.directed(Direction::SourceToTarget);
        let spans = available_phrases(&["das", "Haus", "brennt"], &s2t);
        let expected: Vec<Span> = vec![Span::new(1, 1), Span::new(1, 2), Span::new(2, 2)];
        assert_eq!(spans.into_iter().collect::<Vec<_>>(), expected);
        assert!(table.directed(Direction::TargetToSource).has_input("the house"));
    }

    #[test]
    fn builder_counts_relative_frequencies() {
        let mut builder = PhraseTableBuilder::new(ExtractOptions::default());
        let a: Alignment = [(1, 1), (2, 2)].into_iter().collect();
        builder.add(&["das", "Haus"], &["the", "house"], &a).unwrap();
        let b: Alignment = [(1, 1), (2, 2)].into_iter().collect();
        builder.add(&["das", "Buch"], &["the", "book"], &b).unwrap();
        let c: Alignment = [(1, 1)].into_iter().collect();
        builder.add(&["das"], &["that"], &c).unwrap();
        let table = builder.build();

        assert_eq!(table.len(), 6);
        let das_the = table.get("das", "the").unwrap();
        assert_abs_diff_eq!(das_the.forward, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(das_the.backward, 1.0, epsilon = 1e-12);
        let das_that = table.get("das", "that").unwrap();
        assert_abs_diff_eq!(das_that.forward, 1.0 / 3.0, epsilon = 1e-12);
        assert_eq!(table.get("das Haus", "the house"), Some(probs(1.0, 1.0)));

        // forward distributions sum to one per source phrase
        let total: Prob = table
            .sorted_entries()
            .iter()
            .filter(|(s, _, _)| *s == "das")
            .map(|(_, _, p)| p.forward)
            .sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn builder_rejects_links_outside_the_sentence() {
        let mut builder = PhraseTableBuilder::default();
        let a: Alignment = [(1, 3)].into_iter().collect();
        assert!(builder.add(&["das"], &["the"], &a).is_err());
    }

    #[test]
    fn sorted_entries_are_ordered() {
        let table = small_table();
        let keys: Vec<(&str, &str)> = table.sorted_entries().iter().map(|e| (e.0, e.1)).collect();
        assert_eq!(
            keys,
            vec![
                ("Haus", "house"),
                ("das", "that"),
                ("das", "the"),
                ("das Haus", "the house"),
                ("dies", "the"),
            ]
        );
    }

    #[test]
    fn trains_from_a_corpus() {
        let corpus = Corpus::from_pairs(&[
            ("僕 は 男 です", "I am a man"),
            ("私 は 女 です", "I am a girl"),
            ("私 は 先生 です", "I am a teacher"),
            ("彼女 は 先生 です", "She is a teacher"),
            ("彼 は 先生 です", "He is a teacher"),
        ]);
        let table = PhraseTable::train(
            &corpus,
            &TrainOptions::with_iterations(50, 50),
            &ExtractOptions::default(),
        )
        .unwrap();
        assert!(!table.is_empty());
        // each full sentence pair is always consistent
        assert!(table.get("私 は 先生 です", "I am a teacher").is_some());
        for (_, _, p) in table.sorted_entries() {
            assert!(p.forward > 0.0 && p.forward <= 1.0);
            assert!(p.backward > 0.0 && p.backward <= 1.0);
        }
    }
}
