//! IBM Model 1 and Model 2 training by fixed-iteration EM.

use hashbrown::HashMap;
use log::{debug, info};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::table::{DistortionContext, DistortionKey, DistortionTable, TranslationTable};
use crate::text::{Corpus, SentencePair};
use crate::types::*;
use crate::viterbi::viterbi_alignment;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainOptions {
    pub model1_iterations: usize,
    pub model2_iterations: usize,
    /// Sentence pairs per E-step shard.
    pub shard_size: usize,
}

impl Default for TrainOptions {
    fn default() -> Self {
        TrainOptions {
            model1_iterations: 5,
            model2_iterations: 5,
            shard_size: 1024,
        }
    }
}

impl TrainOptions {
    pub fn with_iterations(model1_iterations: usize, model2_iterations: usize) -> Self {
        TrainOptions {
            model1_iterations,
            model2_iterations,
            ..Default::default()
        }
    }
}

/// Iteration counts scaled down for larger corpora: (model 1, model 2).
pub fn suggested_iterations(n_sentences: usize) -> (usize, usize) {
    let iters = (1000.0 / (n_sentences.max(1) as f64).sqrt()).round().max(2.0) as usize;
    let iters4 = ((iters as f64) / 4.0).max(2.0) as usize;
    (iters, iters4)
}

/// Trained translation and distortion tables for one direction.
#[derive(Clone, Debug)]
pub struct AlignmentModel {
    pub translation: TranslationTable,
    pub distortion: DistortionTable,
}

impl AlignmentModel {
    /// Viterbi alignment: element `j - 1` is the source position of target `j`.
    pub fn align(&self, source: &[Token], target: &[Token]) -> Vec<Position> {
        viterbi_alignment(source, target, &self.translation, &self.distortion)
    }
}

#[derive(Debug, Default)]
struct Counts {
    lexical: HashMap<(Token, Token), Prob>,
    total: HashMap<Token, Prob>,
    distortion: HashMap<DistortionKey, Prob>,
    distortion_total: HashMap<DistortionContext, Prob>,
    log_likelihood: f64,
}

impl Counts {
    fn merge(&mut self, other: Counts) {
        for (k, c) in other.lexical {
            *self.lexical.entry(k).or_insert(0.0) += c;
        }
        for (k, c) in other.total {
            *self.total.entry(k).or_insert(0.0) += c;
        }
        for (k, c) in other.distortion {
            *self.distortion.entry(k).or_insert(0.0) += c;
        }
        for (k, c) in other.distortion_total {
            *self.distortion_total.entry(k).or_insert(0.0) += c;
        }
        self.log_likelihood += other.log_likelihood;
    }
}

// E-step over one shard. With `distortion == None` this is Model 1.
fn expectation(
    pairs: &[SentencePair],
    translation: &TranslationTable,
    distortion: Option<&DistortionTable>,
) -> Counts {
    let mut counts = Counts::default();
    let mut weights: Vec<Prob> = Vec::new();

    for pair in pairs {
        let l_f = pair.source.len();
        let l_e = pair.target.len();
        if l_f == 0 || l_e == 0 {
            continue;
        }
        for (j0, &e) in pair.target.tokens.iter().enumerate() {
            let j = j0 + 1;
            weights.clear();
            let mut z: Prob = 0.0;
            for (i0, &f) in pair.source.tokens.iter().enumerate() {
                let mut w = translation.get(e, f);
                if let Some(a) = distortion {
                    w *= a.get(&DistortionKey::new(i0 + 1, j, l_e, l_f));
                }
                z += w;
                weights.push(w);
            }
            // no mass to distribute for this position
            if z <= 0.0 {
                continue;
            }
            // Model 1 draws the source position uniformly
            counts.log_likelihood += match distortion {
                Some(_) => z.ln(),
                None => (z / l_f as Prob).ln(),
            };

            for (i0, &f) in pair.source.tokens.iter().enumerate() {
                let c = weights[i0] / z;
                *counts.lexical.entry((e, f)).or_insert(0.0) += c;
                *counts.total.entry(f).or_insert(0.0) += c;
                if distortion.is_some() {
                    let key = DistortionKey::new(i0 + 1, j, l_e, l_f);
                    *counts.distortion.entry(key).or_insert(0.0) += c;
                    *counts.distortion_total.entry(key.context()).or_insert(0.0) += c;
                }
            }
        }
    }
    counts
}

// Shards are merged in corpus order, so the result does not depend on
// thread scheduling.
fn collect_counts(
    corpus: &Corpus,
    translation: &TranslationTable,
    distortion: Option<&DistortionTable>,
    shard_size: usize,
) -> Counts {
    let shard_size = shard_size.max(1);

    #[cfg(feature = "parallel")]
    let partials: Vec<Counts> = corpus
        .pairs
        .par_chunks(shard_size)
        .map(|shard| expectation(shard, translation, distortion))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let partials: Vec<Counts> = corpus
        .pairs
        .chunks(shard_size)
        .map(|shard| expectation(shard, translation, distortion))
        .collect();

    let mut partials = partials.into_iter();
    let mut counts = partials.next().unwrap_or_default();
    for partial in partials {
        counts.merge(partial);
    }
    counts
}

fn maximize_translation(translation: &mut TranslationTable, counts: &Counts) {
    for (&(e, f), &c) in counts.lexical.iter() {
        if let Some(&total) = counts.total.get(&f) {
            translation.set(e, f, c / total);
        }
    }
}

fn maximize_distortion(distortion: &mut DistortionTable, counts: &Counts) {
    for (&key, &c) in counts.distortion.iter() {
        if let Some(&total) = counts.distortion_total.get(&key.context()) {
            distortion.set(key, c / total);
        }
    }
}

/// IBM Model 1. `t` starts uniform over the target vocabulary.
pub fn train_model1(corpus: &Corpus, iterations: usize, shard_size: usize) -> TranslationTable {
    let mut translation = TranslationTable::uniform(corpus.target_vocab.len());
    for it in 0..iterations {
        let counts = collect_counts(corpus, &translation, None, shard_size);
        maximize_translation(&mut translation, &counts);
        info!(
            "model 1 iteration {}/{}: log-likelihood {:.4}",
            it + 1,
            iterations,
            counts.log_likelihood
        );
    }
    debug!("model 1: {} lexical entries", translation.len());
    translation
}

/// IBM Model 2 seeded with a Model 1 translation table.
pub fn train_model2(
    corpus: &Corpus,
    mut translation: TranslationTable,
    iterations: usize,
    shard_size: usize,
) -> (TranslationTable, DistortionTable) {
    let mut distortion = DistortionTable::uniform();
    for it in 0..iterations {
        let counts = collect_counts(corpus, &translation, Some(&distortion), shard_size);
        maximize_translation(&mut translation, &counts);
        maximize_distortion(&mut distortion, &counts);
        info!(
            "model 2 iteration {}/{}: log-likelihood {:.4}",
            it + 1,
            iterations,
            counts.log_likelihood
        );
    }
    debug!(
        "model 2: {} lexical entries, {} distortion entries",
        translation.len(),
        distortion.len()
    );
    (translation, distortion)
}

/// Model 1 followed by Model 2, estimating p(target | source).
pub fn train(corpus: &Corpus, opts: &TrainOptions) -> AlignmentModel {
    let t = train_model1(corpus, opts.model1_iterations, opts.shard_size);
    let (translation, distortion) = train_model2(corpus, t, opts.model2_iterations, opts.shard_size);
    AlignmentModel {
        translation,
        distortion,
    }
}
