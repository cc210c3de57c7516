//! Hypothesis stacks with recombination and pruning.

use std::cmp::Ordering;

use hashbrown::HashMap;

use crate::hypothesis::{HypothesisArena, HypothesisId};
use crate::types::*;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StackOptions {
    pub beam_size: usize,
    pub histogram_pruning: bool,
    pub threshold_pruning: bool,
    pub threshold_epsilon: Prob,
}

impl Default for StackOptions {
    fn default() -> Self {
        StackOptions {
            beam_size: BEAM_SIZE,
            histogram_pruning: true,
            threshold_pruning: false,
            threshold_epsilon: THRESHOLD_EPSILON,
        }
    }
}

/// What happened to a hypothesis offered to a [`Stack`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Insertion {
    Added,
    /// Replaced a recombinable hypothesis with a lower score.
    Recombined { replaced: HypothesisId },
    /// A recombinable hypothesis with an equal or higher score is kept.
    Rejected,
    /// Added, then evicted by pruning in the same step.
    Pruned,
}

impl Insertion {
    #[inline]
    pub fn is_kept(&self) -> bool {
        matches!(self, Insertion::Added | Insertion::Recombined { .. })
    }
}

type RecombinationKey = (Vec<String>, Position);

fn recombination_key(arena: &HypothesisArena, id: HypothesisId) -> RecombinationKey {
    let (context, end) = arena[id].recombination_key();
    (context.to_vec(), end)
}

/// The hypotheses that cover the same number of input positions.
#[derive(Clone, Debug)]
pub struct Stack {
    opts: StackOptions,
    members: Vec<HypothesisId>,
    keys: HashMap<RecombinationKey, HypothesisId>,
    // left the stack since the last `take_evicted`
    evicted: Vec<HypothesisId>,
}

// Best first, lower id first on equal estimates.
fn by_estimate(arena: &HypothesisArena) -> impl Fn(&HypothesisId, &HypothesisId) -> Ordering + '_ {
    move |a, b| {
        arena[*b]
            .estimate
            .partial_cmp(&arena[*a].estimate)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(b))
    }
}

impl Stack {
    pub fn new(opts: StackOptions) -> Self {
        Stack {
            opts,
            members: Vec::new(),
            keys: HashMap::new(),
            evicted: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: HypothesisId) -> bool {
        self.members.contains(&id)
    }

    /// Members ordered by estimate, best first.
    pub fn ordered(&self, arena: &HypothesisArena) -> Vec<HypothesisId> {
        let mut ids = self.members.clone();
        ids.sort_by(by_estimate(arena));
        ids
    }

    /// Member with the highest score.
    pub fn best(&self, arena: &HypothesisArena) -> Option<HypothesisId> {
        self.members.iter().copied().min_by(|a, b| {
            arena[*b]
                .score
                .partial_cmp(&arena[*a].score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.cmp(b))
        })
    }

    /// Whether a hypothesis with this key and these scores would survive
    /// [`Stack::insert`]. A `false` is exact: such a hypothesis would be
    /// rejected by recombination or pruned on arrival, so it need not be
    /// built. Newcomers lose estimate ties.
    pub fn admits(
        &self,
        context: &[String],
        end: Position,
        score: Prob,
        estimate: Prob,
        arena: &HypothesisArena,
    ) -> bool {
        let replaced = match self.keys.get(&(context.to_vec(), end)) {
            Some(&existing) if arena[existing].score >= score => return false,
            existing => existing.copied(),
        };
        let others: Vec<Prob> = self
            .members
            .iter()
            .filter(|&&m| Some(m) != replaced)
            .map(|&m| arena[m].estimate)
            .collect();

        if self.opts.histogram_pruning && others.len() >= self.opts.beam_size {
            let worst = others.iter().copied().fold(f64::INFINITY, f64::min);
            if estimate <= worst {
                return false;
            }
        }
        if self.opts.threshold_pruning {
            let max = others.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if estimate < max * self.opts.threshold_epsilon {
                return false;
            }
        }
        true
    }

    /// Ids that left the stack through recombination, rejection or pruning
    /// since the last call.
    pub fn take_evicted(&mut self) -> Vec<HypothesisId> {
        std::mem::take(&mut self.evicted)
    }

    /// Offer `id` to the stack.
    ///
    /// A member with the same recombination key is replaced only by a
    /// strictly better score. Histogram pruning then evicts the lowest
    /// estimate once the stack exceeds the beam, and threshold pruning evicts
    /// every member below the best estimate times epsilon.
    pub fn insert(&mut self, id: HypothesisId, arena: &HypothesisArena) -> Insertion {
        let hyp = &arena[id];
        let key = recombination_key(arena, id);

        let mut outcome = Insertion::Added;
        if let Some(&existing) = self.keys.get(&key) {
            if existing == id {
                return Insertion::Rejected;
            }
            if hyp.score > arena[existing].score {
                self.remove(existing);
                self.evicted.push(existing);
                outcome = Insertion::Recombined { replaced: existing };
            } else {
                self.evicted.push(id);
                return Insertion::Rejected;
            }
        }
        self.members.push(id);
        self.keys.insert(key, id);

        if self.opts.histogram_pruning {
            let cmp = by_estimate(arena);
            while self.members.len() > self.opts.beam_size {
                let worst = self.members.iter().copied().max_by(|a, b| cmp(a, b));
                match worst {
                    Some(worst) => self.evict(worst, arena),
                    None => break,
                }
            }
        }

        if self.opts.threshold_pruning {
            let max = self
                .members
                .iter()
                .map(|&m| arena[m].estimate)
                .fold(f64::NEG_INFINITY, f64::max);
            let cutoff = max * self.opts.threshold_epsilon;
            let below: Vec<HypothesisId> = self
                .members
                .iter()
                .copied()
                .filter(|&m| arena[m].estimate < cutoff)
                .collect();
            for m in below {
                self.evict(m, arena);
            }
        }

        if self.contains(id) {
            outcome
        } else {
            Insertion::Pruned
        }
    }

    fn remove(&mut self, id: HypothesisId) {
        self.members.retain(|&m| m != id);
    }

    fn evict(&mut self, id: HypothesisId, arena: &HypothesisArena) {
        self.remove(id);
        self.evicted.push(id);
        let key = recombination_key(arena, id);
        if self.keys.get(&key) == Some(&id) {
            self.keys.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypothesis::Hypothesis;

    fn hyp(context: &str, end: Position, score: Prob) -> Hypothesis {
        let mut h = Hypothesis::empty(4, 3, Vec::new());
        h.context = context.split_whitespace().map(String::from).collect();
        h.end = end;
        h.score = score;
        h.estimate = score;
        h
    }

    #[test]
    fn recombination_keeps_the_higher_score() {
        let mut arena = HypothesisArena::new();
        let mut stack = Stack::new(StackOptions::default());
        let low = arena.push(hyp("the house", 2, 0.0072));
        let high = arena.push(hyp("the house", 2, 0.05));
        let tie = arena.push(hyp("the house", 2, 0.05));

        assert_eq!(stack.insert(low, &arena), Insertion::Added);
        assert_eq!(stack.insert(high, &arena), Insertion::Recombined { replaced: low });
        assert_eq!(stack.insert(tie, &arena), Insertion::Rejected);
        assert_eq!(stack.ordered(&arena), vec![high]);
        // never compared against itself
        assert_eq!(stack.insert(high, &arena), Insertion::Rejected);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn different_end_or_context_do_not_recombine() {
        let mut arena = HypothesisArena::new();
        let mut stack = Stack::new(StackOptions::default());
        let a = arena.push(hyp("the house", 2, 0.05));
        let b = arena.push(hyp("the house", 1, 0.01));
        let c = arena.push(hyp("a house", 2, 0.02));
        for id in [a, b, c] {
            assert!(stack.insert(id, &arena).is_kept());
        }
        assert_eq!(stack.ordered(&arena), vec![a, c, b]);
        assert_eq!(stack.best(&arena), Some(a));
    }

    #[test]
    fn histogram_pruning_bounds_the_stack() {
        let mut arena = HypothesisArena::new();
        let opts = StackOptions {
            beam_size: 2,
            ..Default::default()
        };
        let mut stack = Stack::new(opts);
        let ids: Vec<HypothesisId> = [0.3, 0.1, 0.5, 0.05]
            .iter()
            .enumerate()
            .map(|(k, &p)| arena.push(hyp(&format!("w{k}"), 1, p)))
            .collect();
        assert_eq!(stack.insert(ids[0], &arena), Insertion::Added);
        assert_eq!(stack.insert(ids[1], &arena), Insertion::Added);
        assert_eq!(stack.insert(ids[2], &arena), Insertion::Added);
        assert_eq!(stack.insert(ids[3], &arena), Insertion::Pruned);
        assert_eq!(stack.ordered(&arena), vec![ids[2], ids[0]]);
    }

    #[test]
    fn evicted_keys_can_be_reused() {
        let mut arena = HypothesisArena::new();
        let opts = StackOptions {
            beam_size: 1,
            ..Default::default()
        };
        let mut stack = Stack::new(opts);
        let a = arena.push(hyp("x", 1, 0.2));
        let b = arena.push(hyp("y", 1, 0.5));
        let c = arena.push(hyp("x", 1, 0.1));
        stack.insert(a, &arena);
        stack.insert(b, &arena);
        assert!(!stack.contains(a));
        // a was evicted, so c is not compared against it
        assert_eq!(stack.insert(c, &arena), Insertion::Pruned);
        assert_eq!(stack.ordered(&arena), vec![b]);
    }

    #[test]
    fn threshold_pruning_drops_weak_members() {
        let mut arena = HypothesisArena::new();
        let opts = StackOptions {
            threshold_pruning: true,
            threshold_epsilon: 0.5,
            ..Default::default()
        };
        let mut stack = Stack::new(opts);
        let the = arena.push(hyp("<s> the", 1, 0.08));
        let house = arena.push(hyp("<s> house", 2, 0.009));
        let that = arena.push(hyp("<s> that", 1, 0.05));
        assert_eq!(stack.insert(the, &arena), Insertion::Added);
        assert_eq!(stack.insert(house, &arena), Insertion::Pruned);
        assert_eq!(stack.insert(that, &arena), Insertion::Added);
        assert_eq!(stack.ordered(&arena), vec![the, that]);
    }

    #[test]
    fn admission_matches_insertion() {
        let mut arena = HypothesisArena::new();
        let opts = StackOptions {
            beam_size: 2,
            threshold_pruning: true,
            threshold_epsilon: 0.1,
            ..Default::default()
        };
        let mut stack = Stack::new(opts);
        let a = arena.push(hyp("a", 1, 0.5));
        let b = arena.push(hyp("b", 1, 0.2));
        stack.insert(a, &arena);
        stack.insert(b, &arena);
        let context = |s: &str| vec![s.to_string()];

        // recombination: only a strictly higher score gets in
        assert!(!stack.admits(&context("b"), 1, 0.2, 0.2, &arena));
        assert!(stack.admits(&context("b"), 1, 0.3, 0.3, &arena));
        // a full stack turns away anything not better than its worst
        assert!(!stack.admits(&context("c"), 1, 0.2, 0.2, &arena));
        assert!(stack.admits(&context("c"), 1, 0.25, 0.25, &arena));
        assert!(!stack.admits(&context("d"), 1, 0.01, 0.01, &arena));
        // the threshold follows the members that would remain
        assert!(!stack.admits(&context("b"), 1, 0.3, 0.04, &arena));
        assert!(stack.admits(&context("a"), 1, 0.55, 0.03, &arena));

        let tie = arena.push(hyp("c", 1, 0.2));
        assert_eq!(stack.insert(tie, &arena), Insertion::Pruned);
        let better = arena.push(hyp("c", 1, 0.25));
        assert!(stack.insert(better, &arena).is_kept());
        assert_eq!(stack.ordered(&arena), vec![a, better]);
    }

    #[test]
    fn evicted_ids_are_reported_once() {
        let mut arena = HypothesisArena::new();
        let opts = StackOptions {
            beam_size: 1,
            ..Default::default()
        };
        let mut stack = Stack::new(opts);
        let low = arena.push(hyp("x", 1, 0.1));
        let high = arena.push(hyp("x", 1, 0.4));
        let same = arena.push(hyp("x", 1, 0.4));
        let other = arena.push(hyp("y", 1, 0.2));
        stack.insert(low, &arena);
        assert!(stack.take_evicted().is_empty());

        stack.insert(high, &arena);
        stack.insert(same, &arena);
        stack.insert(other, &arena);
        stack.insert(high, &arena);
        assert_eq!(stack.take_evicted(), vec![low, same, other]);
        assert!(stack.take_evicted().is_empty());
        assert_eq!(stack.ordered(&arena), vec![high]);
    }
}
