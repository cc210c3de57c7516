//! Probability tables with an explicit default policy.
//!
//! Missing keys are never materialised: a lookup that misses returns the
//! table's declared default, so a table only stores what EM has estimated.

use hashbrown::HashMap;

use crate::types::*;

/// Key of the distortion table a(i | j, l_e, l_f).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DistortionKey {
    pub source_pos: Position,
    pub target_pos: Position,
    pub target_len: usize,
    pub source_len: usize,
}

impl DistortionKey {
    #[inline]
    pub fn new(source_pos: Position, target_pos: Position, target_len: usize, source_len: usize) -> Self {
        DistortionKey {
            source_pos,
            target_pos,
            target_len,
            source_len,
        }
    }

    /// The normalisation group: every `source_pos` for one (j, l_e, l_f).
    #[inline]
    pub fn context(&self) -> DistortionContext {
        DistortionContext {
            target_pos: self.target_pos,
            target_len: self.target_len,
            source_len: self.source_len,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DistortionContext {
    pub target_pos: Position,
    pub target_len: usize,
    pub source_len: usize,
}

/// Lexical translation table t(e | f), keyed by (target token, source token).
#[derive(Clone, Debug)]
pub struct TranslationTable {
    probs: HashMap<(Token, Token), Prob>,
    default: Prob,
}

impl TranslationTable {
    pub fn with_default(default: Prob) -> Self {
        TranslationTable {
            probs: HashMap::new(),
            default,
        }
    }

    /// Uniform over a target vocabulary of `target_vocab_size` words.
    pub fn uniform(target_vocab_size: usize) -> Self {
        Self::with_default(1.0 / target_vocab_size.max(1) as Prob)
    }

    #[inline]
    pub fn get(&self, target: Token, source: Token) -> Prob {
        self.probs.get(&(target, source)).copied().unwrap_or(self.default)
    }

    #[inline]
    pub fn set(&mut self, target: Token, source: Token, p: Prob) {
        self.probs.insert((target, source), p);
    }

    /// Number of estimated entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.probs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ((Token, Token), Prob)> + '_ {
        self.probs.iter().map(|(&k, &p)| (k, p))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DistortionDefault {
    /// 1 / (l_f + 1), the IBM Model 2 starting point.
    UniformOverSource,
    Constant(Prob),
}

/// Alignment (distortion) table a(i | j, l_e, l_f).
#[derive(Clone, Debug)]
pub struct DistortionTable {
    probs: HashMap<DistortionKey, Prob>,
    default: DistortionDefault,
}

impl Default for DistortionTable {
    fn default() -> Self {
        Self::uniform()
    }
}

impl DistortionTable {
    pub fn uniform() -> Self {
        DistortionTable {
            probs: HashMap::new(),
            default: DistortionDefault::UniformOverSource,
        }
    }

    pub fn with_default(default: Prob) -> Self {
        DistortionTable {
            probs: HashMap::new(),
            default: DistortionDefault::Constant(default),
        }
    }

    #[inline]
    pub fn get(&self, key: &DistortionKey) -> Prob {
        match self.probs.get(key) {
            Some(&p) => p,
            None => match self.default {
                DistortionDefault::UniformOverSource => 1.0 / (key.source_len + 1) as Prob,
                DistortionDefault::Constant(p) => p,
            },
        }
    }

    #[inline]
    pub fn set(&mut self, key: DistortionKey, p: Prob) {
        self.probs.insert(key, p);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.probs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DistortionKey, Prob)> + '_ {
        self.probs.iter().map(|(&k, &p)| (k, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_default_is_lazy() {
        let mut t = TranslationTable::uniform(4);
        assert_eq!(t.get(1, 2), 0.25);
        assert!(t.is_empty());
        t.set(1, 2, 0.9);
        assert_eq!(t.get(1, 2), 0.9);
        assert_eq!(t.get(2, 1), 0.25);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn distortion_default_depends_on_source_length() {
        let a = DistortionTable::uniform();
        assert_eq!(a.get(&DistortionKey::new(1, 1, 2, 3)), 0.25);
        assert_eq!(a.get(&DistortionKey::new(2, 5, 7, 1)), 0.5);
        let zero = DistortionTable::with_default(0.0);
        assert_eq!(zero.get(&DistortionKey::new(1, 1, 1, 1)), 0.0);
    }
}
