use serde::{Deserialize, Serialize};

pub type Token = u32;
pub type Position = usize;
pub type Prob = f64;

/// Token id reserved for the empty word; unknown words encode to it as well.
pub const NULL_TOKEN: Token = 0;

/// Marker used to pad the n-gram context of the empty hypothesis.
pub const SENTENCE_START: &str = "<s>";

/// Probability returned for a phrase pair that the table has never seen.
pub const UNSEEN_PHRASE_PROB: Prob = 1.0e-10;

pub const REORDERING_ALPHA: Prob = 0.1;
pub const THRESHOLD_EPSILON: Prob = 1.0e-5;
pub const CANDIDATES_PER_SPAN: usize = 10;
pub const BEAM_SIZE: usize = 10;
pub const NGRAM_ORDER: usize = 3;

/// Which side of the phrase table is the decoder input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[default]
    SourceToTarget,
    TargetToSource,
}

/// Inclusive 1-based range of positions in one sentence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    #[inline]
    pub fn new(start: Position, end: Position) -> Self {
        debug_assert!(start >= 1 && start <= end);
        Span { start, end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    #[inline]
    pub fn contains(&self, p: Position) -> bool {
        self.start <= p && p <= self.end
    }

    #[inline]
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Tokens covered by this span in a 1-based sentence.
    pub fn slice<'s, T>(&self, tokens: &'s [T]) -> &'s [T] {
        &tokens[self.start - 1..self.end]
    }
}

/// Join phrase tokens the way phrase tables key them.
pub fn phrase_text<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut s = String::new();
    for (k, t) in tokens.iter().enumerate() {
        if k > 0 {
            s.push(' ');
        }
        s.push_str(t.as_ref());
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_geometry() {
        let a = Span::new(2, 4);
        assert_eq!(a.len(), 3);
        assert!(a.contains(2) && a.contains(4) && !a.contains(5));
        assert!(a.overlaps(&Span::new(4, 6)));
        assert!(!a.overlaps(&Span::new(5, 6)));
        assert_eq!(a.slice(&["a", "b", "c", "d", "e"]), &["b", "c", "d"]);
    }

    #[test]
    fn phrase_text_joins_with_spaces() {
        assert_eq!(phrase_text(&["im", "haus"]), "im haus");
        assert_eq!(phrase_text::<&str>(&[]), "");
    }
}
