//! Extraction of alignment-consistent phrase pairs.

use std::collections::BTreeSet;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::symmetrize::Alignment;
use crate::types::*;

/// A source span paired with a target span.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhraseSpan {
    pub source: Span,
    pub target: Span,
}

impl PhraseSpan {
    pub fn new(s1: Position, s2: Position, t1: Position, t2: Position) -> Self {
        PhraseSpan {
            source: Span::new(s1, s2),
            target: Span::new(t1, t2),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Longest phrase kept on either side; `None` keeps everything.
    pub max_length: Option<usize>,
}

impl ExtractOptions {
    fn admits(&self, span: &PhraseSpan) -> bool {
        match self.max_length {
            Some(n) => span.source.len() <= n && span.target.len() <= n,
            None => true,
        }
    }
}

// No link may leave the rectangle through the target side.
fn consistent(alignment: &Alignment, source: Span, target: Span) -> bool {
    alignment
        .iter()
        .all(|(i, j)| !target.contains(j) || source.contains(i))
}

/// All consistent span pairs of one sentence pair.
///
/// For each source span the minimal target span covering its links is
/// checked for links escaping to other source words, then widened over
/// unaligned target words at both edges.
pub fn extract(source_len: usize, target_len: usize, alignment: &Alignment) -> BTreeSet<PhraseSpan> {
    let mut aligned_target = vec![false; target_len + 2];
    for (_, j) in alignment.iter() {
        if j <= target_len {
            aligned_target[j] = true;
        }
    }

    let mut spans = BTreeSet::new();
    for s1 in 1..=source_len {
        for s2 in s1..=source_len {
            let source = Span::new(s1, s2);
            let mut t_min = Position::MAX;
            let mut t_max = 0;
            for (i, j) in alignment.iter() {
                if source.contains(i) {
                    t_min = t_min.min(j);
                    t_max = t_max.max(j);
                }
            }
            if t_max == 0 || t_max > target_len {
                continue;
            }
            if !consistent(alignment, source, Span::new(t_min, t_max)) {
                continue;
            }

            let mut t1 = t_min;
            loop {
                let mut t2 = t_max;
                loop {
                    spans.insert(PhraseSpan {
                        source,
                        target: Span::new(t1, t2),
                    });
                    t2 += 1;
                    if t2 > target_len || aligned_target[t2] {
                        break;
                    }
                }
                t1 -= 1;
                if t1 < 1 || aligned_target[t1] {
                    break;
                }
            }
        }
    }
    spans
}

/// [`extract`] with the covered tokens attached.
pub fn phrase_extract<S: AsRef<str>>(
    source: &[S],
    target: &[S],
    alignment: &Alignment,
    opts: &ExtractOptions,
) -> BTreeSet<(Vec<String>, Vec<String>)> {
    let to_owned = |tokens: &[S]| tokens.iter().map(|t| t.as_ref().to_string()).collect::<Vec<_>>();
    extract(source.len(), target.len(), alignment)
        .into_iter()
        .filter(|span| opts.admits(span))
        .map(|span| {
            (
                to_owned(span.source.slice(source)),
                to_owned(span.target.slice(target)),
            )
        })
        .collect()
}

/// A set of phrases, each keyed by its space-joined text.
pub trait PhraseVocabulary {
    fn contains_phrase(&self, phrase: &str) -> bool;
}

impl PhraseVocabulary for HashSet<String> {
    fn contains_phrase(&self, phrase: &str) -> bool {
        self.contains(phrase)
    }
}

impl PhraseVocabulary for std::collections::HashSet<String> {
    fn contains_phrase(&self, phrase: &str) -> bool {
        self.contains(phrase)
    }
}

impl PhraseVocabulary for BTreeSet<String> {
    fn contains_phrase(&self, phrase: &str) -> bool {
        self.contains(phrase)
    }
}

/// Spans of `tokens` whose text is a known phrase.
pub fn available_phrases<S, V>(tokens: &[S], vocabulary: &V) -> BTreeSet<Span>
where
    S: AsRef<str>,
    V: PhraseVocabulary + ?Sized,
{
    let mut spans = BTreeSet::new();
    for start in 1..=tokens.len() {
        let mut text = String::new();
        for end in start..=tokens.len() {
            if end > start {
                text.push(' ');
            }
            text.push_str(tokens[end - 1].as_ref());
            if vocabulary.contains_phrase(&text) {
                spans.insert(Span::new(start, end));
            }
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alignment(links: &[(Position, Position)]) -> Alignment {
        links.iter().copied().collect()
    }

    fn spans(list: &[(Position, Position, Position, Position)]) -> BTreeSet<PhraseSpan> {
        list.iter()
            .map(|&(s1, s2, t1, t2)| PhraseSpan::new(s1, s2, t1, t2))
            .collect()
    }

    fn michael() -> (Vec<&'static str>, Vec<&'static str>, Alignment) {
        let source = "michael assumes that he will stay in the house".split_whitespace().collect();
        let target = "michael geht davon aus , dass er im haus bleibt".split_whitespace().collect();
        let a = alignment(&[
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
        (source, target, a)
    }

    #[test]
    fn extracts_small_grid() {
        // | |x|x| | |
        // |x| | |x| |
        // | | | | |x|
        let a = alignment(&[(2, 1), (1, 2), (1, 3), (2, 4), (3, 5)]);
        assert_eq!(
            extract(3, 5, &a),
            spans(&[(1, 1, 2, 3), (1, 3, 1, 5), (3, 3, 5, 5), (1, 2, 1, 4)])
        );
    }

    #[test]
    fn extracts_michael_fixture() {
        let (source, target, a) = michael();
        let expected = spans(&[
            (1, 1, 1, 1),
            (1, 2, 1, 4),
            (1, 2, 1, 5),
            (1, 3, 1, 6),
            (1, 4, 1, 7),
            (1, 9, 1, 10),
            (2, 2, 2, 4),
            (2, 2, 2, 5),
            (2, 3, 2, 6),
            (2, 4, 2, 7),
            (2, 9, 2, 10),
            (3, 3, 5, 6),
            (3, 3, 6, 6),
            (3, 4, 5, 7),
            (3, 4, 6, 7),
            (3, 9, 5, 10),
            (3, 9, 6, 10),
            (4, 4, 7, 7),
            (4, 9, 7, 10),
            (5, 6, 10, 10),
            (5, 9, 8, 10),
            (7, 8, 8, 8),
            (7, 9, 8, 9),
            (9, 9, 9, 9),
        ]);
        let got = extract(source.len(), target.len(), &a);
        assert_eq!(got, expected);

        // no link crosses any rectangle boundary
        for span in &got {
            for (i, j) in a.iter() {
                assert_eq!(span.source.contains(i), span.target.contains(j), "{span:?} vs ({i}, {j})");
            }
        }
    }

    #[test]
    fn phrase_extract_attaches_tokens() {
        let (source, target, a) = michael();
        let pairs = phrase_extract(&source, &target, &a, &ExtractOptions::default());
        assert_eq!(pairs.len(), 24);
        let has = |s: &str, t: &str| {
            pairs.contains(&(
                s.split_whitespace().map(String::from).collect(),
                t.split_whitespace().map(String::from).collect(),
            ))
        };
        assert!(has("assumes", "geht davon aus ,"));
        assert!(has("in the", "im"));
        assert!(has("will stay in the house", "im haus bleibt"));
        assert!(has("that", ", dass"));
        assert!(!has("will", "bleibt"));
    }

    #[test]
    fn max_length_bounds_both_sides() {
        let (source, target, a) = michael();
        let opts = ExtractOptions { max_length: Some(2) };
        let pairs = phrase_extract(&source, &target, &a, &opts);
        assert!(pairs.iter().all(|(s, t)| s.len() <= 2 && t.len() <= 2));
        assert_eq!(pairs.len(), 8);
    }

    #[test]
    fn unaligned_source_words_never_start_a_phrase() {
        let a = alignment(&[(1, 1), (3, 2)]);
        let got = extract(3, 2, &a);
        assert_eq!(got, spans(&[(1, 1, 1, 1), (1, 2, 1, 1), (1, 3, 1, 2), (2, 3, 2, 2), (3, 3, 2, 2)]));
    }

    #[test]
    fn available_phrases_match_vocabulary() {
        let tokens = ["I", "am", "a", "teacher"];
        let known: HashSet<String> = ["I am", "a teacher", "teacher", "I am a teacher"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let got = available_phrases(&tokens, &known);
        let expected: BTreeSet<Span> = [Span::new(4, 4), Span::new(1, 2), Span::new(3, 4), Span::new(1, 4)]
            .into_iter()
            .collect();
        assert_eq!(got, expected);
    }
}
