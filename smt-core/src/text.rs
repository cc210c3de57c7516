use hashbrown::HashMap;

use crate::errors::{Result, SmtError};
use crate::phrase_table::{PhraseProbs, PhraseTable};
use crate::symmetrize::Alignment;
use crate::types::*;

/// Interning map between words and token ids; id 0 is the NULL word.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    ids: HashMap<String, Token>,
    words: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Vocabulary {
            ids: HashMap::new(),
            words: vec![String::from("NULL")],
        }
    }
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, word: &str) -> Token {
        if let Some(&id) = self.ids.get(word) {
            return id;
        }
        let id = self.words.len() as Token;
        self.ids.insert(word.to_string(), id);
        self.words.push(word.to_string());
        id
    }

    #[inline]
    pub fn get(&self, word: &str) -> Option<Token> {
        self.ids.get(word).copied()
    }

    #[inline]
    pub fn word(&self, id: Token) -> Option<&str> {
        self.words.get(id as usize).map(|s| s.as_str())
    }

    /// Number of real words (NULL excluded).
    #[inline]
    pub fn len(&self) -> usize {
        self.words.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map words to ids; words never seen become [`NULL_TOKEN`].
    pub fn encode<S: AsRef<str>>(&self, words: &[S]) -> Vec<Token> {
        words
            .iter()
            .map(|w| self.get(w.as_ref()).unwrap_or(NULL_TOKEN))
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sentence {
    pub tokens: Vec<Token>,
}

impl Sentence {
    #[inline]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SentencePair {
    pub source: Sentence,
    pub target: Sentence,
}

/// Tokenized parallel corpus. The trainer estimates p(target | source).
#[derive(Clone, Debug, Default)]
pub struct Corpus {
    pub source_vocab: Vocabulary,
    pub target_vocab: Vocabulary,
    pub pairs: Vec<SentencePair>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<S: AsRef<str>>(&mut self, source: &[S], target: &[S]) {
        let source = Sentence {
            tokens: source.iter().map(|w| self.source_vocab.intern(w.as_ref())).collect(),
        };
        let target = Sentence {
            tokens: target.iter().map(|w| self.target_vocab.intern(w.as_ref())).collect(),
        };
        self.pairs.push(SentencePair { source, target });
    }

    /// Build from whitespace-separated `(source, target)` strings.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[(S, S)]) -> Self {
        let mut corpus = Corpus::new();
        for (source, target) in pairs {
            let source: Vec<&str> = source.as_ref().split_whitespace().collect();
            let target: Vec<&str> = target.as_ref().split_whitespace().collect();
            corpus.push(&source, &target);
        }
        corpus
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Same corpus with the language roles exchanged.
    pub fn swapped(&self) -> Corpus {
        Corpus {
            source_vocab: self.target_vocab.clone(),
            target_vocab: self.source_vocab.clone(),
            pairs: self
                .pairs
                .iter()
                .map(|p| SentencePair {
                    source: p.target.clone(),
                    target: p.source.clone(),
                })
                .collect(),
        }
    }

    pub fn source_words(&self, index: usize) -> Vec<&str> {
        self.pairs[index]
            .source
            .tokens
            .iter()
            .map(|&t| self.source_vocab.word(t).unwrap_or_default())
            .collect()
    }

    pub fn target_words(&self, index: usize) -> Vec<&str> {
        self.pairs[index]
            .target
            .tokens
            .iter()
            .map(|&t| self.target_vocab.word(t).unwrap_or_default())
            .collect()
    }
}

/// Read two line-aligned plain-text files into a corpus.
pub fn parse_plaintext(source: &str, target: &str) -> Result<Corpus> {
    let source_lines: Vec<&str> = source.lines().collect();
    let target_lines: Vec<&str> = target.lines().collect();
    if source_lines.len() != target_lines.len() {
        return Err(SmtError::MismatchedLength {
            what: "sentence counts",
            left: source_lines.len(),
            right: target_lines.len(),
        });
    }
    let mut corpus = Corpus::new();
    for (s, t) in source_lines.iter().zip(target_lines.iter()) {
        let s: Vec<&str> = s.split_whitespace().collect();
        let t: Vec<&str> = t.split_whitespace().collect();
        corpus.push(&s, &t);
    }
    Ok(corpus)
}

/// Parse one line of Moses `i-j` links (0-based) into a 1-based alignment.
pub fn parse_moses_line(line: &str) -> Result<Alignment> {
    let mut alignment = Alignment::new();
    for item in line.split_whitespace() {
        let (i, j) = item
            .split_once('-')
            .ok_or_else(|| SmtError::invalid_format("alignment", format!("bad link '{item}'")))?;
        let i: Position = i
            .parse()
            .map_err(|_| SmtError::invalid_format("alignment", format!("bad source index '{i}'")))?;
        let j: Position = j
            .parse()
            .map_err(|_| SmtError::invalid_format("alignment", format!("bad target index '{j}'")))?;
        alignment.insert(i + 1, j + 1);
    }
    Ok(alignment)
}

/// Moses alignment writer, one sentence per line, 0-based `i-j` links.
/// Links must be 1-based.
pub fn write_moses(alignments: &[Alignment]) -> Result<String> {
    let mut out = String::new();
    for (n, alignment) in alignments.iter().enumerate() {
        let mut first = true;
        for (i, j) in alignment.iter() {
            if i == 0 || j == 0 {
                return Err(SmtError::invalid_argument(
                    "alignment",
                    format!("sentence {}: link ({i}, {j}) is not 1-based", n + 1),
                ));
            }
            if !first {
                out.push(' ');
            }
            out.push_str(&format!("{}-{}", i - 1, j - 1));
            first = false;
        }
        out.push('\n');
    }
    Ok(out)
}

/// Phrase table as `source ||| target ||| forward backward` lines, sorted.
pub fn write_phrase_table(table: &PhraseTable) -> String {
    let mut out = String::new();
    for (source, target, probs) in table.sorted_entries() {
        out.push_str(&format!(
            "{} ||| {} ||| {} {}\n",
            source, target, probs.forward, probs.backward
        ));
    }
    out
}

/// Read lines written by [`write_phrase_table`]. Blank lines are skipped.
pub fn parse_phrase_table(text: &str) -> Result<PhraseTable> {
    let mut table = PhraseTable::new();
    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split("|||").map(str::trim).collect();
        let [source, target, probs] = fields[..] else {
            return Err(SmtError::invalid_format(
                "phrase table",
                format!("line {}: expected 3 fields, found {}", n + 1, fields.len()),
            ));
        };
        let probs: Vec<Prob> = probs
            .split_whitespace()
            .map(|p| p.parse::<Prob>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| SmtError::invalid_format("phrase table", format!("line {}: {e}", n + 1)))?;
        let [forward, backward] = probs[..] else {
            return Err(SmtError::invalid_format(
                "phrase table",
                format!("line {}: expected 2 probabilities", n + 1),
            ));
        };
        table.insert(source, target, PhraseProbs { forward, backward });
    }
    Ok(table)
}
