pub mod types;
pub mod errors;
pub mod text;
pub mod table;
pub mod alignment;
pub mod viterbi;
pub mod symmetrize;
pub mod phrase;
pub mod phrase_table;
pub mod future_cost;
pub mod hypothesis;
pub mod stack;
pub mod decoder;

pub use alignment::{suggested_iterations, train, train_model1, train_model2, AlignmentModel, TrainOptions};
pub use decoder::{reordering_penalty, DecoderConfig, Decoding, LanguageModel, StackDecoder};
pub use errors::{Result, SmtError};
pub use future_cost::{fill_diagonal, FutureCostTable, SpanScores};
pub use phrase::{available_phrases, extract, phrase_extract, ExtractOptions, PhraseSpan, PhraseVocabulary};
pub use phrase_table::{Candidate, DirectedPhraseTable, PhraseLookup, PhraseProbs, PhraseTable, PhraseTableBuilder};
pub use symmetrize::{grow_diag_final, symmetrize, Alignment, Symmetrizer};
pub use text::{parse_moses_line, parse_phrase_table, parse_plaintext, write_moses, write_phrase_table, Corpus, Sentence, SentencePair, Vocabulary};
pub use types::{Direction, Span};
pub use viterbi::viterbi_alignment;
