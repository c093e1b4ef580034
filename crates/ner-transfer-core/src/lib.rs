//! # ner-transfer Core
//!
//! Data representation and evaluation for span-based named entity
//! recognition: CoNLL corpus reading, IOB tag to character span conversion
//! and set-based precision/recall/F1 scoring.
//!
//! ## Quick Start
//!
//! ```rust
//! use ner_transfer_core::{convert_corpus, parse_lines, score};
//!
//! let gold = convert_corpus(&parse_lines(["Anders\tB-PER", "Hansen\tI-PER", "bor\tO"]).unwrap());
//! assert_eq!(gold[0].text, "Anders Hansen bor");
//!
//! let scores = score(&gold, &gold);
//! assert_eq!(scores.f1, 100.0);
//! ```
pub mod corpus;
pub mod error;
pub mod scorer;
pub mod span;
pub mod tags;

// Re-export primary API
pub use corpus::{Corpus, Sentence, parse_lines, read_corpus, read_corpus_file};
pub use error::{NerError, Result};
pub use scorer::{Evaluation, LengthPolicy, Scorer, Scores, score};
pub use span::{
    AnnotatedSentence, EntitySpan, TOKEN_SEPARATOR, convert, convert_corpus, par_convert_corpus,
    to_token_tags,
};
pub use tags::{IobPrefix, IobTag, TagIssue, validate_tags};
