//! # ner-transfer
//!
//! Umbrella crate over [`ner_transfer_core`] (corpus reading, span conversion,
//! scoring) and [`ner_transfer_trainer`] (training, transfer, annotation).
//!
//! ```rust
//! use ner_transfer::{convert_corpus, parse_lines, score};
//!
//! let gold = convert_corpus(&parse_lines(["Mette\tB-PER", "bor\tO"]).unwrap());
//! assert_eq!(score(&gold, &gold).f1, 100.0);
//! ```

pub use ner_transfer_core::*;
pub use ner_transfer_trainer as trainer;
pub use ner_transfer_trainer::{
    BatchSchedule, Embeddings, NerModel, TrainConfig, annotate, init_model, retrain, train,
};
