//! # ner-transfer Trainer
//!
//! Sequence tagger training on span-annotated data, transfer from pretrained
//! word vectors, and annotation of new text. Exposes the boundary used by the
//! evaluation pipeline: [`train`], [`init_model`] + [`retrain`], [`annotate`].

pub mod config;
pub mod data;
pub mod embeddings;
pub mod experiment;
pub mod features;
pub mod model;
pub mod trainer;

pub use config::{BatchSchedule, TrainConfig};
pub use data::{LabelSet, TrainingExample};
pub use embeddings::Embeddings;
pub use experiment::{Experiment, ExperimentModels, ExperimentReport, compare, load_split};
pub use model::{Decoder, NerModel};
pub use trainer::{EpochStats, Trainer, annotate, init_model, retrain, train};
