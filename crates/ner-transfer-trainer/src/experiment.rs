//! Baseline versus transfer comparison on train/dev/test corpora.

use std::path::{Path, PathBuf};

use anyhow::Context;
use ner_transfer_core::{AnnotatedSentence, Scores, convert_corpus, read_corpus_file, score};
use serde::Serialize;
use tracing::info;

use crate::config::TrainConfig;
use crate::embeddings::Embeddings;
use crate::model::NerModel;
use crate::trainer::{annotate, init_model, retrain, train};

/// Test-set scores of both systems.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentReport {
    pub baseline: Scores,
    /// Present when pretrained vectors were supplied.
    pub transfer: Option<Scores>,
}

/// Models produced by [`compare`], kept for saving or inspection.
#[derive(Debug, Clone)]
pub struct ExperimentModels {
    pub baseline: NerModel,
    pub transfer: Option<NerModel>,
}

/// Corpus splits plus both training configurations.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub train: PathBuf,
    pub dev: PathBuf,
    pub test: PathBuf,
    pub vectors: Option<PathBuf>,
    pub baseline: TrainConfig,
    pub transfer: TrainConfig,
}

impl Experiment {
    pub fn new(train: PathBuf, dev: PathBuf, test: PathBuf) -> Self {
        Self {
            train,
            dev,
            test,
            vectors: None,
            baseline: TrainConfig::default(),
            transfer: TrainConfig::transfer(),
        }
    }

    pub fn with_vectors(mut self, vectors: PathBuf) -> Self {
        self.vectors = Some(vectors);
        self
    }

    pub fn with_configs(mut self, baseline: TrainConfig, transfer: TrainConfig) -> Self {
        self.baseline = baseline;
        self.transfer = transfer;
        self
    }

    /// Load every input and run [`compare`].
    pub fn run(&self) -> anyhow::Result<(ExperimentReport, ExperimentModels)> {
        let train_data = load_split(&self.train)?;
        let dev_data = load_split(&self.dev)?;
        let test_data = load_split(&self.test)?;
        let embeddings = self
            .vectors
            .as_ref()
            .map(Embeddings::from_file)
            .transpose()?;

        compare(
            &train_data,
            &dev_data,
            &test_data,
            embeddings,
            &self.baseline,
            &self.transfer,
        )
    }
}

/// Read a CoNLL file and convert it to span annotations.
pub fn load_split(path: &Path) -> anyhow::Result<Vec<AnnotatedSentence>> {
    let corpus = read_corpus_file(path)
        .with_context(|| format!("failed to read corpus {}", path.display()))?;
    Ok(convert_corpus(&corpus))
}

/// Train the baseline and, given vectors, the transfer model; score both on `test_data`.
pub fn compare(
    train_data: &[AnnotatedSentence],
    dev_data: &[AnnotatedSentence],
    test_data: &[AnnotatedSentence],
    embeddings: Option<Embeddings>,
    baseline_config: &TrainConfig,
    transfer_config: &TrainConfig,
) -> anyhow::Result<(ExperimentReport, ExperimentModels)> {
    info!(sentences = train_data.len(), "training baseline model");
    let baseline = train(train_data, dev_data, baseline_config)?;
    let baseline_scores = score(&annotate(test_data, &baseline), test_data);
    info!(f1 = baseline_scores.f1, "baseline test scores");

    let (transfer, transfer_scores) = match embeddings {
        Some(embeddings) => {
            info!("training transfer model with pretrained vectors");
            let initial = init_model(train_data, embeddings);
            let model = retrain(train_data, dev_data, transfer_config, &initial)?;
            let scores = score(&annotate(test_data, &model), test_data);
            info!(f1 = scores.f1, "transfer test scores");
            (Some(model), Some(scores))
        }
        None => (None, None),
    };

    Ok((
        ExperimentReport {
            baseline: baseline_scores,
            transfer: transfer_scores,
        },
        ExperimentModels {
            baseline,
            transfer,
        },
    ))
}
