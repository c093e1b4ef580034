//! Training loop and the `train` / `retrain` / `annotate` entry points.

use anyhow::bail;
use ner_transfer_core::{AnnotatedSentence, Scores, Sentence, convert, score};
use oorandom::Rand32;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::TrainConfig;
use crate::data::{LabelSet, to_examples, tokenize};
use crate::embeddings::Embeddings;
use crate::model::{Gradient, NerModel};

/// Progress of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Mistagged training tokens seen during the epoch.
    pub loss: usize,
    /// Scores on the development set, if one was given.
    pub dev: Option<Scores>,
}

/// Runs perceptron epochs over a model with a seeded generator.
pub struct Trainer {
    config: TrainConfig,
    rng: Rand32,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Self {
        let rng = Rand32::new(config.seed);
        Self { config, rng }
    }

    fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.rng.rand_range(0..(i as u32 + 1)) as usize;
            items.swap(i, j);
        }
    }

    /// Drop features at the configured rate. The bias feature always stays.
    fn thin(&mut self, features: Vec<Vec<String>>) -> Vec<Vec<String>> {
        if self.config.dropout <= 0.0 {
            return features;
        }
        features
            .into_iter()
            .map(|token_features| {
                token_features
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| *i == 0 || self.rng.rand_float() >= self.config.dropout)
                    .map(|(_, f)| f)
                    .collect()
            })
            .collect()
    }

    /// Train `model` in place, adding any labels of `train_data` it lacks.
    ///
    /// After every epoch the dev set (if non-empty) is annotated and scored.
    pub fn fit(
        &mut self,
        model: &mut NerModel,
        train_data: &[AnnotatedSentence],
        dev_data: &[AnnotatedSentence],
    ) -> anyhow::Result<Vec<EpochStats>> {
        if train_data.is_empty() {
            bail!("no training sentences");
        }

        model.add_labels(&LabelSet::from_annotated(train_data));
        let mut examples = to_examples(train_data, model.labels());
        examples.retain(|e| !e.is_empty());
        debug!(
            examples = examples.len(),
            labels = model.labels().len(),
            "prepared training data"
        );

        let constraints = model.constraints();
        let lr = self.config.learning_rate;
        let mut history = Vec::with_capacity(self.config.epochs);

        for epoch in 0..self.config.epochs {
            self.shuffle(&mut examples);

            let mut loss = 0usize;
            let mut sizes = self.config.batch.sizes();
            let mut start = 0;
            while start < examples.len() {
                let size = sizes.next().unwrap_or(1);
                let end = (start + size).min(examples.len());

                let mut grad = Gradient::default();
                for example in &examples[start..end] {
                    let features = self.thin(NerModel::features(&example.tokens));
                    loss += model.accumulate(example, &features, &constraints, &mut grad, lr);
                }
                model.apply(grad);
                start = end;
            }

            let dev = if dev_data.is_empty() {
                None
            } else {
                Some(score(&annotate(dev_data, model), dev_data))
            };

            info!(epoch = epoch + 1, epochs = self.config.epochs, loss, "finished epoch");
            if let Some(dev) = dev {
                info!(
                    precision = dev.precision,
                    recall = dev.recall,
                    f1 = dev.f1,
                    "dev scores"
                );
            }

            history.push(EpochStats {
                epoch: epoch + 1,
                loss,
                dev,
            });
        }

        debug!(features = model.num_features(), "training finished");
        Ok(history)
    }
}

/// Train a fresh model on `train_data`.
pub fn train(
    train_data: &[AnnotatedSentence],
    dev_data: &[AnnotatedSentence],
    config: &TrainConfig,
) -> anyhow::Result<NerModel> {
    let mut model = NerModel::new(LabelSet::from_annotated(train_data));
    Trainer::new(config.clone()).fit(&mut model, train_data, dev_data)?;
    Ok(model)
}

/// Untrained model carrying pretrained vectors, with the labels of `train_data`.
pub fn init_model(train_data: &[AnnotatedSentence], embeddings: Embeddings) -> NerModel {
    let coverage = embeddings.coverage(train_data.iter().flat_map(|s| s.text.split(' ')));
    info!(
        words = embeddings.len(),
        dim = embeddings.dim(),
        coverage,
        "initialised model with pretrained vectors"
    );
    NerModel::new(LabelSet::from_annotated(train_data)).with_embeddings(embeddings)
}

/// Fine-tune a copy of `model`. The given model is left untouched.
pub fn retrain(
    train_data: &[AnnotatedSentence],
    dev_data: &[AnnotatedSentence],
    config: &TrainConfig,
    model: &NerModel,
) -> anyhow::Result<NerModel> {
    let mut model = model.clone();
    Trainer::new(config.clone()).fit(&mut model, train_data, dev_data)?;
    Ok(model)
}

/// Tag every sentence text with `model`. Output text equals input text.
pub fn annotate(data: &[AnnotatedSentence], model: &NerModel) -> Vec<AnnotatedSentence> {
    let decoder = model.decoder();
    data.iter()
        .map(|sentence| {
            let tokens = tokenize(&sentence.text);
            let tags = decoder.predict_tags(&tokens);
            convert(&Sentence::new(tokens.into_iter().zip(tags).collect()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchSchedule;
    use ner_transfer_core::EntitySpan;

    fn config() -> TrainConfig {
        TrainConfig::new()
            .with_epochs(3)
            .with_dropout(0.0)
            .with_batch(BatchSchedule::Fixed(1))
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let mut a = Trainer::new(config().with_seed(1));
        let mut b = Trainer::new(config().with_seed(1));
        let mut xs: Vec<u32> = (0..20).collect();
        let mut ys = xs.clone();
        a.shuffle(&mut xs);
        b.shuffle(&mut ys);
        assert_eq!(xs, ys);

        let mut sorted = xs.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_thin_keeps_bias() {
        let mut trainer = Trainer::new(config().with_dropout(1.0));
        let thinned = trainer.thin(vec![vec!["bias".into(), "w=a".into(), "w=b".into()]]);
        assert_eq!(thinned, vec![vec!["bias".to_string()]]);
    }

    #[test]
    fn test_fit_requires_data() {
        let mut model = NerModel::new(LabelSet::new());
        let err = Trainer::new(config()).fit(&mut model, &[], &[]).unwrap_err();
        assert!(err.to_string().contains("no training sentences"));
    }

    #[test]
    fn test_fit_reports_each_epoch() {
        let data = vec![AnnotatedSentence::new(
            "Anders bor",
            vec![EntitySpan::new(0, 6, "PER")],
        )];
        let mut model = NerModel::new(LabelSet::new());
        let history = Trainer::new(config()).fit(&mut model, &data, &data).unwrap();

        assert_eq!(history.len(), 3);
        assert_eq!(history[0].epoch, 1);
        assert!(history[0].loss > 0);
        assert_eq!(history[2].loss, 0);
        assert_eq!(history[2].dev.map(|s| s.f1), Some(100.0));
        assert_eq!(model.labels().tags(), &["O", "B-PER", "I-PER"]);
        assert!(model.num_features() > 0);
    }

    #[test]
    fn test_annotate_keeps_text() {
        let model = NerModel::new(LabelSet::new());
        let data = vec![
            AnnotatedSentence::unannotated("Anders bor i Århus"),
            AnnotatedSentence::unannotated(""),
        ];
        let out = annotate(&data, &model);
        assert_eq!(out[0].text, "Anders bor i Århus");
        assert!(out[0].entities.is_empty());
        assert_eq!(out[1], AnnotatedSentence::default());
    }
}
