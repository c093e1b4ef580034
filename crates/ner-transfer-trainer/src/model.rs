//! Structured perceptron sequence tagger.
//!
//! Emission scores combine sparse lexical feature weights with an optional
//! dense projection of pretrained word vectors. Decoding is Viterbi over IOB
//! tags with the IOB2 constraint that `I-X` only follows `B-X` or `I-X`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, bail};
use ner_transfer_core::IobTag;
use serde::{Deserialize, Serialize};

use crate::data::{LabelSet, OUTSIDE, TrainingExample};
use crate::embeddings::Embeddings;
use crate::features::token_features;

/// Allowed tag transitions for decoding.
#[derive(Debug, Clone)]
pub struct Constraints {
    /// `start[j]`: tag `j` may open a sentence.
    pub start: Vec<bool>,
    /// `transitions[i][j]`: tag `j` may follow tag `i`.
    pub transitions: Vec<Vec<bool>>,
}

impl Constraints {
    /// IOB2 constraints for a tag inventory.
    pub fn iob(labels: &LabelSet) -> Self {
        let parsed: Vec<IobTag> = labels.tags().iter().map(|t| IobTag::parse(t)).collect();
        let start = parsed
            .iter()
            .map(|to| IobTag::is_valid_transition(None, to))
            .collect();
        let transitions = parsed
            .iter()
            .map(|from| {
                parsed
                    .iter()
                    .map(|to| IobTag::is_valid_transition(Some(from), to))
                    .collect()
            })
            .collect();
        Self { start, transitions }
    }
}

/// Most likely tag sequence.
///
/// `emissions` is `[seq_len][num_labels]`, `transitions` is `[prev][curr]`,
/// `start` holds the score of each tag opening the sequence.
pub fn viterbi_decode(
    emissions: &[Vec<f32>],
    transitions: &[Vec<f32>],
    start: &[f32],
    constraints: &Constraints,
) -> Vec<usize> {
    let seq_len = emissions.len();
    let num_labels = start.len();
    if seq_len == 0 || num_labels == 0 {
        return Vec::new();
    }

    let mut viterbi = vec![vec![f32::NEG_INFINITY; num_labels]; seq_len];
    let mut backpointers = vec![vec![0usize; num_labels]; seq_len];

    for j in 0..num_labels {
        if constraints.start[j] {
            viterbi[0][j] = start[j] + emissions[0][j];
        }
    }

    for t in 1..seq_len {
        for j in 0..num_labels {
            let mut best_score = f32::NEG_INFINITY;
            let mut best_prev = 0;

            for i in 0..num_labels {
                if !constraints.transitions[i][j] || viterbi[t - 1][i] == f32::NEG_INFINITY {
                    continue;
                }
                let score = viterbi[t - 1][i] + transitions[i][j];
                if score > best_score {
                    best_score = score;
                    best_prev = i;
                }
            }

            if best_score > f32::NEG_INFINITY {
                viterbi[t][j] = best_score + emissions[t][j];
                backpointers[t][j] = best_prev;
            }
        }
    }

    // Backtrack
    let mut path = vec![0usize; seq_len];
    let mut best_final = f32::NEG_INFINITY;
    for (j, &score) in viterbi[seq_len - 1].iter().enumerate() {
        if score > best_final {
            best_final = score;
            path[seq_len - 1] = j;
        }
    }
    for t in (1..seq_len).rev() {
        path[t - 1] = backpointers[t][path[t]];
    }

    path
}

/// Weight updates accumulated over a minibatch.
#[derive(Debug, Default)]
pub(crate) struct Gradient {
    sparse: HashMap<(String, usize), f32>,
    transitions: HashMap<(usize, usize), f32>,
    start: HashMap<usize, f32>,
    dense: HashMap<usize, Vec<f32>>,
}

impl Gradient {
    fn add_dense(&mut self, label: usize, v: &[f32], scale: f32) {
        let row = self
            .dense
            .entry(label)
            .or_insert_with(|| vec![0.0; v.len()]);
        row.iter_mut().zip(v).for_each(|(r, x)| *r += scale * x);
    }

    fn add_transition(&mut self, prev: Option<usize>, curr: usize, delta: f32) {
        match prev {
            Some(p) => *self.transitions.entry((p, curr)).or_default() += delta,
            None => *self.start.entry(curr).or_default() += delta,
        }
    }
}

/// A model bound to its decoding constraints.
///
/// The constraints depend only on the tag inventory, so one decoder serves a
/// whole pass over a corpus.
pub struct Decoder<'a> {
    model: &'a NerModel,
    constraints: Constraints,
}

impl Decoder<'_> {
    /// Predict tag indices for a token sequence.
    pub fn predict(&self, tokens: &[String]) -> Vec<usize> {
        let features = NerModel::features(tokens);
        let vectors = self.model.token_vectors(tokens);
        self.model
            .decode(&self.model.emissions(&features, &vectors), &self.constraints)
    }

    /// Predict tag strings for a token sequence.
    pub fn predict_tags(&self, tokens: &[String]) -> Vec<String> {
        let labels = self.model.labels();
        self.predict(tokens)
            .into_iter()
            .map(|idx| labels.tag(idx).unwrap_or(OUTSIDE).to_string())
            .collect()
    }
}

/// Sequence tagging model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NerModel {
    labels: LabelSet,
    weights: HashMap<String, Vec<f32>>,
    transitions: Vec<Vec<f32>>,
    start: Vec<f32>,
    embeddings: Option<Embeddings>,
    dense: Vec<Vec<f32>>,
}

impl NerModel {
    /// Untrained model over the given tags.
    pub fn new(labels: LabelSet) -> Self {
        let n = labels.len();
        Self {
            labels,
            weights: HashMap::new(),
            transitions: vec![vec![0.0; n]; n],
            start: vec![0.0; n],
            embeddings: None,
            dense: Vec::new(),
        }
    }

    /// Attach pretrained vectors; their projection weights start at zero.
    pub fn with_embeddings(mut self, embeddings: Embeddings) -> Self {
        self.dense = vec![vec![0.0; embeddings.dim()]; self.labels.len()];
        self.embeddings = Some(embeddings);
        self
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn embeddings(&self) -> Option<&Embeddings> {
        self.embeddings.as_ref()
    }

    /// Number of distinct sparse features with weights.
    pub fn num_features(&self) -> usize {
        self.weights.len()
    }

    /// Add a tag, growing every weight table. Returns the tag's index.
    pub fn add_label(&mut self, tag: &str) -> usize {
        let before = self.labels.len();
        let idx = self.labels.add(tag);
        if self.labels.len() > before {
            self.weights.values_mut().for_each(|w| w.push(0.0));
            self.transitions.iter_mut().for_each(|row| row.push(0.0));
            self.transitions.push(vec![0.0; self.labels.len()]);
            self.start.push(0.0);
            if let Some(emb) = &self.embeddings {
                self.dense.push(vec![0.0; emb.dim()]);
            }
        }
        idx
    }

    /// Add every tag of `labels` not yet known.
    pub fn add_labels(&mut self, labels: &LabelSet) {
        for tag in labels.tags() {
            self.add_label(tag);
        }
    }

    pub(crate) fn features(tokens: &[String]) -> Vec<Vec<String>> {
        (0..tokens.len()).map(|i| token_features(tokens, i)).collect()
    }

    fn token_vectors<'a>(&'a self, tokens: &[String]) -> Vec<Option<&'a [f32]>> {
        tokens
            .iter()
            .map(|t| self.embeddings.as_ref().and_then(|e| e.get(t)))
            .collect()
    }

    fn emissions(&self, features: &[Vec<String>], vectors: &[Option<&[f32]>]) -> Vec<Vec<f32>> {
        let n = self.labels.len();
        features
            .iter()
            .zip(vectors)
            .map(|(feats, vector)| {
                let mut scores = vec![0.0f32; n];
                for f in feats {
                    if let Some(w) = self.weights.get(f) {
                        scores.iter_mut().zip(w).for_each(|(s, w)| *s += w);
                    }
                }
                if let Some(v) = vector {
                    for (s, row) in scores.iter_mut().zip(&self.dense) {
                        *s += row.iter().zip(*v).map(|(a, b)| a * b).sum::<f32>();
                    }
                }
                scores
            })
            .collect()
    }

    fn decode(&self, emissions: &[Vec<f32>], constraints: &Constraints) -> Vec<usize> {
        viterbi_decode(emissions, &self.transitions, &self.start, constraints)
    }

    /// IOB2 decoding constraints for the current tag inventory.
    pub fn constraints(&self) -> Constraints {
        Constraints::iob(&self.labels)
    }

    /// Decoder for tagging many sentences with one set of constraints.
    pub fn decoder(&self) -> Decoder<'_> {
        Decoder {
            model: self,
            constraints: self.constraints(),
        }
    }

    /// Predict tag indices for a token sequence.
    pub fn predict(&self, tokens: &[String]) -> Vec<usize> {
        self.decoder().predict(tokens)
    }

    /// Predict tag strings for a token sequence.
    pub fn predict_tags(&self, tokens: &[String]) -> Vec<String> {
        self.decoder().predict_tags(tokens)
    }

    /// Accumulate the perceptron update for one example into `grad`.
    ///
    /// `features` may be a thinned copy of the example's features. Returns
    /// the number of mistagged tokens.
    pub(crate) fn accumulate(
        &self,
        example: &TrainingExample,
        features: &[Vec<String>],
        constraints: &Constraints,
        grad: &mut Gradient,
        lr: f32,
    ) -> usize {
        let vectors = self.token_vectors(&example.tokens);
        let pred = self.decode(&self.emissions(features, &vectors), constraints);
        let gold = &example.labels;
        if pred == *gold {
            return 0;
        }

        let mut errors = 0;
        for i in 0..gold.len().min(pred.len()) {
            let (g, p) = (gold[i], pred[i]);
            if g != p {
                errors += 1;
                for f in &features[i] {
                    *grad.sparse.entry((f.clone(), g)).or_default() += lr;
                    *grad.sparse.entry((f.clone(), p)).or_default() -= lr;
                }
                if let Some(v) = vectors[i] {
                    grad.add_dense(g, v, lr);
                    grad.add_dense(p, v, -lr);
                }
            }

            let gold_prev = i.checked_sub(1).map(|j| gold[j]);
            let pred_prev = i.checked_sub(1).map(|j| pred[j]);
            if (gold_prev, g) != (pred_prev, p) {
                grad.add_transition(gold_prev, g, lr);
                grad.add_transition(pred_prev, p, -lr);
            }
        }

        errors
    }

    /// Apply accumulated updates.
    pub(crate) fn apply(&mut self, grad: Gradient) {
        let n = self.labels.len();
        for ((feature, label), delta) in grad.sparse {
            if delta != 0.0 {
                self.weights.entry(feature).or_insert_with(|| vec![0.0; n])[label] += delta;
            }
        }
        for ((prev, curr), delta) in grad.transitions {
            self.transitions[prev][curr] += delta;
        }
        for (label, delta) in grad.start {
            self.start[label] += delta;
        }
        for (label, delta) in grad.dense {
            if let Some(row) = self.dense.get_mut(label) {
                row.iter_mut().zip(delta).for_each(|(w, d)| *w += d);
            }
        }
    }

    /// Check that every table matches the tag inventory.
    fn validate(&self) -> anyhow::Result<()> {
        let n = self.labels.len();
        if self.start.len() != n
            || self.transitions.len() != n
            || self.transitions.iter().any(|row| row.len() != n)
        {
            bail!("transition table does not match {n} labels");
        }
        if let Some((feature, _)) = self.weights.iter().find(|(_, w)| w.len() != n) {
            bail!("weights for feature {feature:?} do not match {n} labels");
        }
        match &self.embeddings {
            Some(emb) if self.dense.len() != n || self.dense.iter().any(|r| r.len() != emb.dim()) => {
                bail!("embedding projection does not match {n} labels x {} dims", emb.dim())
            }
            None if !self.dense.is_empty() => bail!("embedding projection without embeddings"),
            _ => Ok(()),
        }
    }

    /// Write the model as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("failed to create model file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)
            .with_context(|| format!("failed to write model {}", path.display()))?;
        writer
            .flush()
            .with_context(|| format!("failed to write model {}", path.display()))
    }

    /// Read a model written by [`NerModel::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open model file {}", path.display()))?;
        let model: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse model {}", path.display()))?;
        model.validate()?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconstrained(num_labels: usize) -> Constraints {
        Constraints {
            start: vec![true; num_labels],
            transitions: vec![vec![true; num_labels]; num_labels],
        }
    }

    fn labels() -> LabelSet {
        let mut labels = LabelSet::new();
        labels.add_entity_label("PER");
        labels
    }

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_viterbi() {
        let emissions = vec![vec![0.1, 0.8, 0.1], vec![0.8, 0.1, 0.1]];
        let transitions = vec![vec![0.0; 3]; 3];
        let path = viterbi_decode(
            &emissions,
            &transitions,
            &[0.0; 3],
            &unconstrained(3),
        );
        assert_eq!(path, vec![1, 0]);
    }

    #[test]
    fn test_viterbi_uses_transitions() {
        // Emissions prefer 0 at both positions, but 0 -> 0 is heavily penalised.
        let emissions = vec![vec![0.6, 0.4], vec![0.6, 0.5]];
        let transitions = vec![vec![-5.0, 0.0], vec![0.0, 0.0]];
        let path = viterbi_decode(
            &emissions,
            &transitions,
            &[0.0; 2],
            &unconstrained(2),
        );
        assert_eq!(path, vec![0, 1]);
    }

    #[test]
    fn test_viterbi_respects_iob_constraints() {
        let labels = labels();
        // I-PER scores best everywhere but cannot start a sentence or follow O.
        let emissions = vec![vec![0.0, 0.5, 1.0], vec![0.0, 0.0, 1.0]];
        let transitions = vec![vec![0.0; 3]; 3];
        let path = viterbi_decode(&emissions, &transitions, &[0.0; 3], &Constraints::iob(&labels));
        assert_eq!(path, vec![1, 2]);
    }

    #[test]
    fn test_viterbi_empty() {
        let path = viterbi_decode(&[], &[], &[], &unconstrained(0));
        assert!(path.is_empty());
    }

    #[test]
    fn test_untrained_model_predicts_outside() {
        let model = NerModel::new(labels());
        assert_eq!(model.predict_tags(&tokens(&["Anders", "bor"])), vec!["O", "O"]);
    }

    #[test]
    fn test_perceptron_update_fixes_mistake() {
        let mut model = NerModel::new(labels());
        let example = TrainingExample::new(tokens(&["Anders", "Hansen"]), vec![1, 2]);
        let features = NerModel::features(&example.tokens);

        let mut grad = Gradient::default();
        let constraints = model.constraints();
        let errors = model.accumulate(&example, &features, &constraints, &mut grad, 1.0);
        assert_eq!(errors, 2);
        model.apply(grad);

        assert_eq!(model.predict(&example.tokens), vec![1, 2]);
        let mut grad = Gradient::default();
        assert_eq!(
            model.accumulate(&example, &features, &constraints, &mut grad, 1.0),
            0
        );
    }

    #[test]
    fn test_add_label_grows_tables() {
        let mut model = NerModel::new(labels());
        let example = TrainingExample::new(tokens(&["Anders"]), vec![1]);
        let mut grad = Gradient::default();
        model.accumulate(
                &example,
                &NerModel::features(&example.tokens),
                &model.constraints(),
                &mut grad,
                1.0,
            );
        model.apply(grad);

        let idx = model.add_label("B-LOC");
        assert_eq!(idx, 3);
        assert_eq!(model.add_label("B-LOC"), 3);
        assert_eq!(model.start.len(), 4);
        assert!(model.transitions.iter().all(|row| row.len() == 4));
        assert!(model.weights.values().all(|w| w.len() == 4));
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_decoder_tracks_label_inventory() {
        let mut model = NerModel::new(labels());
        let example = TrainingExample::new(tokens(&["Anders", "Hansen"]), vec![1, 2]);
        let mut grad = Gradient::default();
        model.accumulate(
            &example,
            &NerModel::features(&example.tokens),
            &model.constraints(),
            &mut grad,
            1.0,
        );
        model.apply(grad);

        let decoder = model.decoder();
        assert_eq!(decoder.predict(&example.tokens), model.predict(&example.tokens));
        assert_eq!(decoder.predict_tags(&example.tokens), vec!["B-PER", "I-PER"]);

        model.add_label("B-LOC");
        let constraints = model.constraints();
        assert_eq!(constraints.start, vec![true, true, false, true]);
        assert!(!constraints.transitions[3][2]);
        assert!(constraints.transitions[1][2]);
    }

    #[test]
    fn test_embeddings_contribute_to_emissions() {
        let emb = Embeddings::from_reader("anders 1 0\naarhus 0 1\n".as_bytes()).unwrap();
        let mut model = NerModel::new(labels()).with_embeddings(emb);
        assert_eq!(model.dense.len(), 3);

        model.dense[1] = vec![2.0, 0.0];
        let toks = tokens(&["Anders", "Aarhus"]);
        let vectors = model.token_vectors(&toks);
        let emissions = model.emissions(&NerModel::features(&toks), &vectors);
        assert_eq!(emissions[0], vec![0.0, 2.0, 0.0]);
        assert_eq!(emissions[1], vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut model = NerModel::new(labels());
        let example = TrainingExample::new(tokens(&["Anders", "Hansen", "bor"]), vec![1, 2, 0]);
        for _ in 0..3 {
            let mut grad = Gradient::default();
            model.accumulate(
                &example,
                &NerModel::features(&example.tokens),
                &model.constraints(),
                &mut grad,
                1.0,
            );
            model.apply(grad);
        }

        let path = std::env::temp_dir().join(format!("ner-model-{}.json", std::process::id()));
        model.save(&path).unwrap();
        let loaded = NerModel::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, model);
        assert_eq!(loaded.predict(&example.tokens), model.predict(&example.tokens));
    }

    #[test]
    fn test_load_rejects_inconsistent_tables() {
        let mut model = NerModel::new(labels());
        model.start.pop();
        let path = std::env::temp_dir().join(format!("ner-bad-{}.json", std::process::id()));
        model.save(&path).unwrap();
        let result = NerModel::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }
}
