//! # Span-level Scoring
//!
//! Precision, recall and F1 over exact-match entity spans. Spans are
//! compared as sets per sentence (duplicates count once) and counts are
//! summed over the corpus before the percentages are computed.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{NerError, Result};
use crate::span::{AnnotatedSentence, EntitySpan};

/// Aggregated counts and the percentages derived from them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub n_sys: usize,
    pub n_gold: usize,
    pub n_correct: usize,
}

impl Scores {
    /// Compute percentages from raw counts.
    ///
    /// Precision and recall are 0 when their denominator is 0, and F1 is 0
    /// whenever nothing is correct.
    pub fn from_counts(n_sys: usize, n_gold: usize, n_correct: usize) -> Self {
        let precision = if n_sys > 0 {
            100.0 * n_correct as f64 / n_sys as f64
        } else {
            0.0
        };
        let recall = if n_gold > 0 {
            100.0 * n_correct as f64 / n_gold as f64
        } else {
            0.0
        };
        let f1 = if n_correct == 0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Self {
            precision,
            recall,
            f1,
            n_sys,
            n_gold,
            n_correct,
        }
    }

    /// The (precision, recall, f1) triple.
    pub fn as_tuple(&self) -> (f64, f64, f64) {
        (self.precision, self.recall, self.f1)
    }
}

impl fmt::Display for Scores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Precision: {:.2}%, Recall: {:.2}%, F1: {:.2}%",
            self.precision, self.recall, self.f1
        )
    }
}

/// What to do when system and gold sequences differ in length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LengthPolicy {
    /// Score the common prefix and ignore the rest.
    #[default]
    Truncate,
    /// Refuse to score.
    Strict,
}

/// Overall scores plus a breakdown per entity label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub overall: Scores,
    pub per_label: BTreeMap<String, Scores>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    n_sys: usize,
    n_gold: usize,
    n_correct: usize,
}

impl Counts {
    fn scores(&self) -> Scores {
        Scores::from_counts(self.n_sys, self.n_gold, self.n_correct)
    }
}

/// Configurable scorer.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    length_policy: LengthPolicy,
}

impl Scorer {
    /// Create a scorer with the truncating length policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the length policy.
    pub fn with_length_policy(mut self, policy: LengthPolicy) -> Self {
        self.length_policy = policy;
        self
    }

    fn check_lengths(&self, system: &[AnnotatedSentence], gold: &[AnnotatedSentence]) -> Result<()> {
        if self.length_policy == LengthPolicy::Strict && system.len() != gold.len() {
            return Err(NerError::LengthMismatch {
                system: system.len(),
                gold: gold.len(),
            });
        }
        Ok(())
    }

    /// Score `system` against `gold`.
    ///
    /// # Errors
    /// [`NerError::LengthMismatch`] under [`LengthPolicy::Strict`] when the
    /// sequences differ in length.
    pub fn score(&self, system: &[AnnotatedSentence], gold: &[AnnotatedSentence]) -> Result<Scores> {
        self.check_lengths(system, gold)?;
        Ok(count(system, gold).scores())
    }

    /// Score overall and separately for every label seen on either side.
    pub fn evaluate(
        &self,
        system: &[AnnotatedSentence],
        gold: &[AnnotatedSentence],
    ) -> Result<Evaluation> {
        let overall = self.score(system, gold)?;

        let mut per_label: BTreeMap<String, Counts> = BTreeMap::new();
        for (sys_sent, gold_sent) in system.iter().zip(gold) {
            let sys_entities: HashSet<&EntitySpan> = sys_sent.entities.iter().collect();
            let gold_entities: HashSet<&EntitySpan> = gold_sent.entities.iter().collect();

            for span in &sys_entities {
                let counts = per_label.entry(span.label.clone()).or_default();
                counts.n_sys += 1;
                if gold_entities.contains(span) {
                    counts.n_correct += 1;
                }
            }
            for span in &gold_entities {
                per_label.entry(span.label.clone()).or_default().n_gold += 1;
            }
        }

        Ok(Evaluation {
            overall,
            per_label: per_label
                .into_iter()
                .map(|(label, counts)| (label, counts.scores()))
                .collect(),
        })
    }
}

/// Score with the truncating policy: pairs beyond the shorter sequence are
/// ignored.
pub fn score(system: &[AnnotatedSentence], gold: &[AnnotatedSentence]) -> Scores {
    count(system, gold).scores()
}

fn count(system: &[AnnotatedSentence], gold: &[AnnotatedSentence]) -> Counts {
    let mut counts = Counts::default();
    for (sys_sent, gold_sent) in system.iter().zip(gold) {
        let sys_entities: HashSet<&EntitySpan> = sys_sent.entities.iter().collect();
        let gold_entities: HashSet<&EntitySpan> = gold_sent.entities.iter().collect();

        counts.n_sys += sys_entities.len();
        counts.n_gold += gold_entities.len();
        counts.n_correct += sys_entities.intersection(&gold_entities).count();
    }
    counts
}
