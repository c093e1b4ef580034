//! Training data preparation: label inventory and per-token supervision
//! derived from span-annotated sentences.

use ner_transfer_core::{
    AnnotatedSentence, IobTag, Sentence, TOKEN_SEPARATOR, TagIssue, to_token_tags, validate_tags,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tag of tokens outside any entity.
pub const OUTSIDE: &str = "O";

/// A single training example: tokens and the index of each token's tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingExample {
    pub tokens: Vec<String>,
    pub labels: Vec<usize>,
}

impl TrainingExample {
    pub fn new(tokens: Vec<String>, labels: Vec<usize>) -> Self {
        Self { tokens, labels }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Ordered inventory of IOB tags known to a model. `O` is always index 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSet {
    tags: Vec<String>,
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelSet {
    pub fn new() -> Self {
        Self {
            tags: vec![OUTSIDE.to_string()],
        }
    }

    /// Collect `B-`/`I-` tags for every entity label in `data`.
    pub fn from_annotated(data: &[AnnotatedSentence]) -> Self {
        let mut set = Self::new();
        for sentence in data {
            for span in &sentence.entities {
                set.add_entity_label(&span.label);
            }
        }
        set
    }

    /// Add the begin and inside tags of an entity label.
    pub fn add_entity_label(&mut self, label: &str) {
        self.add(&IobTag::begin(label).to_string());
        self.add(&IobTag::inside(label).to_string());
    }

    /// Add a tag if missing and return its index.
    pub fn add(&mut self, tag: &str) -> usize {
        match self.index_of(tag) {
            Some(idx) => idx,
            None => {
                self.tags.push(tag.to_string());
                self.tags.len() - 1
            }
        }
    }

    pub fn index_of(&self, tag: &str) -> Option<usize> {
        self.tags.iter().position(|t| t == tag)
    }

    pub fn tag(&self, idx: usize) -> Option<&str> {
        self.tags.get(idx).map(String::as_str)
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Split annotated text into the tokens the tagger works on.
pub fn tokenize(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(TOKEN_SEPARATOR).map(str::to_string).collect()
}

/// Per-token tag indices of one sentence, plus the irregularities of its
/// projected tag sequence.
fn project(
    sentence: &AnnotatedSentence,
    labels: &LabelSet,
    outside: usize,
) -> (TrainingExample, Vec<TagIssue>) {
    let tagged = Sentence::new(to_token_tags(sentence));
    let issues = validate_tags(&tagged);

    let (tokens, label_ids): (Vec<_>, Vec<_>) = tagged
        .into_pairs()
        .into_iter()
        .map(|(token, tag)| {
            let idx = labels.index_of(&tag).unwrap_or(outside);
            (token, idx)
        })
        .unzip();
    (TrainingExample::new(tokens, label_ids), issues)
}

/// Turn span annotations into per-token tag indices.
///
/// Tags missing from `labels` fall back to `O`. Sentences whose projected
/// tags are irregular (overlapping or mid-token spans) are kept but reported.
pub fn to_examples(data: &[AnnotatedSentence], labels: &LabelSet) -> Vec<TrainingExample> {
    let outside = labels.index_of(OUTSIDE).unwrap_or(0);
    let mut irregular = 0usize;

    let examples = data
        .iter()
        .map(|sentence| {
            let (example, issues) = project(sentence, labels, outside);
            if !issues.is_empty() {
                irregular += 1;
            }
            example
        })
        .collect();

    if irregular > 0 {
        warn!(
            sentences = irregular,
            "training data has entity spans that do not map onto IOB2 tags"
        );
    }

    examples
}

#[cfg(test)]
mod tests {
    use super::*;
    use ner_transfer_core::EntitySpan;

    fn sample() -> Vec<AnnotatedSentence> {
        vec![
            AnnotatedSentence::new(
                "Anders Hansen bor i Aarhus",
                vec![EntitySpan::new(0, 13, "PER"), EntitySpan::new(20, 26, "LOC")],
            ),
            AnnotatedSentence::unannotated("det regner"),
        ]
    }

    #[test]
    fn test_label_set_from_annotated() {
        let labels = LabelSet::from_annotated(&sample());
        assert_eq!(labels.tags(), &["O", "B-PER", "I-PER", "B-LOC", "I-LOC"]);
        assert_eq!(labels.index_of("O"), Some(0));
        assert_eq!(labels.tag(3), Some("B-LOC"));
        assert_eq!(labels.tag(9), None);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut labels = LabelSet::new();
        let a = labels.add("B-ORG");
        let b = labels.add("B-ORG");
        assert_eq!(a, b);
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_to_examples() {
        let labels = LabelSet::from_annotated(&sample());
        let examples = to_examples(&sample(), &labels);

        assert_eq!(examples.len(), 2);
        assert_eq!(
            examples[0].tokens,
            vec!["Anders", "Hansen", "bor", "i", "Aarhus"]
        );
        assert_eq!(examples[0].labels, vec![1, 2, 0, 0, 3]);
        assert_eq!(examples[1].labels, vec![0, 0]);
    }

    #[test]
    fn test_irregular_spans_are_reported_and_kept() {
        let labels = LabelSet::from_annotated(&sample());
        // LOC covers only the first token, PER continues onto the second.
        let overlapping = AnnotatedSentence::new(
            "Anders Hansen",
            vec![EntitySpan::new(0, 6, "LOC"), EntitySpan::new(0, 13, "PER")],
        );
        let (example, issues) = project(&overlapping, &labels, 0);
        assert_eq!(example.labels, vec![3, 2]);
        assert_eq!(
            issues,
            vec![TagIssue::LabelMismatch {
                index: 1,
                expected: "LOC".into(),
                found: "PER".into(),
            }]
        );

        // A span starting mid-token leaves an orphan I- tag.
        let mid_token =
            AnnotatedSentence::new("Anders Hansen", vec![EntitySpan::new(3, 13, "PER")]);
        let (example, issues) = project(&mid_token, &labels, 0);
        assert_eq!(example.labels, vec![0, 2]);
        assert_eq!(issues, vec![TagIssue::OrphanInside { index: 1 }]);

        let examples = to_examples(&[overlapping, mid_token], &labels);
        assert_eq!(examples.len(), 2);
    }

    #[test]
    fn test_unknown_tags_fall_back_to_outside() {
        let labels = LabelSet::new();
        let examples = to_examples(&sample(), &labels);
        assert!(examples[0].labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("a b"), vec!["a", "b"]);
        assert!(tokenize("").is_empty());

        let sentence = Sentence::from(&[("Mette", "B-PER"), ("bor", "O"), ("i", "O")][..]);
        let text = ner_transfer_core::convert(&sentence).text;
        assert_eq!(tokenize(&text), sentence.tokens().collect::<Vec<_>>());
    }
}
