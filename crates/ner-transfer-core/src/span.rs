//! # Span Conversion
//!
//! Turns a tagged sentence into its space-joined text plus character-offset
//! entity spans, and projects spans back onto per-token tags.
//!
//! Offsets count Unicode scalar values, not bytes, so `"Århus"` has length 5.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corpus::Sentence;
use crate::tags::{IobPrefix, IobTag};

/// Separator used to rebuild sentence text from tokens.
pub const TOKEN_SEPARATOR: char = ' ';

/// A labelled character range `[start, end)` of a sentence text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntitySpan {
    pub start: usize,
    pub end: usize,
    pub label: String,
}

impl EntitySpan {
    pub fn new(start: usize, end: usize, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The substring of `text` covered by this span, if the offsets fit.
    pub fn surface<'a>(&self, text: &'a str) -> Option<&'a str> {
        if self.start > self.end {
            return None;
        }
        let byte_at = |char_idx: usize| {
            text.char_indices()
                .map(|(b, _)| b)
                .chain(std::iter::once(text.len()))
                .nth(char_idx)
        };
        let start = byte_at(self.start)?;
        let end = byte_at(self.end)?;
        text.get(start..end)
    }
}

impl From<(usize, usize, &str)> for EntitySpan {
    fn from((start, end, label): (usize, usize, &str)) -> Self {
        Self::new(start, end, label)
    }
}

/// Sentence text with the entities found in it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedSentence {
    pub text: String,
    pub entities: Vec<EntitySpan>,
}

impl AnnotatedSentence {
    pub fn new(text: impl Into<String>, entities: Vec<EntitySpan>) -> Self {
        Self {
            text: text.into(),
            entities,
        }
    }

    /// Text with no entities, e.g. as input for annotation.
    pub fn unannotated(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }

    /// Number of characters in the text; the upper bound for span offsets.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Convert one tagged sentence into text and entity spans.
///
/// A `B-` tag opens a span over its token. An `I-` tag extends the most
/// recently opened span by the token plus one separator, whatever its label
/// and however far back that span was opened. An `I-` with nothing to extend
/// is dropped.
///
/// # Examples
/// ```
/// use ner_transfer_core::corpus::Sentence;
/// use ner_transfer_core::span::{convert, EntitySpan};
///
/// let sentence = Sentence::from(&[("Anders", "B-PER"), ("Hansen", "I-PER")][..]);
/// let annotated = convert(&sentence);
/// assert_eq!(annotated.text, "Anders Hansen");
/// assert_eq!(annotated.entities, vec![EntitySpan::new(0, 13, "PER")]);
/// ```
pub fn convert(sentence: &Sentence) -> AnnotatedSentence {
    let text = sentence
        .tokens()
        .collect::<Vec<_>>()
        .join(&TOKEN_SEPARATOR.to_string());

    let mut entities: Vec<EntitySpan> = Vec::new();
    let mut ind = 0usize;

    for (token, tag) in sentence.pairs() {
        let token_len = token.chars().count();
        let tag = IobTag::parse(tag);

        match tag.prefix {
            IobPrefix::Begin => {
                entities.push(EntitySpan::new(ind, ind + token_len, tag.label));
            }
            IobPrefix::Inside => {
                if let Some(last) = entities.pop() {
                    entities.push(EntitySpan::new(
                        last.start,
                        last.end + token_len + 1,
                        last.label,
                    ));
                }
            }
            IobPrefix::Outside => {}
        }

        ind += token_len + 1;
    }

    AnnotatedSentence::new(text, entities)
}

/// Convert every sentence, preserving order.
pub fn convert_corpus(corpus: &[Sentence]) -> Vec<AnnotatedSentence> {
    let converted: Vec<_> = corpus.iter().map(convert).collect();
    debug!(
        sentences = converted.len(),
        entities = converted.iter().map(|s| s.entities.len()).sum::<usize>(),
        "converted corpus"
    );
    converted
}

/// [`convert_corpus`] with one rayon task per sentence. Output order matches input.
pub fn par_convert_corpus(corpus: &[Sentence]) -> Vec<AnnotatedSentence> {
    corpus.par_iter().map(convert).collect()
}

/// Project entity spans back onto the space-separated tokens of the text.
///
/// A token starting where a span starts gets `B-label`, a token starting
/// strictly inside a span gets `I-label`, everything else is `O`. When spans
/// overlap the first one in list order wins.
pub fn to_token_tags(sentence: &AnnotatedSentence) -> Vec<(String, String)> {
    if sentence.text.is_empty() {
        return Vec::new();
    }

    let mut tagged = Vec::new();
    let mut ind = 0usize;

    for token in sentence.text.split(TOKEN_SEPARATOR) {
        let covering = sentence
            .entities
            .iter()
            .find(|span| span.start <= ind && ind < span.end);

        let tag = match covering {
            Some(span) if span.start == ind => IobTag::begin(span.label.as_str()),
            Some(span) => IobTag::inside(span.label.as_str()),
            None => IobTag::outside(),
        };

        tagged.push((token.to_string(), tag.to_string()));
        ind += token.chars().count() + 1;
    }

    tagged
}
