//! # IOB Tags
//!
//! Parsed view of IOB2 tag strings (`O`, `B-LABEL`, `I-LABEL`) and a
//! checker for tag sequences that the span converter accepts silently.
//!
//! The prefix is decided by the first character alone and the label is
//! everything from the third character on, so `"B"` is a Begin tag with an
//! empty label and `"BX-PER"` is a Begin tag labelled `"-PER"`.

use std::fmt;

use crate::corpus::Sentence;

/// The positional part of an IOB tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IobPrefix {
    /// First token of an entity.
    Begin,
    /// Continuation of the most recently opened entity.
    Inside,
    /// Not part of any entity (also used for unrecognized prefixes).
    Outside,
}

/// A tag string split into prefix and label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IobTag {
    pub prefix: IobPrefix,
    pub label: String,
}

impl IobTag {
    /// Parse a raw tag string. Never fails: unknown prefixes read as Outside.
    pub fn parse(tag: &str) -> Self {
        let prefix = match tag.chars().next() {
            Some('B') => IobPrefix::Begin,
            Some('I') => IobPrefix::Inside,
            _ => IobPrefix::Outside,
        };
        let label = match prefix {
            IobPrefix::Outside => String::new(),
            _ => tag.chars().skip(2).collect(),
        };
        Self { prefix, label }
    }

    /// The outside tag.
    pub fn outside() -> Self {
        Self {
            prefix: IobPrefix::Outside,
            label: String::new(),
        }
    }

    pub fn begin(label: impl Into<String>) -> Self {
        Self {
            prefix: IobPrefix::Begin,
            label: label.into(),
        }
    }

    pub fn inside(label: impl Into<String>) -> Self {
        Self {
            prefix: IobPrefix::Inside,
            label: label.into(),
        }
    }

    /// Check if transitioning from `from` to `to` is valid under IOB2.
    ///
    /// `from == None` stands for the start of a sentence.
    pub fn is_valid_transition(from: Option<&IobTag>, to: &IobTag) -> bool {
        match (from, to.prefix) {
            (_, IobPrefix::Begin) | (_, IobPrefix::Outside) => true,
            (None, IobPrefix::Inside) => false,
            (Some(prev), IobPrefix::Inside) => {
                prev.prefix != IobPrefix::Outside && prev.label == to.label
            }
        }
    }
}

impl fmt::Display for IobTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            IobPrefix::Begin => write!(f, "B-{}", self.label),
            IobPrefix::Inside => write!(f, "I-{}", self.label),
            IobPrefix::Outside => write!(f, "O"),
        }
    }
}

/// A tag sequence irregularity. None of these stop conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagIssue {
    /// An `I-` tag with no entity opened before it in the sentence.
    OrphanInside { index: usize },
    /// An `I-` tag whose label differs from the entity it extends.
    LabelMismatch {
        index: usize,
        expected: String,
        found: String,
    },
    /// A tag that is neither `O` nor starts with `B` or `I`.
    UnknownPrefix { index: usize, tag: String },
}

impl fmt::Display for TagIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagIssue::OrphanInside { index } => {
                write!(f, "token {index}: I- tag without a preceding entity")
            }
            TagIssue::LabelMismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "token {index}: I-{found} extends an entity labelled {expected}"
            ),
            TagIssue::UnknownPrefix { index, tag } => {
                write!(f, "token {index}: unrecognized tag {tag:?}")
            }
        }
    }
}

/// Report the irregular tags of a sentence.
///
/// Tracks the label of the last opened entity the same way the span
/// converter does: only `B-` opens an entity and it stays open across `O`.
pub fn validate_tags(sentence: &Sentence) -> Vec<TagIssue> {
    let mut issues = Vec::new();
    let mut open_label: Option<String> = None;

    for (index, tag) in sentence.tags().enumerate() {
        let parsed = IobTag::parse(tag);
        match parsed.prefix {
            IobPrefix::Begin => open_label = Some(parsed.label),
            IobPrefix::Inside => match &open_label {
                None => issues.push(TagIssue::OrphanInside { index }),
                Some(expected) if *expected != parsed.label => {
                    issues.push(TagIssue::LabelMismatch {
                        index,
                        expected: expected.clone(),
                        found: parsed.label,
                    })
                }
                Some(_) => {}
            },
            IobPrefix::Outside if tag != "O" => issues.push(TagIssue::UnknownPrefix {
                index,
                tag: tag.to_string(),
            }),
            IobPrefix::Outside => {}
        }
    }

    issues
}
