//! # CoNLL Corpus Reader
//!
//! Parses `TOKEN<TAB>TAG` records into sentences. Blank lines separate
//! sentences; runs of blank lines never produce empty sentences and the last
//! sentence does not need a trailing blank line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NerError, Result};

/// Field delimiter of a record line.
const DELIMITER: char = '\t';

/// An ordered sequence of (token, tag) pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence(Vec<(String, String)>);

/// Sentences in source order.
pub type Corpus = Vec<Sentence>;

impl Sentence {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// The (token, tag) pairs in order.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(token, _)| token.as_str())
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(_, tag)| tag.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.0
    }
}

impl From<Vec<(String, String)>> for Sentence {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

impl<'a> From<&[(&'a str, &'a str)]> for Sentence {
    fn from(pairs: &[(&'a str, &'a str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(token, tag)| (token.to_string(), tag.to_string()))
                .collect(),
        )
    }
}

/// Split a trimmed record line into its token and tag.
fn parse_record(line: &str, line_no: usize) -> Result<(String, String)> {
    let mut fields = line.split(DELIMITER);
    match (fields.next(), fields.next(), fields.next()) {
        (Some(token), Some(tag), None) => Ok((token.to_string(), tag.to_string())),
        _ => Err(NerError::Parse {
            line: line_no,
            content: line.to_string(),
        }),
    }
}

/// Parse a corpus from an ordered sequence of lines.
///
/// # Errors
/// Returns [`NerError::Parse`] with the 1-based line number for the first
/// non-blank line that is not exactly two tab-separated fields.
///
/// # Examples
/// ```
/// use ner_transfer_core::corpus::parse_lines;
///
/// let corpus = parse_lines(["a\tO", "", "b\tO", "c\tB-X"]).unwrap();
/// assert_eq!(corpus.len(), 2);
/// assert_eq!(corpus[1].len(), 2);
/// ```
pub fn parse_lines<I, S>(lines: I) -> Result<Corpus>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut corpus = Vec::new();
    let mut current = Vec::new();

    for (idx, line) in lines.into_iter().enumerate() {
        let line = line.as_ref().trim();

        if line.is_empty() {
            if !current.is_empty() {
                corpus.push(Sentence(std::mem::take(&mut current)));
            }
            continue;
        }

        current.push(parse_record(line, idx + 1)?);
    }

    if !current.is_empty() {
        corpus.push(Sentence(current));
    }

    Ok(corpus)
}

/// Read a corpus from any buffered reader.
pub fn read_corpus<R: BufRead>(reader: R) -> Result<Corpus> {
    let lines = reader.lines().collect::<std::io::Result<Vec<_>>>()?;
    let corpus = parse_lines(&lines)?;

    debug!(
        sentences = corpus.len(),
        tokens = corpus.iter().map(Sentence::len).sum::<usize>(),
        "read corpus"
    );

    Ok(corpus)
}

/// Read a corpus from a UTF-8 file.
pub fn read_corpus_file<P: AsRef<Path>>(path: P) -> Result<Corpus> {
    let file = File::open(path.as_ref())?;
    read_corpus(BufReader::new(file))
}
