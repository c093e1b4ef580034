//! Pretrained word vectors in word2vec text format.
//!
//! One `word v1 v2 ... vd` record per line, optionally preceded by a
//! `count dim` header. Vectors are L2-normalised on load so they can be fed to
//! the perceptron next to binary features.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Word vector table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embeddings {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl Embeddings {
    /// Build a table from in-memory vectors. All vectors must have length `dim`.
    pub fn new(dim: usize, vectors: HashMap<String, Vec<f32>>) -> anyhow::Result<Self> {
        if let Some((word, v)) = vectors.iter().find(|(_, v)| v.len() != dim) {
            bail!("vector for {word:?} has {} dimensions, expected {dim}", v.len());
        }
        let vectors = vectors
            .into_iter()
            .map(|(word, v)| (word, normalize(v)))
            .collect();
        Ok(Self { dim, vectors })
    }

    /// Parse vectors from a reader.
    pub fn from_reader<R: BufRead>(reader: R) -> anyhow::Result<Self> {
        let mut dim: Option<usize> = None;
        let mut vectors = HashMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.with_context(|| format!("failed to read line {line_no}"))?;
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };
            let rest: Vec<&str> = fields.collect();

            if idx == 0 && rest.len() == 1 {
                if let (Ok(_), Ok(header_dim)) = (word.parse::<usize>(), rest[0].parse::<usize>()) {
                    dim = Some(header_dim);
                    continue;
                }
            }

            let values = rest
                .iter()
                .map(|v| v.parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("invalid number on line {line_no}"))?;

            match dim {
                None if values.is_empty() => bail!("line {line_no}: {word:?} has no vector"),
                None => dim = Some(values.len()),
                Some(d) if d != values.len() => bail!(
                    "line {line_no}: expected {d} dimensions, found {}",
                    values.len()
                ),
                Some(_) => {}
            }

            vectors.insert(word.to_string(), normalize(values));
        }

        let Some(dim) = dim else {
            bail!("no vectors found");
        };

        debug!(words = vectors.len(), dim, "loaded embeddings");
        Ok(Self { dim, vectors })
    }

    /// Parse vectors from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open embeddings {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse embeddings {}", path.display()))
    }

    /// Look a word up, falling back to its lowercase form.
    pub fn get(&self, word: &str) -> Option<&[f32]> {
        self.vectors
            .get(word)
            .or_else(|| self.vectors.get(&word.to_lowercase()))
            .map(Vec::as_slice)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Fraction of `tokens` that have a vector.
    pub fn coverage<'a, I>(&self, tokens: I) -> f64
    where
        I: IntoIterator<Item = &'a str>,
    {
        let (found, total) = tokens.into_iter().fold((0usize, 0usize), |(f, t), token| {
            (f + usize::from(self.get(token).is_some()), t + 1)
        });
        if total == 0 {
            0.0
        } else {
            found as f64 / total as f64
        }
    }
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}
