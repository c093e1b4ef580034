//! CoNLL NER utility
//!
//! Converts IOB-tagged CoNLL files into span JSON lines, reports irregular tag
//! sequences and scores a system file against a gold file.

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ner_transfer_core::{
    AnnotatedSentence, Corpus, Evaluation, LengthPolicy, Scorer, convert_corpus,
    par_convert_corpus, read_corpus_file, validate_tags,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conll-eval")]
#[command(about = "Convert, validate and score CoNLL NER files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print each sentence as a JSON line of text and entity spans
    Convert {
        /// CoNLL corpus
        corpus: PathBuf,

        /// Convert sentences in parallel
        #[arg(long)]
        parallel: bool,
    },
    /// Report orphan or mislabelled I- tags
    Validate {
        /// CoNLL corpus
        corpus: PathBuf,
    },
    /// Score system annotations against gold annotations
    Evaluate {
        /// System output (CoNLL)
        #[arg(short, long)]
        system: PathBuf,

        /// Gold standard (CoNLL)
        #[arg(short, long)]
        gold: PathBuf,

        /// Fail when the files hold different numbers of sentences
        #[arg(long)]
        strict: bool,

        /// Also print scores for every entity label
        #[arg(long)]
        per_label: bool,

        /// Print the evaluation as JSON
        #[arg(long)]
        json: bool,
    },
}

fn load(path: &Path) -> Result<Corpus> {
    let corpus =
        read_corpus_file(path).with_context(|| format!("failed to read {}", path.display()))?;
    info!(path = %path.display(), sentences = corpus.len(), "loaded corpus");
    Ok(corpus)
}

fn write_json_lines<W: Write>(out: &mut W, data: &[AnnotatedSentence]) -> Result<()> {
    for sentence in data {
        serde_json::to_writer(&mut *out, sentence)?;
        writeln!(out)?;
    }
    Ok(())
}

/// One line per tag issue, prefixed with the 1-based sentence number.
fn issue_report(corpus: &Corpus) -> Vec<String> {
    corpus
        .iter()
        .enumerate()
        .flat_map(|(idx, sentence)| {
            validate_tags(sentence)
                .into_iter()
                .map(move |issue| format!("sentence {}: {issue}", idx + 1))
        })
        .collect()
}

fn render_evaluation(evaluation: &Evaluation, per_label: bool) -> String {
    let mut out = format!("Overall - {}\n", evaluation.overall);
    if per_label {
        for (label, scores) in &evaluation.per_label {
            out.push_str(&format!("{label} - {scores}\n"));
        }
    }
    out
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Convert { corpus, parallel } => {
            let corpus = load(&corpus)?;
            let data = if parallel {
                par_convert_corpus(&corpus)
            } else {
                convert_corpus(&corpus)
            };
            let mut out = BufWriter::new(io::stdout().lock());
            write_json_lines(&mut out, &data)?;
            out.flush()?;
        }
        Commands::Validate { corpus } => {
            let issues = issue_report(&load(&corpus)?);
            for line in &issues {
                println!("{line}");
            }
            if !issues.is_empty() {
                eprintln!("{} tag issue(s) found", issues.len());
                return Ok(ExitCode::FAILURE);
            }
            println!("No tag issues found");
        }
        Commands::Evaluate {
            system,
            gold,
            strict,
            per_label,
            json,
        } => {
            let system = convert_corpus(&load(&system)?);
            let gold = convert_corpus(&load(&gold)?);
            let policy = if strict {
                LengthPolicy::Strict
            } else {
                LengthPolicy::Truncate
            };
            let evaluation = Scorer::new()
                .with_length_policy(policy)
                .evaluate(&system, &gold)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&evaluation)?);
            } else {
                print!("{}", render_evaluation(&evaluation, per_label));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ner_transfer_core::{EntitySpan, Sentence, parse_lines};

    #[test]
    fn test_json_lines_shape() {
        let data = vec![
            AnnotatedSentence::new("Anders", vec![EntitySpan::new(0, 6, "PER")]),
            AnnotatedSentence::unannotated("bor"),
        ];
        let mut buf = Vec::new();
        write_json_lines(&mut buf, &data).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            r#"{"text":"Anders","entities":[{"start":0,"end":6,"label":"PER"}]}"#
        );
        assert_eq!(lines[1], r#"{"text":"bor","entities":[]}"#);
    }

    #[test]
    fn test_issue_report_numbers_sentences() {
        let corpus = vec![
            Sentence::from(&[("Anders", "B-PER")][..]),
            Sentence::from(&[("bor", "O"), ("Hansen", "I-PER")][..]),
        ];
        let report = issue_report(&corpus);
        assert_eq!(report.len(), 1);
        assert!(report[0].starts_with("sentence 2: "));
    }

    #[test]
    fn test_render_evaluation() {
        let gold = convert_corpus(&parse_lines(["Anders\tB-PER", "i\tO", "Aarhus\tB-LOC"]).unwrap());
        let system = convert_corpus(&parse_lines(["Anders\tB-PER", "i\tO", "Aarhus\tO"]).unwrap());
        let evaluation = Scorer::new().evaluate(&system, &gold).unwrap();

        let text = render_evaluation(&evaluation, true);
        assert!(text.starts_with("Overall - Precision: 100.00%, Recall: 50.00%, F1: 66.67%"));
        assert!(text.contains("PER - Precision: 100.00%"));
        assert!(text.contains("LOC - Precision: 0.00%"));

        assert_eq!(render_evaluation(&evaluation, false).lines().count(), 1);
    }

    #[test]
    fn test_cli_parses_evaluate() {
        let cli = Cli::parse_from([
            "conll-eval", "evaluate", "--system", "s.conll", "--gold", "g.conll", "--strict",
        ]);
        match cli.command {
            Commands::Evaluate { strict, json, .. } => {
                assert!(strict);
                assert!(!json);
            }
            _ => panic!("expected evaluate"),
        }
    }
}
