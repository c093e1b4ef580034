use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ner_transfer_trainer::{Experiment, TrainConfig};
use tracing_subscriber::EnvFilter;

/// Train a baseline and a transfer NER model and compare them on the test split.
#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Compare baseline and embedding-transfer NER models")]
#[command(version)]
struct Cli {
    /// Training corpus (CoNLL)
    #[arg(long, env = "NER_TRAIN", default_value = "data/danish-train.conll")]
    train: PathBuf,

    /// Development corpus (CoNLL)
    #[arg(long, env = "NER_DEV", default_value = "data/danish-dev.conll")]
    dev: PathBuf,

    /// Test corpus (CoNLL)
    #[arg(long, env = "NER_TEST", default_value = "data/danish-test.conll")]
    test: PathBuf,

    /// Pretrained donor-language vectors; enables the transfer model
    #[arg(long, env = "NER_VECTORS")]
    vectors: Option<PathBuf>,

    /// Training epochs for both models
    #[arg(short, long, default_value_t = 20)]
    epochs: usize,

    /// Override the seeds of both models
    #[arg(long)]
    seed: Option<u64>,

    /// Directory to save trained models into
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Write the scores as a JSON report to this file
    #[arg(short, long, alias = "report")]
    output: Option<PathBuf>,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut baseline = TrainConfig::default().with_epochs(cli.epochs);
    let mut transfer = TrainConfig::transfer().with_epochs(cli.epochs);
    if let Some(seed) = cli.seed {
        baseline = baseline.with_seed(seed);
        transfer = transfer.with_seed(seed);
    }

    let mut experiment =
        Experiment::new(cli.train, cli.dev, cli.test).with_configs(baseline, transfer);
    if let Some(vectors) = cli.vectors {
        experiment = experiment.with_vectors(vectors);
    }

    let (report, models) = experiment.run()?;

    println!("Baseline Model - {}", report.baseline);
    match &report.transfer {
        Some(scores) => println!("Transfer Model - {scores}"),
        None => println!("Transfer Model - skipped (no --vectors given)"),
    }

    if let Some(dir) = cli.model_dir {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        models.baseline.save(dir.join("baseline.json"))?;
        if let Some(model) = &models.transfer {
            model.save(dir.join("transfer.json"))?;
        }
        println!("Models saved to {}", dir.display());
    }

    if let Some(path) = cli.output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write report {}", path.display()))?;
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Training failed: {e:#}");
        std::process::exit(1);
    }
}
