//! Training configuration.

use serde::{Deserialize, Serialize};

/// How minibatch sizes evolve over an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BatchSchedule {
    /// Every batch has the same size.
    Fixed(usize),
    /// Sizes grow geometrically from `start` by `factor` per batch, capped at `stop`.
    Compounding { start: f32, stop: f32, factor: f32 },
}

impl BatchSchedule {
    /// Infinite iterator over batch sizes, each at least 1.
    pub fn sizes(&self) -> BatchSizes {
        match *self {
            BatchSchedule::Fixed(n) => BatchSizes {
                current: n as f32,
                stop: n as f32,
                factor: 1.0,
            },
            BatchSchedule::Compounding {
                start,
                stop,
                factor,
            } => BatchSizes {
                current: start,
                stop,
                factor,
            },
        }
    }
}

/// Iterator returned by [`BatchSchedule::sizes`].
#[derive(Debug, Clone)]
pub struct BatchSizes {
    current: f32,
    stop: f32,
    factor: f32,
}

impl Iterator for BatchSizes {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let size = (self.current as usize).max(1);
        self.current = if self.factor >= 1.0 {
            (self.current * self.factor).min(self.stop)
        } else {
            (self.current * self.factor).max(self.stop)
        };
        Some(size)
    }
}

/// Hyperparameters for one training run.
///
/// The seed drives shuffling and feature dropout; two runs with the same
/// config and data produce the same model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Passes over the training data.
    pub epochs: usize,
    /// Seed for the run's random generator.
    pub seed: u64,
    /// Probability of dropping a sparse feature during an update.
    pub dropout: f32,
    /// Minibatch size schedule.
    pub batch: BatchSchedule,
    /// Perceptron step size.
    pub learning_rate: f32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 20,
            seed: 42,
            dropout: 0.5,
            batch: BatchSchedule::Compounding {
                start: 4.0,
                stop: 32.0,
                factor: 1.001,
            },
            learning_rate: 1.0,
        }
    }
}

impl TrainConfig {
    /// Create a training configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings used when fine-tuning an embedding-initialised model.
    pub fn transfer() -> Self {
        Self {
            seed: 0,
            dropout: 0.1,
            batch: BatchSchedule::Fixed(5),
            ..Self::default()
        }
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the dropout rate, clamped to `[0.0, 1.0]`.
    pub fn with_dropout(mut self, dropout: f32) -> Self {
        self.dropout = dropout.clamp(0.0, 1.0);
        self
    }

    pub fn with_batch(mut self, batch: BatchSchedule) -> Self {
        self.batch = batch;
        self
    }

    /// Set the step size; negative values become 0.
    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate.max(0.0);
        self
    }
}
