//! Training module: the epoch-loop engine and best-model checkpointing.

pub mod checkpoint;
pub mod trainer;

use serde::{Deserialize, Serialize};

pub use checkpoint::BestModelKeeper;
pub use trainer::{build_trainer, Trainer, TrainingConfig};

/// Metrics for one completed epoch. Immutable after creation; the engine
/// accumulates them into an append-only history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub test_loss: f64,
    pub test_accuracy: f64,
}
