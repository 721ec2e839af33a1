//! Best-model checkpointing
//!
//! Tracks the best evaluation loss seen during a run and persists the model
//! parameters whenever the loss strictly improves. This is the only
//! mechanism keeping a run from shipping a model that regressed on its
//! final epoch.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::backend::Backend;
use tracing::{debug, info};

use crate::model::LesionClassifier;
use crate::utils::error::{DermascopeError, Result};

/// Saves model parameters whenever the observed loss strictly improves.
#[derive(Debug)]
pub struct BestModelKeeper {
    path: PathBuf,
    best_loss: f64,
}

impl BestModelKeeper {
    /// Create a keeper writing to `path`; the initial best loss is +infinity
    /// so the first observation always saves.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            best_loss: f64::INFINITY,
        }
    }

    /// Best loss seen so far.
    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    /// Path the best model is written to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save the model iff `loss` strictly improves on the best seen.
    /// Ties do not overwrite. Returns whether a save happened; a failed
    /// write is a persistence error and aborts the run.
    pub fn consider<B: Backend>(
        &mut self,
        model: &LesionClassifier<B>,
        loss: f64,
    ) -> Result<bool> {
        if loss >= self.best_loss {
            debug!(
                "Loss {:.4} did not improve on best {:.4}, not saving",
                loss, self.best_loss
            );
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let recorder = CompactRecorder::new();
        model
            .clone()
            .save_file(self.path.clone(), &recorder)
            .map_err(|e| {
                DermascopeError::Persistence(format!(
                    "failed to save best model to {:?}: {:?}",
                    self.path, e
                ))
            })?;

        info!(
            "Best model improved: {:.4} -> {:.4}, saved to {:?}",
            self.best_loss, loss, self.path
        );
        self.best_loss = loss;

        Ok(true)
    }
}
