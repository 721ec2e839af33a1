//! Training & Evaluation Engine
//!
//! Implements the supervised training loop using Burn's API directly with a
//! custom epoch loop rather than the high-level LearnerBuilder:
//! - Forward/backward passes with automatic differentiation
//! - Cross-entropy loss and Adam with weight decay
//! - Separate evaluation passes over the train and test batches
//! - Best-model checkpointing driven by the test loss
//!
//! The engine owns the model and optimizer for the duration of a run and
//! mutates them in place across epochs. It performs no I/O besides
//! delegating to the checkpointer; failures in the classifier, optimizer or
//! loss propagate to the caller.

use std::path::{Path, PathBuf};

use burn::{
    module::{AutodiffModule, Module},
    nn::loss::CrossEntropyLossConfig,
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use tracing::{debug, info};

use crate::dataset::LesionBatch;
use crate::model::LesionClassifier;
use crate::training::checkpoint::BestModelKeeper;
use crate::training::EpochMetrics;
use crate::utils::error::{DermascopeError, Result};

/// Engine configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Learning rate for the Adam optimizer
    pub learning_rate: f64,
    /// L2 weight decay
    pub weight_decay: f32,
    /// Whether to checkpoint the best model (by test loss) after each epoch
    pub keep_best: bool,
    /// Where the best model is written when `keep_best` is set
    pub best_model_path: PathBuf,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-4,
            weight_decay: 1e-4,
            keep_best: false,
            best_model_path: PathBuf::from("model/best_model"),
        }
    }
}

/// Trainer for the LesionClassifier model
pub struct Trainer<B: AutodiffBackend, O> {
    model: LesionClassifier<B>,
    optimizer: O,
    config: TrainingConfig,
    keeper: Option<BestModelKeeper>,
    device: B::Device,
}

/// Build a trainer with an Adam optimizer configured from `config`.
pub fn build_trainer<B: AutodiffBackend>(
    model: LesionClassifier<B>,
    config: TrainingConfig,
    device: B::Device,
) -> Trainer<B, impl Optimizer<LesionClassifier<B>, B>> {
    let optimizer = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(config.weight_decay)))
        .init();

    let keeper = config
        .keep_best
        .then(|| BestModelKeeper::new(&config.best_model_path));

    Trainer {
        model,
        optimizer,
        config,
        keeper,
        device,
    }
}

impl<B, O> Trainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<LesionClassifier<B>, B>,
{
    /// One full optimization pass over `batches`: gradients enabled,
    /// parameters updated after every batch.
    fn train_epoch(&mut self, batches: &[LesionBatch<B>]) {
        let num_batches = batches.len();

        for (batch_idx, batch) in batches.iter().enumerate() {
            let output = self.model.forward(batch.images.clone());

            let loss = CrossEntropyLossConfig::new()
                .init(&output.device())
                .forward(output.clone(), batch.targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model =
                self.optimizer
                    .step(self.config.learning_rate, self.model.clone(), grads);

            if (batch_idx + 1) % 10 == 0 || batch_idx + 1 == num_batches {
                debug!(
                    "  Batch {}/{}: loss = {:.4}",
                    batch_idx + 1,
                    num_batches,
                    loss_value
                );
            }
        }
    }

    /// Evaluation pass: no gradient tracking, no parameter updates.
    ///
    /// Loss is the mean of per-batch mean losses (denominator = batch
    /// count); accuracy is correct predictions over total samples
    /// (denominator = sample count). The two use different denominators on
    /// purpose.
    pub fn evaluate(&self, batches: &[LesionBatch<B>]) -> (f64, f64) {
        let model = self.model.valid();

        let mut total_loss = 0.0f64;
        let mut correct = 0usize;
        let mut total = 0usize;

        for batch in batches {
            let images = batch.images.clone().inner();
            let targets = batch.targets.clone().inner();

            let output = model.forward(images);

            let loss = CrossEntropyLossConfig::new()
                .init(&output.device())
                .forward(output.clone(), targets.clone());
            let loss_value: f64 = loss.into_scalar().elem();
            total_loss += loss_value;

            // A prediction is correct iff the argmax index equals the label.
            let predictions = output.argmax(1).squeeze::<1>(1);
            let batch_correct: i64 = predictions
                .equal(targets.clone())
                .int()
                .sum()
                .into_scalar()
                .elem();
            correct += batch_correct as usize;
            total += targets.dims()[0];
        }

        let loss = total_loss / batches.len().max(1) as f64;
        let accuracy = correct as f64 / total.max(1) as f64;

        (loss, accuracy)
    }

    /// Run the full training process.
    ///
    /// Each epoch: one optimization pass over `train_batches`, then one
    /// evaluation pass each over `train_batches` and `test_batches`. Returns
    /// one [`EpochMetrics`] per completed epoch, in order.
    pub fn training_process(
        &mut self,
        train_batches: &[LesionBatch<B>],
        test_batches: &[LesionBatch<B>],
        epochs: usize,
    ) -> Result<Vec<EpochMetrics>> {
        let mut history = Vec::with_capacity(epochs);

        for epoch in 0..epochs {
            self.train_epoch(train_batches);

            let (train_loss, train_accuracy) = self.evaluate(train_batches);
            let (test_loss, test_accuracy) = self.evaluate(test_batches);

            if let Some(keeper) = self.keeper.as_mut() {
                keeper.consider(&self.model, test_loss)?;
            }

            info!(
                "Epoch {}/{}: train loss = {:.4}, train acc = {:.2}%, test loss = {:.4}, test acc = {:.2}%",
                epoch + 1,
                epochs,
                train_loss,
                train_accuracy * 100.0,
                test_loss,
                test_accuracy * 100.0
            );

            history.push(EpochMetrics {
                train_loss,
                train_accuracy,
                test_loss,
                test_accuracy,
            });
        }

        Ok(history)
    }

    /// Serialize the current model unconditionally, independent of the
    /// best-loss logic. This is the terminal action of a training run;
    /// a write failure is fatal.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let recorder = CompactRecorder::new();
        self.model
            .clone()
            .save_file(path.to_path_buf(), &recorder)
            .map_err(|e| {
                DermascopeError::Persistence(format!("failed to save model to {:?}: {:?}", path, e))
            })?;

        info!("Model saved to {:?}", path);
        Ok(())
    }

    /// Reference to the model being trained.
    pub fn model(&self) -> &LesionClassifier<B> {
        &self.model
    }

    /// The device the engine was constructed for.
    pub fn device(&self) -> &B::Device {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{LesionBatcher, LesionItem};
    use crate::model::LesionClassifierConfig;
    use burn::backend::{Autodiff, NdArray};
    use tempfile::TempDir;

    type TestBackend = Autodiff<NdArray>;

    fn make_batches(extent: usize, sizes: &[usize]) -> Vec<LesionBatch<TestBackend>> {
        let device = Default::default();
        let batcher = LesionBatcher::with_extent(extent, extent);

        sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let items: Vec<LesionItem> = (0..n)
                    .map(|j| {
                        let value = (i * 7 + j) as f32 * 0.05;
                        LesionItem::from_data(vec![value; 3 * extent * extent], (i + j) % 7)
                    })
                    .collect();
                batcher.batch::<TestBackend>(&items, &device)
            })
            .collect()
    }

    fn make_trainer(
        config: TrainingConfig,
    ) -> Trainer<TestBackend, impl Optimizer<LesionClassifier<TestBackend>, TestBackend>> {
        let device = Default::default();
        let model_config = LesionClassifierConfig::new().with_base_filters(2);
        let model = LesionClassifier::new(&model_config, &device);
        build_trainer(model, config, device)
    }

    #[test]
    fn test_training_process_returns_one_metric_per_epoch() {
        let train = make_batches(16, &[2, 2]);
        let test = make_batches(16, &[2]);
        let mut trainer = make_trainer(TrainingConfig {
            learning_rate: 1e-3,
            ..Default::default()
        });

        let history = trainer.training_process(&train, &test, 3).unwrap();

        assert_eq!(history.len(), 3);
        for metrics in &history {
            assert!(metrics.train_loss.is_finite());
            assert!(metrics.test_loss.is_finite());
            assert!((0.0..=1.0).contains(&metrics.train_accuracy));
            assert!((0.0..=1.0).contains(&metrics.test_accuracy));
        }
    }

    #[test]
    fn test_evaluate_is_pure() {
        // Inference mode must not mutate any state: two consecutive
        // evaluations of the same batches are bit-identical.
        let batches = make_batches(16, &[3, 2]);
        let trainer = make_trainer(TrainingConfig::default());

        let (loss_a, acc_a) = trainer.evaluate(&batches);
        let (loss_b, acc_b) = trainer.evaluate(&batches);

        assert_eq!(loss_a, loss_b);
        assert_eq!(acc_a, acc_b);
    }

    #[test]
    fn test_zero_lr_training_yields_finite_history() {
        let train = make_batches(16, &[2]);
        let test = make_batches(16, &[2]);
        let mut trainer = make_trainer(TrainingConfig {
            learning_rate: 0.0,
            ..Default::default()
        });

        let history = trainer.training_process(&train, &test, 2).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|m| m.train_loss.is_finite()));
    }

    #[test]
    fn test_keep_best_writes_checkpoint() {
        let tmp = TempDir::new().unwrap();
        let best_path = tmp.path().join("best_model");

        let train = make_batches(16, &[2]);
        let test = make_batches(16, &[2]);
        let mut trainer = make_trainer(TrainingConfig {
            learning_rate: 1e-3,
            keep_best: true,
            best_model_path: best_path.clone(),
            ..Default::default()
        });

        trainer.training_process(&train, &test, 1).unwrap();
        assert!(best_path.with_extension("mpk").exists());
    }

    #[test]
    fn test_unconditional_save() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("model/final");

        let trainer = make_trainer(TrainingConfig::default());
        trainer.save(&path).unwrap();

        assert!(path.with_extension("mpk").exists());
    }

    #[test]
    fn test_evaluate_empty_batches() {
        let trainer = make_trainer(TrainingConfig::default());
        let (loss, accuracy) = trainer.evaluate(&[]);
        assert_eq!(loss, 0.0);
        assert_eq!(accuracy, 0.0);
    }
}
