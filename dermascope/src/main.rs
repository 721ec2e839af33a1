//! Dermascope CLI
//!
//! Entry point for training the skin lesion classifier and running
//! explainable inference on single images.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use dermascope::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use dermascope::dataset::{LesionBatch, LesionBatcher, LesionDataset, LesionItem};
use dermascope::inference::{Explainer, PrecisionLevel};
use dermascope::model::{load_model, LesionClassifier, LesionClassifierConfig};
use dermascope::taxonomy::LesionTaxonomy;
use dermascope::training::{build_trainer, TrainingConfig};
use dermascope::utils::logging::{init_logging, LogConfig};

/// Skin lesion classification with explainable predictions
#[derive(Parser, Debug)]
#[command(name = "dermascope")]
#[command(version)]
#[command(about = "Skin lesion classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the classifier on the HAM10000 dataset
    Train {
        /// Path to the dataset root (metadata CSV + image directories)
        #[arg(short, long, default_value = "data/ham10000")]
        data_dir: String,

        /// Number of training epochs
        #[arg(short, long, default_value = "15")]
        epochs: usize,

        /// Batch size for training
        #[arg(short, long, default_value = "64")]
        batch_size: usize,

        /// Learning rate
        #[arg(short, long, default_value = "0.0001")]
        learning_rate: f64,

        /// L2 weight decay
        #[arg(long, default_value = "0.0001")]
        weight_decay: f32,

        /// Output path for the trained model (written with a .mpk extension)
        #[arg(short, long, default_value = "model/model_dermascope")]
        model_name: String,

        /// Also checkpoint the best model by test loss after each epoch
        #[arg(long, default_value = "false")]
        keep_best: bool,

        /// Random seed for the shuffle
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Cap the number of training samples (for quick verification runs)
        #[arg(long)]
        max_samples: Option<usize>,
    },

    /// Classify a single image, optionally with a saliency explanation
    Infer {
        /// Path to the input image
        #[arg(short, long)]
        input: String,

        /// Path to the trained model
        #[arg(short, long)]
        model: String,

        /// Compute a saliency explanation for the prediction
        #[arg(long, default_value = "false")]
        explain: bool,

        /// Explanation precision level (Low, Medium, High)
        #[arg(long, default_value = "Medium")]
        precision: String,
    },

    /// Show dataset statistics
    Stats {
        /// Path to the dataset root
        #[arg(short, long, default_value = "data/ham10000")]
        data_dir: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    if let Err(e) = init_logging(&log_config) {
        eprintln!("{}", e);
    }

    print_banner();

    match cli.command {
        Commands::Train {
            data_dir,
            epochs,
            batch_size,
            learning_rate,
            weight_decay,
            model_name,
            keep_best,
            seed,
            max_samples,
        } => {
            cmd_train(
                &data_dir,
                epochs,
                batch_size,
                learning_rate,
                weight_decay,
                &model_name,
                keep_best,
                seed,
                max_samples,
            )?;
        }

        Commands::Infer {
            input,
            model,
            explain,
            precision,
        } => {
            cmd_infer(&input, &model, explain, &precision)?;
        }

        Commands::Stats { data_dir } => {
            cmd_stats(&data_dir)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 +--------------------------------------------------+
 |   Dermascope - Skin Lesion Classification        |
 |   Explainable inference with Burn + Rust         |
 +--------------------------------------------------+
  "#
        .green()
    );
}

/// Load a dataset split from disk into ready-to-train batches. Images that
/// fail to decode are skipped with a warning.
fn load_split_batches(
    dataset: &LesionDataset,
    batch_size: usize,
) -> Vec<LesionBatch<TrainingBackend>> {
    let device = default_device();
    let batcher = LesionBatcher::new();

    let items: Vec<LesionItem> = dataset
        .samples
        .iter()
        .filter_map(|sample| match LesionItem::from_path(&sample.path, sample.label) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping unreadable image {:?}: {}", sample.path, e);
                None
            }
        })
        .collect();

    items
        .chunks(batch_size.max(1))
        .map(|chunk| batcher.batch::<TrainingBackend>(chunk, &device))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn cmd_train(
    data_dir: &str,
    epochs: usize,
    batch_size: usize,
    learning_rate: f64,
    weight_decay: f32,
    model_name: &str,
    keep_best: bool,
    seed: u64,
    max_samples: Option<usize>,
) -> Result<()> {
    let root = Path::new(data_dir);
    info!("Training on {} ({})", data_dir, backend_name());

    let mut train_dataset = LesionDataset::load(root, true)?;
    let test_dataset = LesionDataset::load(root, false)?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    train_dataset.samples.shuffle(&mut rng);
    if let Some(cap) = max_samples {
        println!(
            "{}",
            format!("Quick mode: capping training set at {} samples", cap).yellow()
        );
        train_dataset.samples.truncate(cap);
    }

    let train_batches = load_split_batches(&train_dataset, batch_size);
    let test_batches = load_split_batches(&test_dataset, batch_size);
    info!(
        "Prepared {} training and {} test batches",
        train_batches.len(),
        test_batches.len()
    );

    let model_path = PathBuf::from(model_name);
    let config = TrainingConfig {
        learning_rate,
        weight_decay,
        keep_best,
        best_model_path: model_path.with_file_name("best_model"),
    };

    let device = default_device();
    let model_config = LesionClassifierConfig::new();
    let model = LesionClassifier::<TrainingBackend>::new(&model_config, &device);

    let mut trainer = build_trainer(model, config, device);
    let history = trainer.training_process(&train_batches, &test_batches, epochs)?;
    trainer.save(&model_path)?;

    // Metrics history next to the model, one entry per epoch
    let metrics_path = model_path.with_file_name("training_metrics.json");
    let json = serde_json::to_string_pretty(&history)?;
    std::fs::write(&metrics_path, json)
        .with_context(|| format!("failed to write metrics to {:?}", metrics_path))?;

    if let Some(last) = history.last() {
        println!(
            "{}",
            format!(
                "Training complete: test accuracy {:.2}%, test loss {:.4}",
                last.test_accuracy * 100.0,
                last.test_loss
            )
            .green()
            .bold()
        );
    }
    println!("Model written to {:?}", model_path.with_extension("mpk"));

    Ok(())
}

fn cmd_infer(input: &str, model_path: &str, explain: bool, precision: &str) -> Result<()> {
    let device = default_device();
    let model = load_model::<DefaultBackend>(Path::new(model_path), &device)?;
    let explainer = Explainer::new(model, device);

    let image = image::open(input).with_context(|| format!("failed to open image {}", input))?;
    let budget = PrecisionLevel::resolve(precision);

    let (prediction, mask) = explainer.predict(&image, explain, budget)?;

    println!(
        "{} {} ({:.1}% confidence)",
        "Prediction:".cyan().bold(),
        prediction.label.green(),
        prediction.confidence * 100.0
    );

    if let Some(mask) = mask {
        let (height, width) = mask.dimensions();
        println!(
            "Saliency mask: {}x{} ({} perturbation samples)",
            width, height, budget
        );
    }

    Ok(())
}

fn cmd_stats(data_dir: &str) -> Result<()> {
    let root = Path::new(data_dir);
    let taxonomy = LesionTaxonomy::new();

    for (name, train) in [("train", true), ("test", false)] {
        let dataset = LesionDataset::load(root, train)?;
        println!("{} split: {} samples", name.cyan().bold(), dataset.len());

        for (idx, count) in dataset.class_distribution().iter().enumerate() {
            if let Some(class_name) = taxonomy.class_name(idx) {
                println!("  {:>5}  {}", count, class_name);
            }
        }
    }

    Ok(())
}
