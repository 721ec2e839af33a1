//! # Dermascope
//!
//! A Rust library for skin lesion classification with explainable
//! predictions, built on the Burn framework.
//!
//! ## Features
//!
//! - **CNN classifier** for the seven HAM10000 lesion categories
//! - **Burn framework** for portable, efficient training and inference
//! - **Explainable predictions** via perturbation-sampled saliency masks
//! - **HAM10000 dataset** support joining the metadata CSV with the images
//!
//! ## Modules
//!
//! - `dataset`: HAM10000 loading and tensor batching
//! - `model`: CNN architecture built with Burn
//! - `training`: Epoch loop, evaluation and best-model checkpointing
//! - `inference`: Decoding, explainable prediction and the request service
//! - `utils`: Logging and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dermascope::dataset::LesionDataset;
//! use dermascope::model::LesionClassifierConfig;
//!
//! // Load dataset
//! let dataset = LesionDataset::load("data/ham10000", true)?;
//!
//! // Create model
//! let config = LesionClassifierConfig::new();
//! // ... training and inference
//! ```

pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod taxonomy;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::{LesionBatch, LesionBatcher, LesionDataset, LesionItem};
pub use inference::{Explainer, Prediction, PredictionResponse, PredictionService, SaliencyMask};
pub use model::{load_model, LesionClassifier, LesionClassifierConfig};
pub use taxonomy::LesionTaxonomy;
pub use training::{build_trainer, EpochMetrics, Trainer, TrainingConfig};
pub use utils::error::{DermascopeError, Result};

/// HAM10000 lesion classes (7 total)
pub const NUM_CLASSES: usize = 7;

/// Native HAM10000 image height
pub const IMAGE_HEIGHT: u32 = 450;

/// Native HAM10000 image width
pub const IMAGE_WIDTH: u32 = 600;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
