//! Dataset module for HAM10000 data handling
//!
//! - `loader`: joins the metadata CSV with the image files on disk
//! - `burn_dataset`: converts images to tensors and collates batches

pub mod burn_dataset;
pub mod loader;

pub use burn_dataset::{image_to_chw, LesionBatch, LesionBatcher, LesionItem};
pub use loader::{LesionDataset, LesionSample};
