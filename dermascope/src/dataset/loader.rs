//! HAM10000 dataset loader
//!
//! Reads `HAM10000_metadata.csv` (`image_id`, `dx` columns), keeps only rows
//! whose image file is actually present under the train or test image
//! directory, and maps the `dx` diagnosis codes to class labels through the
//! taxonomy.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::taxonomy::LesionTaxonomy;
use crate::utils::error::{DermascopeError, Result};

const METADATA_FILE: &str = "HAM10000_metadata.csv";
const TRAIN_DIR: &str = "HAM10000_images_train";
const TEST_DIR: &str = "HAM10000_images_test";

/// One row of the metadata file (extra columns are ignored)
#[derive(Debug, Deserialize)]
struct MetadataRow {
    image_id: String,
    dx: String,
}

/// A labelled image on disk
#[derive(Debug, Clone)]
pub struct LesionSample {
    pub path: PathBuf,
    pub label: usize,
}

/// The HAM10000 dataset: metadata joined against the files on disk
#[derive(Debug, Clone)]
pub struct LesionDataset {
    pub samples: Vec<LesionSample>,
}

impl LesionDataset {
    /// Load the train or test split from the dataset root.
    pub fn load(root: &Path, train: bool) -> Result<Self> {
        let metadata_path = root.join(METADATA_FILE);
        let images_dir = root.join(if train { TRAIN_DIR } else { TEST_DIR });

        if !metadata_path.exists() {
            return Err(DermascopeError::PathNotFound(metadata_path));
        }
        if !images_dir.exists() {
            return Err(DermascopeError::PathNotFound(images_dir));
        }

        let present: HashSet<String> = std::fs::read_dir(&images_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();

        let taxonomy = LesionTaxonomy::new();
        let mut reader = csv::Reader::from_path(&metadata_path)
            .map_err(|e| DermascopeError::Dataset(format!("failed to read metadata: {}", e)))?;

        let mut samples = Vec::new();
        for row in reader.deserialize::<MetadataRow>() {
            let row =
                row.map_err(|e| DermascopeError::Dataset(format!("malformed metadata row: {}", e)))?;

            let file_name = format!("{}.jpg", row.image_id);
            if !present.contains(&file_name) {
                continue;
            }

            let Some(label) = taxonomy.index_of_code(&row.dx) else {
                warn!("Unknown dx code '{}' for image {}", row.dx, row.image_id);
                continue;
            };

            samples.push(LesionSample {
                path: images_dir.join(file_name),
                label,
            });
        }

        info!(
            "Loaded {} {} samples from {:?}",
            samples.len(),
            if train { "training" } else { "test" },
            root
        );

        Ok(Self { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples per class.
    pub fn class_distribution(&self) -> Vec<usize> {
        let mut counts = vec![0usize; crate::NUM_CLASSES];
        for sample in &self.samples {
            if sample.label < counts.len() {
                counts[sample.label] += 1;
            }
        }
        counts
    }
}
