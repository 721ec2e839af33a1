//! Model module: the burn CNN classifier and weight persistence.

pub mod cnn;

use std::path::Path;

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::backend::Backend;

pub use cnn::{LesionClassifier, LesionClassifierConfig};

use crate::utils::error::{DermascopeError, Result};

/// Load saved model weights into a freshly initialized classifier.
pub fn load_model<B: Backend>(path: &Path, device: &B::Device) -> Result<LesionClassifier<B>> {
    let config = LesionClassifierConfig::new();
    let model = LesionClassifier::new(&config, device);

    model
        .load_file(path.to_path_buf(), &CompactRecorder::new(), device)
        .map_err(|e| {
            DermascopeError::Persistence(format!(
                "failed to load model from {:?}: {:?}",
                path, e
            ))
        })
}
