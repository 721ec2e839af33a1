//! Burn tensor integration for HAM10000 samples
//!
//! Converts decoded dermatoscopic images into CHW float arrays and collates
//! them into burn tensors. Preprocessing here (resize to the model input
//! extent, scale to [0, 1]) is the single source of truth shared by the
//! training engine and the inference pipeline.

use std::path::Path;

use burn::prelude::*;
use image::imageops::FilterType;
use image::{ImageReader, RgbImage};
use serde::{Deserialize, Serialize};

use crate::{IMAGE_HEIGHT, IMAGE_WIDTH};

/// A single lesion image ready for batching
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LesionItem {
    /// Image data as flattened CHW float array [3 * H * W], scaled to [0, 1]
    pub image: Vec<f32>,
    /// Class label (0-6)
    pub label: usize,
}

impl LesionItem {
    /// Load an image from disk, resize to the model input extent and scale
    /// pixel values to [0, 1].
    pub fn from_path(path: &Path, label: usize) -> anyhow::Result<Self> {
        let img = ImageReader::open(path)?.decode()?;
        let rgb = img
            .resize_exact(IMAGE_WIDTH, IMAGE_HEIGHT, FilterType::Triangle)
            .to_rgb8();

        Ok(Self {
            image: image_to_chw(&rgb),
            label,
        })
    }

    /// Create from pre-loaded pixel data
    pub fn from_data(image: Vec<f32>, label: usize) -> Self {
        Self { image, label }
    }
}

/// Convert an RGB image to a flattened CHW float array scaled to [0, 1].
pub fn image_to_chw(rgb: &RgbImage) -> Vec<f32> {
    let (width, height) = rgb.dimensions();
    let plane = (width * height) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (i, pixel) in rgb.pixels().enumerate() {
        data[i] = pixel[0] as f32 / 255.0;
        data[plane + i] = pixel[1] as f32 / 255.0;
        data[2 * plane + i] = pixel[2] as f32 / 255.0;
    }

    data
}

/// A batch of lesion images for training or evaluation
#[derive(Clone, Debug)]
pub struct LesionBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> LesionBatch<B> {
    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collates [`LesionItem`]s into [`LesionBatch`]es
#[derive(Clone, Debug)]
pub struct LesionBatcher {
    height: usize,
    width: usize,
}

impl Default for LesionBatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl LesionBatcher {
    /// Create a batcher for the default model input extent
    pub fn new() -> Self {
        Self {
            height: IMAGE_HEIGHT as usize,
            width: IMAGE_WIDTH as usize,
        }
    }

    /// Create a batcher with a custom extent (items must match)
    pub fn with_extent(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    /// Collate items into one batch on the given device.
    pub fn batch<B: Backend>(&self, items: &[LesionItem], device: &B::Device) -> LesionBatch<B> {
        let batch_size = items.len();

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, self.height, self.width]),
            device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        LesionBatch { images, targets }
    }
}
