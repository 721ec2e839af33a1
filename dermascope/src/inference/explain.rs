//! Explanation Engine
//!
//! Produces a class prediction for an image and, on request, a
//! perturbation-sampled saliency mask. The image is partitioned into a grid
//! of superpixels; random subsets of regions are blanked out, every variant
//! is scored through the classifier in batched forward passes, and a ridge
//! regression over region presence estimates each region's contribution to
//! the predicted class. The most influential positively-contributing
//! regions are marked on an overlay of the original image.

use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::dataset::image_to_chw;
use crate::model::LesionClassifier;
use crate::taxonomy::LesionTaxonomy;
use crate::utils::error::{DermascopeError, Result};
use crate::{IMAGE_HEIGHT, IMAGE_WIDTH, NUM_CLASSES};

/// Superpixel grid extent: the image is partitioned into ROWS x COLS
/// rectangular regions, the atomic units of perturbation.
const SUPERPIXEL_ROWS: usize = 8;
const SUPERPIXEL_COLS: usize = 8;

/// How many positively-contributing regions are highlighted.
const TOP_REGIONS: usize = 5;

/// Variants scored per forward pass while sampling.
const SCORING_CHUNK: usize = 16;

/// Ridge regularization for the local linear fit.
const RIDGE_LAMBDA: f32 = 1e-3;

/// Boundary highlight color in [0, 1] scale (yellow).
const BOUNDARY_COLOR: [f32; 3] = [1.0, 1.0, 0.0];

/// A class prediction with its softmax confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

/// Spatial saliency overlay: the input image in [0, 1] scale with the
/// supporting superpixels' boundaries marked. Stored HWC.
#[derive(Debug, Clone)]
pub struct SaliencyMask {
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl SaliencyMask {
    /// All-zero mask of the given spatial extent.
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            data: vec![0.0; height * width * 3],
        }
    }

    /// Build from an image, scaling pixel values to [0, 1].
    pub fn from_image(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let mut mask = Self::new(height as usize, width as usize);
        for (x, y, pixel) in image.enumerate_pixels() {
            mask.set(
                y as usize,
                x as usize,
                [
                    pixel[0] as f32 / 255.0,
                    pixel[1] as f32 / 255.0,
                    pixel[2] as f32 / 255.0,
                ],
            );
        }
        mask
    }

    /// (height, width)
    pub fn dimensions(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn set(&mut self, y: usize, x: usize, rgb: [f32; 3]) {
        let base = (y * self.width + x) * 3;
        self.data[base..base + 3].copy_from_slice(&rgb);
    }

    pub fn get(&self, y: usize, x: usize) -> [f32; 3] {
        let base = (y * self.width + x) * 3;
        [self.data[base], self.data[base + 1], self.data[base + 2]]
    }

    /// Lossless conversion to nested arrays ([H][W][3]).
    pub fn to_nested(&self) -> Vec<Vec<Vec<f32>>> {
        (0..self.height)
            .map(|y| (0..self.width).map(|x| self.get(y, x).to_vec()).collect())
            .collect()
    }
}

/// Superpixel id for a pixel, given the image extent.
fn region_of(x: usize, y: usize, width: usize, height: usize) -> usize {
    let cell_w = width.div_ceil(SUPERPIXEL_COLS).max(1);
    let cell_h = height.div_ceil(SUPERPIXEL_ROWS).max(1);
    let col = (x / cell_w).min(SUPERPIXEL_COLS - 1);
    let row = (y / cell_h).min(SUPERPIXEL_ROWS - 1);
    row * SUPERPIXEL_COLS + col
}

/// Draw `budget` random on/off region subsets. The first sample keeps every
/// region on so the fit always sees the unperturbed image.
fn sample_region_masks(
    rng: &mut ChaCha8Rng,
    num_regions: usize,
    budget: usize,
) -> Vec<Vec<bool>> {
    let budget = budget.max(1);
    let mut masks = Vec::with_capacity(budget);
    masks.push(vec![true; num_regions]);
    for _ in 1..budget {
        masks.push((0..num_regions).map(|_| rng.gen_bool(0.5)).collect());
    }
    masks
}

/// Blank out every pixel whose region is off (hide color is black).
fn apply_region_mask(image: &RgbImage, mask: &[bool]) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        if !mask[region_of(x as usize, y as usize, width as usize, height as usize)] {
            *pixel = Rgb([0, 0, 0]);
        }
    }
    out
}

/// Fit a ridge regression of region presence against the target scores and
/// return one coefficient per region. The fit only aggregates sums over
/// samples, so it is invariant to sample order.
fn fit_region_weights(masks: &[Vec<bool>], scores: &[f32], num_regions: usize) -> Vec<f32> {
    let dim = num_regions + 1; // bias column last

    // Normal equations: (X^T X + lambda I) w = X^T y
    let mut a = vec![vec![0.0f32; dim]; dim];
    let mut b = vec![0.0f32; dim];

    for (mask, &score) in masks.iter().zip(scores) {
        let feature = |j: usize| -> f32 {
            if j == num_regions {
                1.0
            } else if mask[j] {
                1.0
            } else {
                0.0
            }
        };
        for i in 0..dim {
            let fi = feature(i);
            if fi == 0.0 {
                continue;
            }
            b[i] += fi * score;
            for (j, row) in a[i].iter_mut().enumerate() {
                *row += fi * feature(j);
            }
        }
    }
    for (i, row) in a.iter_mut().enumerate() {
        row[i] += RIDGE_LAMBDA;
    }

    // Gaussian elimination with partial pivoting; the ridge term keeps the
    // system non-singular.
    for col in 0..dim {
        let pivot_row = (col..dim)
            .max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))
            .unwrap_or(col);
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        let pivot = a[col][col];
        if pivot.abs() < f32::EPSILON {
            continue;
        }

        for row in col + 1..dim {
            let factor = a[row][col] / pivot;
            if factor == 0.0 {
                continue;
            }
            for k in col..dim {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut weights = vec![0.0f32; dim];
    for row in (0..dim).rev() {
        let mut sum = b[row];
        for col in row + 1..dim {
            sum -= a[row][col] * weights[col];
        }
        if a[row][row].abs() >= f32::EPSILON {
            weights[row] = sum / a[row][row];
        }
    }

    weights.truncate(num_regions);
    weights
}

/// Runs predictions and perturbation-based explanations for a loaded model.
///
/// Holds the execution context (device) explicitly; the model is read-only
/// for the lifetime of the explainer and every forward pass runs in
/// inference mode.
pub struct Explainer<B: Backend> {
    model: LesionClassifier<B>,
    taxonomy: LesionTaxonomy,
    device: B::Device,
    input_height: u32,
    input_width: u32,
    seed: u64,
}

impl<B: Backend> Explainer<B> {
    pub fn new(model: LesionClassifier<B>, device: B::Device) -> Self {
        Self {
            model,
            taxonomy: LesionTaxonomy::new(),
            device,
            input_height: IMAGE_HEIGHT,
            input_width: IMAGE_WIDTH,
            seed: 42,
        }
    }

    /// Override the model input extent (the default is the HAM10000 native
    /// 450x600).
    pub fn with_input_extent(mut self, height: u32, width: u32) -> Self {
        self.input_height = height;
        self.input_width = width;
        self
    }

    /// Seed for the perturbation RNG; explanations are reproducible for a
    /// given model, image and budget.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Resize to the model input extent and scale to [0, 1], matching the
    /// training batcher's preprocessing.
    fn preprocess(&self, image: &RgbImage) -> Vec<f32> {
        let resized = image::imageops::resize(
            image,
            self.input_width,
            self.input_height,
            FilterType::Triangle,
        );
        image_to_chw(&resized)
    }

    /// Score a batch of images: stack, one forward pass in inference mode,
    /// softmax, one class-probability vector per image.
    pub fn batch_prediction(&self, images: &[&RgbImage]) -> Result<Vec<Vec<f32>>> {
        let batch_size = images.len();
        let height = self.input_height as usize;
        let width = self.input_width as usize;

        let data: Vec<f32> = images.iter().flat_map(|img| self.preprocess(img)).collect();
        let batch = Tensor::<B, 4>::from_floats(
            TensorData::new(data, [batch_size, 3, height, width]),
            &self.device,
        );

        let probs = self.model.forward_softmax(batch);
        let flat: Vec<f32> = probs
            .into_data()
            .to_vec()
            .map_err(|e| DermascopeError::Inference(format!("failed to read logits: {:?}", e)))?;

        Ok(flat.chunks(NUM_CLASSES).map(|c| c.to_vec()).collect())
    }

    /// Predict the class of `image` and, when `explain` is set, compute a
    /// saliency mask using `budget` perturbation samples. The no-explain
    /// path performs a single forward pass and no sampling work.
    pub fn predict(
        &self,
        image: &DynamicImage,
        explain: bool,
        budget: usize,
    ) -> Result<(Prediction, Option<SaliencyMask>)> {
        let rgb = image.to_rgb8();

        let probs = self.batch_prediction(&[&rgb])?;
        let row = probs
            .first()
            .ok_or_else(|| DermascopeError::Inference("empty prediction batch".to_string()))?;

        let (class_idx, confidence) = row
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .ok_or_else(|| DermascopeError::Inference("empty probability vector".to_string()))?;

        let label = self
            .taxonomy
            .class_name(class_idx)
            .ok_or_else(|| {
                DermascopeError::Inference(format!("class index {} outside taxonomy", class_idx))
            })?
            .to_string();

        let prediction = Prediction {
            label,
            confidence: *confidence as f64,
        };

        if !explain {
            return Ok((prediction, None));
        }

        let mask = self.explain(&rgb, class_idx, budget)?;
        Ok((prediction, Some(mask)))
    }

    /// Perturbation sampling + local fit + overlay rendering.
    fn explain(&self, image: &RgbImage, class_idx: usize, budget: usize) -> Result<SaliencyMask> {
        let (width, height) = image.dimensions();
        let (width, height) = (width as usize, height as usize);
        let num_regions = SUPERPIXEL_ROWS * SUPERPIXEL_COLS;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let masks = sample_region_masks(&mut rng, num_regions, budget);

        debug!(
            "Explaining class {} with {} perturbation samples over {} regions",
            class_idx,
            masks.len(),
            num_regions
        );

        // Score every variant; chunked so peak tensor memory stays bounded
        // at native resolution. Each chunk is one batched forward pass.
        let mut scores = Vec::with_capacity(masks.len());
        for chunk in masks.chunks(SCORING_CHUNK) {
            let variants: Vec<RgbImage> = chunk
                .iter()
                .map(|mask| apply_region_mask(image, mask))
                .collect();
            let refs: Vec<&RgbImage> = variants.iter().collect();
            for row in self.batch_prediction(&refs)? {
                scores.push(row[class_idx]);
            }
        }

        let weights = fit_region_weights(&masks, &scores, num_regions);

        // Top positively-contributing regions only.
        let mut ranked: Vec<(usize, f32)> = weights
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, w)| w > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(TOP_REGIONS);

        let selected: Vec<bool> = {
            let mut selected = vec![false; num_regions];
            for &(region, _) in &ranked {
                selected[region] = true;
            }
            selected
        };

        // Overlay: original image in [0, 1] with selected region boundaries
        // marked.
        let mut overlay = SaliencyMask::from_image(image);
        for y in 0..height {
            for x in 0..width {
                let region = region_of(x, y, width, height);
                if !selected[region] {
                    continue;
                }
                let on_boundary = [(1i64, 0i64), (-1, 0), (0, 1), (0, -1)]
                    .iter()
                    .any(|&(dx, dy)| {
                        let nx = x as i64 + dx;
                        let ny = y as i64 + dy;
                        nx >= 0
                            && ny >= 0
                            && (nx as usize) < width
                            && (ny as usize) < height
                            && region_of(nx as usize, ny as usize, width, height) != region
                    });
                if on_boundary {
                    overlay.set(y, x, BOUNDARY_COLOR);
                }
            }
        }

        Ok(overlay)
    }

    pub fn taxonomy(&self) -> &LesionTaxonomy {
        &self.taxonomy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LesionClassifierConfig;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn test_explainer() -> Explainer<TestBackend> {
        let device = Default::default();
        let config = LesionClassifierConfig::new().with_base_filters(2);
        let model = LesionClassifier::new(&config, &device);
        Explainer::new(model, device).with_input_extent(24, 24)
    }

    fn gradient_image(width: u32, height: u32) -> DynamicImage {
        let mut img = RgbImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([(x * 8) as u8, (y * 8) as u8, 128]);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_predict_without_explain_has_no_mask() {
        let explainer = test_explainer();
        let (prediction, mask) = explainer.predict(&gradient_image(20, 20), false, 1000).unwrap();

        assert!(mask.is_none());
        assert!((0.0..=1.0).contains(&prediction.confidence));
        assert!(LesionTaxonomy::new().index_of(&prediction.label).is_some());
    }

    #[test]
    fn test_mask_matches_input_extent() {
        let explainer = test_explainer();
        let (_, mask) = explainer.predict(&gradient_image(20, 14), true, 8).unwrap();

        let mask = mask.unwrap();
        assert_eq!(mask.dimensions(), (14, 20));
    }

    #[test]
    fn test_sample_budget_is_honored() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let masks = sample_region_masks(&mut rng, 64, 37);
        assert_eq!(masks.len(), 37);
        assert!(masks[0].iter().all(|&on| on));
    }

    #[test]
    fn test_region_grid_is_stable() {
        assert_eq!(region_of(0, 0, 64, 64), 0);
        assert_eq!(
            region_of(63, 63, 64, 64),
            SUPERPIXEL_ROWS * SUPERPIXEL_COLS - 1
        );
        // 1x1 image still maps into the grid
        assert_eq!(region_of(0, 0, 1, 1), 0);
    }

    #[test]
    fn test_fit_recovers_influential_region() {
        // Score depends only on region 3 being present.
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let masks = sample_region_masks(&mut rng, 16, 200);
        let scores: Vec<f32> = masks
            .iter()
            .map(|m| if m[3] { 0.9 } else { 0.1 })
            .collect();

        let weights = fit_region_weights(&masks, &scores, 16);

        let (best, _) = weights
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .unwrap();
        assert_eq!(best, 3);
        assert!(weights[3] > 0.5);
    }

    #[test]
    fn test_fit_is_permutation_invariant() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let masks = sample_region_masks(&mut rng, 8, 64);
        let scores: Vec<f32> = masks
            .iter()
            .map(|m| m.iter().filter(|&&on| on).count() as f32 * 0.1)
            .collect();

        let forward = fit_region_weights(&masks, &scores, 8);

        let mut reversed_masks = masks.clone();
        reversed_masks.reverse();
        let mut reversed_scores = scores.clone();
        reversed_scores.reverse();
        let reversed = fit_region_weights(&reversed_masks, &reversed_scores, 8);

        for (a, b) in forward.iter().zip(&reversed) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_saliency_mask_nested_round_trip() {
        let mut mask = SaliencyMask::new(2, 2);
        mask.set(1, 0, [0.25, 0.5, 0.75]);

        let nested = mask.to_nested();
        assert_eq!(nested[1][0], vec![0.25, 0.5, 0.75]);
        assert_eq!(nested[0][1], vec![0.0, 0.0, 0.0]);
    }
}
