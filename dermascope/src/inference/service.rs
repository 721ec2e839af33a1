//! Prediction Service
//!
//! Transport-agnostic request handling: takes a parsed JSON body, validates
//! it, runs the explainer and produces a response value. Every failure mode
//! maps to a total `Failure` response; the service never panics or returns
//! a transport error of its own.

use burn::tensor::backend::Backend;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::inference::codec::{decode_image, encode_mask};
use crate::inference::explain::Explainer;
use crate::inference::precision::PrecisionLevel;

/// Response body for a prediction request. Serializes untagged: a success
/// carries the prediction fields, a failure carries only the error text.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PredictionResponse {
    Success {
        success: bool,
        prediction: String,
        probability: f64,
        /// Saliency overlay as nested arrays; `null` when no explanation
        /// was requested.
        image: Option<Vec<Vec<Vec<f32>>>>,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl PredictionResponse {
    fn failure(error: impl Into<String>) -> Self {
        PredictionResponse::Failure {
            success: false,
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PredictionResponse::Success { .. })
    }
}

/// Stateless request handler around a loaded model.
pub struct PredictionService<B: Backend> {
    explainer: Explainer<B>,
}

impl<B: Backend> PredictionService<B> {
    pub fn new(explainer: Explainer<B>) -> Self {
        Self { explainer }
    }

    /// Handle one prediction request.
    ///
    /// Expected body: `{"image": <base64>, "explain": <bool, optional>,
    /// "precision": <level name, optional>}`. Validation happens in field
    /// order; the first failing field determines the error text.
    pub fn handle(&self, body: &Value) -> PredictionResponse {
        let transport_text = match body.get("image") {
            None => return PredictionResponse::failure("Missing image"),
            Some(Value::String(text)) => text,
            Some(_) => {
                return PredictionResponse::failure(
                    "Invalid image: expected a base64-encoded string",
                )
            }
        };

        let explain = match body.get("explain") {
            None => false,
            Some(Value::Bool(flag)) => *flag,
            Some(_) => {
                return PredictionResponse::failure(
                    "Invalid type for explain: Should be a boolean",
                )
            }
        };

        let budget = match body.get("precision") {
            None => PrecisionLevel::default().sample_budget(),
            Some(Value::String(name)) => PrecisionLevel::resolve(name),
            Some(other) => {
                warn!("Non-string precision value {:?}, using fallback budget", other);
                crate::inference::precision::FALLBACK_SAMPLES
            }
        };

        let image = match decode_image(transport_text) {
            Ok(image) => image,
            Err(e) => return PredictionResponse::failure(format!("Invalid image: {}", e)),
        };

        debug!(
            "Prediction request: {}x{} image, explain={}, budget={}",
            image.width(),
            image.height(),
            explain,
            budget
        );

        match self.explainer.predict(&image, explain, budget) {
            Ok((prediction, mask)) => PredictionResponse::Success {
                success: true,
                prediction: prediction.label,
                probability: prediction.confidence,
                image: mask.as_ref().map(encode_mask),
            },
            Err(e) => PredictionResponse::failure(format!("Invalid image: {}", e)),
        }
    }

    pub fn explainer(&self) -> &Explainer<B> {
        &self.explainer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::codec::encode_bytes;
    use crate::model::{LesionClassifier, LesionClassifierConfig};
    use crate::taxonomy::LesionTaxonomy;
    use burn::backend::NdArray;
    use image::RgbImage;
    use serde_json::json;

    fn test_service() -> PredictionService<NdArray> {
        let device = Default::default();
        let config = LesionClassifierConfig::new().with_base_filters(2);
        let model = LesionClassifier::new(&config, &device);
        let explainer = Explainer::new(model, device).with_input_extent(24, 24);
        PredictionService::new(explainer)
    }

    fn png_payload(width: u32, height: u32) -> String {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 10) as u8, (y * 10) as u8, 100])
        });
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
        encode_bytes(&bytes)
    }

    #[test]
    fn test_missing_image_field() {
        let service = test_service();
        let response = service.handle(&json!({"explain": false}));

        assert!(!response.is_success());
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"], json!("Missing image"));
        // Failure bodies carry no prediction fields at all
        assert!(value.get("prediction").is_none());
    }

    #[test]
    fn test_non_string_image_field() {
        // Present-but-wrong-type is an invalid image, not a missing one.
        let service = test_service();

        for body in [json!({"image": 17}), json!({"image": [1, 2, 3]})] {
            let response = service.handle(&body);
            let value = serde_json::to_value(&response).unwrap();
            assert_eq!(value["success"], json!(false));
            assert!(value["error"].as_str().unwrap().starts_with("Invalid image: "));
        }
    }

    #[test]
    fn test_invalid_explain_type() {
        let service = test_service();
        let response = service.handle(&json!({
            "image": png_payload(16, 16),
            "explain": "yes"
        }));

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value["error"],
            json!("Invalid type for explain: Should be a boolean")
        );
    }

    #[test]
    fn test_undecodable_payload() {
        let service = test_service();
        let response = service.handle(&json!({"image": "!!not-base64!!"}));

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], json!(false));
        let error = value["error"].as_str().unwrap();
        assert!(error.starts_with("Invalid image: "));
    }

    #[test]
    fn test_prediction_without_explanation() {
        let service = test_service();
        let response = service.handle(&json!({"image": png_payload(20, 20)}));

        assert!(response.is_success());
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], json!(true));
        assert!(value["image"].is_null());

        let label = value["prediction"].as_str().unwrap();
        assert!(LesionTaxonomy::new().index_of(label).is_some());

        let probability = value["probability"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&probability));
    }

    #[test]
    fn test_prediction_with_explanation() {
        let service = test_service();
        let response = service.handle(&json!({
            "image": png_payload(18, 12),
            "explain": true,
            "precision": "this is not a level"
        }));

        assert!(response.is_success());
        let value = serde_json::to_value(&response).unwrap();
        // Mask dimensions follow the decoded input image
        let rows = value["image"].as_array().unwrap();
        assert_eq!(rows.len(), 12);
        assert_eq!(rows[0].as_array().unwrap().len(), 18);
        assert_eq!(rows[0][0].as_array().unwrap().len(), 3);
    }
}
