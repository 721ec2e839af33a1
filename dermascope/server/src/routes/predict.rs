//! Prediction endpoint
//!
//! Accepts the JSON request body as-is and delegates validation to the
//! prediction service, which maps every failure mode to a JSON error
//! response. Model inference is CPU-bound, so it runs on the blocking pool
//! to keep the async workers free.

use axum::{extract::State, Json};
use serde_json::Value;
use tracing::error;

use dermascope::inference::PredictionResponse;

use crate::state::SharedState;

/// POST /predict - Classify a base64-encoded image
pub async fn predict(
    State(state): State<SharedState>,
    Json(body): Json<Value>,
) -> Json<PredictionResponse> {
    let result = tokio::task::spawn_blocking(move || state.service.lock().unwrap().handle(&body)).await;

    match result {
        Ok(response) => Json(response),
        Err(e) => {
            error!("Prediction task failed: {}", e);
            Json(PredictionResponse::Failure {
                success: false,
                error: "Internal server error".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use dermascope::inference::{Explainer, PredictionService};
    use dermascope::model::{LesionClassifier, LesionClassifierConfig};
    use image::RgbImage;
    use serde_json::json;
    use std::sync::Arc;

    fn test_state() -> SharedState {
        let device = Default::default();
        let config = LesionClassifierConfig::new().with_base_filters(2);
        let model = LesionClassifier::new(&config, &device);
        let explainer = Explainer::new(model, device).with_input_extent(24, 24);
        Arc::new(AppState::new(
            PredictionService::new(explainer),
            "model/model_dermascope".into(),
        ))
    }

    fn png_payload() -> String {
        let img = RgbImage::from_fn(16, 16, |x, y| image::Rgb([x as u8 * 10, y as u8 * 10, 80]));
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
        STANDARD.encode(&bytes)
    }

    #[tokio::test]
    async fn test_predict_handler_success() {
        let state = test_state();
        let body = json!({"image": png_payload()});

        let Json(response) = predict(State(state), Json(body)).await;
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["success"], json!(true));
        assert!(value["image"].is_null());
        assert!(value["prediction"].is_string());
    }

    #[tokio::test]
    async fn test_predict_handler_missing_image() {
        let state = test_state();

        let Json(response) = predict(State(state), Json(json!({}))).await;
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"], json!("Missing image"));
    }
}
