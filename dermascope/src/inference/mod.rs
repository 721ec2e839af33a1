//! Inference module: image decoding, explainable prediction and the
//! transport-agnostic request service.

pub mod codec;
pub mod explain;
pub mod precision;
pub mod service;

pub use codec::{decode_image, encode_mask, DecodeError};
pub use explain::{Explainer, Prediction, SaliencyMask};
pub use precision::{PrecisionLevel, FALLBACK_SAMPLES};
pub use service::{PredictionResponse, PredictionService};
