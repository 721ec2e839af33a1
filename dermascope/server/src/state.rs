//! Application state for the prediction server
//!
//! Holds the loaded model behind the prediction service plus server
//! start-time bookkeeping. The service is read-only after startup, but
//! burn's lazily-initialized `Param` cells are not `Sync`, so it sits
//! behind a `Mutex` to let the state be shared across worker threads.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use dermascope::backend::DefaultBackend;
use dermascope::inference::PredictionService;

/// Shared application state
pub struct AppState {
    /// The prediction service wrapping the loaded model
    pub service: Mutex<PredictionService<DefaultBackend>>,
    /// Where the served model weights were loaded from
    pub model_path: PathBuf,
    /// Wall-clock server start time
    pub started_at: DateTime<Utc>,
    /// Monotonic start instant for uptime reporting
    started: Instant,
}

impl AppState {
    pub fn new(service: PredictionService<DefaultBackend>, model_path: PathBuf) -> Self {
        Self {
            service: Mutex::new(service),
            model_path,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;
