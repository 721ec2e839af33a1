//! Dermascope Prediction Server
//!
//! HTTP API server exposing the skin lesion classifier. Loads the model
//! once at startup and serves classification requests with optional
//! saliency explanations.

mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use dermascope::backend::{backend_name, default_device, DefaultBackend};
use dermascope::inference::{Explainer, PredictionService};
use dermascope::model::load_model;

use crate::state::AppState;

/// Dermascope Prediction Server
#[derive(Parser, Debug)]
#[command(name = "dermascope-server")]
#[command(version)]
#[command(about = "HTTP prediction API for skin lesion classification")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "8089")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Path to the trained model
    #[arg(short, long, env = "DERMASCOPE_MODEL", default_value = "model/model_dermascope")]
    model: PathBuf,

    /// Seed for the explanation sampler
    #[arg(long, default_value = "42")]
    seed: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .init();

    info!("Dermascope Prediction Server v{}", env!("CARGO_PKG_VERSION"));
    info!("  Backend: {}", backend_name());
    info!("  Model:   {:?}", cli.model);

    let device = default_device();
    let model = load_model::<DefaultBackend>(&cli.model, &device)?;
    let explainer = Explainer::new(model, device).with_seed(cli.seed);
    let service = PredictionService::new(explainer);

    let state = Arc::new(AppState::new(service, cli.model));

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/predict", post(routes::predict::predict))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
