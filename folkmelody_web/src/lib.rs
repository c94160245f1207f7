// Folk Melody web front end.
//
// A small axum app around a `MelodyGenerator`: a form for the seed, a
// generate endpoint that samples a melody and renders it to MIDI, and a
// download endpoint serving the last rendered file.
//
// Routes:
// - GET  /          seed form
// - POST /predict   form field `melody`; generates, renders, returns the page
//                   with the token sequence and a download link
// - GET  /download  the last rendered MIDI file as an attachment
//
// The model and vocabulary are loaded once at startup and shared read-only.
// All requests write the same output file, so rendering and serving it go
// through one lock.

pub mod error;
pub mod handlers;

use axum::{
    Router,
    routing::{get, post},
};
use folkmelody_music::config::PipelineConfig;
use folkmelody_music::generator::MelodyGenerator;
use folkmelody_music::markov::MarkovModel;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<MelodyGenerator<MarkovModel>>,
    pub config: Arc<PipelineConfig>,
    /// Held while the output file is written or read.
    pub output_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(generator: MelodyGenerator<MarkovModel>, config: PipelineConfig) -> Self {
        Self {
            generator: Arc::new(generator),
            config: Arc::new(config),
            output_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/predict", post(handlers::predict))
        .route("/download", get(handlers::download))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
