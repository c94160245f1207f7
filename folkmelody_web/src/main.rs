// Folk Melody web front end: server entry point.
//
// Loads the pipeline config, the trained model, and the token mapping once,
// then serves the seed form on the given port until Ctrl+C or SIGTERM.
//
// Usage:
//   cargo run -p folkmelody_web -- [--port 5000] [--config FILE]
//     [--model model.json] [--mapping Mapping.json]

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use folkmelody_music::config::PipelineConfig;
use folkmelody_music::generator::MelodyGenerator;
use folkmelody_music::markov::MarkovModel;
use folkmelody_music::vocab::Vocabulary;
use folkmelody_web::{AppState, create_router};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "folkmelody_web")]
#[command(about = "Web form that generates folk melodies from a seed")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5000", env = "FOLKMELODY_PORT")]
    port: u16,

    /// JSON pipeline configuration
    #[arg(short, long, env = "FOLKMELODY_CONFIG")]
    config: Option<PathBuf>,

    /// Trained model file (overrides the config)
    #[arg(long, env = "FOLKMELODY_MODEL")]
    model: Option<PathBuf>,

    /// Token mapping file (overrides the config)
    #[arg(long, env = "FOLKMELODY_MAPPING")]
    mapping: Option<PathBuf>,

    /// Where rendered melodies are written (overrides the config)
    #[arg(long, env = "FOLKMELODY_OUTPUT")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "folkmelody_music=info,folkmelody_web=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(model) = args.model {
        config.model_path = model;
    }
    if let Some(mapping) = args.mapping {
        config.mapping_path = mapping;
    }
    if let Some(output) = args.output {
        config.output_path = output;
    }

    let model = MarkovModel::load(&config.model_path)
        .with_context(|| format!("Failed to load model {}", config.model_path.display()))?;
    let vocab = Vocabulary::load(&config.mapping_path)
        .with_context(|| format!("Failed to load mapping {}", config.mapping_path.display()))?;
    let generator = MelodyGenerator::new(model, vocab, config.sequence_length)
        .context("Model and mapping do not match")?;
    info!(
        vocabulary = generator.vocab().len(),
        model = %config.model_path.display(),
        "model loaded"
    );

    let app = create_router(AppState::new(generator, config));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
