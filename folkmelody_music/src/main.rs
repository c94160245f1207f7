// Folk Melody Pipeline: CLI entry point.
//
// Three stages, each reading what the previous one wrote:
//   preprocess: kern corpus → per-song encodings → merged corpus + mapping
//   train:      merged corpus + mapping → model file
//   generate:   model + mapping + seed → MIDI or LilyPond file
//
// Usage:
//   cargo run -p folkmelody_music -- [--config FILE] preprocess [--dataset DIR]
//   cargo run -p folkmelody_music -- train [--order N]
//   cargo run -p folkmelody_music -- generate --seed "67 _ 67 _ 67 _ _ 65 64 _ 64 _ 64 _ _"
//     [--steps N] [--temperature T] [--format midi|lilypond] [--output FILE] [--rng-seed N]

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use folkmelody_music::config::PipelineConfig;
use folkmelody_music::corpus::{load, prepare_corpus};
use folkmelody_music::generator::{GenerationParams, MelodyGenerator};
use folkmelody_music::markov::MarkovModel;
use folkmelody_music::render::{RenderFormat, save_melody};
use folkmelody_music::token::join_tokens;
use folkmelody_music::training::generate_training_sequences;
use folkmelody_music::vocab::Vocabulary;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "folkmelody")]
#[command(about = "Folk melody corpus preparation, training, and generation")]
#[command(version)]
struct Args {
    /// JSON pipeline configuration; missing fields use the defaults
    #[arg(short, long, env = "FOLKMELODY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load, filter, transpose, and encode the kern corpus, then merge it and
    /// build the token mapping
    Preprocess {
        /// Root of the kern corpus
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
    /// Fit the Markov model on the merged corpus
    Train {
        /// Highest context order to count
        #[arg(long)]
        order: Option<usize>,
    },
    /// Generate a melody from a seed and render it
    Generate {
        /// Space-delimited seed tokens, e.g. "60 _ 62 _"
        #[arg(long)]
        seed: String,
        #[arg(long)]
        steps: Option<usize>,
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long, default_value = "midi")]
        format: RenderFormat,
        /// Output file; defaults to the configured output path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Seed for the sampler RNG (random if omitted)
        #[arg(long)]
        rng_seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folkmelody_music=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match args.command {
        Command::Preprocess { dataset } => {
            if let Some(dataset) = dataset {
                config.dataset_path = dataset;
            }
            let (report, vocab) = prepare_corpus(&config).context("Preprocessing failed")?;
            info!(
                loaded = report.loaded,
                kept = report.kept,
                rejected = report.rejected,
                vocabulary = vocab.len(),
                "corpus ready"
            );
        }
        Command::Train { order } => {
            if let Some(order) = order {
                config.markov_order = order;
            }
            config.validate()?;
            train(&config)?;
        }
        Command::Generate {
            seed,
            steps,
            temperature,
            format,
            output,
            rng_seed,
        } => {
            if let Some(steps) = steps {
                config.num_steps = steps;
            }
            if let Some(temperature) = temperature {
                config.temperature = temperature;
            }
            config.validate()?;
            let output = output.unwrap_or_else(|| {
                config.output_path.with_extension(format.extension())
            });
            generate(&config, &seed, format, &output, rng_seed)?;
        }
    }
    Ok(())
}

fn train(config: &PipelineConfig) -> Result<()> {
    let songs = load(&config.single_file_dataset).with_context(|| {
        format!(
            "Failed to read merged corpus {} (run preprocess first)",
            config.single_file_dataset.display()
        )
    })?;
    let vocab = Vocabulary::load(&config.mapping_path).context("Failed to load mapping")?;
    let sequences = generate_training_sequences(&songs, &vocab, config.sequence_length)
        .context("Failed to build training sequences")?;
    if sequences.is_empty() {
        bail!(
            "merged corpus is not longer than one {}-token window",
            config.sequence_length
        );
    }
    let model = MarkovModel::fit(&sequences, config.markov_order)?;
    model
        .save(&config.model_path)
        .with_context(|| format!("Failed to write model {}", config.model_path.display()))?;
    info!(path = %config.model_path.display(), "model saved");
    Ok(())
}

fn generate(
    config: &PipelineConfig,
    seed: &str,
    format: RenderFormat,
    output: &std::path::Path,
    rng_seed: Option<u64>,
) -> Result<()> {
    let model = MarkovModel::load(&config.model_path)
        .with_context(|| format!("Failed to load model {}", config.model_path.display()))?;
    let vocab = Vocabulary::load(&config.mapping_path).context("Failed to load mapping")?;
    let generator = MelodyGenerator::new(model, vocab, config.sequence_length)?;

    let mut rng = match rng_seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_os_rng(),
    };
    let params = GenerationParams {
        num_steps: config.num_steps,
        max_sequence_length: config.sequence_length,
        temperature: config.temperature,
    };
    let melody = generator.generate_from_str(seed, &params, &mut rng)?;
    info!(steps = melody.steps, stop = ?melody.stop_reason, "generated melody");

    save_melody(
        &melody.tokens,
        config.step_duration,
        format,
        config.tempo_bpm,
        output,
    )?;
    println!("{}", join_tokens(&melody.tokens));
    Ok(())
}
