// Autoregressive melody generation.
//
// The context starts as `sequence_length` boundary markers (the same run that
// precedes every song in the training corpus) followed by the seed tokens.
// Each step:
// 1. keep the last `input_length` ids,
// 2. one-hot encode and ask the model for next-token probabilities,
// 3. sample with temperature (sampler.rs),
// 4. append the id to the context; stop if it decodes to the boundary
//    marker, otherwise append the token to the melody.
//
// The returned melody begins with the seed itself and never contains the
// boundary marker that stopped it.

use crate::error::{MelodyError, Result};
use crate::model::SequenceModel;
use crate::sampler::sample_with_temperature;
use crate::token::{Token, parse_tokens};
use crate::training::OneHotSequence;
use crate::vocab::Vocabulary;
use rand::Rng;
use tracing::debug;

/// Knobs for one generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Maximum number of sampled tokens.
    pub num_steps: usize,
    /// Context window fed to the model.
    pub max_sequence_length: usize,
    pub temperature: f64,
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model produced the boundary marker.
    Boundary,
    /// `num_steps` tokens were sampled.
    StepBudget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedMelody {
    /// Seed followed by the sampled tokens.
    pub tokens: Vec<Token>,
    /// Number of model calls made.
    pub steps: usize,
    pub stop_reason: StopReason,
}

/// A loaded model plus the vocabulary it was trained against.
pub struct MelodyGenerator<M> {
    model: M,
    vocab: Vocabulary,
    start_symbols: Vec<Token>,
}

impl<M: SequenceModel> MelodyGenerator<M> {
    /// `start_length` boundary markers are prepended to every seed; use the
    /// corpus sequence length.
    pub fn new(model: M, vocab: Vocabulary, start_length: usize) -> Result<Self> {
        if model.vocab_size() != vocab.len() {
            return Err(MelodyError::ModelShape(format!(
                "model has {} classes but the vocabulary has {} tokens",
                model.vocab_size(),
                vocab.len()
            )));
        }
        if start_length > 0 && !vocab.contains(Token::Boundary) {
            return Err(MelodyError::UnknownToken(Token::Boundary.to_string()));
        }
        Ok(MelodyGenerator {
            model,
            vocab,
            start_symbols: vec![Token::Boundary; start_length],
        })
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Parse a space-delimited seed and generate from it.
    pub fn generate_from_str(
        &self,
        seed: &str,
        params: &GenerationParams,
        rng: &mut impl Rng,
    ) -> Result<GeneratedMelody> {
        let seed = parse_tokens(seed)?;
        self.generate_melody(&seed, params, rng)
    }

    pub fn generate_melody(
        &self,
        seed: &[Token],
        params: &GenerationParams,
        rng: &mut impl Rng,
    ) -> Result<GeneratedMelody> {
        let mut melody = seed.to_vec();

        let mut context: Vec<usize> = self.vocab.encode(&self.start_symbols)?;
        context.extend(self.vocab.encode(seed)?);

        let window = params.max_sequence_length.min(self.model.input_length());
        if window == 0 {
            return Err(MelodyError::ModelShape("context window is empty".into()));
        }

        for step in 0..params.num_steps {
            if context.len() > window {
                context.drain(..context.len() - window);
            }

            let onehot = OneHotSequence::from_ids(&context, self.vocab.len())?;
            let probabilities = self.model.predict(&onehot)?;
            if probabilities.len() != self.vocab.len() {
                return Err(MelodyError::ModelShape(format!(
                    "model returned {} probabilities for {} tokens",
                    probabilities.len(),
                    self.vocab.len()
                )));
            }

            let output_id = sample_with_temperature(&probabilities, params.temperature, rng)?;
            context.push(output_id);

            let output_token = self.vocab.token_of(output_id)?;
            if output_token == Token::Boundary {
                debug!(steps = step + 1, "boundary sampled");
                return Ok(GeneratedMelody {
                    tokens: melody,
                    steps: step + 1,
                    stop_reason: StopReason::Boundary,
                });
            }
            melody.push(output_token);
        }

        Ok(GeneratedMelody {
            tokens: melody,
            steps: params.num_steps,
            stop_reason: StopReason::StepBudget,
        })
    }
}
