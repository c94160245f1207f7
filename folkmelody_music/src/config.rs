// Data-driven pipeline configuration.
//
// Every constant the pipeline depends on lives in `PipelineConfig`: corpus
// locations, the encoding time step, the duration whitelist, the context
// window length, and the generation defaults. `Default` carries the values
// the corpus and the shipped model were built with; a JSON file can override
// any subset of them.
//
// **Critical constraint:** `sequence_length`, `time_step`, and the mapping
// file must be identical between preprocessing, training, and generation.
// A model trained with one window length cannot be driven with another.

use crate::error::{MelodyError, Result};
use crate::midi::tempo_microseconds;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Quarter-length durations a song may contain to be kept in the corpus.
/// 1.0 is a quarter note; 0.25 a sixteenth.
pub const ACCEPTABLE_DURATIONS: [f64; 8] = [0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 4.0];

/// Number of tokens the model sees per prediction, and the number of
/// boundary markers written between songs.
pub const SEQUENCE_LENGTH: usize = 64;

/// Encoding granularity in quarter lengths (a sixteenth note).
pub const TIME_STEP: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the `**kern` corpus.
    pub dataset_path: PathBuf,
    /// Directory receiving one encoded file per kept song.
    pub save_dir: PathBuf,
    /// Merged corpus with boundary markers between songs.
    pub single_file_dataset: PathBuf,
    /// Token-to-id JSON object.
    pub mapping_path: PathBuf,
    /// Trained model artifact.
    pub model_path: PathBuf,
    pub sequence_length: usize,
    pub time_step: f64,
    pub acceptable_durations: Vec<f64>,
    /// Quarter length of one token when rendering a generated melody.
    pub step_duration: f64,
    /// Maximum number of tokens sampled per generation.
    pub num_steps: usize,
    pub temperature: f64,
    /// Highest context order the Markov model keeps counts for.
    pub markov_order: usize,
    /// Where the web front end writes the rendered melody.
    pub output_path: PathBuf,
    pub tempo_bpm: u16,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            dataset_path: PathBuf::from("Kern_Dataset/erk"),
            save_dir: PathBuf::from("Dataset"),
            single_file_dataset: PathBuf::from("Dataset_file"),
            mapping_path: PathBuf::from("Mapping.json"),
            model_path: PathBuf::from("model.json"),
            sequence_length: SEQUENCE_LENGTH,
            time_step: TIME_STEP,
            acceptable_durations: ACCEPTABLE_DURATIONS.to_vec(),
            step_duration: TIME_STEP,
            num_steps: 500,
            temperature: 0.3,
            markov_order: 8,
            output_path: PathBuf::from("GeneratedMusic/melody.mid"),
            tempo_bpm: 120,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file. Missing fields take their default values.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| MelodyError::io_at(path, e))?;
        let config: PipelineConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sequence_length == 0 {
            return Err(MelodyError::ModelShape(
                "sequence_length must be at least 1".into(),
            ));
        }
        if !(self.time_step > 0.0 && self.time_step.is_finite()) {
            return Err(MelodyError::ModelShape(format!(
                "time_step must be positive, got {}",
                self.time_step
            )));
        }
        if !(self.step_duration > 0.0 && self.step_duration.is_finite()) {
            return Err(MelodyError::ModelShape(format!(
                "step_duration must be positive, got {}",
                self.step_duration
            )));
        }
        if !(self.temperature > 0.0 && self.temperature.is_finite()) {
            return Err(MelodyError::InvalidTemperature(self.temperature));
        }
        if self.markov_order == 0 {
            return Err(MelodyError::ModelShape(
                "markov_order must be at least 1".into(),
            ));
        }
        tempo_microseconds(self.tempo_bpm)?;
        Ok(())
    }
}
