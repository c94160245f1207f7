// Error type shared by every stage of the pipeline.
//
// Nothing in the pipeline is retried: an unmapped token, a malformed kern
// file, or a degenerate probability vector aborts the current run (or the
// current web request). The variants exist so callers can tell a bad seed
// (user error) apart from a broken corpus or model artifact.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MelodyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on {path}: {source}")]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{path}:{line}: {message}")]
    KernParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// A well-formed token that the vocabulary has never seen.
    #[error("token '{0}' is not in the vocabulary")]
    UnknownToken(String),

    /// An id outside `[0, vocabulary size)`.
    #[error("token id {0} is not in the vocabulary")]
    UnknownTokenId(usize),

    /// Text that is not a pitch, rest, hold, or boundary marker.
    #[error("invalid token '{0}'")]
    InvalidToken(String),

    #[error("temperature must be finite and > 0, got {0}")]
    InvalidTemperature(f64),

    #[error("probability vector has no positive finite entry")]
    DegenerateDistribution,

    #[error("pitch {pitch} shifted by {shift} semitones leaves the MIDI range")]
    PitchOutOfRange { pitch: u8, shift: i32 },

    #[error("corpus is empty: {0}")]
    EmptyCorpus(String),

    #[error("model shape mismatch: {0}")]
    ModelShape(String),

    #[error("MIDI write failed: {0}")]
    Midi(String),

    #[error("cannot render: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, MelodyError>;

impl MelodyError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MelodyError::IoAt {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by the caller's input rather than the corpus,
    /// model, or filesystem.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            MelodyError::UnknownToken(_)
                | MelodyError::InvalidToken(_)
                | MelodyError::InvalidTemperature(_)
        )
    }
}
