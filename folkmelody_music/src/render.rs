// Token stream → notes and rests → file.
//
// Each onset token is merged with the run of hold tokens after it into one
// event lasting `(1 + holds) * step_duration` quarter lengths. This is the
// inverse of encode.rs up to time-step quantization.
//
// Holds with no onset before them have nothing to extend and are dropped. A
// boundary marker closes the current event. The writers for each output
// format live in midi.rs and lilypond.rs.

use crate::error::{MelodyError, Result};
use crate::lilypond::write_lilypond;
use crate::midi::write_midi;
use crate::score::Event;
use crate::token::Token;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Output formats for a rendered melody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    Midi,
    Lilypond,
}

impl RenderFormat {
    pub fn extension(self) -> &'static str {
        match self {
            RenderFormat::Midi => "mid",
            RenderFormat::Lilypond => "ly",
        }
    }
}

impl FromStr for RenderFormat {
    type Err = MelodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "midi" | "mid" => Ok(RenderFormat::Midi),
            "lilypond" | "ly" => Ok(RenderFormat::Lilypond),
            _ => Err(MelodyError::Render(format!("unknown format '{s}'"))),
        }
    }
}

/// Coalesce onset + holds into events.
pub fn tokens_to_events(melody: &[Token], step_duration: f64) -> Vec<Event> {
    let mut events = Vec::new();
    // Current onset and its step count.
    let mut current: Option<(Token, usize)> = None;
    let mut orphan_holds = 0usize;

    let flush = |current: &mut Option<(Token, usize)>, events: &mut Vec<Event>| {
        if let Some((onset, steps)) = current.take() {
            let quarter_length = steps as f64 * step_duration;
            match onset {
                Token::Pitch(p) => events.push(Event::note(p, quarter_length)),
                _ => events.push(Event::rest(quarter_length)),
            }
        }
    };

    for &token in melody {
        match token {
            Token::Pitch(_) | Token::Rest => {
                flush(&mut current, &mut events);
                current = Some((token, 1));
            }
            Token::Hold => match current.as_mut() {
                Some((_, steps)) => *steps += 1,
                None => orphan_holds += 1,
            },
            Token::Boundary => flush(&mut current, &mut events),
        }
    }
    flush(&mut current, &mut events);

    if orphan_holds > 0 {
        warn!(count = orphan_holds, "dropped hold tokens with no onset");
    }
    events
}

/// Render `melody` to `path` in `format`.
pub fn save_melody(
    melody: &[Token],
    step_duration: f64,
    format: RenderFormat,
    tempo_bpm: u16,
    path: &Path,
) -> Result<()> {
    let events = tokens_to_events(melody, step_duration);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| MelodyError::io_at(parent, e))?;
        }
    }
    match format {
        RenderFormat::Midi => write_midi(&events, tempo_bpm, path)?,
        RenderFormat::Lilypond => write_lilypond(&events, tempo_bpm, None, path)?,
    }
    info!(path = %path.display(), events = events.len(), ?format, "saved melody");
    Ok(())
}
