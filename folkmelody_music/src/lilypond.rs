// LilyPond sheet music output for rendered melodies.
//
// Converts note/rest events into a LilyPond (.ly) source file that can be
// engraved to PDF/SVG. The melody goes on a single treble staff in 4/4.
//
// LilyPond needs durations as power-of-two note values (with optional dots),
// and notes crossing barlines must be split into tied segments. Durations
// are handled in sixteenth-note units, the encoding's time step, so every
// event from a generated melody maps exactly.
//
// Uses absolute pitches (not \relative) for simplicity and correctness.

use crate::error::{MelodyError, Result};
use crate::score::Event;
use std::fmt::Write;
use std::path::Path;

/// Pitch class names in LilyPond notation (indexed by pitch class 0-11).
/// The corpus is in C major / A minor, so sharps read more naturally for
/// raised leading tones.
const LY_PITCH_NAMES: [&str; 12] = [
    "c", "cis", "d", "ees", "e", "f", "fis", "g", "gis", "a", "bes", "b",
];

/// Sixteenth notes per 4/4 bar.
const BAR_LENGTH: usize = 16;

/// Convert a MIDI pitch number to a LilyPond absolute pitch string.
///
/// LilyPond's `c` with no octave marks = MIDI 48 (C3).
/// Each `'` raises one octave, each `,` lowers one octave.
pub fn midi_to_ly_note(midi_pitch: u8) -> String {
    let pc = (midi_pitch % 12) as usize;
    let octave = (midi_pitch / 12) as i8 - 4;
    let mut result = LY_PITCH_NAMES[pc].to_string();
    if octave > 0 {
        for _ in 0..octave {
            result.push('\'');
        }
    } else {
        for _ in 0..(-octave) {
            result.push(',');
        }
    }
    result
}

/// A valid LilyPond duration: note value in sixteenths and its text form.
const DURATION_TABLE: [(usize, &str); 8] = [
    (16, "1"),
    (12, "2."),
    (8, "2"),
    (6, "4."),
    (4, "4"),
    (3, "8."),
    (2, "8"),
    (1, "16"),
];

/// Decompose a duration (in sixteenths) into LilyPond duration strings,
/// largest first. Multiple parts are connected with ties.
pub fn decompose_duration(mut sixteenths: usize) -> Vec<&'static str> {
    let mut parts = Vec::new();
    for &(value, name) in &DURATION_TABLE {
        while sixteenths >= value {
            parts.push(name);
            sixteenths -= value;
        }
    }
    parts
}

/// Split a duration at barlines. Returns the fragment lengths, each fitting
/// inside one bar.
pub fn split_at_barlines(start: usize, duration: usize) -> Vec<usize> {
    let mut fragments = Vec::new();
    let mut remaining = duration;
    let mut pos = start;
    while remaining > 0 {
        let bar_end = (pos / BAR_LENGTH + 1) * BAR_LENGTH;
        let frag = remaining.min(bar_end - pos);
        fragments.push(frag);
        remaining -= frag;
        pos += frag;
    }
    fragments
}

fn to_sixteenths(quarter_length: f64) -> Result<usize> {
    let units = quarter_length * 4.0;
    let rounded = units.round();
    if !units.is_finite() || rounded < 0.0 || (units - rounded).abs() > 1e-9 {
        return Err(MelodyError::Render(format!(
            "duration {quarter_length} is not a whole number of sixteenths"
        )));
    }
    Ok(rounded as usize)
}

/// Render the events as a LilyPond music expression.
pub fn render_music(events: &[Event]) -> Result<String> {
    let mut out = String::new();
    let mut pos = 0usize;

    for event in events {
        let duration = to_sixteenths(event.quarter_length)?;
        let fragments = split_at_barlines(pos, duration);
        let name = match event.pitch {
            Some(p) => midi_to_ly_note(p),
            None => "r".to_string(),
        };
        for (i, frag) in fragments.iter().enumerate() {
            let parts = decompose_duration(*frag);
            for (j, dur) in parts.iter().enumerate() {
                if !out.is_empty() {
                    out.push(' ');
                }
                let _ = write!(out, "{name}{dur}");
                let more = j + 1 < parts.len() || i + 1 < fragments.len();
                if more && event.pitch.is_some() {
                    out.push('~');
                }
            }
        }
        pos += duration;
    }
    Ok(out)
}

/// Generate a complete LilyPond file.
pub fn events_to_lilypond(events: &[Event], tempo_bpm: u16, title: Option<&str>) -> Result<String> {
    let music = render_music(events)?;
    let mut ly = String::new();
    ly.push_str("\\version \"2.24.0\"\n\n");
    let title = title.unwrap_or("Generated Melody").replace('"', "\\\"");
    let _ = write!(ly, "\\header {{\n  title = \"{title}\"\n}}\n\n");
    let _ = write!(
        ly,
        "melody = \\absolute {{\n  \\time 4/4 \\tempo 4 = {tempo_bpm}\n  {music}\n}}\n\n"
    );
    ly.push_str("\\score {\n  \\new Staff { \\clef treble \\melody }\n");
    ly.push_str("  \\layout { }\n");
    ly.push_str("  \\midi { }\n");
    ly.push_str("}\n");
    Ok(ly)
}

/// Write a LilyPond file.
pub fn write_lilypond(
    events: &[Event],
    tempo_bpm: u16,
    title: Option<&str>,
    path: &Path,
) -> Result<()> {
    let ly = events_to_lilypond(events, tempo_bpm, title)?;
    std::fs::write(path, ly).map_err(|e| MelodyError::io_at(path, e))?;
    Ok(())
}
