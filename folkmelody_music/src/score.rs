// Parsed score representation.
//
// A `Score` is a single monophonic line flattened to its notes and rests,
// each with a duration in quarter lengths (1.0 = quarter note). That is all
// the encoder needs; barlines, phrase marks, and ties are dropped during
// parsing.
//
// Keys are stored with their spelling (`Step` + alteration) rather than a bare
// pitch class, because the transposition interval depends on it: moving a
// C-flat major tune to C major goes up a semitone, moving a B major tune goes
// down eleven.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Diatonic step name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    /// Semitones above C within one octave.
    pub fn semitones(self) -> i32 {
        match self {
            Step::C => 0,
            Step::D => 2,
            Step::E => 4,
            Step::F => 5,
            Step::G => 7,
            Step::A => 9,
            Step::B => 11,
        }
    }

    pub fn from_letter(c: char) -> Option<Step> {
        match c.to_ascii_lowercase() {
            'c' => Some(Step::C),
            'd' => Some(Step::D),
            'e' => Some(Step::E),
            'f' => Some(Step::F),
            'g' => Some(Step::G),
            'a' => Some(Step::A),
            'b' => Some(Step::B),
            _ => None,
        }
    }
}

/// A spelled pitch without octave, e.g. E-flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PitchName {
    pub step: Step,
    /// Semitone alteration: -1 flat, +1 sharp.
    pub alter: i8,
}

impl PitchName {
    pub const C: PitchName = PitchName { step: Step::C, alter: 0 };
    pub const A: PitchName = PitchName { step: Step::A, alter: 0 };

    pub fn new(step: Step, alter: i8) -> Self {
        PitchName { step, alter }
    }

    /// MIDI number of this pitch in octave 4 (C4 = 60). Not reduced mod 12,
    /// so C-flat gives 59 and B-sharp gives 72.
    pub fn midi_in_octave_4(self) -> i32 {
        60 + self.step.semitones() + self.alter as i32
    }

    /// Pitch class 0-11.
    pub fn pitch_class(self) -> u8 {
        self.midi_in_octave_4().rem_euclid(12) as u8
    }

    /// Sharp-preferring spelling of a pitch class, used for estimated keys.
    pub fn from_pitch_class(pc: u8) -> Self {
        match pc % 12 {
            0 => PitchName::new(Step::C, 0),
            1 => PitchName::new(Step::C, 1),
            2 => PitchName::new(Step::D, 0),
            3 => PitchName::new(Step::E, -1),
            4 => PitchName::new(Step::E, 0),
            5 => PitchName::new(Step::F, 0),
            6 => PitchName::new(Step::F, 1),
            7 => PitchName::new(Step::G, 0),
            8 => PitchName::new(Step::A, -1),
            9 => PitchName::new(Step::A, 0),
            10 => PitchName::new(Step::B, -1),
            _ => PitchName::new(Step::B, 0),
        }
    }
}

impl fmt::Display for PitchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.step)?;
        let accidental = if self.alter < 0 { "b" } else { "#" };
        for _ in 0..self.alter.unsigned_abs() {
            f.write_str(accidental)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyMode {
    Major,
    Minor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub tonic: PitchName,
    pub mode: KeyMode,
}

impl Key {
    pub fn new(tonic: PitchName, mode: KeyMode) -> Self {
        Key { tonic, mode }
    }

    /// Tonic every song is moved to: C for major, A for minor.
    pub fn canonical_tonic(self) -> PitchName {
        match self.mode {
            KeyMode::Major => PitchName::C,
            KeyMode::Minor => PitchName::A,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            KeyMode::Major => "major",
            KeyMode::Minor => "minor",
        };
        write!(f, "{} {}", self.tonic, mode)
    }
}

/// One note or rest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// MIDI pitch, or `None` for a rest.
    pub pitch: Option<u8>,
    /// Duration in quarter lengths.
    pub quarter_length: f64,
}

impl Event {
    pub fn note(pitch: u8, quarter_length: f64) -> Self {
        Event {
            pitch: Some(pitch),
            quarter_length,
        }
    }

    pub fn rest(quarter_length: f64) -> Self {
        Event {
            pitch: None,
            quarter_length,
        }
    }
}

/// A parsed song.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Title from the `!!!OTL` reference record, if any.
    pub title: Option<String>,
    /// Key stated in the file (`*G:`). Absent keys are estimated on demand.
    pub key: Option<Key>,
    /// Raw key signature accidentals, e.g. `["f#", "c#"]`.
    pub key_signature: Vec<String>,
    /// Meter as written, e.g. `"3/4"`.
    pub meter: Option<String>,
    /// Flattened notes and rests in order.
    pub events: Vec<Event>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_name_midi_keeps_spelling() {
        assert_eq!(PitchName::new(Step::C, -1).midi_in_octave_4(), 59);
        assert_eq!(PitchName::new(Step::B, 1).midi_in_octave_4(), 72);
        assert_eq!(PitchName::new(Step::B, 1).pitch_class(), 0);
        assert_eq!(PitchName::new(Step::E, -1).pitch_class(), 3);
    }

    #[test]
    fn test_display() {
        let key = Key::new(PitchName::new(Step::F, 1), KeyMode::Minor);
        assert_eq!(key.to_string(), "F# minor");
        let key = Key::new(PitchName::new(Step::B, -1), KeyMode::Major);
        assert_eq!(key.to_string(), "Bb major");
    }

    #[test]
    fn test_from_pitch_class_round_trips() {
        for pc in 0..12u8 {
            assert_eq!(PitchName::from_pitch_class(pc).pitch_class(), pc);
        }
    }
}
