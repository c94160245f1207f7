// Key determination and transposition to a canonical tonic.
//
// Every song is moved to C major or A minor before encoding so the model only
// has to learn one major and one minor pitch vocabulary. The key comes from
// the file's explicit designation when there is one; otherwise it is
// estimated with a profile-correlation key finder:
//
// 1. Build a pitch-class histogram weighted by note duration.
// 2. For each of the 24 major/minor keys, rotate the key profile to that
//    tonic and compute the Pearson correlation with the histogram.
// 3. The best-correlated key wins (ties go to the first candidate in
//    C..B, major before minor).
//
// The transposition interval is measured from the tonic to the target tonic
// with both placed in octave 4, so a G major tune moves down a fifth and an
// E minor tune moves up a fourth.

use crate::error::{MelodyError, Result};
use crate::score::{Key, KeyMode, PitchName, Score};
use tracing::debug;

/// Key profile weights, indexed by semitones above the tonic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyProfile {
    pub major: [f64; 12],
    pub minor: [f64; 12],
}

impl KeyProfile {
    /// Aarden–Essen profiles, derived from the Essen folk-song collection.
    pub const AARDEN_ESSEN: KeyProfile = KeyProfile {
        major: [
            17.7661, 0.145624, 14.9265, 0.160186, 19.8049, 11.3587, 0.291248, 22.062, 0.145624,
            8.15494, 0.232998, 4.95122,
        ],
        minor: [
            18.2648, 0.737619, 14.0499, 16.8599, 0.702494, 14.4362, 0.702494, 18.6161, 4.56621,
            1.93186, 7.37619, 1.75623,
        ],
    };

    /// Krumhansl–Kessler probe-tone profiles.
    pub const KRUMHANSL_KESSLER: KeyProfile = KeyProfile {
        major: [
            6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
        ],
        minor: [
            6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
        ],
    };
}

impl Default for KeyProfile {
    fn default() -> Self {
        KeyProfile::AARDEN_ESSEN
    }
}

/// Duration-weighted pitch-class histogram of a score's notes.
pub fn pitch_class_histogram(score: &Score) -> [f64; 12] {
    let mut hist = [0.0; 12];
    for event in &score.events {
        if let Some(pitch) = event.pitch {
            hist[(pitch % 12) as usize] += event.quarter_length;
        }
    }
    hist
}

fn pearson(a: &[f64; 12], b: &[f64; 12]) -> f64 {
    let mean_a = a.iter().sum::<f64>() / 12.0;
    let mean_b = b.iter().sum::<f64>() / 12.0;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..12 {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    cov / (var_a * var_b).sqrt()
}

/// Correlation of the histogram with `profile` rotated so index 0 sits on
/// `tonic_pc`.
fn correlate(hist: &[f64; 12], profile: &[f64; 12], tonic_pc: usize) -> f64 {
    let mut rotated = [0.0; 12];
    for (pc, slot) in rotated.iter_mut().enumerate() {
        *slot = profile[(pc + 12 - tonic_pc) % 12];
    }
    pearson(hist, &rotated)
}

/// Estimate the key of a score from its notes. Returns `None` for scores
/// without pitched notes.
pub fn estimate_key(score: &Score, profile: &KeyProfile) -> Option<Key> {
    let hist = pitch_class_histogram(score);
    if hist.iter().all(|&w| w == 0.0) {
        return None;
    }

    let mut best: Option<(f64, Key)> = None;
    for tonic_pc in 0..12 {
        for (mode, weights) in [(KeyMode::Major, &profile.major), (KeyMode::Minor, &profile.minor)] {
            let r = correlate(&hist, weights, tonic_pc);
            if best.as_ref().is_none_or(|(best_r, _)| r > *best_r) {
                best = Some((r, Key::new(PitchName::from_pitch_class(tonic_pc as u8), mode)));
            }
        }
    }
    best.map(|(_, key)| key)
}

/// The score's stated key, or an estimate when it has none.
pub fn determine_key(score: &Score, profile: &KeyProfile) -> Option<Key> {
    score.key.or_else(|| estimate_key(score, profile))
}

/// Semitones that carry `key`'s tonic to its canonical tonic, both in
/// octave 4.
pub fn transposition_interval(key: Key) -> i32 {
    key.canonical_tonic().midi_in_octave_4() - key.tonic.midi_in_octave_4()
}

/// Transpose a score to C major / A minor. Scores without any pitched note
/// are returned unchanged.
pub fn transpose_to_canonical(score: &Score, profile: &KeyProfile) -> Result<Score> {
    let Some(key) = determine_key(score, profile) else {
        return Ok(score.clone());
    };
    let shift = transposition_interval(key);
    debug!(%key, shift, explicit = score.key.is_some(), "transposing");

    let mut out = transpose(score, shift)?;
    out.key = Some(Key::new(key.canonical_tonic(), key.mode));
    out.key_signature.clear();
    Ok(out)
}

/// Shift every pitched event by `shift` semitones.
pub fn transpose(score: &Score, shift: i32) -> Result<Score> {
    let mut out = score.clone();
    for event in &mut out.events {
        if let Some(pitch) = event.pitch {
            let moved = pitch as i32 + shift;
            if !(0..=127).contains(&moved) {
                return Err(MelodyError::PitchOutOfRange { pitch, shift });
            }
            event.pitch = Some(moved as u8);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{Event, Step};

    fn score_of(pitches: &[(u8, f64)]) -> Score {
        Score {
            events: pitches.iter().map(|&(p, d)| Event::note(p, d)).collect(),
            ..Default::default()
        }
    }

    /// Scale with the tonic triad emphasized.
    fn major_tune(tonic: u8) -> Score {
        let steps = [0u8, 2, 4, 5, 7, 9, 11, 12, 7, 4, 0];
        let mut events: Vec<(u8, f64)> = steps.iter().map(|&s| (tonic + s, 1.0)).collect();
        events.push((tonic, 4.0));
        events.push((tonic + 4, 2.0));
        events.push((tonic + 7, 2.0));
        score_of(&events)
    }

    fn minor_tune(tonic: u8) -> Score {
        let steps = [0u8, 2, 3, 5, 7, 8, 10, 12, 7, 3, 0];
        let mut events: Vec<(u8, f64)> = steps.iter().map(|&s| (tonic + s, 1.0)).collect();
        events.push((tonic, 4.0));
        events.push((tonic + 3, 2.0));
        events.push((tonic + 7, 2.0));
        score_of(&events)
    }

    #[test]
    fn test_interval_to_canonical_tonic() {
        let g = Key::new(PitchName::new(Step::G, 0), KeyMode::Major);
        assert_eq!(transposition_interval(g), -7);
        let e = Key::new(PitchName::new(Step::E, 0), KeyMode::Minor);
        assert_eq!(transposition_interval(e), 5);
        let b = Key::new(PitchName::new(Step::B, 0), KeyMode::Major);
        assert_eq!(transposition_interval(b), -11);
        let c_flat = Key::new(PitchName::new(Step::C, -1), KeyMode::Major);
        assert_eq!(transposition_interval(c_flat), 1);
        let c = Key::new(PitchName::C, KeyMode::Minor);
        assert_eq!(transposition_interval(c), 9);
    }

    #[test]
    fn test_estimate_major_keys() {
        for profile in [KeyProfile::AARDEN_ESSEN, KeyProfile::KRUMHANSL_KESSLER] {
            let key = estimate_key(&major_tune(67), &profile).unwrap();
            assert_eq!(key.mode, KeyMode::Major);
            assert_eq!(key.tonic.pitch_class(), 7);

            let key = estimate_key(&major_tune(62), &profile).unwrap();
            assert_eq!(key.mode, KeyMode::Major);
            assert_eq!(key.tonic.pitch_class(), 2);
        }
    }

    #[test]
    fn test_estimate_minor_key() {
        for profile in [KeyProfile::AARDEN_ESSEN, KeyProfile::KRUMHANSL_KESSLER] {
            let key = estimate_key(&minor_tune(64), &profile).unwrap();
            assert_eq!(key.mode, KeyMode::Minor);
            assert_eq!(key.tonic.pitch_class(), 4);
        }
    }

    #[test]
    fn test_estimate_needs_notes() {
        let rests = Score {
            events: vec![Event::rest(1.0)],
            ..Default::default()
        };
        assert_eq!(estimate_key(&rests, &KeyProfile::default()), None);
    }

    #[test]
    fn test_explicit_key_wins() {
        let mut score = major_tune(67);
        score.key = Some(Key::new(PitchName::new(Step::D, 0), KeyMode::Major));
        let out = transpose_to_canonical(&score, &KeyProfile::default()).unwrap();
        // D major → C major is two semitones down.
        assert_eq!(out.events[0].pitch, Some(65));
        assert_eq!(out.key, Some(Key::new(PitchName::C, KeyMode::Major)));
    }

    #[test]
    fn test_estimated_transposition_lands_on_c() {
        let out = transpose_to_canonical(&major_tune(67), &KeyProfile::default()).unwrap();
        assert_eq!(out.events[0].pitch, Some(60));
        let out = transpose_to_canonical(&minor_tune(64), &KeyProfile::default()).unwrap();
        assert_eq!(out.events[0].pitch, Some(69));
        assert_eq!(out.key.map(|k| k.mode), Some(KeyMode::Minor));
    }

    #[test]
    fn test_rests_survive_transposition() {
        let score = Score {
            events: vec![Event::note(62, 1.0), Event::rest(0.5), Event::note(64, 1.0)],
            ..Default::default()
        };
        let out = transpose(&score, -2).unwrap();
        assert_eq!(
            out.events,
            vec![Event::note(60, 1.0), Event::rest(0.5), Event::note(62, 1.0)]
        );
    }

    #[test]
    fn test_out_of_range_is_error() {
        let score = score_of(&[(125, 1.0)]);
        assert!(matches!(
            transpose(&score, 5),
            Err(MelodyError::PitchOutOfRange { pitch: 125, shift: 5 })
        ));
    }
}
