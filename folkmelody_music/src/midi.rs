// MIDI output for rendered melodies.
//
// Converts a list of note/rest events into a Standard MIDI File for playback.
// The melody is a single line, so the file is SMF format 0: one track holding
// the tempo, the track name, a program change, and the notes. Rests simply
// advance the clock until the next note-on.
//
// Uses the `midly` crate for MIDI writing.

use crate::error::{MelodyError, Result};
use crate::score::Event;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
pub const TICKS_PER_QUARTER: u16 = 480;

const CHANNEL: u8 = 0;
const VELOCITY: u8 = 80;
/// Acoustic grand piano.
const PROGRAM: u8 = 0;

/// Largest value a 24-bit tempo meta event can hold.
const MAX_TEMPO_MICROSECONDS: u32 = (1 << 24) - 1;

/// Microseconds per quarter note for `tempo_bpm`. Tempos below 4 BPM do not
/// fit the 24-bit tempo field and are rejected.
pub fn tempo_microseconds(tempo_bpm: u16) -> Result<u32> {
    if tempo_bpm == 0 {
        return Err(MelodyError::Midi("tempo must be positive".into()));
    }
    let micros = 60_000_000 / tempo_bpm as u32;
    if micros > MAX_TEMPO_MICROSECONDS {
        return Err(MelodyError::Midi(format!(
            "tempo {tempo_bpm} BPM is too slow for a MIDI tempo event"
        )));
    }
    Ok(micros)
}

/// Convert events to MIDI and write to a file.
pub fn write_midi(events: &[Event], tempo_bpm: u16, path: &Path) -> Result<()> {
    let bytes = events_to_midi_bytes(events, tempo_bpm)?;
    std::fs::write(path, &bytes).map_err(|e| MelodyError::io_at(path, e))?;
    Ok(())
}

/// Encode events as SMF bytes.
pub fn events_to_midi_bytes(events: &[Event], tempo_bpm: u16) -> Result<Vec<u8>> {
    let smf = events_to_smf(events, tempo_bpm)?;
    let mut buf = Vec::new();
    smf.write(&mut buf)
        .map_err(|e| MelodyError::Midi(e.to_string()))?;
    Ok(buf)
}

/// Quarter length → ticks, rounded to the nearest tick.
fn ticks(quarter_length: f64) -> u32 {
    (quarter_length * TICKS_PER_QUARTER as f64).round().max(0.0) as u32
}

/// Convert events to an in-memory SMF.
fn events_to_smf(events: &[Event], tempo_bpm: u16) -> Result<Smf<'static>> {
    let tempo = tempo_microseconds(tempo_bpm)?;
    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    let channel = u4::new(CHANNEL);
    let mut track: Track<'static> = Vec::new();

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo))),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(b"Melody")),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(PROGRAM),
            },
        },
    });

    // Ticks elapsed since the last written event.
    let mut pending: u32 = 0;

    for event in events {
        let length = ticks(event.quarter_length);
        let Some(pitch) = event.pitch else {
            pending += length;
            continue;
        };
        if pitch > 127 {
            return Err(MelodyError::Midi(format!("pitch {pitch} is not a MIDI key")));
        }
        if length == 0 {
            continue;
        }

        track.push(TrackEvent {
            delta: u28::new(pending),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: u7::new(pitch),
                    vel: u7::new(VELOCITY),
                },
            },
        });
        track.push(TrackEvent {
            delta: u28::new(length),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key: u7::new(pitch),
                    vel: u7::new(0),
                },
            },
        });
        pending = 0;
    }

    // Trailing rests still take up time before the end of the track.
    track.push(TrackEvent {
        delta: u28::new(pending),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    smf.tracks.push(track);
    Ok(smf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_events(smf: &Smf) -> Vec<(u32, bool, u8)> {
        smf.tracks[0]
            .iter()
            .filter_map(|ev| match ev.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { key, .. },
                    ..
                } => Some((ev.delta.as_int(), true, key.as_int())),
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOff { key, .. },
                    ..
                } => Some((ev.delta.as_int(), false, key.as_int())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_events_to_smf_basic() {
        let events = vec![
            Event::note(60, 1.0),
            Event::rest(0.5),
            Event::note(64, 0.25),
        ];
        let smf = events_to_smf(&events, 120).unwrap();
        assert_eq!(smf.tracks.len(), 1);
        assert_eq!(
            note_events(&smf),
            vec![
                (0, true, 60),
                (480, false, 60),
                (240, true, 64),
                (120, false, 64),
            ]
        );
    }

    #[test]
    fn test_trailing_rest_extends_track() {
        let smf = events_to_smf(&[Event::note(60, 1.0), Event::rest(2.0)], 120).unwrap();
        let last = smf.tracks[0].last().unwrap();
        assert!(matches!(last.kind, TrackEventKind::Meta(MetaMessage::EndOfTrack)));
        assert_eq!(last.delta.as_int(), 960);
    }

    #[test]
    fn test_bytes_parse_back() {
        let events = vec![Event::note(67, 0.75), Event::note(65, 0.25)];
        let bytes = events_to_midi_bytes(&events, 90).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.header.format, Format::SingleTrack);
        assert_eq!(note_events(&smf).len(), 4);
        let tempo = smf.tracks[0].iter().find_map(|ev| match ev.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(t)) => Some(t.as_int()),
            _ => None,
        });
        assert_eq!(tempo, Some(60_000_000 / 90));
    }

    #[test]
    fn test_zero_tempo_rejected() {
        assert!(events_to_smf(&[Event::note(60, 1.0)], 0).is_err());
    }

    #[test]
    fn test_tempo_must_fit_24_bits() {
        for bpm in 1..=3 {
            assert!(matches!(
                events_to_smf(&[Event::note(60, 1.0)], bpm),
                Err(MelodyError::Midi(_))
            ));
        }
        assert_eq!(tempo_microseconds(4).unwrap(), 15_000_000);

        let bytes = events_to_midi_bytes(&[Event::note(60, 1.0)], 4).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        let tempo = smf.tracks[0].iter().find_map(|ev| match ev.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(t)) => Some(t.as_int()),
            _ => None,
        });
        assert_eq!(tempo, Some(15_000_000));
    }
}
