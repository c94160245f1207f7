// Humdrum `**kern` reader.
//
// Reads the first `**kern` spine of a Humdrum file into a `Score`. The folk
// corpora this pipeline consumes (Essen collection and similar) are
// monophonic, so one spine is the whole song; any further spines are ignored.
//
// What is read:
// - reference records `!!!OTL: ...` (title),
// - interpretations `*k[f#c#]` (key signature), `*G:` / `*e-:` (explicit key,
//   upper case = major), `*M3/4` (meter), and spine manipulators so the
//   column index of the tracked spine survives splits, joins, and
//   exchanges,
// - data tokens: duration (`4`, `8.`, `16`, `0` = breve, `3%2` rational),
//   pitch letters with octave by repetition (`c` = C4, `cc` = C5, `C` = C3,
//   `CC` = C2), accidentals (`#`, `-`, `n`), rests (`r`), grace notes
//   (`q`/`Q`, zero duration).
//
// Ties, slurs, phrase marks, beams, articulations, and barlines carry no
// information the encoder uses and are skipped. Chords keep their first note.

use crate::error::{MelodyError, Result};
use crate::score::{Event, Key, KeyMode, PitchName, Score, Step};
use std::path::Path;

const KERN_EXCLUSIVE: &str = "**kern";

/// Read and parse a kern file.
pub fn load_kern_file(path: &Path) -> Result<Score> {
    let text = std::fs::read_to_string(path).map_err(|e| MelodyError::io_at(path, e))?;
    parse_kern(&text, path)
}

/// Parse kern text. `path` is only used in error messages.
pub fn parse_kern(text: &str, path: &Path) -> Result<Score> {
    let mut score = Score::default();
    // Column of the tracked spine once the exclusive interpretation is seen.
    let mut spine: Option<usize> = None;
    let mut finished = false;

    let err = |line: usize, message: String| MelodyError::KernParse {
        path: path.to_path_buf(),
        line,
        message,
    };

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        if let Some(record) = line.strip_prefix("!!!") {
            if let Some((key, value)) = record.split_once(':') {
                if key.trim() == "OTL" && score.title.is_none() {
                    let value = value.trim();
                    if !value.is_empty() {
                        score.title = Some(value.to_string());
                    }
                }
            }
            continue;
        }
        // Global comments span the whole line, not one field per spine.
        if line.starts_with("!!") || (line.starts_with('!') && spine.is_none()) {
            continue;
        }
        if finished {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();

        let Some(col) = spine else {
            if fields.iter().any(|f| f.starts_with("**")) {
                match fields.iter().position(|f| *f == KERN_EXCLUSIVE) {
                    Some(c) => spine = Some(c),
                    None => return Err(err(line_no, "no **kern spine".into())),
                }
                continue;
            }
            return Err(err(
                line_no,
                "data before the exclusive interpretation".into(),
            ));
        };

        let Some(&field) = fields.get(col) else {
            return Err(err(
                line_no,
                format!("line has {} spines, expected at least {}", fields.len(), col + 1),
            ));
        };

        if field.starts_with('!') || field.starts_with('=') || field == "." {
            continue;
        }

        if field.starts_with('*') {
            if is_manipulator_line(&fields) {
                match next_spine_index(&fields, col) {
                    Some(next) => spine = Some(next),
                    None => finished = true,
                }
                continue;
            }
            read_interpretation(field, &mut score);
            continue;
        }

        // Chords are space-separated; the melody takes the first note.
        let token = field.split(' ').next().unwrap_or(field);
        if let Some(event) = parse_data_token(token).map_err(|m| err(line_no, m))? {
            score.events.push(event);
        }
    }

    if spine.is_none() {
        return Err(err(0, "no **kern spine".into()));
    }
    Ok(score)
}

fn is_manipulator_line(fields: &[&str]) -> bool {
    fields
        .iter()
        .any(|f| matches!(*f, "*^" | "*v" | "*-" | "*+" | "*x"))
}

/// Column of the tracked spine on the line after a manipulator line, or
/// `None` if the spine is terminated.
fn next_spine_index(fields: &[&str], ours: usize) -> Option<usize> {
    if fields[ours] == "*-" {
        return None;
    }
    // An exchanged spine lands where its `*x` partner was.
    let target = if fields[ours] == "*x" {
        fields
            .iter()
            .enumerate()
            .find(|&(i, f)| i != ours && *f == "*x")
            .map_or(ours, |(i, _)| i)
    } else {
        ours
    };
    let mut next = 0;
    let mut i = 0;
    while i < target {
        match fields[i] {
            "*^" | "*+" => next += 2,
            "*-" => {}
            "*v" => {
                // A run of joins collapses to one spine.
                while i + 1 < fields.len() && fields[i + 1] == "*v" {
                    i += 1;
                }
                if i >= target {
                    return Some(next);
                }
                next += 1;
            }
            _ => next += 1,
        }
        i += 1;
    }
    Some(next)
}

fn read_interpretation(field: &str, score: &mut Score) {
    let body = &field[1..];

    if let Some(sig) = body.strip_prefix("k[").and_then(|s| s.strip_suffix(']')) {
        score.key_signature = split_key_signature(sig);
        return;
    }

    if let Some(meter) = body.strip_prefix('M') {
        if meter.starts_with(|c: char| c.is_ascii_digit()) && meter.contains('/') {
            score.meter = Some(meter.to_string());
        }
        return;
    }

    if let Some(name) = body.strip_suffix(':') {
        if score.key.is_none() {
            score.key = parse_key_designation(name);
        }
    }
}

fn split_key_signature(sig: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for c in sig.chars() {
        if c.is_ascii_alphabetic() {
            out.push(c.to_string());
        } else if let Some(last) = out.last_mut() {
            last.push(c);
        }
    }
    out
}

/// `G` → G major, `e-` → E-flat minor, `F#` → F-sharp major.
fn parse_key_designation(name: &str) -> Option<Key> {
    let mut chars = name.chars();
    let letter = chars.next()?;
    let step = Step::from_letter(letter)?;
    let mut alter: i8 = 0;
    for c in chars {
        match c {
            '#' => alter += 1,
            '-' => alter -= 1,
            _ => return None,
        }
    }
    let mode = if letter.is_ascii_uppercase() {
        KeyMode::Major
    } else {
        KeyMode::Minor
    };
    Some(Key::new(PitchName::new(step, alter), mode))
}

/// Parse one data token. Returns `Ok(None)` for tokens that carry no event.
pub fn parse_data_token(token: &str) -> std::result::Result<Option<Event>, String> {
    let mut duration_digits = String::new();
    let mut rational_digits: Option<String> = None;
    let mut dots = 0u32;
    let mut letter: Option<char> = None;
    let mut letter_count = 0i32;
    let mut alter: i32 = 0;
    let mut is_rest = false;
    let mut is_grace = false;

    for c in token.chars() {
        match c {
            '0'..='9' => match rational_digits.as_mut() {
                Some(r) => r.push(c),
                None => duration_digits.push(c),
            },
            '%' => rational_digits = Some(String::new()),
            '.' => dots += 1,
            'a'..='g' | 'A'..='G' => match letter {
                None => {
                    letter = Some(c);
                    letter_count = 1;
                }
                Some(l) if l == c => letter_count += 1,
                Some(l) => return Err(format!("mixed pitch letters '{l}' and '{c}' in '{token}'")),
            },
            '#' => alter += 1,
            '-' => alter -= 1,
            'n' => alter = 0,
            'r' => is_rest = true,
            'q' | 'Q' => is_grace = true,
            _ => {}
        }
    }

    if letter.is_none() && !is_rest {
        // Pure ornament/phrase tokens such as a lone `}`.
        return Ok(None);
    }

    let quarter_length = if is_grace {
        0.0
    } else {
        base_quarter_length(&duration_digits, rational_digits.as_deref())
            .ok_or_else(|| format!("missing or bad duration in '{token}'"))?
            * (2.0 - 0.5f64.powi(dots as i32))
    };

    if is_rest {
        return Ok(Some(Event::rest(quarter_length)));
    }

    let letter = letter.ok_or_else(|| format!("no pitch in '{token}'"))?;
    let step = Step::from_letter(letter).ok_or_else(|| format!("bad pitch letter '{letter}'"))?;
    let octave_c = if letter.is_ascii_lowercase() {
        60 + 12 * (letter_count - 1)
    } else {
        48 - 12 * (letter_count - 1)
    };
    let midi = octave_c + step.semitones() + alter;
    if !(0..=127).contains(&midi) {
        return Err(format!("pitch '{token}' is outside the MIDI range"));
    }
    Ok(Some(Event::note(midi as u8, quarter_length)))
}

/// `4` → 1.0, `8` → 0.5, `0` → 8.0 (breve), `00` → 16.0, `3%2` → 8/3.
fn base_quarter_length(digits: &str, rational: Option<&str>) -> Option<f64> {
    if digits.is_empty() {
        return None;
    }
    if digits.chars().all(|c| c == '0') {
        return Some(4.0 * 2f64.powi(digits.len() as i32));
    }
    let numerator: f64 = digits.parse::<u32>().ok()? as f64;
    let denominator: f64 = match rational {
        Some(r) => r.parse::<u32>().ok().filter(|&d| d > 0)? as f64,
        None => 1.0,
    };
    Some(4.0 * denominator / numerator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Score {
        parse_kern(text, Path::new("test.krn")).unwrap()
    }

    #[test]
    fn test_data_token_pitches() {
        assert_eq!(parse_data_token("4c").unwrap(), Some(Event::note(60, 1.0)));
        assert_eq!(parse_data_token("8cc").unwrap(), Some(Event::note(72, 0.5)));
        assert_eq!(parse_data_token("2C").unwrap(), Some(Event::note(48, 2.0)));
        assert_eq!(parse_data_token("1CC").unwrap(), Some(Event::note(36, 4.0)));
        assert_eq!(parse_data_token("4f#").unwrap(), Some(Event::note(66, 1.0)));
        assert_eq!(parse_data_token("4b-").unwrap(), Some(Event::note(70, 1.0)));
        assert_eq!(parse_data_token("4B--").unwrap(), Some(Event::note(57, 1.0)));
    }

    #[test]
    fn test_data_token_durations() {
        assert_eq!(parse_data_token("8.g").unwrap(), Some(Event::note(67, 0.75)));
        assert_eq!(parse_data_token("4..g").unwrap(), Some(Event::note(67, 1.75)));
        assert_eq!(parse_data_token("16a").unwrap(), Some(Event::note(69, 0.25)));
        assert_eq!(parse_data_token("0c").unwrap(), Some(Event::note(60, 8.0)));
        assert_eq!(parse_data_token("4r").unwrap(), Some(Event::rest(1.0)));
        let triplet = parse_data_token("12e").unwrap().unwrap();
        assert!((triplet.quarter_length - 1.0 / 3.0).abs() < 1e-12);
        let rational = parse_data_token("3%2c").unwrap().unwrap();
        assert!((rational.quarter_length - 8.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_data_token_ignores_markup() {
        assert_eq!(parse_data_token("{(8.dL").unwrap(), Some(Event::note(62, 0.75)));
        assert_eq!(parse_data_token("[4e;").unwrap(), Some(Event::note(64, 1.0)));
        assert_eq!(parse_data_token("qg").unwrap(), Some(Event::note(67, 0.0)));
        assert_eq!(parse_data_token("}").unwrap(), None);
    }

    #[test]
    fn test_data_token_errors() {
        assert!(parse_data_token("c").is_err());
        assert!(parse_data_token("4cd").is_err());
        assert!(parse_data_token("4cccccccc").is_err());
    }

    #[test]
    fn test_parse_essen_style_song() {
        let text = "!!!OTL: Das kleine Lied\n\
                    **kern\n\
                    *ICvox\n\
                    *M3/4\n\
                    *k[b-]\n\
                    *F:\n\
                    {4f\n\
                    =1\n\
                    8.g\n\
                    16a\n\
                    4b-\n\
                    4r}\n\
                    ==\n\
                    *-\n\
                    !!!AGN: Ballade\n";
        let score = parse(text);
        assert_eq!(score.title.as_deref(), Some("Das kleine Lied"));
        assert_eq!(score.meter.as_deref(), Some("3/4"));
        assert_eq!(score.key_signature, vec!["b-".to_string()]);
        assert_eq!(
            score.key,
            Some(Key::new(PitchName::new(Step::F, 0), KeyMode::Major))
        );
        assert_eq!(
            score.events,
            vec![
                Event::note(65, 1.0),
                Event::note(67, 0.75),
                Event::note(69, 0.25),
                Event::note(70, 1.0),
                Event::rest(1.0),
            ]
        );
    }

    #[test]
    fn test_minor_key_designation() {
        let score = parse("**kern\n*e-:\n4e-\n*-\n");
        assert_eq!(
            score.key,
            Some(Key::new(PitchName::new(Step::E, -1), KeyMode::Minor))
        );
    }

    #[test]
    fn test_tracks_first_kern_spine_only() {
        let text = "**text\t**kern\t**kern\n\
                    *\t*G:\t*C:\n\
                    la\t4g\t4c\n\
                    .\t.\t4d\n\
                    li\t8a\t4e\n\
                    *-\t*-\t*-\n";
        let score = parse(text);
        assert_eq!(
            score.key,
            Some(Key::new(PitchName::new(Step::G, 0), KeyMode::Major))
        );
        assert_eq!(score.events, vec![Event::note(67, 1.0), Event::note(69, 0.5)]);
    }

    #[test]
    fn test_spine_split_before_tracked_spine() {
        let text = "**kern\t**kern\n\
                    *^\t*\n\
                    4c\t4e\t4g\n\
                    *v\t*v\t*\n\
                    4d\t4a\n\
                    *-\t*-\n";
        let score = parse(text);
        // The tracked spine is the first one; after the split it keeps the
        // left sub-spine.
        assert_eq!(score.events, vec![Event::note(60, 1.0), Event::note(62, 1.0)]);

        let text = "**kern\t**kern\n\
                    *^\t*\n\
                    4c\t4e\t4g\n\
                    *v\t*v\t*\n\
                    4d\t4a\n\
                    *-\t*-\n";
        let score = parse(&text.replace("**kern\t**kern", "**text\t**kern"));
        assert_eq!(score.events, vec![Event::note(67, 1.0), Event::note(69, 1.0)]);
    }

    #[test]
    fn test_spine_exchange_moves_tracked_spine() {
        let text = "**text\t**kern\n\
                    *\t*C:\n\
                    la\t4c\n\
                    *x\t*x\n\
                    4d\tli\n\
                    8e\tlo\n\
                    *-\t*-\n";
        let score = parse(text);
        assert_eq!(
            score.events,
            vec![Event::note(60, 1.0), Event::note(62, 1.0), Event::note(64, 0.5)]
        );
    }

    #[test]
    fn test_global_comment_in_multi_spine_body() {
        let text = "**text\t**kern\n\
                    *\t*C:\n\
                    la\t4c\n\
                    !! verse 2\n\
                    li\t4d\n\
                    !\t! local\n\
                    lo\t2e\n\
                    *-\t*-\n";
        let score = parse(text);
        assert_eq!(
            score.events,
            vec![Event::note(60, 1.0), Event::note(62, 1.0), Event::note(64, 2.0)]
        );
    }

    #[test]
    fn test_missing_kern_spine_is_error() {
        let result = parse_kern("**text\nla\n*-\n", Path::new("x.krn"));
        assert!(matches!(result, Err(MelodyError::KernParse { .. })));
        let result = parse_kern("!!!OTL: empty\n", Path::new("x.krn"));
        assert!(matches!(result, Err(MelodyError::KernParse { .. })));
    }

    #[test]
    fn test_bad_token_reports_line() {
        let err = parse_kern("**kern\n4c\nxc\n*-\n", Path::new("song.krn")).unwrap_err();
        match err {
            MelodyError::KernParse { line, .. } => assert_eq!(line, 3),
            other => panic!("expected KernParse, got {other:?}"),
        }
    }
}
