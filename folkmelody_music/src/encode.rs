// Score → time-series token encoding.
//
// Each event becomes `steps = trunc(quarter_length / time_step)` tokens: the
// onset (MIDI number or `r`) followed by `steps - 1` holds. With the default
// sixteenth-note step, a quarter-note middle C is `60 _ _ _`.
//
// Durations that are not a whole number of steps are truncated, so an event
// shorter than one step disappears. The duration filter in corpus.rs keeps
// such songs out of the training corpus.

use crate::score::Score;
use crate::token::{Token, join_tokens};

/// Number of whole time steps an event of `quarter_length` occupies.
pub fn steps_for(quarter_length: f64, time_step: f64) -> usize {
    let steps = quarter_length / time_step;
    if steps.is_finite() && steps > 0.0 {
        steps as usize
    } else {
        0
    }
}

/// Encode a score's events as tokens.
pub fn encode_events(score: &Score, time_step: f64) -> Vec<Token> {
    let mut tokens = Vec::new();
    for event in &score.events {
        let onset = match event.pitch {
            Some(p) => Token::Pitch(p),
            None => Token::Rest,
        };
        let steps = steps_for(event.quarter_length, time_step);
        for step in 0..steps {
            tokens.push(if step == 0 { onset } else { Token::Hold });
        }
    }
    tokens
}

/// Encode a score as a space-delimited token string.
pub fn encode_song(score: &Score, time_step: f64) -> String {
    join_tokens(&encode_events(score, time_step))
}
