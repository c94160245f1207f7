// Time-series tokens.
//
// A melody is a stream of fixed-duration steps. Each step is one token:
// - a MIDI pitch number ("60") marks a note onset,
// - "r" marks a rest onset,
// - "_" holds the previous onset for one more step,
// - "/" marks a song boundary (and doubles as the generation start/stop
//   marker).
//
// On disk and on the wire tokens are space-separated strings; the string form
// is also the key in the vocabulary map.

use crate::error::{MelodyError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const REST_SYMBOL: &str = "r";
pub const HOLD_SYMBOL: &str = "_";
pub const BOUNDARY_SYMBOL: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Token {
    /// Note onset at a MIDI pitch (0-127).
    Pitch(u8),
    /// Rest onset.
    Rest,
    /// Continuation of the previous onset.
    Hold,
    /// Song boundary.
    Boundary,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Pitch(p) => write!(f, "{p}"),
            Token::Rest => f.write_str(REST_SYMBOL),
            Token::Hold => f.write_str(HOLD_SYMBOL),
            Token::Boundary => f.write_str(BOUNDARY_SYMBOL),
        }
    }
}

impl FromStr for Token {
    type Err = MelodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            REST_SYMBOL => Ok(Token::Rest),
            HOLD_SYMBOL => Ok(Token::Hold),
            BOUNDARY_SYMBOL => Ok(Token::Boundary),
            _ => match s.parse::<u8>() {
                Ok(p) if p <= 127 && s.bytes().all(|b| b.is_ascii_digit()) => Ok(Token::Pitch(p)),
                _ => Err(MelodyError::InvalidToken(s.to_string())),
            },
        }
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Split a whitespace-delimited token string.
pub fn parse_tokens(text: &str) -> Result<Vec<Token>> {
    text.split_whitespace().map(str::parse).collect()
}

/// Join tokens with single spaces.
pub fn join_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_each_kind() {
        assert_eq!("60".parse::<Token>().unwrap(), Token::Pitch(60));
        assert_eq!("r".parse::<Token>().unwrap(), Token::Rest);
        assert_eq!("_".parse::<Token>().unwrap(), Token::Hold);
        assert_eq!("/".parse::<Token>().unwrap(), Token::Boundary);
    }

    #[test]
    fn test_rejects_out_of_range_and_junk() {
        assert!("128".parse::<Token>().is_err());
        assert!("+60".parse::<Token>().is_err());
        assert!("c4".parse::<Token>().is_err());
        assert!("".parse::<Token>().is_err());
    }

    #[test]
    fn test_parse_tokens_collapses_whitespace() {
        let tokens = parse_tokens(" 55 _  _\t r\n_ 60 ").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Pitch(55),
                Token::Hold,
                Token::Hold,
                Token::Rest,
                Token::Hold,
                Token::Pitch(60),
            ]
        );
        assert_eq!(join_tokens(&tokens), "55 _ _ r _ 60");
    }

    #[test]
    fn test_serde_uses_string_form() {
        let json = serde_json::to_string(&vec![Token::Pitch(67), Token::Hold]).unwrap();
        assert_eq!(json, r#"["67","_"]"#);
        let back: Vec<Token> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![Token::Pitch(67), Token::Hold]);
    }
}
