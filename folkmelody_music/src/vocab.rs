// Token ↔ integer id mapping.
//
// Built once from the merged corpus and persisted as a JSON object
// (`{"60": 3, "_": 12, ...}`). Training and generation both load the same
// file, so an id means the same token on both sides.
//
// Ids are dense in `[0, len)` and assigned in sorted order of the token
// strings, so rebuilding from an unchanged corpus reproduces the same map.

use crate::error::{MelodyError, Result};
use crate::token::Token;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    /// id → token.
    tokens: Vec<Token>,
    ids: HashMap<Token, usize>,
}

impl Vocabulary {
    /// Build from every distinct token in a space-delimited corpus.
    pub fn from_corpus(songs: &str) -> Result<Self> {
        let mut distinct: BTreeSet<String> = BTreeSet::new();
        for symbol in songs.split_whitespace() {
            // Validate while collecting so a bad corpus fails here rather
            // than at training time.
            symbol.parse::<Token>()?;
            distinct.insert(symbol.to_string());
        }
        if distinct.is_empty() {
            return Err(MelodyError::EmptyCorpus("no tokens to build a vocabulary from".into()));
        }
        let tokens = distinct
            .iter()
            .map(|s| s.parse::<Token>())
            .collect::<Result<Vec<_>>>()?;
        Self::from_tokens(tokens)
    }

    /// Build from tokens already in id order.
    pub fn from_tokens(tokens: Vec<Token>) -> Result<Self> {
        let mut ids = HashMap::with_capacity(tokens.len());
        for (id, &token) in tokens.iter().enumerate() {
            if ids.insert(token, id).is_some() {
                return Err(MelodyError::ModelShape(format!(
                    "token '{token}' appears twice in the vocabulary"
                )));
            }
        }
        Ok(Vocabulary { tokens, ids })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, token: Token) -> bool {
        self.ids.contains_key(&token)
    }

    pub fn id_of(&self, token: Token) -> Result<usize> {
        self.ids
            .get(&token)
            .copied()
            .ok_or_else(|| MelodyError::UnknownToken(token.to_string()))
    }

    pub fn token_of(&self, id: usize) -> Result<Token> {
        self.tokens
            .get(id)
            .copied()
            .ok_or(MelodyError::UnknownTokenId(id))
    }

    /// Map a space-delimited token string to ids.
    pub fn encode_str(&self, songs: &str) -> Result<Vec<usize>> {
        songs
            .split_whitespace()
            .map(|symbol| {
                let token: Token = symbol.parse()?;
                self.id_of(token)
            })
            .collect()
    }

    pub fn encode(&self, tokens: &[Token]) -> Result<Vec<usize>> {
        tokens.iter().map(|&t| self.id_of(t)).collect()
    }

    pub fn decode(&self, ids: &[usize]) -> Result<Vec<Token>> {
        ids.iter().map(|&id| self.token_of(id)).collect()
    }

    /// The JSON object form: token string → id.
    pub fn to_map(&self) -> BTreeMap<String, usize> {
        self.tokens
            .iter()
            .enumerate()
            .map(|(id, t)| (t.to_string(), id))
            .collect()
    }

    /// Rebuild from the JSON object form. Ids must be dense.
    pub fn from_map(map: BTreeMap<String, usize>) -> Result<Self> {
        let mut slots: Vec<Option<Token>> = vec![None; map.len()];
        for (symbol, id) in map {
            let token: Token = symbol.parse()?;
            let size = slots.len();
            let Some(slot) = slots.get_mut(id) else {
                return Err(MelodyError::ModelShape(format!(
                    "id {id} for '{symbol}' is outside 0..{size}"
                )));
            };
            if slot.is_some() {
                return Err(MelodyError::ModelShape(format!("id {id} is assigned twice")));
            }
            *slot = Some(token);
        }
        let tokens = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| MelodyError::ModelShape("vocabulary ids are not dense".into()))?;
        Self::from_tokens(tokens)
    }

    /// Write as a JSON object with 4-space indentation.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.to_map().serialize(&mut ser)?;
        std::fs::write(path, buf).map_err(|e| MelodyError::io_at(path, e))?;
        info!(path = %path.display(), size = self.len(), "wrote vocabulary");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| MelodyError::io_at(path, e))?;
        let map: BTreeMap<String, usize> = serde_json::from_str(&data)?;
        Self::from_map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sorted_and_dense() {
        let vocab = Vocabulary::from_corpus("60 _ _ 62 r / / 60").unwrap();
        assert_eq!(vocab.len(), 5);
        // Sorted by string: "/" < "60" < "62" < "_" < "r"
        assert_eq!(vocab.id_of(Token::Boundary).unwrap(), 0);
        assert_eq!(vocab.id_of(Token::Pitch(60)).unwrap(), 1);
        assert_eq!(vocab.id_of(Token::Pitch(62)).unwrap(), 2);
        assert_eq!(vocab.id_of(Token::Hold).unwrap(), 3);
        assert_eq!(vocab.id_of(Token::Rest).unwrap(), 4);
    }

    #[test]
    fn test_unknown_token_is_lookup_error() {
        let vocab = Vocabulary::from_corpus("60 _").unwrap();
        assert!(matches!(
            vocab.id_of(Token::Pitch(61)),
            Err(MelodyError::UnknownToken(ref s)) if s == "61"
        ));
        assert!(matches!(vocab.token_of(7), Err(MelodyError::UnknownTokenId(7))));
        assert!(vocab.encode_str("60 61").is_err());
    }

    #[test]
    fn test_every_corpus_token_is_mapped() {
        let corpus = "55 _ _ _ 57 _ 59 r _ _ 60 _ _ _ / / / / 64 _ 62 _ 60";
        let vocab = Vocabulary::from_corpus(corpus).unwrap();
        let ids = vocab.encode_str(corpus).unwrap();
        assert_eq!(ids.len(), corpus.split_whitespace().count());
        let back = vocab.decode(&ids).unwrap();
        assert_eq!(crate::token::join_tokens(&back), corpus);
    }

    #[test]
    fn test_empty_corpus_is_error() {
        assert!(matches!(
            Vocabulary::from_corpus("   "),
            Err(MelodyError::EmptyCorpus(_))
        ));
    }

    #[test]
    fn test_from_map_rejects_gaps() {
        let mut map = BTreeMap::new();
        map.insert("60".to_string(), 0);
        map.insert("_".to_string(), 2);
        assert!(Vocabulary::from_map(map).is_err());
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Mapping.json");
        let vocab = Vocabulary::from_corpus("67 _ r / 72").unwrap();
        vocab.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"67\": "), "expected 4-space indent: {text}");

        let loaded = Vocabulary::load(&path).unwrap();
        assert_eq!(loaded, vocab);
    }
}
