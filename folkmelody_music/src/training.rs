// Training pairs and one-hot encoding.
//
// The merged corpus, mapped to ids, is cut into overlapping windows: window
// `i` is `ids[i..i + sequence_length]` and its target is
// `ids[i + sequence_length]`. A corpus of n ids yields `n - sequence_length`
// pairs.
//
// Models consume windows one-hot encoded as a `sequence_length x vocab_size`
// matrix (`OneHotSequence`). The matrix is only materialized per window;
// holding the whole corpus one-hot would cost `pairs * len * vocab` floats.

use crate::error::{MelodyError, Result};
use crate::vocab::Vocabulary;

/// Row-major one-hot matrix: one row per position, one column per token id.
#[derive(Debug, Clone, PartialEq)]
pub struct OneHotSequence {
    rows: usize,
    num_classes: usize,
    data: Vec<f32>,
}

impl OneHotSequence {
    /// One-hot encode `ids` with `num_classes` columns.
    pub fn from_ids(ids: &[usize], num_classes: usize) -> Result<Self> {
        let mut data = vec![0.0; ids.len() * num_classes];
        for (row, &id) in ids.iter().enumerate() {
            if id >= num_classes {
                return Err(MelodyError::UnknownTokenId(id));
            }
            data[row * num_classes + id] = 1.0;
        }
        Ok(OneHotSequence {
            rows: ids.len(),
            num_classes,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.num_classes..(index + 1) * self.num_classes]
    }

    /// Recover the id of each row (the hot column; the first one on ties).
    pub fn ids(&self) -> Vec<usize> {
        (0..self.rows)
            .map(|r| {
                self.row(r)
                    .iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
                        if v > best.1 { (i, v) } else { best }
                    })
                    .0
            })
            .collect()
    }
}

/// (window, next id) pairs over an integer corpus.
#[derive(Debug, Clone)]
pub struct TrainingSequences {
    ids: Vec<usize>,
    sequence_length: usize,
    num_classes: usize,
}

impl TrainingSequences {
    pub fn new(ids: Vec<usize>, sequence_length: usize, num_classes: usize) -> Result<Self> {
        if sequence_length == 0 {
            return Err(MelodyError::ModelShape("sequence_length must be at least 1".into()));
        }
        if let Some(&bad) = ids.iter().find(|&&id| id >= num_classes) {
            return Err(MelodyError::UnknownTokenId(bad));
        }
        Ok(TrainingSequences {
            ids,
            sequence_length,
            num_classes,
        })
    }

    /// Number of (window, target) pairs.
    pub fn len(&self) -> usize {
        self.ids.len().saturating_sub(self.sequence_length)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Window `i` and its target id.
    pub fn pair(&self, i: usize) -> Option<(&[usize], usize)> {
        if i >= self.len() {
            return None;
        }
        let end = i + self.sequence_length;
        Some((&self.ids[i..end], self.ids[end]))
    }

    /// Iterate over all (window, target) pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (&[usize], usize)> + '_ {
        (0..self.len()).filter_map(move |i| self.pair(i))
    }

    /// Iterate over one-hot windows and their targets.
    pub fn one_hot_pairs(&self) -> impl Iterator<Item = Result<(OneHotSequence, usize)>> + '_ {
        self.pairs().map(move |(window, target)| {
            OneHotSequence::from_ids(window, self.num_classes).map(|encoded| (encoded, target))
        })
    }

    pub fn targets(&self) -> &[usize] {
        self.ids.get(self.sequence_length..).unwrap_or(&[])
    }
}

/// Map the merged corpus to ids and cut it into training pairs.
pub fn generate_training_sequences(
    songs: &str,
    vocab: &Vocabulary,
    sequence_length: usize,
) -> Result<TrainingSequences> {
    let ids = vocab.encode_str(songs)?;
    TrainingSequences::new(ids, sequence_length, vocab.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hot_rows() {
        let m = OneHotSequence::from_ids(&[2, 0, 1], 3).unwrap();
        assert_eq!(m.rows(), 3);
        assert_eq!(m.row(0), &[0.0f32, 0.0, 1.0][..]);
        assert_eq!(m.row(1), &[1.0f32, 0.0, 0.0][..]);
        assert_eq!(m.ids(), vec![2, 0, 1]);
        assert!(OneHotSequence::from_ids(&[3], 3).is_err());
    }

    #[test]
    fn test_window_count_and_targets() {
        let seqs = TrainingSequences::new(vec![0, 1, 2, 3, 4, 0], 4, 5).unwrap();
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs.pair(0), Some((&[0, 1, 2, 3][..], 4)));
        assert_eq!(seqs.pair(1), Some((&[1, 2, 3, 4][..], 0)));
        assert_eq!(seqs.pair(2), None);
        assert_eq!(seqs.targets(), &[4usize, 0][..]);
    }

    #[test]
    fn test_short_corpus_has_no_pairs() {
        let seqs = TrainingSequences::new(vec![0, 1], 4, 2).unwrap();
        assert!(seqs.is_empty());
        assert_eq!(seqs.pairs().count(), 0);
        assert!(seqs.targets().is_empty());
    }

    #[test]
    fn test_from_corpus_string() {
        let songs = "60 _ 62 _ / / 60";
        let vocab = Vocabulary::from_corpus(songs).unwrap();
        let seqs = generate_training_sequences(songs, &vocab, 2).unwrap();
        assert_eq!(seqs.len(), 5);
        let (x, y) = seqs.one_hot_pairs().next().unwrap().unwrap();
        assert_eq!(x.rows(), 2);
        assert_eq!(x.num_classes(), vocab.len());
        assert_eq!(vocab.token_of(y).unwrap().to_string(), "62");
    }
}
