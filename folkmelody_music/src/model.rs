// Next-token model interface.
//
// The generator only needs a function from a one-hot context window to a
// probability vector over the vocabulary. Anything that can provide that
// (the bundled Markov model in markov.rs, or an external network runtime)
// implements `SequenceModel`.

use crate::error::Result;
use crate::training::OneHotSequence;

pub trait SequenceModel {
    /// Number of context positions the model reads. Longer contexts are
    /// truncated to their last `input_length()` tokens by the caller.
    fn input_length(&self) -> usize;

    /// Number of classes in the output distribution.
    fn vocab_size(&self) -> usize;

    /// Probability of each token id following `context`. The returned vector
    /// has `vocab_size()` entries.
    fn predict(&self, context: &OneHotSequence) -> Result<Vec<f64>>;
}

impl<M: SequenceModel + ?Sized> SequenceModel for Box<M> {
    fn input_length(&self) -> usize {
        (**self).input_length()
    }

    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }

    fn predict(&self, context: &OneHotSequence) -> Result<Vec<f64>> {
        (**self).predict(context)
    }
}
