// Count-based next-token model with backoff.
//
// Trained from the same (window, target) pairs a neural model would see.
// For each order k in 1..=N it counts which id followed the last k ids of
// every window; prediction uses the longest context suffix that was seen in
// training and backs off one order at a time down to the unigram
// distribution.
//
// The model is the artifact the web front end loads at start: a JSON file
// holding the count tables. It implements `SequenceModel`, so the generator
// drives it through one-hot windows exactly like any other model.

use crate::error::{MelodyError, Result};
use crate::model::SequenceModel;
use crate::training::{OneHotSequence, TrainingSequences};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Next id → count.
type TransitionTable = BTreeMap<usize, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovModel {
    /// Window length the model was trained with.
    pub sequence_length: usize,
    pub vocab_size: usize,
    /// `orders[k - 1]` maps an order-k context key to its transitions.
    pub orders: Vec<BTreeMap<String, TransitionTable>>,
    /// Order-0: overall target distribution.
    pub unigram: TransitionTable,
}

impl MarkovModel {
    /// Count transitions of every order up to `max_order` (capped at the
    /// window length).
    pub fn fit(sequences: &TrainingSequences, max_order: usize) -> Result<Self> {
        if sequences.is_empty() {
            return Err(MelodyError::EmptyCorpus(
                "corpus is not longer than one window".into(),
            ));
        }
        let max_order = max_order.clamp(1, sequences.sequence_length());
        let mut orders: Vec<BTreeMap<String, TransitionTable>> = vec![BTreeMap::new(); max_order];
        let mut unigram = TransitionTable::new();

        for (window, target) in sequences.pairs() {
            *unigram.entry(target).or_insert(0.0) += 1.0;
            for (k, table) in orders.iter_mut().enumerate() {
                let key = context_key(&window[window.len() - (k + 1)..]);
                *table
                    .entry(key)
                    .or_default()
                    .entry(target)
                    .or_insert(0.0) += 1.0;
            }
        }

        info!(
            pairs = sequences.len(),
            order = max_order,
            contexts = orders.iter().map(BTreeMap::len).sum::<usize>(),
            "fitted Markov model"
        );

        Ok(MarkovModel {
            sequence_length: sequences.sequence_length(),
            vocab_size: sequences.num_classes(),
            orders,
            unigram,
        })
    }

    pub fn max_order(&self) -> usize {
        self.orders.len()
    }

    /// Transition counts for the longest matching context suffix.
    fn backoff_table(&self, context: &[usize]) -> &TransitionTable {
        for k in (1..=self.max_order().min(context.len())).rev() {
            let key = context_key(&context[context.len() - k..]);
            if let Some(table) = self.orders[k - 1].get(&key) {
                if table.values().sum::<f64>() > 0.0 {
                    return table;
                }
            }
        }
        &self.unigram
    }

    /// Probability vector for the token following `context`.
    pub fn distribution(&self, context: &[usize]) -> Vec<f64> {
        let table = self.backoff_table(context);
        let total: f64 = table.values().sum();
        let mut probs = vec![0.0; self.vocab_size];
        if total > 0.0 {
            for (&id, &count) in table {
                if let Some(slot) = probs.get_mut(id) {
                    *slot = count / total;
                }
            }
        }
        probs
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| MelodyError::io_at(path, e))?;
        let model: MarkovModel = serde_json::from_str(&data)?;
        if model.orders.is_empty() || model.vocab_size == 0 {
            return Err(MelodyError::ModelShape(format!(
                "{} holds an empty model",
                path.display()
            )));
        }
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string(self)?;
        std::fs::write(path, data).map_err(|e| MelodyError::io_at(path, e))?;
        Ok(())
    }
}

impl SequenceModel for MarkovModel {
    fn input_length(&self) -> usize {
        self.sequence_length
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn predict(&self, context: &OneHotSequence) -> Result<Vec<f64>> {
        if context.num_classes() != self.vocab_size {
            return Err(MelodyError::ModelShape(format!(
                "context has {} classes, model expects {}",
                context.num_classes(),
                self.vocab_size
            )));
        }
        Ok(self.distribution(&context.ids()))
    }
}

/// Encode a context (slice of ids) as a string key for BTreeMap lookup.
fn context_key(context: &[usize]) -> String {
    context
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
