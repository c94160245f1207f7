// Folk Melody Pipeline
//
// Turns a corpus of monophonic folk songs in Humdrum **kern notation into a
// next-token training corpus, trains a sequence model on it, and samples new
// melodies from a seed. Generated token streams are rendered back to MIDI or
// LilyPond.
//
// Architecture:
// - config.rs: PipelineConfig (paths, time step, window length, defaults)
// - error.rs: MelodyError and the crate Result alias
// - score.rs: Score representation (note/rest events, pitch spelling, keys)
// - kern.rs: **kern parser producing a Score from the first melodic spine
// - key.rs: Key estimation (profile correlation) and transposition to C / Am
// - token.rs: Token alphabet (MIDI pitch, rest, hold, boundary)
// - encode.rs: Score → time-step token stream
// - corpus.rs: Load, filter, transpose, encode, merge, and map a corpus
// - vocab.rs: Token ↔ id vocabulary persisted as JSON
// - training.rs: Sliding-window training pairs and one-hot windows
// - model.rs: SequenceModel trait (one-hot window → next-token probabilities)
// - markov.rs: Count-based n-gram SequenceModel with backoff
// - sampler.rs: Temperature-scaled categorical sampling
// - generator.rs: Autoregressive generation from a seed
// - render.rs: Token stream → note/rest events → output file
// - midi.rs: MIDI file output
// - lilypond.rs: LilyPond sheet music output (.ly files for engraving)
//
// Generation is deterministic given a seeded RNG.

pub mod config;
pub mod corpus;
pub mod encode;
pub mod error;
pub mod generator;
pub mod kern;
pub mod key;
pub mod lilypond;
pub mod markov;
pub mod midi;
pub mod model;
pub mod render;
pub mod sampler;
pub mod score;
pub mod token;
pub mod training;
pub mod vocab;
