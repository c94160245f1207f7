// Corpus preparation: load, filter, transpose, encode, merge, map.
//
// The stages run in this order:
// 1. `load_songs_in_kern` walks the dataset tree and parses every `.krn`.
// 2. `has_acceptable_durations` drops songs with durations outside the
//    whitelist (triplets, grace notes, very long notes).
// 3. Kept songs are transposed to C major / A minor (key.rs) and encoded
//    (encode.rs), one text file per song named by its load index.
// 4. `create_single_file_dataset` concatenates the per-song files with a
//    run of `sequence_length` boundary markers after each song.
// 5. `create_mapping` builds and saves the vocabulary from the merged text.
//
// A malformed kern file aborts the whole run; nothing is skipped silently.

use crate::config::PipelineConfig;
use crate::encode::encode_song;
use crate::error::{MelodyError, Result};
use crate::key::{KeyProfile, transpose_to_canonical};
use crate::kern::load_kern_file;
use crate::score::Score;
use crate::token::BOUNDARY_SYMBOL;
use crate::vocab::Vocabulary;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

const KERN_EXTENSION: &str = "krn";

/// Tolerance for comparing quarter lengths against the whitelist.
const DURATION_EPSILON: f64 = 1e-9;

/// Counts from one preprocessing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreprocessReport {
    pub loaded: usize,
    pub kept: usize,
    pub rejected: usize,
}

/// Every `.krn` file under `dataset_path`, in sorted path order.
pub fn find_kern_files(dataset_path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dataset_path).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dataset_path).to_path_buf();
            MelodyError::io_at(path, std::io::Error::other(e.to_string()))
        })?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().and_then(|e| e.to_str()) == Some(KERN_EXTENSION)
        {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// Parse every kern file under `dataset_path`.
pub fn load_songs_in_kern(dataset_path: &Path) -> Result<Vec<Score>> {
    find_kern_files(dataset_path)?
        .iter()
        .map(|path| {
            debug!(path = %path.display(), "parsing");
            load_kern_file(path)
        })
        .collect()
}

/// True if every note and rest has a whitelisted quarter length.
pub fn has_acceptable_durations(song: &Score, acceptable_durations: &[f64]) -> bool {
    song.events.iter().all(|event| {
        acceptable_durations
            .iter()
            .any(|&d| (event.quarter_length - d).abs() < DURATION_EPSILON)
    })
}

/// Load, filter, transpose, and encode the corpus, writing one file per kept
/// song into `save_dir`. Anything already in `save_dir` is removed first.
pub fn preprocess(config: &PipelineConfig) -> Result<PreprocessReport> {
    info!(path = %config.dataset_path.display(), "loading songs");
    let songs = load_songs_in_kern(&config.dataset_path)?;
    info!(count = songs.len(), "loaded songs");

    // Songs from an earlier run would otherwise leak into the merged corpus.
    if config.save_dir.exists() {
        debug!(path = %config.save_dir.display(), "clearing previous encodings");
        std::fs::remove_dir_all(&config.save_dir)
            .map_err(|e| MelodyError::io_at(&config.save_dir, e))?;
    }
    std::fs::create_dir_all(&config.save_dir)
        .map_err(|e| MelodyError::io_at(&config.save_dir, e))?;

    let profile = KeyProfile::default();
    let mut report = PreprocessReport {
        loaded: songs.len(),
        ..Default::default()
    };

    for (i, song) in songs.iter().enumerate() {
        if !has_acceptable_durations(song, &config.acceptable_durations) {
            debug!(index = i, title = ?song.title, "rejected: unacceptable durations");
            report.rejected += 1;
            continue;
        }

        let song = transpose_to_canonical(song, &profile)?;
        let encoded = encode_song(&song, config.time_step);

        let save_path = config.save_dir.join(i.to_string());
        std::fs::write(&save_path, encoded).map_err(|e| MelodyError::io_at(&save_path, e))?;
        report.kept += 1;
    }

    info!(
        kept = report.kept,
        rejected = report.rejected,
        "preprocessing finished"
    );
    Ok(report)
}

/// Read a text file.
pub fn load(file_path: &Path) -> Result<String> {
    std::fs::read_to_string(file_path).map_err(|e| MelodyError::io_at(file_path, e))
}

/// Concatenate the encoded songs under `dataset_path`, each followed by
/// `sequence_length` boundary markers, and write the result to
/// `dataset_file_path`.
pub fn create_single_file_dataset(
    dataset_path: &Path,
    dataset_file_path: &Path,
    sequence_length: usize,
) -> Result<String> {
    let delimiter = format!("{BOUNDARY_SYMBOL} ").repeat(sequence_length);
    let mut songs = String::new();
    let mut count = 0usize;

    for entry in WalkDir::new(dataset_path).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dataset_path).to_path_buf();
            MelodyError::io_at(path, std::io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let song = load(entry.path())?;
        songs.push_str(&song);
        songs.push(' ');
        songs.push_str(&delimiter);
        count += 1;
    }

    // Drop the trailing space after the last boundary marker.
    songs.pop();

    if let Some(parent) = dataset_file_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| MelodyError::io_at(parent, e))?;
        }
    }
    std::fs::write(dataset_file_path, &songs)
        .map_err(|e| MelodyError::io_at(dataset_file_path, e))?;
    info!(songs = count, path = %dataset_file_path.display(), "merged corpus");
    Ok(songs)
}

/// Build the vocabulary from the merged corpus and save it.
pub fn create_mapping(songs: &str, mapping_path: &Path) -> Result<Vocabulary> {
    let vocab = Vocabulary::from_corpus(songs)?;
    vocab.save(mapping_path)?;
    Ok(vocab)
}

/// Map the merged corpus to ids.
pub fn convert_songs_to_int(songs: &str, vocab: &Vocabulary) -> Result<Vec<usize>> {
    vocab.encode_str(songs)
}

/// Full preparation: preprocess, merge, and build the mapping.
pub fn prepare_corpus(config: &PipelineConfig) -> Result<(PreprocessReport, Vocabulary)> {
    let report = preprocess(config)?;
    let songs = create_single_file_dataset(
        &config.save_dir,
        &config.single_file_dataset,
        config.sequence_length,
    )?;
    let vocab = create_mapping(&songs, &config.mapping_path)?;
    Ok((report, vocab))
}
