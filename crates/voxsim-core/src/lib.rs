//! Voxsim Core - Audio Recording Similarity Index
//!
//! Recordings are summarized into fixed-length spectral vectors, normalized
//! against corpus-wide bounds and ranked by weighted cosine similarity.

pub mod aggregate;
pub mod audio;
pub mod config;
pub mod corpus;
pub mod error;
pub mod extractor;
pub mod normalize;
pub mod preprocess;
pub mod settings;
pub mod similarity;
pub mod stats;
pub mod store;
pub mod summary;
pub mod transform;

pub use config::AnalysisConfig;
pub use corpus::{Corpus, IngestEvent, IngestFailure, IngestReport};
pub use error::{Error, ExtractionError, Result};
pub use extractor::{FeatureExtractor, FrameFeatures, SpectralExtractor};
pub use normalize::normalize;
pub use preprocess::Preprocessor;
pub use settings::{StoreFormat, VoxsimConfig};
pub use similarity::{CorpusEntry, Hit, QueryOutcome, SimilarityIndex};
pub use stats::{compute_bounds, NormalizationBounds, StatsDiagnostic};
pub use summary::{Field, NormalizedVector, SummaryVector, SUMMARY_DIM};

use std::path::Path;

/// Generate the summary vector of an audio file
pub fn extract_summary(
    audio_path: &Path,
    extractor: &dyn FeatureExtractor,
    preprocessor: Option<&Preprocessor>,
) -> std::result::Result<SummaryVector, ExtractionError> {
    // Decode to mono at the analysis rate
    let wave = audio::decode_file(audio_path, extractor.sample_rate())?;

    let wave = match preprocessor {
        Some(p) => p.process(wave),
        None => wave,
    };
    if wave.is_empty() {
        return Err(ExtractionError::Empty);
    }

    // Per-frame features
    let frames = extractor.extract(&wave.samples, wave.sample_rate)?;

    // Collapse frames into per-feature statistics
    aggregate::aggregate(&frames)
}
