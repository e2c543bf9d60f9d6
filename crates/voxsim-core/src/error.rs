//! Error taxonomy for corpus ingestion and retrieval

use std::path::PathBuf;
use thiserror::Error;

/// A single recording could not be analyzed
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("recording contains no audio samples")]
    Empty,

    #[error("invalid analysis output: {0}")]
    InvalidFeatures(String),
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("extraction failed for {identity}: {source}")]
    Extraction {
        identity: String,
        #[source]
        source: ExtractionError,
    },

    /// The vector carries a feature the persisted bounds know nothing about
    #[error("no normalization bounds for feature '{0}'; the corpus was built by a different pipeline")]
    MissingBounds(String),

    /// The corpus has never been ingested
    #[error("no normalization bounds found at {}; ingest the corpus first", .0.display())]
    BoundsNotFound(PathBuf),

    #[error("invalid summary vector: {0}")]
    InvalidVector(String),

    #[error("another ingest holds the build lock {}; delete it if no ingest is running", .0.display())]
    IngestInProgress(PathBuf),

    #[error("path is outside the corpus root: {}", .0.display())]
    OutsideCorpus(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl Error {
    /// True for both flavors of missing normalization bounds
    pub fn is_missing_bounds(&self) -> bool {
        matches!(self, Error::MissingBounds(_) | Error::BoundsNotFound(_))
    }

    /// Stable machine-readable tag for reporting
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Extraction { .. } => "extraction",
            Error::MissingBounds(_) | Error::BoundsNotFound(_) => "missing_bounds",
            Error::InvalidVector(_) => "invalid_vector",
            Error::IngestInProgress(_) => "ingest_in_progress",
            Error::OutsideCorpus(_) => "outside_corpus",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Store(_) => "store",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_bounds_kinds() {
        let field = Error::MissingBounds("mfcc_mean".to_string());
        let absent = Error::BoundsNotFound(PathBuf::from("corpus/normalized_features/configs.json"));
        assert!(field.is_missing_bounds());
        assert!(absent.is_missing_bounds());
        assert_eq!(field.kind(), absent.kind());
        assert!(absent.to_string().contains("configs.json"));
    }

    #[test]
    fn test_extraction_error_names_the_recording() {
        let err = Error::Extraction {
            identity: "corpus/bad.wav".to_string(),
            source: ExtractionError::Empty,
        };
        assert_eq!(err.kind(), "extraction");
        assert!(err.to_string().contains("corpus/bad.wav"));
        assert!(!err.is_missing_bounds());
    }
}
