//! voxsim on-disk formats: feature files, bounds files and corpus snapshots

pub mod format;
pub mod json_format;
pub mod reader;
pub mod writer;

pub use format::{
    FormatError, IndexEntry, IndexFile, IndexHeader, IndexMetadata, ALGORITHM_ID, HEADER_SIZE,
    MAGIC, VERSION,
};
pub use json_format::{BoundsEntry, BoundsFile, FeatureFile, FeatureValue};
pub use reader::IndexReader;
pub use writer::IndexWriter;
