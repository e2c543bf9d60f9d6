//! .vsi corpus snapshot format structures

use crate::json_format::BoundsFile;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Magic bytes for .vsi files: "VSIX"
pub const MAGIC: [u8; 4] = [0x56, 0x53, 0x49, 0x58];

/// Current format version
pub const VERSION: u16 = 1;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 64;

/// Algorithm identifier written into snapshot metadata
pub const ALGORITHM_ID: &str = "VOXSIM-WCOS";

/// CRC-64 used for the payload checksum
pub const CHECKSUM: crc::Crc<u64> = crc::Crc::<u64>::new(&crc::CRC_64_ECMA_182);

/// Structural problems detected while reading a snapshot
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("invalid .vsi file: magic bytes mismatch")]
    BadMagic,

    #[error("unsupported .vsi version {0}")]
    UnsupportedVersion(u16),

    #[error("truncated .vsi file: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("payload checksum mismatch: stored {stored:#018x}, computed {computed:#018x}")]
    ChecksumMismatch { stored: u64, computed: u64 },
}

/// File header (64 bytes fixed size, little-endian)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHeader {
    /// Magic bytes: "VSIX"
    pub magic: [u8; 4],
    pub version: u16,
    /// Flags (bit 0: payload is zstd-compressed)
    pub flags: u16,
    /// Flattened vector dimensionality the snapshot was built with
    pub dimension: u32,
    pub num_entries: u32,
    pub metadata_size: u64,
    /// Size of the bincode payload before compression
    pub payload_size: u64,
    /// Compressed payload size (0 if uncompressed)
    pub payload_size_compressed: u64,
    /// CRC-64 of the payload bytes as stored on disk
    pub checksum: u64,
    pub reserved1: u64,
    pub reserved2: u64,
}

impl IndexHeader {
    pub fn new(dimension: u32, num_entries: u32, metadata_size: u64, payload_size: u64) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            flags: 0,
            dimension,
            num_entries,
            metadata_size,
            payload_size,
            payload_size_compressed: 0,
            checksum: 0,
            reserved1: 0,
            reserved2: 0,
        }
    }

    pub fn is_compressed(&self) -> bool {
        (self.flags & 0x1) != 0
    }

    pub fn set_compressed(&mut self, compressed: bool) {
        if compressed {
            self.flags |= 0x1;
        } else {
            self.flags &= !0x1;
        }
    }

    /// Number of payload bytes actually stored after the metadata block
    pub fn stored_payload_size(&self) -> u64 {
        if self.is_compressed() {
            self.payload_size_compressed
        } else {
            self.payload_size
        }
    }
}

/// Metadata section (stored as JSON)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub algorithm_id: String,
    /// Analysis parameters the corpus was extracted with
    pub analysis_params: serde_json::Value,
    /// Whether the optional preprocessing stage ran during ingest
    #[serde(default)]
    pub preprocessed: bool,
    pub created_at: String,
    /// Normalization bounds learned from the corpus
    pub bounds: BoundsFile,
}

impl IndexMetadata {
    pub fn new(analysis_params: serde_json::Value, preprocessed: bool, bounds: BoundsFile) -> Self {
        Self {
            algorithm_id: ALGORITHM_ID.to_string(),
            analysis_params,
            preprocessed,
            created_at: chrono::Utc::now().to_rfc3339(),
            bounds,
        }
    }
}

/// One normalized, flattened corpus vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub identity: String,
    pub vector: Vec<f64>,
}

/// Complete .vsi file structure
#[derive(Debug, Clone, PartialEq)]
pub struct IndexFile {
    pub header: IndexHeader,
    pub metadata: IndexMetadata,
    pub entries: Vec<IndexEntry>,
}
