//! .vsi snapshot reader

use crate::format::{
    FormatError, IndexEntry, IndexFile, IndexHeader, IndexMetadata, CHECKSUM, HEADER_SIZE, MAGIC,
    VERSION,
};
use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

pub struct IndexReader;

impl IndexReader {
    /// Read a .vsi snapshot, verifying magic, version and payload checksum
    pub fn read(path: &Path) -> Result<IndexFile> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open .vsi file: {}", path.display()))?;

        // SAFETY: the snapshot is replaced by rename, never rewritten in place,
        // so the mapped file is not mutated while we hold the map.
        let map = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to map .vsi file: {}", path.display()))?;

        Self::parse(&map).with_context(|| format!("Invalid .vsi file: {}", path.display()))
    }

    /// Parse a snapshot held in memory
    pub fn parse(bytes: &[u8]) -> Result<IndexFile> {
        let header = Self::parse_header(bytes)?;
        let metadata = Self::parse_metadata(bytes, &header)?;
        let entries = Self::parse_entries(bytes, &header)?;

        Ok(IndexFile {
            header,
            metadata,
            entries,
        })
    }

    fn parse_header(bytes: &[u8]) -> Result<IndexHeader> {
        let mut cursor = Cursor::new(bytes);

        let magic: [u8; 4] = cursor.take_array()?;
        if magic != MAGIC {
            return Err(FormatError::BadMagic.into());
        }

        let version = u16::from_le_bytes(cursor.take_array()?);
        if version != VERSION {
            return Err(FormatError::UnsupportedVersion(version).into());
        }

        Ok(IndexHeader {
            magic,
            version,
            flags: u16::from_le_bytes(cursor.take_array()?),
            dimension: u32::from_le_bytes(cursor.take_array()?),
            num_entries: u32::from_le_bytes(cursor.take_array()?),
            metadata_size: u64::from_le_bytes(cursor.take_array()?),
            payload_size: u64::from_le_bytes(cursor.take_array()?),
            payload_size_compressed: u64::from_le_bytes(cursor.take_array()?),
            checksum: u64::from_le_bytes(cursor.take_array()?),
            reserved1: u64::from_le_bytes(cursor.take_array()?),
            reserved2: u64::from_le_bytes(cursor.take_array()?),
        })
    }

    fn parse_metadata(bytes: &[u8], header: &IndexHeader) -> Result<IndexMetadata> {
        let end = offset(bytes, HEADER_SIZE, header.metadata_size)?;
        let block = slice(bytes, HEADER_SIZE, end)?;
        let metadata = serde_json::from_slice(block).context("Malformed snapshot metadata")?;
        Ok(metadata)
    }

    fn parse_entries(bytes: &[u8], header: &IndexHeader) -> Result<Vec<IndexEntry>> {
        let start = offset(bytes, HEADER_SIZE, header.metadata_size)?;
        let end = offset(bytes, start, header.stored_payload_size())?;
        let stored = slice(bytes, start, end)?;

        let computed = CHECKSUM.checksum(stored);
        if computed != header.checksum {
            return Err(FormatError::ChecksumMismatch {
                stored: header.checksum,
                computed,
            }
            .into());
        }

        let entries: Vec<IndexEntry> = if header.is_compressed() {
            let payload = zstd::decode_all(stored).context("Failed to decompress index payload")?;
            bincode::deserialize(&payload)?
        } else {
            bincode::deserialize(stored)?
        };

        if entries.len() != header.num_entries as usize {
            anyhow::bail!(
                "Entry count mismatch: header says {}, payload holds {}",
                header.num_entries,
                entries.len()
            );
        }

        Ok(entries)
    }
}

/// `start + len`; header sizes are not covered by the checksum
fn offset(bytes: &[u8], start: usize, len: u64) -> Result<usize, FormatError> {
    usize::try_from(len)
        .ok()
        .and_then(|len| start.checked_add(len))
        .ok_or(FormatError::Truncated {
            needed: usize::MAX,
            available: bytes.len(),
        })
}

fn slice(bytes: &[u8], start: usize, end: usize) -> Result<&[u8], FormatError> {
    bytes.get(start..end).ok_or(FormatError::Truncated {
        needed: end,
        available: bytes.len(),
    })
}

/// Little-endian field reader over the fixed header
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let end = offset(self.bytes, self.pos, N as u64)?;
        let chunk = slice(self.bytes, self.pos, end)?;
        let mut out = [0u8; N];
        out.copy_from_slice(chunk);
        self.pos += N;
        Ok(out)
    }
}
