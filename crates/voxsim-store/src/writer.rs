//! .vsi snapshot writer

use crate::format::{IndexEntry, IndexHeader, IndexMetadata, CHECKSUM};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// zstd level used for compressed payloads
const COMPRESSION_LEVEL: i32 = 3;

pub struct IndexWriter {
    compress: bool,
}

impl IndexWriter {
    pub fn new() -> Self {
        Self { compress: false }
    }

    /// Compress the entry payload with zstd
    pub fn compressed(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Write a .vsi snapshot and return the header that was written
    pub fn write(
        &self,
        path: &Path,
        dimension: usize,
        metadata: &IndexMetadata,
        entries: &[IndexEntry],
    ) -> Result<IndexHeader> {
        let metadata_bytes = serde_json::to_vec(metadata)?;
        let payload = bincode::serialize(entries).context("Failed to encode index entries")?;

        let mut header = IndexHeader::new(
            dimension as u32,
            entries.len() as u32,
            metadata_bytes.len() as u64,
            payload.len() as u64,
        );

        let stored = if self.compress {
            let compressed = zstd::encode_all(&payload[..], COMPRESSION_LEVEL)
                .context("Failed to compress index payload")?;
            header.set_compressed(true);
            header.payload_size_compressed = compressed.len() as u64;
            compressed
        } else {
            payload
        };
        header.checksum = CHECKSUM.checksum(&stored);

        let file = File::create(path)
            .with_context(|| format!("Failed to create .vsi file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        self.write_header(&mut writer, &header)?;
        writer.write_all(&metadata_bytes)?;
        writer.write_all(&stored)?;
        writer.flush()?;

        Ok(header)
    }

    fn write_header<W: Write>(&self, writer: &mut W, header: &IndexHeader) -> Result<()> {
        // Write as little-endian binary
        writer.write_all(&header.magic)?;
        writer.write_all(&header.version.to_le_bytes())?;
        writer.write_all(&header.flags.to_le_bytes())?;
        writer.write_all(&header.dimension.to_le_bytes())?;
        writer.write_all(&header.num_entries.to_le_bytes())?;
        writer.write_all(&header.metadata_size.to_le_bytes())?;
        writer.write_all(&header.payload_size.to_le_bytes())?;
        writer.write_all(&header.payload_size_compressed.to_le_bytes())?;
        writer.write_all(&header.checksum.to_le_bytes())?;
        writer.write_all(&header.reserved1.to_le_bytes())?;
        writer.write_all(&header.reserved2.to_le_bytes())?;

        Ok(())
    }
}

impl Default for IndexWriter {
    fn default() -> Self {
        Self::new()
    }
}
