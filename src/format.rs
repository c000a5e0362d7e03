//! Compression format definitions

use std::io::{self, Read};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compression applied around the tar stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionFormat {
    /// Raw tar
    #[default]
    None,
    /// Gzip compression
    Gzip,
}

impl CompressionFormat {
    /// Pick the compression for the `gzip` flag taken by `create`
    pub fn from_gzip(gzip: bool) -> Self {
        if gzip {
            CompressionFormat::Gzip
        } else {
            CompressionFormat::None
        }
    }

    /// Sniff the compression from the first bytes of an archive
    pub fn detect(prefix: &[u8]) -> Self {
        if prefix.starts_with(&GZIP_MAGIC) {
            CompressionFormat::Gzip
        } else {
            CompressionFormat::None
        }
    }

    /// Read just enough of `reader` to sniff its compression.
    ///
    /// Returns the bytes consumed so the caller can chain them back in front
    /// of the stream.
    pub(crate) fn sniff<R: Read>(reader: &mut R) -> io::Result<(Self, Vec<u8>)> {
        let mut prefix = Vec::with_capacity(GZIP_MAGIC.len());
        reader
            .by_ref()
            .take(GZIP_MAGIC.len() as u64)
            .read_to_end(&mut prefix)?;
        Ok((Self::detect(&prefix), prefix))
    }

    /// Get the typical file extension for an archive with this compression
    pub fn extension(&self) -> &'static str {
        match self {
            CompressionFormat::None => "tar",
            CompressionFormat::Gzip => "tar.gz",
        }
    }
}
