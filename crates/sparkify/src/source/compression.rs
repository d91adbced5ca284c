//! Decompression of raw input files, chosen by file extension.

use bytes::Bytes;
use std::io::Read;

/// Compression codec of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Plain JSON.
    None,
    /// Gzip-compressed JSON (`.gz`).
    Gzip,
}

impl CompressionFormat {
    /// Detect the codec from a file path.
    pub fn from_path(path: &str) -> Self {
        if path.ends_with(".gz") {
            CompressionFormat::Gzip
        } else {
            CompressionFormat::None
        }
    }

    /// Decompress `data` fully into memory.
    pub fn decompress(&self, data: Bytes) -> Result<Bytes, std::io::Error> {
        match self {
            CompressionFormat::None => Ok(data),
            CompressionFormat::Gzip => {
                let mut decoder = flate2::read::GzDecoder::new(data.as_ref());
                let mut buf = Vec::with_capacity(data.len() * 4);
                decoder.read_to_end(&mut buf)?;
                Ok(Bytes::from(buf))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompressionFormat::None => "none",
            CompressionFormat::Gzip => "gzip",
        }
    }
}
