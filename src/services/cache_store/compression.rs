//! Compression codecs
//!
//! The store decides *when* to compress (size above the configured threshold);
//! a [`CompressionCodec`] decides *how*. Payloads are kept in a
//! [`CompressedPayload`] envelope with a SHA-256 checksum that is verified
//! before decoding.

use crate::utils::error::CodecError;
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

/// Pluggable encode/decode strategy for large payloads
pub trait CompressionCodec: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

pub const NOOP_CODEC: &str = "noop";

/// Identity transform. Payloads still travel through the envelope so the
/// compression counters and checksum path are exercised.
#[derive(Debug, Clone, Default)]
pub struct NoopCodec;

impl CompressionCodec for NoopCodec {
    fn name(&self) -> &'static str {
        NOOP_CODEC
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }
}

/// Gzip via flate2
#[derive(Debug, Clone)]
pub struct GzipCodec {
    level: u32,
}

impl GzipCodec {
    /// `level` is clamped to 0..=9
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self::new(6)
    }
}

impl CompressionCodec for GzipCodec {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut decoder = GzDecoder::new(data);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

/// Compressed bytes plus what is needed to verify and decode them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedPayload {
    pub codec: String,
    pub original_size: usize,
    pub data: Vec<u8>,
    pub checksum: String,
}

impl CompressedPayload {
    /// Compress `raw` with `codec` and wrap the result
    pub fn seal(codec: &dyn CompressionCodec, raw: &[u8]) -> Result<Self, CodecError> {
        let data = codec.compress(raw)?;
        let checksum = checksum(&data);
        Ok(Self {
            codec: codec.name().to_string(),
            original_size: raw.len(),
            data,
            checksum,
        })
    }

    /// Verify the checksum and decompress with `codec`
    pub fn open(&self, codec: &dyn CompressionCodec) -> Result<Vec<u8>, CodecError> {
        if self.codec != codec.name() {
            return Err(CodecError::CodecMismatch {
                expected: codec.name().to_string(),
                found: self.codec.clone(),
            });
        }

        let actual = checksum(&self.data);
        if actual != self.checksum {
            crate::log_error!(
                "Compressed payload failed checksum verification",
                serde_json::json!({ "codec": self.codec, "originalSize": self.original_size })
            );
            return Err(CodecError::ChecksumMismatch {
                expected: self.checksum.clone(),
                actual,
            });
        }

        codec.decompress(&self.data)
    }

    pub fn stored_size(&self) -> usize {
        self.data.len()
    }
}

fn checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
