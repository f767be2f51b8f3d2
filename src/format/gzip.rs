//! Push-style gzip transforms.
//!
//! Both sides accept input in arbitrary chunks and hand back whatever output
//! is ready, so they can sit between an async source and an async sink
//! without buffering a whole entry.

use flate2::Compression;
use flate2::write::{GzDecoder, GzEncoder};
use std::io::Write;

use crate::error::Result;

pub struct Deflater {
    encoder: GzEncoder<Vec<u8>>,
}

impl Deflater {
    pub fn new(level: Compression) -> Self {
        Self {
            encoder: GzEncoder::new(Vec::new(), level),
        }
    }

    /// Compress `data`, returning any compressed bytes now available
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.encoder.write_all(data)?;
        Ok(std::mem::take(self.encoder.get_mut()))
    }

    /// Finish the gzip member, returning the remaining bytes and trailer
    pub fn finish(self) -> Result<Vec<u8>> {
        Ok(self.encoder.finish()?)
    }
}

pub struct Inflater {
    decoder: GzDecoder<Vec<u8>>,
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl Inflater {
    pub fn new() -> Self {
        Self {
            decoder: GzDecoder::new(Vec::new()),
        }
    }

    /// Decompress `data`, returning any plain bytes now available
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.decoder.write_all(data)?;
        Ok(std::mem::take(self.decoder.get_mut()))
    }

    /// Verify the stream ended cleanly and return the last plain bytes
    pub fn finish(self) -> Result<Vec<u8>> {
        Ok(self.decoder.finish()?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Compress a whole buffer
    fn compress(data: &[u8], level: Compression) -> Result<Vec<u8>> {
        let mut deflater = Deflater::new(level);
        let mut out = deflater.push(data)?;
        out.extend(deflater.finish()?);
        Ok(out)
    }

    /// Decompress a whole buffer
    fn decompress(data: &[u8]) -> Result<Vec<u8>> {
        let mut inflater = Inflater::new();
        let mut out = inflater.push(data)?;
        out.extend(inflater.finish()?);
        Ok(out)
    }

    #[test]
    fn test_chunked_round_trip() {
        let text = "the quick brown fox jumps over the lazy dog\n".repeat(500);

        let mut deflater = Deflater::new(Compression::default());
        let mut packed = Vec::new();
        for chunk in text.as_bytes().chunks(777) {
            packed.extend(deflater.push(chunk).unwrap());
        }
        packed.extend(deflater.finish().unwrap());
        assert!(packed.len() < text.len());
        assert_eq!(&packed[..2], &[0x1f, 0x8b]);

        let mut inflater = Inflater::new();
        let mut plain = Vec::new();
        for chunk in packed.chunks(13) {
            plain.extend(inflater.push(chunk).unwrap());
        }
        plain.extend(inflater.finish().unwrap());
        assert_eq!(plain, text.as_bytes());
    }

    #[test]
    fn test_empty_payload() {
        let packed = compress(b"", Compression::default()).unwrap();
        assert!(!packed.is_empty());
        assert!(decompress(&packed).unwrap().is_empty());
    }

    #[test]
    fn test_cut_stream_fails_to_finish() {
        let packed = compress(b"hello hello hello", Compression::default()).unwrap();
        assert!(decompress(&packed[..packed.len() - 4]).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(decompress(b"definitely not gzip").is_err());
    }
}
