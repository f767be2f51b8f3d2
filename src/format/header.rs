use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

/// Size of the fixed file header in bytes
pub const HEADER_SIZE: usize = 24;

/// File header at offset 0 - 24 bytes
///
/// ```text
/// 0   4  signature "%pkg"
/// 4   4  format version (u32, big-endian)
/// 8   8  catalog start offset (u64, big-endian)
/// 16  8  catalog compressed length (u64, big-endian)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub catalog_start: u64,
    pub catalog_length: u64,
}

impl Header {
    pub const SIGNATURE: &'static [u8; 4] = b"%pkg";
    pub const VERSION: u32 = 1;

    pub fn new(catalog_start: u64, catalog_length: u64) -> Self {
        Self {
            catalog_start,
            catalog_length,
        }
    }

    /// Header of an archive that has never had a catalog written
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the header points at a catalog block
    pub fn has_catalog(&self) -> bool {
        self.catalog_start != 0 || self.catalog_length != 0
    }

    /// End offset of the catalog block, `None` on overflow
    pub fn catalog_end(&self) -> Option<u64> {
        self.catalog_start.checked_add(self.catalog_length)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(Self::SIGNATURE);
        BigEndian::write_u32(&mut buf[4..8], Self::VERSION);
        BigEndian::write_u64(&mut buf[8..16], self.catalog_start);
        BigEndian::write_u64(&mut buf[16..24], self.catalog_length);
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::TruncatedArchive {
                offset: 0,
                expected: HEADER_SIZE as u64,
                actual: data.len() as u64,
            });
        }

        if &data[0..4] != Self::SIGNATURE {
            return Err(Error::Format(format!(
                "bad signature {:02x?}",
                &data[0..4]
            )));
        }

        let version = BigEndian::read_u32(&data[4..8]);
        if version != Self::VERSION {
            return Err(Error::Format(format!(
                "unsupported version {version} (expected {})",
                Self::VERSION
            )));
        }

        Ok(Self {
            catalog_start: BigEndian::read_u64(&data[8..16]),
            catalog_length: BigEndian::read_u64(&data[16..24]),
        })
    }
}

/// Encode a header pointing at the given catalog block
pub fn encode(catalog_start: u64, catalog_length: u64) -> [u8; HEADER_SIZE] {
    Header::new(catalog_start, catalog_length).to_bytes()
}

/// Decode and validate a header
pub fn decode(data: &[u8]) -> Result<Header> {
    Header::from_bytes(data)
}
