mod http;
mod local;

pub use http::HttpRangeReader;
pub use local::LocalFile;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer.
    ///
    /// Returns the number of bytes read; `0` means end of data.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}

/// Random access writing on top of [`ReadAt`].
///
/// Writes are positional and never move a shared cursor, so readers holding
/// the same backend are not disturbed by a write elsewhere in the file.
#[async_trait]
pub trait WriteAt: ReadAt {
    /// Write `buf` at `offset`, returning how many bytes were accepted.
    ///
    /// A return value smaller than `buf.len()` is a short write; the caller
    /// decides whether that is fatal.
    async fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize>;

    /// Truncate or extend the data source to `len` bytes
    async fn set_len(&self, len: u64) -> Result<()>;

    /// Flush written data to durable storage
    async fn sync(&self) -> Result<()>;
}
