//! Chunked reads of a byte range.

use std::sync::Arc;
use tracing::trace;

use crate::error::{Error, Result};
use crate::io::ReadAt;

/// Default chunk size for range reads (64 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Lazy reader over `[start, start + length)` of a [`ReadAt`] source.
///
/// Each call to [`next_chunk`](Self::next_chunk) issues one positional read
/// of at most `chunk_size` bytes. The reader owns its cursor, so any number
/// of them can run over the same source at once.
pub struct RangeReader<R: ReadAt + ?Sized> {
    reader: Arc<R>,
    start: u64,
    position: u64,
    remaining: u64,
    buf: Vec<u8>,
}

impl<R: ReadAt + ?Sized> RangeReader<R> {
    pub fn new(reader: Arc<R>, start: u64, length: u64, chunk_size: usize) -> Self {
        let capacity = chunk_size.max(1).min(usize::try_from(length).unwrap_or(usize::MAX));
        Self {
            reader,
            start,
            position: start,
            remaining: length,
            buf: vec![0u8; capacity],
        }
    }

    /// Read the next chunk, or `None` once the range is exhausted.
    ///
    /// Hitting end of data before the range is complete is an
    /// [`Error::TruncatedArchive`].
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let want = usize::try_from(self.remaining)
            .unwrap_or(usize::MAX)
            .min(self.buf.len());
        let n = self
            .reader
            .read_at(self.position, &mut self.buf[..want])
            .await?;

        if n == 0 {
            let expected = self.position - self.start + self.remaining;
            let actual = self.position - self.start;
            self.remaining = 0;
            return Err(Error::TruncatedArchive {
                offset: self.start,
                expected,
                actual,
            });
        }

        trace!("Read {} bytes at offset {}", n, self.position);
        self.position += n as u64;
        self.remaining -= n as u64;
        Ok(Some(self.buf[..n].to_vec()))
    }
}
