use super::{ReadAt, WriteAt};
use crate::error::Result;
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Local file with positional read and write support
pub struct LocalFile {
    file: File,
    size: AtomicU64,
}

impl LocalFile {
    /// Open an existing file for reading only
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_file(file)
    }

    /// Open an existing file for reading and writing
    pub fn open_rw(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Self::from_file(file)
    }

    /// Create (or truncate) a file for reading and writing
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Self::from_file(file)
    }

    fn from_file(file: File) -> Result<Self> {
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            size: AtomicU64::new(size),
        })
    }
}

#[async_trait]
impl ReadAt for LocalFile {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            Ok(self.file.read_at(buf, offset)?)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            Ok(self.file.seek_read(buf, offset)?)
        }

        #[cfg(not(any(unix, windows)))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = &self.file;
            file.seek(SeekFrom::Start(offset))?;
            Ok(file.read(buf)?)
        }
    }

    fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }
}

#[async_trait]
impl WriteAt for LocalFile {
    async fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize> {
        #[cfg(unix)]
        let written = {
            use std::os::unix::fs::FileExt;
            self.file.write_at(buf, offset)?
        };

        #[cfg(windows)]
        let written = {
            use std::os::windows::fs::FileExt;
            self.file.seek_write(buf, offset)?
        };

        #[cfg(not(any(unix, windows)))]
        let written = {
            use std::io::{Seek, SeekFrom, Write};
            let mut file = &self.file;
            file.seek(SeekFrom::Start(offset))?;
            file.write(buf)?
        };

        self.size.fetch_max(offset + written as u64, Ordering::AcqRel);
        Ok(written)
    }

    async fn set_len(&self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        self.size.store(len, Ordering::Release);
        Ok(())
    }

    async fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
