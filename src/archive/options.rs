use flate2::Compression;

use crate::format::DEFAULT_CHUNK_SIZE;

/// Options controlling how an archive is opened and written
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Open without write access. A missing file is an error instead of
    /// being created.
    pub read_only: bool,
    /// Name recorded in a newly created archive. Defaults to the file stem.
    pub archive_name: Option<String>,
    /// Start appending at the old catalog's offset when reopening.
    ///
    /// Keeps files compact, but the old catalog is overwritten before the new
    /// header is written. With this off, appends go to the end of the file and
    /// the previous catalog stays readable until `close` succeeds.
    pub reclaim_catalog_space: bool,
    /// gzip level for new entries
    pub compression: Compression,
    /// Size of each positional read and of each read from an `add` source
    pub chunk_size: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            archive_name: None,
            reclaim_catalog_space: true,
            compression: Compression::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ArchiveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn archive_name(mut self, name: impl Into<String>) -> Self {
        self.archive_name = Some(name.into());
        self
    }

    pub fn reclaim_catalog_space(mut self, reclaim: bool) -> Self {
        self.reclaim_catalog_space = reclaim;
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}
