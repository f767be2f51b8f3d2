use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use super::options::ArchiveOptions;
use super::reader::{EntryStream, default_archive_name, open_entry, read_catalog, read_header};
use crate::error::{Error, Result};
use crate::format::gzip::Deflater;
use crate::format::{Catalog, HEADER_SIZE, header};
use crate::io::{LocalFile, WriteAt};

/// State held while the archive is open
struct Session<F: WriteAt> {
    file: Arc<F>,
    catalog: Catalog,
    /// Next free byte for appends
    cursor: u64,
    /// Cursor right after open; `close` only writes if it moved
    cursor_at_open: u64,
}

impl<F: WriteAt> Session<F> {
    fn is_dirty(&self) -> bool {
        self.cursor != self.cursor_at_open
    }

    /// Write one block at the cursor, advancing it by what was written
    async fn write_block(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let offset = self.cursor;
        let written = self.file.write_at(offset, data).await?;
        self.cursor += written as u64;
        if written != data.len() {
            return Err(Error::ShortWrite {
                offset,
                requested: data.len(),
                written,
            });
        }
        Ok(())
    }

    /// Gzip `source` into the file at the cursor.
    ///
    /// Returns the `(start, length)` of the compressed block. On error the
    /// cursor still covers any bytes that reached the file.
    async fn append<S: AsyncRead + Unpin>(
        &mut self,
        mut source: S,
        options: &ArchiveOptions,
    ) -> Result<(u64, u64)> {
        let start = self.cursor;
        let mut deflater = Deflater::new(options.compression);
        let mut buf = vec![0u8; options.chunk_size];

        loop {
            let n = source.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let packed = deflater.push(&buf[..n])?;
            self.write_block(&packed).await?;
        }
        let tail = deflater.finish()?;
        self.write_block(&tail).await?;

        Ok((start, self.cursor - start))
    }
}

/// A gzpack archive open for reading and appending.
///
/// ## Lifecycle
///
/// [`open`](Self::open) loads the catalog of an existing file or creates a new
/// one. [`add`](Self::add) appends gzip-compressed entries. [`close`](Self::close)
/// appends the updated catalog and rewrites the header to point at it. Every
/// call after `close` fails with [`Error::ArchiveClosed`].
///
/// `add` takes `&mut self`, so writes are always sequenced. Streams returned
/// by [`get`](Self::get) own their read cursor and can be consumed
/// concurrently with each other.
///
/// ## Example
///
/// ```no_run
/// use gzpack::Archive;
///
/// #[tokio::main]
/// async fn main() -> gzpack::Result<()> {
///     let mut archive = Archive::open("notes.pkg").await?;
///     archive.add_bytes("notes.txt", "hello").await?;
///     archive.close().await?;
///
///     let archive = Archive::open("notes.pkg").await?;
///     assert_eq!(archive.content("notes.txt").await?, b"hello");
///     Ok(())
/// }
/// ```
pub struct Archive<F: WriteAt = LocalFile> {
    label: String,
    options: ArchiveOptions,
    session: Option<Session<F>>,
}

impl Archive<LocalFile> {
    /// Open `path`, creating an empty archive if it does not exist
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, ArchiveOptions::default()).await
    }

    pub async fn open_with(path: impl AsRef<Path>, options: ArchiveOptions) -> Result<Self> {
        let path = path.as_ref();
        let exists = tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);

        if exists {
            let file = if options.read_only {
                LocalFile::open(path)?
            } else {
                LocalFile::open_rw(path)?
            };
            let name = default_archive_name(path);
            Self::load(label_of(path), Arc::new(file), &name, options).await
        } else if options.read_only {
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )))
        } else {
            Self::create_with(path, options).await
        }
    }

    /// Create `path`, replacing any existing file
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with(path, ArchiveOptions::default()).await
    }

    pub async fn create_with(path: impl AsRef<Path>, options: ArchiveOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = LocalFile::create(path)?;
        let name = options
            .archive_name
            .clone()
            .unwrap_or_else(|| default_archive_name(path));
        Self::initialize(label_of(path), Arc::new(file), &name, options).await
    }
}

fn label_of(path: &Path) -> String {
    path.display().to_string()
}

impl<F: WriteAt> Archive<F> {
    /// Open an archive on an arbitrary backend.
    ///
    /// An empty backend is initialized as a new archive named `name`;
    /// otherwise the existing header and catalog are loaded.
    pub async fn with_backend(file: F, name: &str, options: ArchiveOptions) -> Result<Self> {
        let file = Arc::new(file);
        if file.size() == 0 && !options.read_only {
            Self::initialize(name.to_string(), file, name, options).await
        } else {
            Self::load(name.to_string(), file, name, options).await
        }
    }

    async fn initialize(
        label: String,
        file: Arc<F>,
        name: &str,
        options: ArchiveOptions,
    ) -> Result<Self> {
        let header = header::encode(0, 0);
        let written = file.write_at(0, &header).await?;
        if written != HEADER_SIZE {
            return Err(Error::ShortWrite {
                offset: 0,
                requested: HEADER_SIZE,
                written,
            });
        }

        info!("Created archive {}", label);

        let cursor = HEADER_SIZE as u64;
        Ok(Self {
            label,
            options,
            session: Some(Session {
                file,
                catalog: Catalog::new(name),
                cursor,
                cursor_at_open: cursor,
            }),
        })
    }

    async fn load(
        label: String,
        file: Arc<F>,
        default_name: &str,
        options: ArchiveOptions,
    ) -> Result<Self> {
        let header = read_header(file.as_ref()).await?;
        let catalog = read_catalog(&file, &header, options.chunk_size).await?;

        let (catalog, cursor) = match catalog {
            Some(catalog) if options.reclaim_catalog_space => (catalog, header.catalog_start),
            Some(catalog) => (catalog, file.size().max(HEADER_SIZE as u64)),
            None => {
                let name = options.archive_name.as_deref().unwrap_or(default_name);
                (Catalog::new(name), HEADER_SIZE as u64)
            }
        };

        debug!(
            "Opened archive {} ({} entries, cursor at {})",
            label,
            catalog.len(),
            cursor
        );

        Ok(Self {
            label,
            options,
            session: Some(Session {
                file,
                catalog,
                cursor,
                cursor_at_open: cursor,
            }),
        })
    }

    fn session(&self) -> Result<&Session<F>> {
        self.session.as_ref().ok_or(Error::ArchiveClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_none()
    }

    /// Name recorded in the catalog
    pub fn name(&self) -> Result<&str> {
        Ok(self.session()?.catalog.archive_name())
    }

    /// Entry names, relative to the archive root
    pub fn entries(&self) -> Result<Vec<String>> {
        Ok(self.session()?.catalog.names())
    }

    /// In-memory catalog
    pub fn catalog(&self) -> Result<&Catalog> {
        Ok(&self.session()?.catalog)
    }

    /// Next byte offset an append would use
    pub fn cursor(&self) -> Result<u64> {
        Ok(self.session()?.cursor)
    }

    /// Compress everything `source` yields into a new entry called `name`.
    ///
    /// The entry is registered only once the whole block has been written. A
    /// failure leaves an unreferenced block behind, never a catalog entry
    /// pointing at partial data.
    pub async fn add<S: AsyncRead + Unpin>(&mut self, name: &str, source: S) -> Result<()> {
        let session = self.session.as_mut().ok_or(Error::ArchiveClosed)?;
        if self.options.read_only {
            return Err(Error::ReadOnly);
        }
        let key = session.catalog.key_for(name)?;

        let (start, length) = session.append(source, &self.options).await?;
        debug!("Added {} at offset {} ({} bytes)", name, start, length);
        session.catalog.insert(key, start, length);
        Ok(())
    }

    /// Add an in-memory buffer as entry `name`
    pub async fn add_bytes(&mut self, name: &str, data: impl AsRef<[u8]>) -> Result<()> {
        self.add(name, data.as_ref()).await
    }

    /// Lazy, decompressed contents of entry `name`
    pub fn get(&self, name: &str) -> Result<EntryStream<F>> {
        let session = self.session()?;
        open_entry(&session.file, &session.catalog, name, self.options.chunk_size)
    }

    pub async fn content(&self, name: &str) -> Result<Vec<u8>> {
        self.get(name)?.read_to_end().await
    }

    pub async fn text(&self, name: &str) -> Result<String> {
        self.get(name)?.read_to_string().await
    }

    pub async fn structured<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        self.get(name)?.read_json().await
    }

    /// Write the catalog and header, then release the file.
    ///
    /// Nothing is written when no entry was added since open. The handle is
    /// closed even if writing fails; the error must not be ignored, as the
    /// header may still point at the previous catalog.
    pub async fn close(&mut self) -> Result<()> {
        let mut session = self.session.take().ok_or(Error::ArchiveClosed)?;
        if !session.is_dirty() {
            debug!("Closed archive {} without changes", self.label);
            return Ok(());
        }

        let catalog = session.catalog.to_json()?;
        let (start, length) = session.append(catalog.as_slice(), &self.options).await?;
        session.file.sync().await?;

        let header = header::encode(start, length);
        let written = session.file.write_at(0, &header).await?;
        if written != HEADER_SIZE {
            return Err(Error::ShortWrite {
                offset: 0,
                requested: HEADER_SIZE,
                written,
            });
        }
        session.file.set_len(session.cursor).await?;
        session.file.sync().await?;

        info!(
            "Closed archive {} ({} entries, catalog at {}, {} bytes)",
            self.label,
            session.catalog.len(),
            start,
            length
        );
        Ok(())
    }
}

impl<F: WriteAt> Drop for Archive<F> {
    fn drop(&mut self) {
        if let Some(session) = &self.session
            && session.is_dirty()
        {
            warn!(
                "Archive {} dropped without close; {} bytes of entries are not in the catalog",
                self.label,
                session.cursor - session.cursor_at_open
            );
        }
    }
}

impl<F: WriteAt> std::fmt::Debug for Archive<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("label", &self.label)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::io::ReadAt;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// In-memory backend that accepts only `budget` bytes in total
    struct Budgeted {
        data: Mutex<Vec<u8>>,
        budget: AtomicU64,
    }

    impl Budgeted {
        fn new(budget: u64) -> Self {
            Self {
                data: Mutex::new(Vec::new()),
                budget: AtomicU64::new(budget),
            }
        }
    }

    #[async_trait]
    impl ReadAt for Budgeted {
        async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
            let data = self.data.lock().unwrap();
            let offset = offset as usize;
            if offset >= data.len() {
                return Ok(0);
            }
            let n = buf.len().min(data.len() - offset);
            buf[..n].copy_from_slice(&data[offset..offset + n]);
            Ok(n)
        }

        fn size(&self) -> u64 {
            self.data.lock().unwrap().len() as u64
        }
    }

    #[async_trait]
    impl WriteAt for Budgeted {
        async fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize> {
            let budget = self.budget.load(Ordering::SeqCst);
            let n = buf.len().min(budget as usize);
            self.budget.fetch_sub(n as u64, Ordering::SeqCst);

            let mut data = self.data.lock().unwrap();
            let offset = offset as usize;
            if data.len() < offset + n {
                data.resize(offset + n, 0);
            }
            data[offset..offset + n].copy_from_slice(&buf[..n]);
            Ok(n)
        }

        async fn set_len(&self, len: u64) -> Result<()> {
            self.data.lock().unwrap().resize(len as usize, 0);
            Ok(())
        }

        async fn sync(&self) -> Result<()> {
            Ok(())
        }
    }

    fn noise(len: usize) -> Vec<u8> {
        let mut state = 0x2545_f491_u32;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect()
    }

    async fn memory_archive() -> Archive<Budgeted> {
        Archive::with_backend(Budgeted::new(u64::MAX), "mem", ArchiveOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_short_write_registers_nothing() {
        let backend = Budgeted::new(HEADER_SIZE as u64 + 10);
        let mut archive = Archive::with_backend(backend, "mem", ArchiveOptions::default())
            .await
            .unwrap();

        let err = archive.add_bytes("big.bin", noise(100_000)).await.unwrap_err();
        assert!(matches!(err, Error::ShortWrite { .. }));
        assert!(archive.entries().unwrap().is_empty());
        assert_eq!(archive.cursor().unwrap(), HEADER_SIZE as u64 + 10);
        assert!(matches!(
            archive.get("big.bin"),
            Err(Error::EntryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_backend_round_trip() {
        let mut archive = memory_archive().await;
        let payload = noise(5_000);
        archive.add_bytes("noise", &payload).await.unwrap();
        archive.add_bytes("empty", b"").await.unwrap();

        assert_eq!(archive.content("noise").await.unwrap(), payload);
        assert!(archive.content("empty").await.unwrap().is_empty());
        assert_eq!(archive.name().unwrap(), "mem");
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let mut archive = memory_archive().await;
        archive.add_bytes("a", "1").await.unwrap();
        archive.close().await.unwrap();

        assert!(archive.is_closed());
        assert!(matches!(archive.entries(), Err(Error::ArchiveClosed)));
        assert!(matches!(archive.get("a"), Err(Error::ArchiveClosed)));
        assert!(matches!(
            archive.add_bytes("b", "2").await,
            Err(Error::ArchiveClosed)
        ));
        assert!(matches!(archive.close().await, Err(Error::ArchiveClosed)));
    }

    #[tokio::test]
    async fn test_closed_read_only_archive_reports_closed() {
        let backend = Budgeted::new(u64::MAX);
        let mut writer = Archive::with_backend(backend, "mem", ArchiveOptions::default())
            .await
            .unwrap();
        writer.add_bytes("a", "1").await.unwrap();
        let shared = writer.session().unwrap().file.clone();
        writer.close().await.unwrap();

        let options = ArchiveOptions::new().read_only(true);
        let mut reader = Archive::load("mem".to_string(), shared, "mem", options)
            .await
            .unwrap();
        assert!(matches!(
            reader.add_bytes("b", "2").await,
            Err(Error::ReadOnly)
        ));
        reader.close().await.unwrap();

        assert!(matches!(
            reader.add_bytes("b", "2").await,
            Err(Error::ArchiveClosed)
        ));
        assert!(matches!(reader.get("a"), Err(Error::ArchiveClosed)));
    }

    #[tokio::test]
    async fn test_reserved_name_rejected() {
        let mut archive = memory_archive().await;
        for name in ["", "/", "./", "a/.."] {
            assert!(matches!(
                archive.add_bytes(name, "x").await,
                Err(Error::InvalidName(_))
            ));
        }
        assert_eq!(archive.cursor().unwrap(), HEADER_SIZE as u64);
    }

    #[tokio::test]
    async fn test_catalog_block_is_last() {
        let mut archive = memory_archive().await;
        archive.add_bytes("a", "alpha").await.unwrap();
        let end_of_entries = archive.cursor().unwrap();
        let file = archive.session().unwrap().file.clone();
        archive.close().await.unwrap();

        let header = read_header(file.as_ref()).await.unwrap();
        assert_eq!(header.catalog_start, end_of_entries);
        assert_eq!(header.catalog_end(), Some(file.size()));
    }
}
