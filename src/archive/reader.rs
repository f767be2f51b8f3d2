//! Read path shared by [`Archive`](super::Archive) and [`ArchiveReader`].

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::format::gzip::Inflater;
use crate::format::{
    Catalog, DEFAULT_CHUNK_SIZE, EntryLocation, HEADER_SIZE, Header, RangeReader, header, name,
};
use crate::io::{LocalFile, ReadAt};

/// Archive name used when none is recorded or supplied: the file stem
pub fn default_archive_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "archive".to_string())
}

/// Read and validate the header at offset 0
pub(crate) async fn read_header<R: ReadAt + ?Sized>(reader: &R) -> Result<Header> {
    let mut buf = [0u8; HEADER_SIZE];
    let mut filled = 0;
    while filled < HEADER_SIZE {
        let n = reader.read_at(filled as u64, &mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    header::decode(&buf[..filled])
}

/// Load the catalog the header points at.
///
/// Returns `None` for an archive that has never been closed with entries.
pub(crate) async fn read_catalog<R: ReadAt + ?Sized>(
    reader: &Arc<R>,
    header: &Header,
    chunk_size: usize,
) -> Result<Option<Catalog>> {
    if !header.has_catalog() {
        return Ok(None);
    }

    if header.catalog_start < HEADER_SIZE as u64 {
        return Err(Error::Format(format!(
            "catalog offset {} overlaps the header",
            header.catalog_start
        )));
    }

    let size = reader.size();
    if header.catalog_end().is_none_or(|end| end > size) {
        return Err(Error::TruncatedArchive {
            offset: header.catalog_start,
            expected: header.catalog_length,
            actual: size.saturating_sub(header.catalog_start),
        });
    }

    debug!(
        "Reading catalog at offset {} ({} bytes)",
        header.catalog_start, header.catalog_length
    );

    let location = EntryLocation {
        start: header.catalog_start,
        length: header.catalog_length,
    };
    let data = EntryStream::new(reader.clone(), name::CATALOG_KEY, location, chunk_size)
        .read_to_end()
        .await
        .map_err(|e| match e {
            Error::CorruptEntry { reason, .. } => Error::CatalogCorrupt(reason),
            other => other,
        })?;

    Catalog::from_json(&data).map(Some)
}

/// Lazy, decompressed contents of one entry.
///
/// Pulls compressed chunks from a [`RangeReader`] and inflates them on the
/// way out. Every stream has its own cursor, so several can be read at once.
pub struct EntryStream<R: ReadAt + ?Sized> {
    name: String,
    range: RangeReader<R>,
    inflater: Option<Inflater>,
}

fn corrupt(name: &str, err: Error) -> Error {
    match err {
        Error::Io(e) => Error::CorruptEntry {
            name: name.to_string(),
            reason: e.to_string(),
        },
        other => other,
    }
}

impl<R: ReadAt + ?Sized> EntryStream<R> {
    pub(crate) fn new(
        reader: Arc<R>,
        key: &str,
        location: EntryLocation,
        chunk_size: usize,
    ) -> Self {
        Self {
            name: name::denormalize(key).to_string(),
            range: RangeReader::new(reader, location.start, location.length, chunk_size),
            inflater: Some(Inflater::new()),
        }
    }

    /// User-facing name of the entry
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next chunk of plain bytes, or `None` at the end of the entry
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let Some(inflater) = self.inflater.as_mut() else {
                return Ok(None);
            };

            match self.range.next_chunk().await? {
                Some(packed) => {
                    let plain = inflater.push(&packed).map_err(|e| corrupt(&self.name, e))?;
                    if !plain.is_empty() {
                        return Ok(Some(plain));
                    }
                }
                None => {
                    let Some(inflater) = self.inflater.take() else {
                        return Ok(None);
                    };
                    let plain = inflater.finish().map_err(|e| corrupt(&self.name, e))?;
                    return Ok((!plain.is_empty()).then_some(plain));
                }
            }
        }
    }

    /// Drain the entry into memory
    pub async fn read_to_end(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// Drain the entry and decode it as UTF-8
    pub async fn read_to_string(self) -> Result<String> {
        Ok(String::from_utf8(self.read_to_end().await?)?)
    }

    /// Drain the entry and parse it as JSON
    pub async fn read_json<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_slice(&self.read_to_end().await?)?)
    }
}

impl<R: ReadAt + ?Sized + 'static> EntryStream<R> {
    /// Convert into a [`Stream`] of plain chunks
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<u8>>> + Send {
        futures::stream::try_unfold(self, |mut entry| async move {
            Ok::<_, Error>(entry.next_chunk().await?.map(|chunk| (chunk, entry)))
        })
    }
}

/// Look up `raw` in `catalog` and open a stream over it
pub(crate) fn open_entry<R: ReadAt + ?Sized>(
    reader: &Arc<R>,
    catalog: &Catalog,
    raw: &str,
    chunk_size: usize,
) -> Result<EntryStream<R>> {
    let key = catalog.key_for(raw)?;
    let location = catalog.lookup(&key)?;
    Ok(EntryStream::new(reader.clone(), &key, location, chunk_size))
}

/// Read-only view of an archive over any [`ReadAt`] source.
///
/// Works on local files as well as remote archives through
/// [`HttpRangeReader`](crate::io::HttpRangeReader); only the header, the
/// catalog and the entries actually read are fetched.
pub struct ArchiveReader<R: ReadAt> {
    reader: Arc<R>,
    header: Header,
    catalog: Catalog,
    chunk_size: usize,
}

impl ArchiveReader<LocalFile> {
    /// Open a local archive read-only
    pub async fn open(path: &Path) -> Result<Self> {
        let file = Arc::new(LocalFile::open(path)?);
        Self::from_reader(file, &default_archive_name(path)).await
    }
}

impl<R: ReadAt> ArchiveReader<R> {
    /// Load header and catalog from `reader`.
    ///
    /// `default_name` is used when the archive has no catalog yet.
    pub async fn from_reader(reader: Arc<R>, default_name: &str) -> Result<Self> {
        Self::with_chunk_size(reader, default_name, DEFAULT_CHUNK_SIZE).await
    }

    pub async fn with_chunk_size(
        reader: Arc<R>,
        default_name: &str,
        chunk_size: usize,
    ) -> Result<Self> {
        let header = read_header(reader.as_ref()).await?;
        let catalog = read_catalog(&reader, &header, chunk_size)
            .await?
            .unwrap_or_else(|| Catalog::new(default_name));

        debug!(
            "Loaded archive {} with {} entries",
            catalog.archive_name(),
            catalog.len()
        );

        Ok(Self {
            reader,
            header,
            catalog,
            chunk_size,
        })
    }

    pub fn name(&self) -> &str {
        self.catalog.archive_name()
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Entry names, relative to the archive root
    pub fn entries(&self) -> Vec<String> {
        self.catalog.names()
    }

    pub fn get(&self, name: &str) -> Result<EntryStream<R>> {
        open_entry(&self.reader, &self.catalog, name, self.chunk_size)
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

    /// Every entry with its contents, in name order
    pub fn contents(&self) -> impl Stream<Item = Result<(String, Vec<u8>)>> + '_ {
        futures::stream::iter(self.entries()).then(move |name| async move {
            let data = self.content(&name).await?;
            Ok::<_, Error>((name, data))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::archive::Archive;
    use futures::TryStreamExt;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_reader_sees_closed_archive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs.pkg");

        let mut archive = Archive::open(&path).await.unwrap();
        archive.add_bytes("readme.md", "# docs").await.unwrap();
        archive.add_bytes("meta.json", r#"{"pages":3}"#).await.unwrap();
        archive.close().await.unwrap();

        let reader = ArchiveReader::open(&path).await.unwrap();
        assert_eq!(reader.name(), "docs");
        assert_eq!(reader.entries(), vec!["meta.json", "readme.md"]);
        assert_eq!(reader.text("readme.md").await.unwrap(), "# docs");

        let meta: serde_json::Value = reader.structured("meta.json").await.unwrap();
        assert_eq!(meta["pages"], 3);

        let all: Vec<(String, Vec<u8>)> = reader.contents().try_collect().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1], ("readme.md".to_string(), b"# docs".to_vec()));
    }

    #[tokio::test]
    async fn test_reader_on_fresh_archive_uses_default_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.pkg");
        Archive::open(&path).await.unwrap().close().await.unwrap();

        let reader = ArchiveReader::open(&path).await.unwrap();
        assert_eq!(reader.name(), "empty");
        assert!(reader.entries().is_empty());
        assert!(!reader.header().has_catalog());
    }

    #[tokio::test]
    async fn test_entry_streams_are_independent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("two.pkg");
        let a = vec![b'a'; 200_000];
        let b: Vec<u8> = (0..200_000u32).map(|i| (i * 7 % 251) as u8).collect();

        let mut archive = Archive::open(&path).await.unwrap();
        archive.add_bytes("a", &a).await.unwrap();
        archive.add_bytes("b", &b).await.unwrap();
        archive.close().await.unwrap();

        let reader = ArchiveReader::with_chunk_size(
            Arc::new(LocalFile::open(&path).unwrap()),
            "two",
            1024,
        )
        .await
        .unwrap();

        let mut first = reader.get("a").unwrap();
        let mut second = reader.get("b").unwrap();
        let mut out_a = Vec::new();
        let mut out_b = Vec::new();
        loop {
            let x = first.next_chunk().await.unwrap();
            let y = second.next_chunk().await.unwrap();
            if x.is_none() && y.is_none() {
                break;
            }
            out_a.extend(x.unwrap_or_default());
            out_b.extend(y.unwrap_or_default());
        }
        assert_eq!(out_a, a);
        assert_eq!(out_b, b);
    }

    #[tokio::test]
    async fn test_corrupt_entry_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.pkg");

        let mut archive = Archive::open(&path).await.unwrap();
        archive.add_bytes("x", "some payload text").await.unwrap();
        archive.close().await.unwrap();

        // Overwrite the gzip magic of the first entry
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[HEADER_SIZE] = 0;
        std::fs::write(&path, bytes).unwrap();

        let reader = ArchiveReader::open(&path).await.unwrap();
        assert!(matches!(
            reader.content("x").await,
            Err(Error::CorruptEntry { name, .. }) if name == "x"
        ));
    }
}
