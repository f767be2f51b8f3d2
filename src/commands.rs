//! Pack, extract, list and show, built on the archive engine.

use futures::TryStreamExt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::info;
use walkdir::WalkDir;

use crate::archive::{Archive, ArchiveReader};
use crate::error::{Error, Result};
use crate::format::name;
use crate::io::{ReadAt, WriteAt};

/// One row of a verbose listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub start: u64,
    pub compressed_size: u64,
}

/// Files under `root`, depth-first in name order.
///
/// Yields each file's path together with its name relative to `base`,
/// joined with `/` whatever the platform separator.
pub fn walk<'a>(
    root: &Path,
    base: &'a Path,
) -> impl Iterator<Item = Result<(PathBuf, String)>> + 'a {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() => {
                let path = entry.into_path();
                let relative = path.strip_prefix(base).unwrap_or(&path);
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                Some(Ok((path, name)))
            }
            Ok(_) => None,
            Err(e) => Some(Err(Error::from(std::io::Error::from(e)))),
        })
}

/// Add files and directories to `archive`.
///
/// A file is stored under its base name. A directory is walked and each
/// file is stored under its path relative to the directory's parent, so
/// packing `site/` yields `site/index.html`, `site/css/main.css`, ...
///
/// Returns the names added, in order.
pub async fn pack<F: WriteAt>(archive: &mut Archive<F>, inputs: &[PathBuf]) -> Result<Vec<String>> {
    let mut added = Vec::new();

    for input in inputs {
        let item = tokio::fs::canonicalize(input).await?;
        let meta = tokio::fs::metadata(&item).await?;

        if meta.is_file() {
            let name = item
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            info!("Packing: {}", name);
            let file = tokio::fs::File::open(&item).await?;
            archive.add(&name, file).await?;
            added.push(name);
        } else if meta.is_dir() {
            let base = item.parent().unwrap_or(&item).to_path_buf();
            for found in walk(&item, &base) {
                let (path, name) = found?;
                info!("Packing: {}", name);
                let file = tokio::fs::File::open(&path).await?;
                archive.add(&name, file).await?;
                added.push(name);
            }
        }
    }

    Ok(added)
}

/// Write every entry under `dir`, creating directories as needed.
///
/// Entry names are re-resolved before joining, so a `..` in a foreign
/// catalog cannot escape `dir`. Where the platform separator is not `/`,
/// it is replaced with `_` inside each segment.
pub async fn extract<R: ReadAt>(reader: &ArchiveReader<R>, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for entry in reader.entries() {
        let segments = name::segments(&entry);
        if segments.is_empty() {
            continue;
        }
        let target = segments
            .iter()
            .fold(dir.to_path_buf(), |path, s| path.join(local_segment(s)));

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!("  extracting: {}", entry);
        let mut stream = reader.get(&entry)?;
        let mut file = tokio::fs::File::create(&target).await?;
        while let Some(chunk) = stream.next_chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        written.push(target);
    }

    Ok(written)
}

fn local_segment(segment: &str) -> String {
    if std::path::MAIN_SEPARATOR == '/' {
        segment.to_string()
    } else {
        segment.replace(std::path::MAIN_SEPARATOR, "_")
    }
}

/// Entry names with their compressed locations
pub fn list<R: ReadAt>(reader: &ArchiveReader<R>) -> Vec<EntryInfo> {
    reader
        .catalog()
        .iter()
        .filter(|(key, _)| name::is_listable(key))
        .map(|(key, location)| EntryInfo {
            name: name::denormalize(key).to_string(),
            start: location.start,
            compressed_size: location.length,
        })
        .collect()
}

/// Stream the named entries, one after another, into `out`
pub async fn show<R: ReadAt + 'static, W: AsyncWrite + Unpin>(
    reader: &ArchiveReader<R>,
    entries: &[String],
    out: &mut W,
) -> Result<()> {
    for entry in entries {
        let mut chunks = std::pin::pin!(reader.get(entry)?.into_stream());
        while let Some(chunk) = chunks.try_next().await? {
            out.write_all(&chunk).await?;
        }
    }
    out.flush().await?;
    Ok(())
}
