//! # gzpack
//!
//! A single-file archive of independently gzip-compressed entries.
//!
//! Entries are appended one after another behind a fixed 24-byte header. A
//! JSON catalog mapping entry names to their byte ranges is written as the
//! last block when the archive is closed, and the header points at it. Any
//! entry can be read without touching the others, which also makes remote
//! archives cheap to browse over HTTP Range requests.
//!
//! ## Features
//!
//! - Streaming `add` and `get`: entries are compressed and decompressed in
//!   chunks, never held whole in memory
//! - Catalog rewritten only when entries were added
//! - Read-only access to local files and HTTP/HTTPS URLs
//! - Pack, extract, list and show helpers for directory trees
//!
//! ## Example
//!
//! ```no_run
//! use gzpack::{Archive, ArchiveReader};
//!
//! #[tokio::main]
//! async fn main() -> gzpack::Result<()> {
//!     let mut archive = Archive::open("site.pkg").await?;
//!     archive.add_bytes("index.html", "<h1>hi</h1>").await?;
//!     archive.close().await?;
//!
//!     let reader = ArchiveReader::open("site.pkg".as_ref()).await?;
//!     for name in reader.entries() {
//!         println!("{name}: {}", reader.text(&name).await?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod commands;
pub mod error;
pub mod format;
pub mod io;

pub use archive::{Archive, ArchiveOptions, ArchiveReader, EntryStream};
pub use cli::Cli;
pub use error::{Error, Result};
pub use io::{HttpRangeReader, LocalFile, ReadAt, WriteAt};
