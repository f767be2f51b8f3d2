//! Archive engine.
//!
//! - [`Archive`]: read-write handle over a local file or any
//!   [`WriteAt`](crate::io::WriteAt) backend
//! - [`ArchiveReader`]: read-only view over any [`ReadAt`](crate::io::ReadAt)
//!   source, local or remote
//! - [`EntryStream`]: lazy, decompressed contents of one entry
//!
//! ## Durability
//!
//! With [`ArchiveOptions::reclaim_catalog_space`] on (the default), a reopened
//! archive starts appending where the previous catalog begins. The old
//! catalog is fully loaded before that space is reused, but a crash between
//! the first append and the final header write leaves a header pointing at
//! overwritten bytes. Turning the option off appends after the old catalog
//! instead: each session then leaves one dead catalog block in the file, and
//! the previous catalog stays valid until the new header lands.

mod engine;
mod options;
mod reader;

pub use engine::Archive;
pub use options::ArchiveOptions;
pub use reader::{ArchiveReader, EntryStream, default_archive_name};
