//! On-disk format of a gzpack archive.
//!
//! ## Layout
//!
//! ```text
//! +-----------------+  0
//! | header (24)     |  signature, version, catalog start, catalog length
//! +-----------------+  24
//! | entry block     |  gzip member, addressed only through the catalog
//! | entry block     |
//! | ...             |
//! +-----------------+
//! | catalog block   |  gzip member holding the JSON catalog
//! +-----------------+  end of file
//! ```
//!
//! Entry blocks carry no framing of their own. The catalog is the only
//! source of truth for which byte ranges hold live entries.
//!
//! - [`header`]: fixed-size header codec
//! - [`range`]: chunked reads of one byte range
//! - [`name`]: entry name normalization
//! - [`catalog`]: the key to location mapping and its JSON form
//! - [`gzip`]: push-style compression transforms

pub mod catalog;
pub mod gzip;
pub mod header;
pub mod name;
pub mod range;

pub use catalog::{Catalog, EntryLocation};
pub use header::{HEADER_SIZE, Header};
pub use range::{DEFAULT_CHUNK_SIZE, RangeReader};
