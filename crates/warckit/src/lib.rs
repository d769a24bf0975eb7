//! WARC (ISO 28500) record codec and streaming reader/writer.
//!
//! The crate is built around two types: [`reader::WarcReader`], which lazily
//! decodes records from a plain or gzip-member-framed byte stream, and
//! [`writer::WarcWriter`], which emits syntactically valid records and opens
//! every archive segment with a `warcinfo` record.

#![warn(missing_docs)]
pub mod compress;
pub mod error;
pub mod fields;
pub mod io;
pub mod reader;
pub mod record;
pub mod stream;
pub mod uuid;
pub mod writer;

pub use error::WarcError;
pub use reader::{RecordBody, WarcReader, WarcRecord};
pub use record::{RecordHeader, RecordType};
pub use writer::{WarcWriter, WriterConfig};

/// WARC version string written by this crate.
pub const DEFAULT_VERSION: &str = "WARC/1.1";
