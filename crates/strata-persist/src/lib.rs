//! Persisted volume files for Strata.
//!
//! A saved volume carries everything needed to rebuild it in any arena:
//! its node and payload words in virtual order, and its padded brick data.
//!
//! # Architecture
//!
//! - [`VolumeFile`] is the in-memory image; [`VolumeFile::write_to`] and
//!   [`VolumeFile::read_from`] move it to and from any byte stream
//! - [`export_volume`] and [`import_volume`] move it to and from a
//!   [`VolumePool`](strata_arena::VolumePool)
//!
//! # Format
//!
//! ```text
//! [MAGIC "STRATAVX"] [VERSION i32] [resolution i32]
//! [node count i32] [payload count i32] [brick-data count i32]
//! [len u32][gzip nodes] [len u32][gzip payloads] [len u32][gzip brick data]
//! ```
//!
//! Integers are little-endian. Each gzip stream holds little-endian `u32`
//! words; a block whose word count disagrees with the header is rejected.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod file;
pub mod volume;

pub use error::PersistError;
pub use file::VolumeFile;
pub use volume::{export_volume, import_volume};

/// Magic bytes at the start of every volume file.
pub const MAGIC: [u8; 8] = *b"STRATAVX";

/// Current binary format version.
pub const FORMAT_VERSION: i32 = 1;
