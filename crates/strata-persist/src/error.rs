//! Error types for volume persistence.

use std::fmt;
use std::io;

use strata_arena::ArenaError;

/// Errors that can occur while saving or loading a volume file.
#[derive(Debug)]
pub enum PersistError {
    /// An I/O error occurred during read or write.
    Io(io::Error),
    /// The file does not start with the expected `b"STRATAVX"` magic bytes.
    InvalidMagic,
    /// The format version is not supported by this build.
    UnsupportedVersion {
        /// The version found in the file.
        found: i32,
    },
    /// A header field or compressed block could not be decoded.
    MalformedBlock {
        /// Which block (or `"header"`).
        block: &'static str,
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// A block decompressed to a different word count than the header
    /// declares.
    CountMismatch {
        /// Which block.
        block: &'static str,
        /// Word count from the header.
        expected: usize,
        /// Word count actually decoded.
        found: usize,
    },
    /// The arena rejected the import or export.
    Arena(ArenaError),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InvalidMagic => write!(f, "invalid magic bytes (expected b\"STRATAVX\")"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported format version {found}")
            }
            Self::MalformedBlock { block, detail } => {
                write!(f, "malformed {block} block: {detail}")
            }
            Self::CountMismatch {
                block,
                expected,
                found,
            } => {
                write!(
                    f,
                    "{block} block holds {found} words, header declares {expected}"
                )
            }
            Self::Arena(e) => write!(f, "arena error: {e}"),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Arena(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PersistError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ArenaError> for PersistError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}
