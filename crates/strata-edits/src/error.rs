//! Error types for edit registration and queries.

use std::error::Error;
use std::fmt;

use strata_core::{BrickCoord, MAX_BRICK_COORD};

/// Errors returned by [`EditDatabase`](crate::EditDatabase) operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditError {
    /// A record's payload is not exactly one padded brick. The whole batch
    /// was rejected and the database is unchanged.
    PayloadLength {
        /// Position of the offending record in the batch.
        index: usize,
        /// Its payload length in words.
        len: usize,
    },
    /// A brick coordinate lies outside `±MAX_BRICK_COORD`. The whole batch
    /// was rejected and the database is unchanged.
    CoordinateOutOfRange {
        /// Position of the offending record (or carve position).
        index: usize,
        /// The brick it addresses.
        coord: BrickCoord,
    },
    /// The requested LOD level is not stored.
    LodOutOfRange {
        /// The level asked for.
        lod: usize,
        /// Number of stored levels.
        levels: usize,
    },
    /// The configuration failed validation.
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadLength { index, len } => {
                write!(f, "edit {index} has payload of {len} words, expected 216")
            }
            Self::CoordinateOutOfRange { index, coord } => write!(
                f,
                "edit {index} addresses brick {coord}, beyond ±{MAX_BRICK_COORD}"
            ),
            Self::LodOutOfRange { lod, levels } => {
                write!(f, "LOD {lod} out of range (database keeps {levels} levels)")
            }
            Self::InvalidConfig { reason } => write!(f, "invalid edit config: {reason}"),
        }
    }
}

impl Error for EditError {}
