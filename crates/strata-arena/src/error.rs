//! Arena-specific error types.

use std::error::Error;
use std::fmt;

use crate::handle::PoolId;

/// Errors that can occur during arena operations.
///
/// Exhaustion errors are ordinary results: the caller decides whether to
/// skip creating the volume. None of them leave the allocators modified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// Fewer free pages than requested.
    PagesExhausted {
        /// Number of pages requested.
        requested: u32,
        /// Number of pages free at the time of the request.
        available: u32,
    },
    /// No free range is large enough for the request.
    RangeExhausted {
        /// Size requested, in allocator units.
        requested: u32,
        /// Largest free range at the time of the request.
        largest_free: u32,
    },
    /// A [`VolumeMemoryHandle`](crate::VolumeMemoryHandle) whose volume has
    /// already been released back to the pool.
    StaleHandle {
        /// Pool slot the handle points at.
        slot: u32,
        /// The generation encoded in the handle.
        handle_generation: u32,
        /// The slot's current generation.
        current_generation: u32,
    },
    /// A handle issued by a different [`VolumePool`](crate::VolumePool).
    ForeignHandle {
        /// Pool slot the handle points at.
        slot: u32,
        /// The pool that issued the handle.
        issuer: PoolId,
        /// The pool it was presented to.
        pool: PoolId,
    },
    /// A virtual index outside the volume's allocated range.
    OutOfBounds {
        /// The offending index.
        index: u32,
        /// Number of addressable elements.
        len: u32,
    },
    /// Arena configuration failed validation.
    InvalidConfig {
        /// Description of the violated constraint.
        reason: String,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PagesExhausted {
                requested,
                available,
            } => {
                write!(
                    f,
                    "page pool exhausted: requested {requested} pages, {available} free"
                )
            }
            Self::RangeExhausted {
                requested,
                largest_free,
            } => {
                write!(
                    f,
                    "range exhausted: requested {requested}, largest free range {largest_free}"
                )
            }
            Self::StaleHandle {
                slot,
                handle_generation,
                current_generation,
            } => {
                write!(
                    f,
                    "stale handle: slot {slot}, generation {handle_generation}, current {current_generation}"
                )
            }
            Self::ForeignHandle { slot, issuer, pool } => {
                write!(
                    f,
                    "foreign handle: slot {slot} issued by pool {issuer}, presented to pool {pool}"
                )
            }
            Self::OutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for length {len}")
            }
            Self::InvalidConfig { reason } => write!(f, "invalid arena config: {reason}"),
        }
    }
}

impl Error for ArenaError {}
