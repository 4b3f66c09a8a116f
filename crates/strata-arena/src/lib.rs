//! Shared-arena memory management for Strata voxel volumes.
//!
//! Every logical volume addresses its own virtual node space, but the bytes
//! live in a handful of shared buffers. This crate maps the former onto the
//! latter with two allocators and a pool that hands out typed handles.
//!
//! # Architecture
//!
//! ```text
//! VolumePool (owner, single host thread)
//! ├── ArenaBuffers (node / payload / page-table / brick-data words)
//! ├── PageAllocator        fixed-size pages of the node + payload arenas
//! ├── RangeAllocator × 2   page-table slots, brick-data words (best-fit)
//! └── slots[]              generation-checked VolumeKey → VolumeCounters
//! ```
//!
//! A volume's virtual node index `v` resolves to
//! `page_table[table_offset + v / page_size] * page_size + v % page_size`.
//! Pages need not be contiguous; the page table provides the indirection.
//!
//! # Thread safety
//!
//! None of the types here lock. All allocate/free calls are expected to come
//! from the one thread that owns the [`VolumePool`]. Wrap the pool in a
//! mutex if a multi-threaded host needs to share it.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod handle;
pub mod page;
pub mod pool;
pub mod range;

// Public re-exports for the primary API surface.
pub use config::ArenaConfig;
pub use error::ArenaError;
pub use handle::{PoolId, VolumeCounters, VolumeKey, VolumeMemoryHandle, VolumeRequest};
pub use page::PageAllocator;
pub use pool::{ArenaBuffers, VolumePool};
pub use range::RangeAllocator;
