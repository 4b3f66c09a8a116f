//! Sparse, multi-LOD voxel edit storage for Strata.
//!
//! [`EditDatabase`] is the single source of truth for persistent edits.
//! LOD 0 holds brick payloads exactly as submitted; every coarser level is
//! derived by 2× downsampling ([`lod`]) and kept consistent on every
//! registration, so a level-`n` brick exists exactly when some covering
//! child at level `n - 1` carries data.
//!
//! ```text
//! EditDatabase
//! └── levels[0..max_lod_levels]
//!     └── MetaChunkCoord (64³ bricks) → bucket
//!         └── BrickCoord → Box<BrickPayload>
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod database;
pub mod error;
pub mod lod;

pub use config::EditConfig;
pub use database::{EditDatabase, EditRecord, EditRef, EditSummary};
pub use error::EditError;
