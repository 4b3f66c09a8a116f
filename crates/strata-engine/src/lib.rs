//! Voxel world orchestration for Strata.
//!
//! [`VoxelWorld`] ties the shared arena, the edit database and the
//! structural analyzer together behind one owner:
//!
//! ```text
//! apply_edits ──► EditDatabase ──► stamp into volumes ──► analyze(bounds)
//!                                                             │
//! pump ◄── IslandReport ◄── StructuralAnalyzer ◄── readbacks ◄┘
//!   └── DebrisPolicy::Carve ──► EditDatabase::carve + volume brick data
//! ```
//!
//! Volumes are created from a [`VolumeSpec`], filled by generation through
//! [`VoxelWorld::brick_data_mut`], and marked ready with
//! [`VoxelWorld::set_ready`]. They can be saved and loaded through
//! `strata-persist`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod metrics;
pub mod world;

pub use config::{ConfigError, DebrisPolicy, WorldConfig};
pub use metrics::WorldMetrics;
pub use world::{VolumeEntry, VolumeSpec, VoxelWorld, WorldError};
