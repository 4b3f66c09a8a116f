//! Core types for the Strata voxel volume framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental vocabulary shared by every other Strata crate:
//!
//! - [`Voxel`]: the packed 32-bit voxel word and its encode/decode routines.
//! - [`BrickCoord`], [`MetaChunkCoord`], [`Aabb`]: brick-space geometry.
//! - [`VolumeId`]: the strongly-typed identifier of a logical volume.
//!
//! The pack/unpack routines in [`voxel`] are the single source of truth for
//! the voxel word layout. Host-side downsampling and the reference labeling
//! device both go through them, so numeric parity is guaranteed by
//! construction rather than by convention.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod geometry;
pub mod id;
pub mod voxel;

pub use geometry::{
    covering_slots, floor_div, padded_index, passthrough_payload, Aabb, BrickCoord, BrickPayload,
    MetaChunkCoord, BRICK_SIZE, MAX_BRICK_COORD, MAX_LOD_LEVELS, META_CHUNK_BRICKS,
    PADDED_BRICK_SIZE, PADDED_BRICK_VOLUME,
};
pub use id::VolumeId;
pub use voxel::{Voxel, AIR_MATERIAL, PASSTHROUGH_MATERIAL, SDF_RANGE};
