//! Test utilities for Strata development.
//!
//! Provides brick payload fixtures ([`fixtures`]), a helper for painting
//! solid voxels into a pooled volume ([`paint_solid`]), and a one-call
//! logger setup for tests that want to see `log` output.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use strata_arena::{ArenaError, VolumeMemoryHandle, VolumePool};
use strata_core::{padded_index, PADDED_BRICK_VOLUME};

pub use fixtures::{brick_with_solid, solid_brick, solid_voxel};

/// Install `env_logger` in test mode. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Brick-data word index of volume-local voxel `v` in a volume of
/// `resolution` bricks per axis.
pub fn voxel_word_index(resolution: u32, v: [u32; 3]) -> usize {
    let r = resolution as usize;
    let brick = [v[0] as usize / 4, v[1] as usize / 4, v[2] as usize / 4];
    let brick_index = brick[0] + r * brick[1] + r * r * brick[2];
    let slot = padded_index(
        v[0] as usize % 4 + 1,
        v[1] as usize % 4 + 1,
        v[2] as usize % 4 + 1,
    );
    brick_index * PADDED_BRICK_VOLUME + slot
}

/// Write a solid voxel of `material` at each volume-local position.
pub fn paint_solid(
    pool: &mut VolumePool,
    handle: &VolumeMemoryHandle,
    resolution: u32,
    voxels: &[[u32; 3]],
    material: u8,
) -> Result<(), ArenaError> {
    let data = pool.brick_data_mut(handle)?;
    let len = data.len() as u32;
    for &v in voxels {
        let idx = voxel_word_index(resolution, v);
        let word = data.get_mut(idx).ok_or(ArenaError::OutOfBounds {
            index: idx as u32,
            len,
        })?;
        *word = solid_voxel(material).0;
    }
    Ok(())
}
