//! Benchmark profiles and utilities for the Strata voxel volume framework.
//!
//! Provides deterministic workloads shared by the benches:
//!
//! - [`reference_config`]: a world sized for a few hundred resident volumes
//! - [`terrain_edits`]: a heightfield of LOD-0 edit bricks
//! - [`paint_scaffold`]: a grounded slab with pillars and floating blocks

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use strata_arena::ArenaConfig;
use strata_core::{
    padded_index, passthrough_payload, BrickCoord, Voxel, BRICK_SIZE, PADDED_BRICK_VOLUME,
};
use strata_edits::{EditConfig, EditRecord};
use strata_engine::WorldConfig;

/// Reference world: 256 pages of 2048 nodes and 4096 bricks, 0.25 voxels.
pub fn reference_config() -> WorldConfig {
    WorldConfig {
        arena: ArenaConfig {
            page_size: ArenaConfig::DEFAULT_PAGE_SIZE,
            total_pages: 256,
            page_table_capacity: 256,
            brick_data_capacity: PADDED_BRICK_VOLUME as u32 * 4096,
        },
        edits: EditConfig::new(0.25),
        ..WorldConfig::default()
    }
}

/// Deterministic column height in `1..=BRICK_SIZE` for global column `(x, z)`.
fn column_height(x: i32, z: i32, seed: u64) -> i32 {
    let h = seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add((x as u64).wrapping_mul(1442695040888963407))
        .wrapping_add((z as u64).wrapping_mul(2862933555777941757));
    (h >> 33) as i32 % BRICK_SIZE + 1
}

/// One brick per `(x, z)` in `0..extent`², each filled with solid columns
/// of deterministic height.
pub fn terrain_edits(extent: i32, seed: u64) -> Vec<EditRecord> {
    let b = BRICK_SIZE as usize;
    let mut batch = Vec::with_capacity((extent * extent).max(0) as usize);
    for bz in 0..extent {
        for bx in 0..extent {
            let mut payload = passthrough_payload();
            for z in 0..b {
                for x in 0..b {
                    let gx = bx * BRICK_SIZE + x as i32;
                    let gz = bz * BRICK_SIZE + z as i32;
                    for y in 0..column_height(gx, gz, seed) as usize {
                        payload[padded_index(x + 1, y + 1, z + 1)] =
                            Voxel::pack(1, -1.0, [0.0, 1.0, 0.0]);
                    }
                }
            }
            batch.push(EditRecord::from_brick(BrickCoord::new(bx, 0, bz), &payload));
        }
    }
    batch
}

/// Fill a volume's brick data with a one-voxel ground slab, a pillar in
/// every brick column, and a floating block above every other pillar.
///
/// Returns the number of floating voxels written.
pub fn paint_scaffold(data: &mut [u32], resolution: u32) -> usize {
    let n = resolution * BRICK_SIZE as u32;
    let solid = Voxel::pack(2, -1.0, [0.0, 1.0, 0.0]).0;
    let mut set = |v: [u32; 3]| {
        data[owner_word(resolution, v)] = solid;
    };
    for z in 0..n {
        for x in 0..n {
            set([x, 0, z]);
        }
    }
    let mut floating = 0;
    for bz in 0..resolution {
        for bx in 0..resolution {
            let (x, z) = (bx * 4 + 1, bz * 4 + 1);
            for y in 1..n / 2 {
                set([x, y, z]);
            }
            if (bx + bz) % 2 == 0 && n >= 4 {
                set([x, n - 1, z]);
                set([x + 1, n - 1, z]);
                floating += 2;
            }
        }
    }
    floating
}

/// Owning-brick word of volume-local voxel `v`.
fn owner_word(resolution: u32, v: [u32; 3]) -> usize {
    let b = BRICK_SIZE as u32;
    let brick = (v[0] / b + resolution * (v[1] / b + resolution * (v[2] / b))) as usize;
    brick * PADDED_BRICK_VOLUME
        + padded_index(
            (v[0] % b + 1) as usize,
            (v[1] % b + 1) as usize,
            (v[2] % b + 1) as usize,
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_config_validates() {
        reference_config().validate().unwrap();
    }

    #[test]
    fn terrain_is_deterministic() {
        let a = terrain_edits(4, 42);
        let b = terrain_edits(4, 42);
        assert_eq!(a.len(), 16);
        assert!(a.iter().zip(&b).all(|(x, y)| x.coord == y.coord && x.payload == y.payload));
    }

    #[test]
    fn every_column_has_ground() {
        for record in terrain_edits(2, 7) {
            for z in 1..=4 {
                for x in 1..=4 {
                    assert!(record.payload[padded_index(x, 1, z)].is_solid());
                }
            }
        }
    }

    #[test]
    fn scaffold_counts_floaters() {
        let mut data = vec![Voxel::PASSTHROUGH.0; 8 * PADDED_BRICK_VOLUME];
        assert_eq!(paint_scaffold(&mut data, 2), 4);
    }
}
