//! Brick payload fixtures.
//!
//! - [`solid_voxel`]: a solid voxel word of a given material.
//! - [`brick_with_solid`]: a passthrough brick with a few solid voxels.
//! - [`solid_brick`]: every logical voxel solid, padding passthrough.

use strata_core::{padded_index, passthrough_payload, BrickPayload, Voxel};

/// A solid voxel one unit inside the surface, facing `+Y`.
pub fn solid_voxel(material: u8) -> Voxel {
    Voxel::pack(material, -1.0, [0.0, 1.0, 0.0])
}

/// A passthrough brick with a solid voxel at each logical position.
///
/// Positions are logical (0..4 per axis); padding stays passthrough.
pub fn brick_with_solid(logical: &[[usize; 3]], material: u8) -> Box<BrickPayload> {
    let mut brick = passthrough_payload();
    for &[x, y, z] in logical {
        assert!(x < 4 && y < 4 && z < 4, "logical voxel ({x}, {y}, {z}) outside brick");
        brick[padded_index(x + 1, y + 1, z + 1)] = solid_voxel(material);
    }
    brick
}

/// A brick whose 64 logical voxels are all solid.
pub fn solid_brick(material: u8) -> Box<BrickPayload> {
    let mut all = Vec::with_capacity(64);
    for z in 0..4 {
        for y in 0..4 {
            for x in 0..4 {
                all.push([x, y, z]);
            }
        }
    }
    brick_with_solid(&all, material)
}
