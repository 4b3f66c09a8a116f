//! Edit database configuration.

use strata_core::MAX_LOD_LEVELS;

use crate::error::EditError;

/// Geometry and depth of the edit database.
#[derive(Clone, Debug, PartialEq)]
pub struct EditConfig {
    /// World size of one LOD-0 voxel. Default: 0.25.
    pub voxel_size: f32,
    /// World position of brick `(0, 0, 0)`'s minimum corner.
    pub world_origin: [f32; 3],
    /// Number of LOD levels kept, including LOD 0. Default: 6, max 6.
    pub max_lod_levels: usize,
}

impl EditConfig {
    /// Default LOD-0 voxel size in world units.
    pub const DEFAULT_VOXEL_SIZE: f32 = 0.25;

    /// Create a config with the given voxel size, origin at zero and the
    /// full LOD depth.
    pub fn new(voxel_size: f32) -> Self {
        Self {
            voxel_size,
            world_origin: [0.0; 3],
            max_lod_levels: MAX_LOD_LEVELS,
        }
    }

    /// World edge length of one brick at `lod`.
    pub fn brick_world_size(&self, lod: usize) -> f32 {
        4.0 * self.voxel_size * (1u32 << lod) as f32
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), EditError> {
        if !(self.voxel_size.is_finite() && self.voxel_size > 0.0) {
            return Err(EditError::InvalidConfig {
                reason: format!("voxel_size {} must be positive and finite", self.voxel_size),
            });
        }
        if self.world_origin.iter().any(|c| !c.is_finite()) {
            return Err(EditError::InvalidConfig {
                reason: "world_origin must be finite".into(),
            });
        }
        if self.max_lod_levels == 0 || self.max_lod_levels > MAX_LOD_LEVELS {
            return Err(EditError::InvalidConfig {
                reason: format!(
                    "max_lod_levels {} must be in 1..={MAX_LOD_LEVELS}",
                    self.max_lod_levels
                ),
            });
        }
        Ok(())
    }
}

impl Default for EditConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VOXEL_SIZE)
    }
}
