//! The labeling device capability contract.
//!
//! A [`LabelingDevice`] runs the four analysis kernels against the shared
//! arena buffers. Dispatches are fire-and-forget; results come back only
//! through [`read_back`](LabelingDevice::read_back), which delivers a
//! [`Readback`] message on the supplied channel once the data is available.
//!
//! Every implementation must:
//!
//! - address a volume's bricks through [`DispatchParams::brick_data_offset`]
//!   and its nodes through the page table at
//!   [`DispatchParams::page_table_offset`],
//! - treat material 255 as passthrough (never solid),
//! - decode voxel words with [`strata_core::Voxel`], and
//! - hold scratch for at most one volume at a time.

use crossbeam_channel::Sender;
use strata_arena::ArenaBuffers;
use strata_core::{Aabb, VolumeId, BRICK_SIZE};

use crate::error::DeviceError;

/// Where one volume lives and how it maps into world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DispatchParams {
    /// The volume being processed.
    pub volume: VolumeId,
    /// First page-table slot of the volume.
    pub page_table_offset: u32,
    /// First brick-data word of the volume.
    pub brick_data_offset: u32,
    /// Bricks per axis.
    pub resolution: u32,
    /// First brick index to process (inclusive).
    pub min_brick: u32,
    /// Last brick index to process (exclusive).
    pub max_brick: u32,
    /// World position of the volume's minimum corner.
    pub origin: [f32; 3],
    /// World size of one voxel.
    pub voxel_size: f32,
}

impl DispatchParams {
    /// Logical voxels per axis.
    pub fn voxels_per_axis(&self) -> u32 {
        self.resolution * BRICK_SIZE as u32
    }

    /// Total logical voxels.
    pub fn voxel_count(&self) -> usize {
        let n = self.voxels_per_axis() as usize;
        n * n * n
    }

    /// World bounds of the volume.
    pub fn bounds(&self) -> Aabb {
        Aabb::cube(self.origin, self.voxels_per_axis() as f32 * self.voxel_size)
    }
}

/// What counts as ground when seeding labels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundSeed {
    /// World Y of the ground plane.
    pub ground_y: f32,
    /// The ready volume directly below, if any. A bottom-layer voxel is
    /// grounded when the support's top-layer voxel in the same world
    /// column is solid.
    pub support: Option<DispatchParams>,
}

/// Data the pipeline can ask the device for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReadbackRequest {
    /// Number of bricks containing a solid voxel.
    ActiveBrickCount,
    /// Whether any label changed during the last propagation batch.
    ChangeFlag,
    /// Number of debris voxels emitted.
    DebrisCount,
    /// The full debris list.
    DebrisList,
}

/// One debris voxel emitted by the collect kernel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DebrisVoxel {
    /// Voxel index inside the volume, as floats.
    pub position: [f32; 3],
    /// Component label. Voxels sharing a label form one island.
    pub label: u32,
}

/// Readback payloads.
#[derive(Clone, Debug, PartialEq)]
pub enum ReadbackData {
    /// An append-buffer element count.
    Count(u32),
    /// A single flag.
    Flag(bool),
    /// The debris append buffer.
    Debris(Vec<DebrisVoxel>),
}

/// A completed (or failed) readback, delivered on the reply channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Readback {
    /// The volume the data belongs to.
    pub volume: VolumeId,
    /// What was requested.
    pub request: ReadbackRequest,
    /// The data, or the reason it could not be read.
    pub result: Result<ReadbackData, DeviceError>,
}

/// The kernels the analyzer drives.
///
/// All dispatch methods operate on the scratch of the volume named by
/// `params.volume`; [`build_topology`](Self::build_topology) starts a new
/// working set and [`release_scratch`](Self::release_scratch) frees it.
pub trait LabelingDevice {
    /// Scan the volume's bricks into a solid bitmask and a compacted list
    /// of active bricks.
    fn build_topology(
        &mut self,
        params: &DispatchParams,
        buffers: &ArenaBuffers,
    ) -> Result<(), DeviceError>;

    /// Allocate per-voxel labels and seed them: grounded voxels get the
    /// ground label, every other solid voxel a unique label.
    fn init_labels(
        &mut self,
        params: &DispatchParams,
        seed: &GroundSeed,
        buffers: &ArenaBuffers,
    ) -> Result<(), DeviceError>;

    /// Run `dispatches` rounds of 6-connected min-label relaxation over the
    /// active bricks, raising the change flag if any label moved.
    fn propagate_labels(
        &mut self,
        params: &DispatchParams,
        dispatches: u32,
    ) -> Result<(), DeviceError>;

    /// Emit every solid voxel not carrying the ground label.
    fn collect_debris(&mut self, params: &DispatchParams) -> Result<(), DeviceError>;

    /// Queue an asynchronous readback; the result arrives on `reply`.
    fn read_back(
        &mut self,
        volume: VolumeId,
        request: ReadbackRequest,
        reply: Sender<Readback>,
    ) -> Result<(), DeviceError>;

    /// Free the current volume's scratch buffers.
    fn release_scratch(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(resolution: u32) -> DispatchParams {
        DispatchParams {
            volume: VolumeId(1),
            page_table_offset: 0,
            brick_data_offset: 0,
            resolution,
            min_brick: 0,
            max_brick: resolution * resolution * resolution,
            origin: [2.0, 0.0, -4.0],
            voxel_size: 0.5,
        }
    }

    #[test]
    fn voxel_counts_follow_resolution() {
        assert_eq!(params(2).voxels_per_axis(), 8);
        assert_eq!(params(2).voxel_count(), 512);
    }

    #[test]
    fn bounds_span_all_bricks() {
        let b = params(2).bounds();
        assert_eq!(b.min, [2.0, 0.0, -4.0]);
        assert_eq!(b.max, [6.0, 4.0, 0.0]);
    }
}
