//! Host-side reference implementation of the labeling kernels.
//!
//! [`CpuLabelingDevice`] executes each dispatch synchronously and answers
//! readbacks immediately on the reply channel. Relaxation is Jacobi-style:
//! every dispatch reads the labels of the previous one, so a label travels
//! exactly one voxel per dispatch, matching a parallel kernel.

use crossbeam_channel::Sender;
use strata_arena::ArenaBuffers;
use strata_core::{padded_index, VolumeId, Voxel, BRICK_SIZE, PADDED_BRICK_VOLUME};

use crate::device::{
    DebrisVoxel, DispatchParams, GroundSeed, LabelingDevice, Readback, ReadbackData,
    ReadbackRequest,
};
use crate::error::DeviceError;

/// Label carried by voxels connected to ground.
const GROUND: u32 = 0;
/// Label of empty voxels.
const EMPTY: u32 = u32::MAX;

const B: usize = BRICK_SIZE as usize;

/// One volume's working set.
struct Scratch {
    volume: VolumeId,
    /// Voxels per axis.
    dim: usize,
    /// One bit per voxel, set when solid.
    mask: Vec<u64>,
    active_bricks: Vec<u32>,
    labels: Vec<u32>,
    next: Vec<u32>,
    changed: bool,
    debris: Vec<DebrisVoxel>,
}

impl Scratch {
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.dim * (y + self.dim * z)
    }

    fn is_solid(&self, i: usize) -> bool {
        (self.mask[i >> 6] >> (i & 63)) & 1 == 1
    }

    /// Voxel coordinates of every logical voxel in brick `brick`.
    fn brick_voxels(&self, brick: u32) -> impl Iterator<Item = [usize; 3]> {
        let r = self.dim / B;
        let b = brick as usize;
        let base = [(b % r) * B, (b / r % r) * B, (b / (r * r)) * B];
        (0..B * B * B).map(move |i| [base[0] + i % B, base[1] + i / B % B, base[2] + i / (B * B)])
    }

    fn bytes(&self) -> usize {
        self.mask.len() * 8
            + self.active_bricks.len() * 4
            + (self.labels.len() + self.next.len()) * 4
            + self.debris.len() * std::mem::size_of::<DebrisVoxel>()
    }
}

/// Reference [`LabelingDevice`] running on the host.
#[derive(Default)]
pub struct CpuLabelingDevice {
    scratch: Option<Scratch>,
    peak_scratch_bytes: usize,
}

impl CpuLabelingDevice {
    /// Create a device with no scratch allocated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a volume's working set is currently held.
    pub fn has_scratch(&self) -> bool {
        self.scratch.is_some()
    }

    /// Largest working set held so far, in bytes.
    pub fn peak_scratch_bytes(&self) -> usize {
        self.peak_scratch_bytes
    }

    fn scratch_for(
        &mut self,
        params: &DispatchParams,
        stage: &'static str,
    ) -> Result<&mut Scratch, DeviceError> {
        match self.scratch.as_mut() {
            Some(s) if s.volume == params.volume => Ok(s),
            _ => Err(DeviceError::Dispatch {
                stage,
                reason: format!("no topology built for volume {}", params.volume),
            }),
        }
    }

    fn track_peak(&mut self) {
        if let Some(s) = &self.scratch {
            self.peak_scratch_bytes = self.peak_scratch_bytes.max(s.bytes());
        }
    }
}

/// The volume's brick words, bounds-checked against the shared buffer.
fn volume_words<'a>(
    params: &DispatchParams,
    buffers: &'a ArenaBuffers,
    stage: &'static str,
) -> Result<&'a [u32], DeviceError> {
    let bricks = params.resolution as usize * params.resolution as usize * params.resolution as usize;
    let start = params.brick_data_offset as usize;
    let end = start + bricks * PADDED_BRICK_VOLUME;
    buffers
        .brick_data()
        .get(start..end)
        .ok_or_else(|| DeviceError::Dispatch {
            stage,
            reason: format!(
                "brick range [{start}, {end}) outside buffer of {}",
                buffers.brick_data().len()
            ),
        })
}

/// Decoded voxel at volume-local voxel `v`.
fn voxel_at(words: &[u32], resolution: usize, v: [usize; 3]) -> Voxel {
    let brick = v[0] / B + resolution * (v[1] / B + resolution * (v[2] / B));
    let slot = padded_index(v[0] % B + 1, v[1] % B + 1, v[2] % B + 1);
    Voxel(words[brick * PADDED_BRICK_VOLUME + slot])
}

/// Whether the support volume's top-layer voxel under world column
/// `(wx, wz)` is solid.
fn support_solid(support: &DispatchParams, words: &[u32], wx: f32, wz: f32) -> bool {
    let n = support.voxels_per_axis() as i64;
    let sx = ((wx - support.origin[0]) / support.voxel_size).floor() as i64;
    let sz = ((wz - support.origin[2]) / support.voxel_size).floor() as i64;
    if !(0..n).contains(&sx) || !(0..n).contains(&sz) {
        return false;
    }
    let top = [sx as usize, n as usize - 1, sz as usize];
    voxel_at(words, support.resolution as usize, top).is_solid()
}

impl LabelingDevice for CpuLabelingDevice {
    fn build_topology(
        &mut self,
        params: &DispatchParams,
        buffers: &ArenaBuffers,
    ) -> Result<(), DeviceError> {
        let words = volume_words(params, buffers, "build_topology")?;
        let r = params.resolution as usize;
        let dim = r * B;
        let count = dim * dim * dim;
        let mut scratch = Scratch {
            volume: params.volume,
            dim,
            mask: vec![0; count.div_ceil(64)],
            active_bricks: Vec::new(),
            labels: Vec::new(),
            next: Vec::new(),
            changed: false,
            debris: Vec::new(),
        };

        let last = params.max_brick.min((r * r * r) as u32);
        for brick in params.min_brick..last {
            let mut any = false;
            let voxels: Vec<[usize; 3]> = scratch.brick_voxels(brick).collect();
            for v in voxels {
                if voxel_at(words, r, v).is_solid() {
                    let i = scratch.index(v[0], v[1], v[2]);
                    scratch.mask[i >> 6] |= 1u64 << (i & 63);
                    any = true;
                }
            }
            if any {
                scratch.active_bricks.push(brick);
            }
        }

        self.scratch = Some(scratch);
        self.track_peak();
        Ok(())
    }

    fn init_labels(
        &mut self,
        params: &DispatchParams,
        seed: &GroundSeed,
        buffers: &ArenaBuffers,
    ) -> Result<(), DeviceError> {
        let support_words = match &seed.support {
            Some(support) => Some((support, volume_words(support, buffers, "init_labels")?)),
            None => None,
        };
        let scratch = self.scratch_for(params, "init_labels")?;
        let count = scratch.dim * scratch.dim * scratch.dim;
        scratch.labels = vec![EMPTY; count];

        for bi in 0..scratch.active_bricks.len() {
            let brick = scratch.active_bricks[bi];
            let voxels: Vec<[usize; 3]> = scratch.brick_voxels(brick).collect();
            for v in voxels {
                let i = scratch.index(v[0], v[1], v[2]);
                if !scratch.is_solid(i) {
                    continue;
                }
                let bottom = params.origin[1] + v[1] as f32 * params.voxel_size;
                let mut grounded = bottom <= seed.ground_y;
                if !grounded && v[1] == 0 {
                    if let Some((support, words)) = &support_words {
                        let wx = params.origin[0] + (v[0] as f32 + 0.5) * params.voxel_size;
                        let wz = params.origin[2] + (v[2] as f32 + 0.5) * params.voxel_size;
                        grounded = support_solid(support, words, wx, wz);
                    }
                }
                scratch.labels[i] = if grounded { GROUND } else { i as u32 + 1 };
            }
        }
        scratch.next = scratch.labels.clone();
        self.track_peak();
        Ok(())
    }

    fn propagate_labels(
        &mut self,
        params: &DispatchParams,
        dispatches: u32,
    ) -> Result<(), DeviceError> {
        let scratch = self.scratch_for(params, "propagate_labels")?;
        if scratch.labels.is_empty() {
            return Err(DeviceError::Dispatch {
                stage: "propagate_labels",
                reason: "labels not initialised".into(),
            });
        }
        let dim = scratch.dim;
        let voxels: Vec<[usize; 3]> = scratch
            .active_bricks
            .iter()
            .flat_map(|&b| scratch.brick_voxels(b))
            .filter(|v| scratch.is_solid(scratch.index(v[0], v[1], v[2])))
            .collect();

        scratch.changed = false;
        for _ in 0..dispatches {
            scratch.next.copy_from_slice(&scratch.labels);
            let mut changed = false;
            for v in &voxels {
                let i = scratch.index(v[0], v[1], v[2]);
                let mut best = scratch.labels[i];
                let mut consider = |j: usize| {
                    if scratch.is_solid(j) {
                        best = best.min(scratch.labels[j]);
                    }
                };
                if v[0] > 0 {
                    consider(i - 1);
                }
                if v[0] + 1 < dim {
                    consider(i + 1);
                }
                if v[1] > 0 {
                    consider(i - dim);
                }
                if v[1] + 1 < dim {
                    consider(i + dim);
                }
                if v[2] > 0 {
                    consider(i - dim * dim);
                }
                if v[2] + 1 < dim {
                    consider(i + dim * dim);
                }
                if best < scratch.labels[i] {
                    scratch.next[i] = best;
                    changed = true;
                }
            }
            std::mem::swap(&mut scratch.labels, &mut scratch.next);
            scratch.changed |= changed;
            if !changed {
                break;
            }
        }
        Ok(())
    }

    fn collect_debris(&mut self, params: &DispatchParams) -> Result<(), DeviceError> {
        let scratch = self.scratch_for(params, "collect_debris")?;
        let mut debris = Vec::new();
        for &brick in &scratch.active_bricks {
            for v in scratch.brick_voxels(brick) {
                let i = scratch.index(v[0], v[1], v[2]);
                if scratch.is_solid(i) && scratch.labels[i] != GROUND {
                    debris.push(DebrisVoxel {
                        position: [v[0] as f32, v[1] as f32, v[2] as f32],
                        label: scratch.labels[i],
                    });
                }
            }
        }
        scratch.debris = debris;
        self.track_peak();
        Ok(())
    }

    fn read_back(
        &mut self,
        volume: VolumeId,
        request: ReadbackRequest,
        reply: Sender<Readback>,
    ) -> Result<(), DeviceError> {
        let result = match self.scratch.as_ref() {
            Some(s) if s.volume == volume => Ok(match request {
                ReadbackRequest::ActiveBrickCount => ReadbackData::Count(s.active_bricks.len() as u32),
                ReadbackRequest::ChangeFlag => ReadbackData::Flag(s.changed),
                ReadbackRequest::DebrisCount => ReadbackData::Count(s.debris.len() as u32),
                ReadbackRequest::DebrisList => ReadbackData::Debris(s.debris.clone()),
            }),
            _ => Err(DeviceError::Readback {
                request,
                reason: format!("no scratch held for volume {volume}"),
            }),
        };
        // A dropped receiver means nobody is waiting; nothing to deliver.
        let _ = reply.send(Readback {
            volume,
            request,
            result,
        });
        Ok(())
    }

    fn release_scratch(&mut self) {
        self.scratch = None;
    }
}
