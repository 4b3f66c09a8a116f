//! The voxel world: volumes, edits and structural analysis in one place.
//!
//! [`VoxelWorld`] owns the shared [`VolumePool`], the [`EditDatabase`] and a
//! [`StructuralAnalyzer`], plus a registry of the volumes carved out of the
//! pool. Everything runs on the caller's thread; device work advances only
//! inside [`pump()`](VoxelWorld::pump).
//!
//! # Voxel grid
//!
//! Volumes share the edit database's voxel size and are expected to sit on
//! its grid: a volume origin is snapped to the nearest voxel corner when
//! edits are stamped into it.

use std::error::Error;
use std::fmt;
use std::io::{Read, Write};

use indexmap::IndexMap;
use strata_arena::{ArenaError, VolumeMemoryHandle, VolumePool, VolumeRequest};
use strata_core::{
    covering_slots, padded_index, Aabb, Voxel, VolumeId, BRICK_SIZE, PADDED_BRICK_VOLUME,
};
use strata_edits::{EditDatabase, EditError, EditRecord, EditSummary};
use strata_integrity::{AnalysisTarget, IslandReport, LabelingDevice, StructuralAnalyzer};
use strata_persist::{export_volume, import_volume, PersistError, VolumeFile};

use crate::config::{ConfigError, DebrisPolicy, WorldConfig};
use crate::metrics::WorldMetrics;

// ── WorldError ─────────────────────────────────────────────────────

/// Errors returned by [`VoxelWorld`] operations.
#[derive(Debug)]
pub enum WorldError {
    /// The arena refused an allocation or a handle.
    Arena(ArenaError),
    /// The edit database rejected a batch.
    Edits(EditError),
    /// A volume file could not be written or read.
    Persist(PersistError),
    /// No volume with this id is registered.
    UnknownVolume(VolumeId),
    /// A volume description is unusable.
    InvalidVolume {
        /// Description of the problem.
        reason: String,
    },
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arena(e) => write!(f, "arena: {e}"),
            Self::Edits(e) => write!(f, "edits: {e}"),
            Self::Persist(e) => write!(f, "persist: {e}"),
            Self::UnknownVolume(id) => write!(f, "unknown volume {id}"),
            Self::InvalidVolume { reason } => write!(f, "invalid volume: {reason}"),
        }
    }
}

impl Error for WorldError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Arena(e) => Some(e),
            Self::Edits(e) => Some(e),
            Self::Persist(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArenaError> for WorldError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}

impl From<EditError> for WorldError {
    fn from(e: EditError) -> Self {
        Self::Edits(e)
    }
}

impl From<PersistError> for WorldError {
    fn from(e: PersistError) -> Self {
        Self::Persist(e)
    }
}

// ── Volumes ────────────────────────────────────────────────────────

/// Description of a volume to create.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeSpec {
    /// World position of the minimum corner.
    pub origin: [f32; 3],
    /// Bricks per axis.
    pub resolution: u32,
    /// Node slots to reserve for the volume's hierarchy.
    pub nodes: u32,
    /// Whether the volume is analyzed.
    pub active: bool,
}

impl VolumeSpec {
    /// An active volume with one node slot per brick.
    pub fn new(origin: [f32; 3], resolution: u32) -> Self {
        Self {
            origin,
            resolution,
            nodes: resolution.saturating_pow(3),
            active: true,
        }
    }
}

/// A registered volume.
#[derive(Clone, Debug)]
pub struct VolumeEntry {
    origin: [f32; 3],
    resolution: u32,
    handle: VolumeMemoryHandle,
    ready: bool,
    active: bool,
}

impl VolumeEntry {
    /// World position of the minimum corner.
    pub fn origin(&self) -> [f32; 3] {
        self.origin
    }

    /// Bricks per axis.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// The volume's arena handle.
    pub fn handle(&self) -> &VolumeMemoryHandle {
        &self.handle
    }

    /// Whether generation has finished.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Whether the volume takes part in analysis.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

// ── VoxelWorld ─────────────────────────────────────────────────────

/// Owner of every volume, the edit history and the structural analyzer.
pub struct VoxelWorld<D> {
    pool: VolumePool,
    edits: EditDatabase,
    analyzer: StructuralAnalyzer<D>,
    volumes: IndexMap<VolumeId, VolumeEntry>,
    next_id: u32,
    debris_policy: DebrisPolicy,
    metrics: WorldMetrics,
}

impl<D: LabelingDevice> VoxelWorld<D> {
    /// Validate `config` and build every subsystem.
    pub fn new(config: WorldConfig, device: D) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            pool: VolumePool::new(config.arena)?,
            edits: EditDatabase::new(config.edits)?,
            analyzer: StructuralAnalyzer::new(config.analyzer, device)?,
            volumes: IndexMap::new(),
            next_id: 1,
            debris_policy: config.debris_policy,
            metrics: WorldMetrics::default(),
        })
    }

    // ── Volume lifecycle ───────────────────────────────────────────

    /// Reserve arena memory for a new volume.
    ///
    /// The volume starts not ready: it is neither analyzed nor used as
    /// support until [`set_ready`](Self::set_ready). Arena exhaustion is
    /// returned to the caller, who may simply skip the volume.
    pub fn create_volume(&mut self, spec: VolumeSpec) -> Result<VolumeId, WorldError> {
        let bricks = brick_count(spec.resolution)?;
        if spec.origin.iter().any(|c| !c.is_finite()) {
            return Err(WorldError::InvalidVolume {
                reason: "origin must be finite".into(),
            });
        }
        let handle = match self.pool.acquire(VolumeRequest {
            nodes: spec.nodes,
            bricks,
        }) {
            Ok(handle) => handle,
            Err(e) => {
                self.metrics.allocation_failures += 1;
                log::warn!("volume at {:?} not created: {e}", spec.origin);
                return Err(e.into());
            }
        };
        let id = self.register(spec.origin, spec.resolution, handle, false, spec.active);
        self.stamp_existing_edits(id)?;
        Ok(id)
    }

    /// Release a volume's memory and forget it.
    pub fn return_volume(&mut self, id: VolumeId) -> Result<(), WorldError> {
        let entry = self
            .volumes
            .shift_remove(&id)
            .ok_or(WorldError::UnknownVolume(id))?;
        self.pool.release(&entry.handle)?;
        self.metrics.volumes_returned += 1;
        log::debug!("returned volume {id}");
        Ok(())
    }

    /// Mark a volume's generation as finished (or restarted).
    pub fn set_ready(&mut self, id: VolumeId, ready: bool) -> Result<(), WorldError> {
        self.entry_mut(id)?.ready = ready;
        Ok(())
    }

    /// Include or exclude a volume from analysis.
    pub fn set_active(&mut self, id: VolumeId, active: bool) -> Result<(), WorldError> {
        self.entry_mut(id)?.active = active;
        Ok(())
    }

    /// A registered volume.
    pub fn volume(&self, id: VolumeId) -> Option<&VolumeEntry> {
        self.volumes.get(&id)
    }

    /// All registered volumes in creation order.
    pub fn volumes(&self) -> impl Iterator<Item = (VolumeId, &VolumeEntry)> {
        self.volumes.iter().map(|(&id, e)| (id, e))
    }

    /// A volume's padded brick words, for generation to fill.
    pub fn brick_data_mut(&mut self, id: VolumeId) -> Result<&mut [u32], WorldError> {
        let entry = self.volumes.get(&id).ok_or(WorldError::UnknownVolume(id))?;
        Ok(self.pool.brick_data_mut(&entry.handle)?)
    }

    // ── Edits ──────────────────────────────────────────────────────

    /// Register a batch of LOD-0 edits and stamp them into every volume
    /// they overlap.
    ///
    /// When the batch removes material, an analysis is requested over the
    /// touched bounds. A malformed batch is rejected whole.
    pub fn apply_edits(&mut self, batch: &[EditRecord]) -> Result<EditSummary, WorldError> {
        let summary = match self.edits.register_edits(batch) {
            Ok(summary) => summary,
            Err(e) => {
                self.metrics.edit_batches_rejected += 1;
                return Err(e.into());
            }
        };
        self.metrics.edit_batches += 1;
        if summary.changed == 0 {
            return Ok(summary);
        }

        let ids: Vec<VolumeId> = self.volumes.keys().copied().collect();
        for id in ids {
            self.stamp(id, batch)?;
        }

        if batch.iter().any(removes_material) {
            let touched = batch
                .iter()
                .map(|r| self.edits.brick_bounds(r.coord, 0))
                .reduce(|a, b| a.union(&b));
            if let Some(bounds) = touched {
                self.analyze(Some(&bounds));
            }
        }
        Ok(summary)
    }

    // ── Analysis ───────────────────────────────────────────────────

    /// Ask for a structural analysis of every active, ready volume touching
    /// `bounds` (or all of them).
    ///
    /// Returns `false` if an analysis is already running; the request is
    /// dropped, not queued.
    pub fn analyze(&mut self, bounds: Option<&Aabb>) -> bool {
        let voxel_size = self.edits.voxel_size();
        let targets: Vec<AnalysisTarget> = self
            .volumes
            .iter()
            .map(|(&id, e)| AnalysisTarget {
                id,
                handle: e.handle.clone(),
                origin: e.origin,
                resolution: e.resolution,
                voxel_size,
                active: e.active,
                ready: e.ready,
            })
            .collect();
        self.metrics.analyses_requested += 1;
        let accepted = self.analyzer.analyze_world(&targets, bounds);
        if !accepted {
            self.metrics.analyses_dropped += 1;
        }
        accepted
    }

    /// Advance the analyzer and collect finished reports.
    ///
    /// Under [`DebrisPolicy::Carve`] every reported voxel is also turned to
    /// air in the edit database and in its volume.
    pub fn pump(&mut self) -> Result<Vec<IslandReport>, WorldError> {
        self.analyzer.pump(&self.pool);
        let reports: Vec<IslandReport> = self.analyzer.reports().try_iter().collect();
        self.metrics.islands_reported += reports.iter().map(|r| r.islands.len() as u64).sum::<u64>();
        if self.debris_policy == DebrisPolicy::Carve {
            for report in &reports {
                self.carve(report)?;
            }
        }
        Ok(reports)
    }

    /// Whether an analysis run is still in progress.
    pub fn is_analyzing(&self) -> bool {
        self.analyzer.is_analyzing()
    }

    // ── Persistence ────────────────────────────────────────────────

    /// Write a volume to `w`.
    pub fn save_volume(&self, id: VolumeId, w: &mut dyn Write) -> Result<(), WorldError> {
        let entry = self.volumes.get(&id).ok_or(WorldError::UnknownVolume(id))?;
        export_volume(&self.pool, &entry.handle, entry.resolution)?.write_to(w)?;
        log::debug!("saved volume {id}");
        Ok(())
    }

    /// Read a volume from `r` into fresh arena memory at `origin`.
    ///
    /// Loaded volumes are ready and active.
    pub fn load_volume(&mut self, r: &mut dyn Read, origin: [f32; 3]) -> Result<VolumeId, WorldError> {
        let file = VolumeFile::read_from(r)?;
        let expected = brick_count(file.resolution)? as usize * PADDED_BRICK_VOLUME;
        if file.brick_data.len() != expected {
            return Err(WorldError::InvalidVolume {
                reason: format!(
                    "resolution {} needs {expected} brick words, file has {}",
                    file.resolution,
                    file.brick_data.len()
                ),
            });
        }
        let handle = match import_volume(&mut self.pool, &file) {
            Ok(handle) => handle,
            Err(e) => {
                if matches!(e, PersistError::Arena(_)) {
                    self.metrics.allocation_failures += 1;
                }
                return Err(e.into());
            }
        };
        Ok(self.register(origin, file.resolution, handle, true, true))
    }

    // ── Accessors ──────────────────────────────────────────────────

    /// The shared arena.
    pub fn pool(&self) -> &VolumePool {
        &self.pool
    }

    /// The edit database.
    pub fn edits(&self) -> &EditDatabase {
        &self.edits
    }

    /// The structural analyzer.
    pub fn analyzer(&self) -> &StructuralAnalyzer<D> {
        &self.analyzer
    }

    /// World-level counters.
    pub fn metrics(&self) -> &WorldMetrics {
        &self.metrics
    }

    // ── Internals ──────────────────────────────────────────────────

    fn register(
        &mut self,
        origin: [f32; 3],
        resolution: u32,
        handle: VolumeMemoryHandle,
        ready: bool,
        active: bool,
    ) -> VolumeId {
        let id = VolumeId(self.next_id);
        self.next_id += 1;
        self.volumes.insert(
            id,
            VolumeEntry {
                origin,
                resolution,
                handle,
                ready,
                active,
            },
        );
        self.metrics.volumes_created += 1;
        log::debug!("volume {id}: resolution {resolution} at {origin:?}");
        id
    }

    fn entry_mut(&mut self, id: VolumeId) -> Result<&mut VolumeEntry, WorldError> {
        self.volumes.get_mut(&id).ok_or(WorldError::UnknownVolume(id))
    }

    /// The global voxel index of a volume's minimum corner.
    fn grid_origin(&self, entry: &VolumeEntry) -> [i32; 3] {
        let vs = self.edits.voxel_size();
        let o = self.edits.config().world_origin;
        [
            ((entry.origin[0] - o[0]) / vs).round() as i32,
            ((entry.origin[1] - o[1]) / vs).round() as i32,
            ((entry.origin[2] - o[2]) / vs).round() as i32,
        ]
    }

    fn volume_bounds(&self, entry: &VolumeEntry) -> Aabb {
        let extent = (entry.resolution * BRICK_SIZE as u32) as f32 * self.edits.voxel_size();
        Aabb::cube(entry.origin, extent)
    }

    /// Stamp every stored LOD-0 edit overlapping a new volume.
    fn stamp_existing_edits(&mut self, id: VolumeId) -> Result<(), WorldError> {
        let entry = self.volumes.get(&id).ok_or(WorldError::UnknownVolume(id))?;
        let bounds = self.volume_bounds(entry);
        let mut found = Vec::new();
        self.edits.get_edits(&bounds, 0, &mut found)?;
        let records: Vec<EditRecord> = found
            .iter()
            .map(|e| EditRecord::from_brick(e.coord, e.payload))
            .collect();
        self.stamp(id, &records)
    }

    /// Write the non-passthrough interior voxels of `records` into a volume.
    fn stamp(&mut self, id: VolumeId, records: &[EditRecord]) -> Result<(), WorldError> {
        let entry = self.volumes.get(&id).ok_or(WorldError::UnknownVolume(id))?;
        let bounds = self.volume_bounds(entry);
        let grid = self.grid_origin(entry);
        let resolution = entry.resolution;
        let handle = entry.handle.clone();

        let overlapping: Vec<&EditRecord> = records
            .iter()
            .filter(|r| self.edits.brick_bounds(r.coord, 0).intersects(&bounds))
            .collect();
        if overlapping.is_empty() {
            return Ok(());
        }
        let data = self.pool.brick_data_mut(&handle)?;
        let mut written = 0usize;
        let b = BRICK_SIZE as usize;
        for record in overlapping {
            let base = record.coord.to_array();
            for z in 1..=b {
                for y in 1..=b {
                    for x in 1..=b {
                        let voxel = record.payload[padded_index(x, y, z)];
                        if voxel.is_passthrough() {
                            continue;
                        }
                        let local = [
                            base[0] * BRICK_SIZE + x as i32 - 1 - grid[0],
                            base[1] * BRICK_SIZE + y as i32 - 1 - grid[1],
                            base[2] * BRICK_SIZE + z as i32 - 1 - grid[2],
                        ];
                        if write_voxel(data, resolution, local, voxel) {
                            written += 1;
                        }
                    }
                }
            }
        }
        log::trace!("stamped {written} edited voxels into volume {id}");
        Ok(())
    }

    /// Carve one report's islands out of the edit database and its volume.
    fn carve(&mut self, report: &IslandReport) -> Result<(), WorldError> {
        let positions: Vec<[f32; 3]> = report.positions().copied().collect();
        if positions.is_empty() {
            return Ok(());
        }
        self.edits.carve(&positions)?;

        // The volume may have been returned while its analysis was in flight.
        let Some(entry) = self.volumes.get(&report.volume) else {
            return Ok(());
        };
        let vs = self.edits.voxel_size();
        let origin = entry.origin;
        let resolution = entry.resolution;
        let handle = entry.handle.clone();
        let data = self.pool.brick_data_mut(&handle)?;
        for p in &positions {
            let local = [
                ((p[0] - origin[0]) / vs).floor() as i32,
                ((p[1] - origin[1]) / vs).floor() as i32,
                ((p[2] - origin[2]) / vs).floor() as i32,
            ];
            write_voxel(data, resolution, local, Voxel::air());
        }
        self.metrics.voxels_carved += positions.len() as u64;
        log::debug!(
            "carved {} voxels from volume {}",
            positions.len(),
            report.volume
        );
        Ok(())
    }
}

/// `resolution³`, rejecting zero and overflow.
fn brick_count(resolution: u32) -> Result<u32, WorldError> {
    if resolution == 0 {
        return Err(WorldError::InvalidVolume {
            reason: "resolution must be at least 1".into(),
        });
    }
    resolution
        .checked_pow(3)
        .filter(|b| b.checked_mul(PADDED_BRICK_VOLUME as u32).is_some())
        .ok_or_else(|| WorldError::InvalidVolume {
            reason: format!("resolution {resolution} is too large"),
        })
}

/// Whether a record turns any voxel into non-solid material.
fn removes_material(record: &EditRecord) -> bool {
    let b = BRICK_SIZE as usize;
    (1..=b).any(|z| {
        (1..=b).any(|y| {
            (1..=b).any(|x| {
                let v = record.payload[padded_index(x, y, z)];
                !v.is_passthrough() && !v.is_solid()
            })
        })
    })
}

/// Write `voxel` at volume-local voxel `local` into the owning brick and
/// every in-volume neighbour's padding. Returns `false` if `local` lies
/// outside the volume.
fn write_voxel(data: &mut [u32], resolution: u32, local: [i32; 3], voxel: Voxel) -> bool {
    let r = resolution as i32;
    if local.iter().any(|&c| c < 0 || c >= r * BRICK_SIZE) {
        return false;
    }
    for (brick, slot) in covering_slots(local) {
        let b = brick.to_array();
        if b.iter().any(|&c| c < 0 || c >= r) {
            continue;
        }
        let index = (b[0] + r * (b[1] + r * b[2])) as usize * PADDED_BRICK_VOLUME
            + padded_index(slot[0], slot[1], slot[2]);
        data[index] = voxel.0;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_arena::ArenaConfig;
    use strata_core::BrickCoord;
    use strata_edits::EditConfig;
    use strata_integrity::CpuLabelingDevice;
    use strata_test_utils::{brick_with_solid, init_logging, solid_voxel, voxel_word_index};

    fn config() -> WorldConfig {
        WorldConfig {
            arena: ArenaConfig {
                page_size: 64,
                total_pages: 16,
                page_table_capacity: 16,
                brick_data_capacity: 216 * 64,
            },
            edits: EditConfig::new(1.0),
            ..WorldConfig::default()
        }
    }

    fn world() -> VoxelWorld<CpuLabelingDevice> {
        init_logging();
        VoxelWorld::new(config(), CpuLabelingDevice::new()).unwrap()
    }

    fn word(world: &VoxelWorld<CpuLabelingDevice>, id: VolumeId, v: [u32; 3]) -> Voxel {
        let entry = world.volume(id).unwrap();
        let data = world.pool().brick_data(entry.handle()).unwrap();
        Voxel(data[voxel_word_index(entry.resolution(), v)])
    }

    #[test]
    fn create_and_return_volume() {
        let mut w = world();
        let id = w.create_volume(VolumeSpec::new([0.0; 3], 2)).unwrap();
        assert!(!w.volume(id).unwrap().is_ready());
        assert_eq!(w.pool().live_count(), 1);
        w.return_volume(id).unwrap();
        assert_eq!(w.pool().live_count(), 0);
        assert!(matches!(
            w.return_volume(id),
            Err(WorldError::UnknownVolume(_))
        ));
        assert_eq!(w.metrics().volumes_returned, 1);
    }

    #[test]
    fn exhaustion_is_reported_not_fatal() {
        let mut w = world();
        let err = w.create_volume(VolumeSpec::new([0.0; 3], 5)).unwrap_err();
        assert!(matches!(err, WorldError::Arena(ArenaError::RangeExhausted { .. })));
        assert_eq!(w.metrics().allocation_failures, 1);
        assert!(w.create_volume(VolumeSpec::new([0.0; 3], 2)).is_ok());
    }

    #[test]
    fn zero_resolution_rejected() {
        let mut w = world();
        assert!(matches!(
            w.create_volume(VolumeSpec::new([0.0; 3], 0)),
            Err(WorldError::InvalidVolume { .. })
        ));
    }

    #[test]
    fn edits_are_stamped_into_overlapping_volumes() {
        let mut w = world();
        let a = w.create_volume(VolumeSpec::new([0.0; 3], 1)).unwrap();
        let b = w.create_volume(VolumeSpec::new([4.0, 0.0, 0.0], 1)).unwrap();
        let brick = brick_with_solid(&[[3, 0, 0]], 9);
        w.apply_edits(&[EditRecord::from_brick(BrickCoord::new(0, 0, 0), &brick)])
            .unwrap();
        assert_eq!(word(&w, a, [3, 0, 0]), solid_voxel(9));
        assert!(word(&w, b, [0, 0, 0]).is_passthrough());
        // Padding never reaches across volumes.
        let data = w.pool().brick_data(w.volume(b).unwrap().handle()).unwrap();
        assert!(Voxel(data[padded_index(0, 1, 1)]).is_passthrough());
    }

    #[test]
    fn new_volume_receives_existing_edits() {
        let mut w = world();
        let brick = brick_with_solid(&[[1, 1, 1]], 4);
        w.apply_edits(&[EditRecord::from_brick(BrickCoord::new(2, 0, 0), &brick)])
            .unwrap();
        let id = w.create_volume(VolumeSpec::new([8.0, 0.0, 0.0], 1)).unwrap();
        assert_eq!(word(&w, id, [1, 1, 1]), solid_voxel(4));
    }

    #[test]
    fn malformed_batch_is_counted_and_rejected() {
        let mut w = world();
        let bad = EditRecord::new(BrickCoord::new(0, 0, 0), vec![Voxel::air(); 10]);
        assert!(matches!(w.apply_edits(&[bad]), Err(WorldError::Edits(_))));
        assert_eq!(w.metrics().edit_batches_rejected, 1);
        assert_eq!(w.edits().edit_count(0), 0);
    }

    #[test]
    fn destructive_edit_requests_analysis() {
        let mut w = world();
        let id = w.create_volume(VolumeSpec::new([0.0; 3], 1)).unwrap();
        w.set_ready(id, true).unwrap();
        let solid = brick_with_solid(&[[0, 0, 0], [0, 1, 0], [0, 2, 0]], 1);
        w.apply_edits(&[EditRecord::from_brick(BrickCoord::new(0, 0, 0), &solid)])
            .unwrap();
        assert!(!w.is_analyzing());

        let mut cut = solid.clone();
        cut[padded_index(1, 2, 1)] = Voxel::air();
        w.apply_edits(&[EditRecord::from_brick(BrickCoord::new(0, 0, 0), &cut)])
            .unwrap();
        assert!(w.is_analyzing());
        let reports = w.pump().unwrap();
        assert_eq!(reports.len(), 1);
        let positions: Vec<&[f32; 3]> = reports[0].positions().collect();
        assert_eq!(positions, vec![&[0.5, 2.5, 0.5]]);
    }

    #[test]
    fn busy_analyzer_drops_world_requests() {
        let mut w = world();
        let id = w.create_volume(VolumeSpec::new([0.0; 3], 1)).unwrap();
        w.set_ready(id, true).unwrap();
        assert!(w.analyze(None));
        assert!(!w.analyze(None));
        assert_eq!(w.metrics().analyses_dropped, 1);
        w.pump().unwrap();
        assert!(w.analyze(None));
    }

    #[test]
    fn save_and_load_round_trip() {
        let mut w = world();
        let id = w.create_volume(VolumeSpec::new([0.0; 3], 2)).unwrap();
        w.brick_data_mut(id).unwrap()[voxel_word_index(2, [5, 6, 7])] = solid_voxel(3).0;
        let mut bytes = Vec::new();
        w.save_volume(id, &mut bytes).unwrap();

        let copy = w.load_volume(&mut bytes.as_slice(), [20.0, 0.0, 0.0]).unwrap();
        assert!(w.volume(copy).unwrap().is_ready());
        assert_eq!(word(&w, copy, [5, 6, 7]), solid_voxel(3));
        let original = w.pool().brick_data(w.volume(id).unwrap().handle()).unwrap();
        let loaded = w.pool().brick_data(w.volume(copy).unwrap().handle()).unwrap();
        assert_eq!(original, loaded);
    }

    #[test]
    fn load_rejects_resolution_mismatch() {
        let mut w = world();
        let file = VolumeFile {
            resolution: 2,
            nodes: vec![],
            payloads: vec![],
            brick_data: vec![0; PADDED_BRICK_VOLUME],
        };
        let mut bytes = Vec::new();
        file.write_to(&mut bytes).unwrap();
        assert!(matches!(
            w.load_volume(&mut bytes.as_slice(), [0.0; 3]),
            Err(WorldError::InvalidVolume { .. })
        ));
        assert_eq!(w.pool().live_count(), 0);
    }

    #[test]
    fn unknown_volume_operations_fail() {
        let mut w = world();
        let ghost = VolumeId(99);
        assert!(matches!(w.set_ready(ghost, true), Err(WorldError::UnknownVolume(_))));
        assert!(matches!(w.set_active(ghost, true), Err(WorldError::UnknownVolume(_))));
        assert!(matches!(w.brick_data_mut(ghost), Err(WorldError::UnknownVolume(_))));
        assert!(matches!(
            w.save_volume(ghost, &mut Vec::new()),
            Err(WorldError::UnknownVolume(_))
        ));
    }

    #[test]
    fn write_voxel_clips_to_volume() {
        let mut data = vec![0u32; 8 * PADDED_BRICK_VOLUME];
        assert!(!write_voxel(&mut data, 2, [8, 0, 0], Voxel::air()));
        assert!(!write_voxel(&mut data, 2, [-1, 0, 0], Voxel::air()));
        assert!(write_voxel(&mut data, 2, [4, 0, 0], Voxel::air()));
        // Owner brick 1 slot (1,1,1) and brick 0's high padding (5,1,1).
        let air = Voxel::air().0;
        assert_eq!(data[PADDED_BRICK_VOLUME + padded_index(1, 1, 1)], air);
        assert_eq!(data[padded_index(5, 1, 1)], air);
        assert_eq!(data.iter().filter(|&&w| w == air).count(), 2);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        /// Copies of a voxel along one axis: the owner plus one padding
        /// slot if it sits on an interior brick boundary.
        fn copies_along(c: i32, resolution: i32) -> usize {
            let (brick, offset) = (c / BRICK_SIZE, c % BRICK_SIZE);
            let low = offset == 0 && brick > 0;
            let high = offset == BRICK_SIZE - 1 && brick < resolution - 1;
            1 + low as usize + high as usize
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                max_global_rejects: 8192,
                ..ProptestConfig::default()
            })]

            #[test]
            fn write_voxel_reaches_owner_and_interior_padding(
                resolution in 1u32..4,
                x in 0i32..16, y in 0i32..16, z in 0i32..16,
            ) {
                let r = resolution as i32;
                prop_assume!(x < r * BRICK_SIZE && y < r * BRICK_SIZE && z < r * BRICK_SIZE);
                let bricks = (resolution * resolution * resolution) as usize;
                let mut data = vec![0u32; bricks * PADDED_BRICK_VOLUME];
                let voxel = Voxel::pack(9, -1.0, [0.0, 1.0, 0.0]);
                prop_assert!(write_voxel(&mut data, resolution, [x, y, z], voxel));

                let owner = voxel_word_index(resolution, [x as u32, y as u32, z as u32]);
                prop_assert_eq!(data[owner], voxel.0);
                let expected = copies_along(x, r) * copies_along(y, r) * copies_along(z, r);
                prop_assert_eq!(data.iter().filter(|&&w| w == voxel.0).count(), expected);
            }
        }
    }
}
