//! The sequential, cross-volume analysis state machine.
//!
//! [`StructuralAnalyzer`] owns a [`LabelingDevice`] and a FIFO of volumes.
//! At most one volume is in flight; its stage advances only when the
//! readback it is waiting for arrives on the readback channel and
//! [`pump`](StructuralAnalyzer::pump) is called.

use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender};
use indexmap::IndexMap;
use strata_arena::{VolumeMemoryHandle, VolumePool};
use strata_core::{Aabb, VolumeId, BRICK_SIZE};

use crate::config::AnalyzerConfig;
use crate::device::{
    DebrisVoxel, DispatchParams, GroundSeed, LabelingDevice, Readback, ReadbackData,
    ReadbackRequest,
};
use crate::error::{AnalysisError, DeviceError};

// ── Public types ────────────────────────────────────────────────

/// A volume offered for analysis.
#[derive(Clone, Debug)]
pub struct AnalysisTarget {
    /// Volume identifier.
    pub id: VolumeId,
    /// The volume's arena handle.
    pub handle: VolumeMemoryHandle,
    /// World position of the volume's minimum corner.
    pub origin: [f32; 3],
    /// Bricks per axis.
    pub resolution: u32,
    /// World size of one voxel.
    pub voxel_size: f32,
    /// Inactive volumes are never analyzed.
    pub active: bool,
    /// Volumes still generating are neither analyzed nor used as support.
    pub ready: bool,
}

impl AnalysisTarget {
    /// World bounds of the volume.
    pub fn bounds(&self) -> Aabb {
        let extent = (self.resolution * BRICK_SIZE as u32) as f32 * self.voxel_size;
        Aabb::cube(self.origin, extent)
    }

    fn dispatch_params(&self) -> DispatchParams {
        DispatchParams {
            volume: self.id,
            page_table_offset: self.handle.page_table_offset(),
            brick_data_offset: self.handle.brick_data_offset(),
            resolution: self.resolution,
            min_brick: 0,
            max_brick: self.resolution * self.resolution * self.resolution,
            origin: self.origin,
            voxel_size: self.voxel_size,
        }
    }
}

/// The islands found in one volume.
#[derive(Clone, Debug, PartialEq)]
pub struct IslandReport {
    /// The analyzed volume.
    pub volume: VolumeId,
    /// Component label → world positions of its voxel centers, in the
    /// order labels were first seen.
    pub islands: IndexMap<u32, Vec<[f32; 3]>>,
}

impl IslandReport {
    /// Every debris position across all islands.
    pub fn positions(&self) -> impl Iterator<Item = &[f32; 3]> {
        self.islands.values().flatten()
    }
}

/// Cumulative analyzer counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnalysisStats {
    /// Accepted `analyze_world` requests.
    pub runs_started: u64,
    /// Requests dropped because a run was already active.
    pub requests_dropped: u64,
    /// Volumes taken through the whole pipeline.
    pub volumes_analyzed: u64,
    /// Volumes skipped because they had no solid bricks.
    pub volumes_empty: u64,
    /// Volumes aborted by a device error or a released handle.
    pub volumes_failed: u64,
    /// Volumes whose relaxation hit the iteration cap.
    pub truncations: u64,
    /// Relaxation dispatches issued.
    pub dispatches: u64,
    /// Islands reported.
    pub islands_reported: u64,
}

// ── State ───────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Topology,
    Relaxing,
    DebrisCount,
    DebrisList,
}

impl Stage {
    fn awaits(self) -> ReadbackRequest {
        match self {
            Self::Topology => ReadbackRequest::ActiveBrickCount,
            Self::Relaxing => ReadbackRequest::ChangeFlag,
            Self::DebrisCount => ReadbackRequest::DebrisCount,
            Self::DebrisList => ReadbackRequest::DebrisList,
        }
    }
}

struct InFlight {
    target: AnalysisTarget,
    params: DispatchParams,
    stage: Stage,
    iterations: u32,
}

enum Next {
    Wait(Stage),
    Done,
}

// ── StructuralAnalyzer ──────────────────────────────────────────

/// Drives a [`LabelingDevice`] across a queue of volumes.
pub struct StructuralAnalyzer<D> {
    config: AnalyzerConfig,
    device: D,
    readback_tx: Sender<Readback>,
    readback_rx: Receiver<Readback>,
    report_tx: Sender<IslandReport>,
    report_rx: Receiver<IslandReport>,
    queue: VecDeque<AnalysisTarget>,
    /// Every target of the current run, for support lookups.
    neighbours: Vec<AnalysisTarget>,
    current: Option<InFlight>,
    stats: AnalysisStats,
}

impl<D: LabelingDevice> StructuralAnalyzer<D> {
    /// Create an idle analyzer.
    pub fn new(config: AnalyzerConfig, device: D) -> Result<Self, AnalysisError> {
        config.validate()?;
        let (readback_tx, readback_rx) = crossbeam_channel::unbounded();
        let (report_tx, report_rx) = crossbeam_channel::unbounded();
        Ok(Self {
            config,
            device,
            readback_tx,
            readback_rx,
            report_tx,
            report_rx,
            queue: VecDeque::new(),
            neighbours: Vec::new(),
            current: None,
            stats: AnalysisStats::default(),
        })
    }

    /// Queue every active, ready target (optionally only those touching
    /// `bounds`) for analysis.
    ///
    /// Returns `false` and does nothing if a run is already in progress;
    /// the caller retries after the current run completes.
    pub fn analyze_world(&mut self, targets: &[AnalysisTarget], bounds: Option<&Aabb>) -> bool {
        if self.is_analyzing() {
            self.stats.requests_dropped += 1;
            log::debug!("analysis already running; request dropped");
            return false;
        }
        self.queue.extend(
            targets
                .iter()
                .filter(|t| t.active && t.ready)
                .filter(|t| bounds.is_none_or(|b| t.bounds().intersects(b)))
                .cloned(),
        );
        self.neighbours = targets.to_vec();
        self.stats.runs_started += 1;
        log::debug!("analysis queued {} of {} volumes", self.queue.len(), targets.len());
        true
    }

    /// Process every readback that has arrived and start queued volumes.
    ///
    /// Never blocks. Returns whether a run is still in progress.
    pub fn pump(&mut self, pool: &VolumePool) -> bool {
        loop {
            if self.current.is_none() && !self.queue.is_empty() {
                self.begin_next(pool);
                continue;
            }
            match self.readback_rx.try_recv() {
                Ok(readback) => self.on_readback(pool, readback),
                Err(_) => break,
            }
        }
        if !self.is_analyzing() {
            self.neighbours.clear();
        }
        self.is_analyzing()
    }

    /// Whether a run is in progress.
    pub fn is_analyzing(&self) -> bool {
        self.current.is_some() || !self.queue.is_empty()
    }

    /// The volume currently in flight.
    pub fn current_volume(&self) -> Option<VolumeId> {
        self.current.as_ref().map(|c| c.target.id)
    }

    /// Volumes waiting behind the current one.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Completion channel: one [`IslandReport`] per volume with debris.
    pub fn reports(&self) -> &Receiver<IslandReport> {
        &self.report_rx
    }

    /// Cumulative counters.
    pub fn stats(&self) -> &AnalysisStats {
        &self.stats
    }

    /// The analyzer configuration.
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// The labeling device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The labeling device, mutably.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    fn begin_next(&mut self, pool: &VolumePool) {
        let Some(target) = self.queue.pop_front() else {
            return;
        };
        let params = target.dispatch_params();
        let started = self.check_live(pool, &target).and_then(|()| {
            self.device.build_topology(&params, pool.buffers())?;
            self.device.read_back(
                target.id,
                ReadbackRequest::ActiveBrickCount,
                self.readback_tx.clone(),
            )
        });
        match started {
            Ok(()) => {
                log::debug!("analyzing volume {}", target.id);
                self.current = Some(InFlight {
                    target,
                    params,
                    stage: Stage::Topology,
                    iterations: 0,
                });
            }
            Err(e) => self.abort(target.id, e),
        }
    }

    fn on_readback(&mut self, pool: &VolumePool, readback: Readback) {
        let awaited = self.current.as_ref().is_some_and(|c| {
            c.target.id == readback.volume && c.stage.awaits() == readback.request
        });
        if !awaited {
            log::debug!(
                "ignoring stray {:?} readback for volume {}",
                readback.request,
                readback.volume
            );
            return;
        }
        let Some(mut current) = self.current.take() else {
            return;
        };

        let next = readback
            .result
            .and_then(|data| self.check_live(pool, &current.target).map(|()| data))
            .and_then(|data| self.advance(pool, &mut current, data));
        match next {
            Ok(Next::Wait(stage)) => {
                current.stage = stage;
                self.current = Some(current);
            }
            Ok(Next::Done) => {
                self.device.release_scratch();
                self.stats.volumes_analyzed += 1;
                log::debug!("volume {} analyzed", current.target.id);
            }
            Err(e) => self.abort(current.target.id, e),
        }
    }

    fn advance(
        &mut self,
        pool: &VolumePool,
        current: &mut InFlight,
        data: ReadbackData,
    ) -> Result<Next, DeviceError> {
        let id = current.target.id;
        match (current.stage, data) {
            (Stage::Topology, ReadbackData::Count(0)) => {
                self.stats.volumes_empty += 1;
                log::debug!("volume {id} has no solid bricks");
                Ok(Next::Done)
            }
            (Stage::Topology, ReadbackData::Count(_)) => {
                let seed = GroundSeed {
                    ground_y: self.config.ground_y,
                    support: self.find_support(pool, &current.target),
                };
                self.device.init_labels(&current.params, &seed, pool.buffers())?;
                self.relax(current)
            }
            (Stage::Relaxing, ReadbackData::Flag(changed)) => {
                if changed && current.iterations < self.config.max_iterations {
                    return self.relax(current);
                }
                if changed {
                    self.stats.truncations += 1;
                    log::warn!(
                        "volume {id}: labels still changing after {} iterations; debris may be incomplete",
                        current.iterations
                    );
                }
                self.device.collect_debris(&current.params)?;
                self.device
                    .read_back(id, ReadbackRequest::DebrisCount, self.readback_tx.clone())?;
                Ok(Next::Wait(Stage::DebrisCount))
            }
            (Stage::DebrisCount, ReadbackData::Count(0)) => Ok(Next::Done),
            (Stage::DebrisCount, ReadbackData::Count(_)) => {
                self.device
                    .read_back(id, ReadbackRequest::DebrisList, self.readback_tx.clone())?;
                Ok(Next::Wait(Stage::DebrisList))
            }
            (Stage::DebrisList, ReadbackData::Debris(list)) => {
                let report = group_islands(&current.target, &list);
                if !report.islands.is_empty() {
                    self.stats.islands_reported += report.islands.len() as u64;
                    log::debug!("volume {id}: {} islands", report.islands.len());
                    // The receiver lives in `self`; the send cannot fail.
                    let _ = self.report_tx.send(report);
                }
                Ok(Next::Done)
            }
            (stage, _) => Err(DeviceError::UnexpectedReadback {
                expected: stage.awaits(),
            }),
        }
    }

    /// Issue one relaxation batch and ask for the change flag.
    fn relax(&mut self, current: &mut InFlight) -> Result<Next, DeviceError> {
        let remaining = self.config.max_iterations - current.iterations;
        let batch = self.config.dispatches_per_batch.min(remaining);
        self.device.propagate_labels(&current.params, batch)?;
        current.iterations += batch;
        self.stats.dispatches += batch as u64;
        self.device.read_back(
            current.target.id,
            ReadbackRequest::ChangeFlag,
            self.readback_tx.clone(),
        )?;
        Ok(Next::Wait(Stage::Relaxing))
    }

    /// The ready, live volume containing the point just below `target`'s
    /// bottom-face center.
    fn find_support(&self, pool: &VolumePool, target: &AnalysisTarget) -> Option<DispatchParams> {
        let bounds = target.bounds();
        let center = bounds.center();
        let probe = [center[0], bounds.min[1] - 0.5 * target.voxel_size, center[2]];
        self.neighbours
            .iter()
            .filter(|n| n.id != target.id && n.ready && pool.contains(&n.handle))
            .find(|n| n.bounds().contains_point(probe))
            .map(AnalysisTarget::dispatch_params)
    }

    fn check_live(&self, pool: &VolumePool, target: &AnalysisTarget) -> Result<(), DeviceError> {
        if pool.contains(&target.handle) {
            Ok(())
        } else {
            Err(DeviceError::VolumeReleased { volume: target.id })
        }
    }

    fn abort(&mut self, volume: VolumeId, error: DeviceError) {
        self.device.release_scratch();
        self.stats.volumes_failed += 1;
        log::warn!("analysis of volume {volume} aborted: {error}");
    }
}

/// Group debris by label in first-seen order, converting voxel indices to
/// world-space voxel centers.
fn group_islands(target: &AnalysisTarget, debris: &[DebrisVoxel]) -> IslandReport {
    let mut islands: IndexMap<u32, Vec<[f32; 3]>> = IndexMap::new();
    for d in debris {
        let world = [
            target.origin[0] + (d.position[0] + 0.5) * target.voxel_size,
            target.origin[1] + (d.position[1] + 0.5) * target.voxel_size,
            target.origin[2] + (d.position[2] + 0.5) * target.voxel_size,
        ];
        islands.entry(d.label).or_default().push(world);
    }
    IslandReport {
        volume: target.id,
        islands,
    }
}
