//! The edit database: per-LOD spatially hashed brick payloads.

use indexmap::{IndexMap, IndexSet};
use strata_core::{
    covering_slots, floor_div, padded_index, passthrough_payload, Aabb, BrickCoord, BrickPayload,
    MetaChunkCoord, Voxel, BRICK_SIZE, META_CHUNK_BRICKS, PADDED_BRICK_VOLUME,
};

use crate::config::EditConfig;
use crate::error::EditError;
use crate::lod::{covering_parents, downsample};

// ── Records ─────────────────────────────────────────────────────

/// One submitted edit: a LOD-0 brick coordinate and its padded payload.
///
/// The payload length is checked at registration, not construction, so a
/// malformed record is representable and rejected with a typed error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditRecord {
    /// LOD-0 brick coordinate.
    pub coord: BrickCoord,
    /// Padded brick payload; must be 216 words.
    pub payload: Box<[Voxel]>,
}

impl EditRecord {
    /// Build a record from a coordinate and any payload container.
    pub fn new(coord: BrickCoord, payload: impl Into<Box<[Voxel]>>) -> Self {
        Self {
            coord,
            payload: payload.into(),
        }
    }

    /// Build a record from a well-formed brick payload.
    pub fn from_brick(coord: BrickCoord, payload: &BrickPayload) -> Self {
        Self::new(coord, payload.to_vec())
    }
}

/// A stored entry returned by [`EditDatabase::get_edits`].
#[derive(Clone, Copy, Debug)]
pub struct EditRef<'a> {
    /// Brick coordinate at the queried LOD.
    pub coord: BrickCoord,
    /// The stored payload.
    pub payload: &'a BrickPayload,
}

/// What one registration call changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EditSummary {
    /// Records applied at LOD 0.
    pub records: usize,
    /// LOD-0 bricks whose stored payload actually changed.
    pub changed: usize,
    /// Coarser bricks recomputed.
    pub recomputed: usize,
    /// Coarser bricks created.
    pub created: usize,
    /// Coarser bricks rewritten in place.
    pub rewritten: usize,
    /// Coarser bricks deleted because they lost all data.
    pub deleted: usize,
}

// ── Storage ─────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Change {
    Unchanged,
    Created,
    Rewritten,
    Deleted,
}

type Bucket = IndexMap<BrickCoord, Box<BrickPayload>>;

/// One LOD level: meta-chunk buckets of exact brick entries.
#[derive(Default)]
struct Level {
    buckets: IndexMap<MetaChunkCoord, Bucket>,
    len: usize,
}

impl Level {
    fn get(&self, coord: BrickCoord) -> Option<&BrickPayload> {
        self.buckets
            .get(&coord.meta_chunk())
            .and_then(|b| b.get(&coord))
            .map(|p| &**p)
    }

    /// Store or delete `coord`, reporting whether the state changed.
    fn set(&mut self, coord: BrickCoord, payload: Option<Box<BrickPayload>>) -> Change {
        let key = coord.meta_chunk();
        match payload {
            Some(payload) => {
                let bucket = self.buckets.entry(key).or_default();
                match bucket.get_mut(&coord) {
                    Some(existing) if **existing == *payload => Change::Unchanged,
                    Some(existing) => {
                        *existing = payload;
                        Change::Rewritten
                    }
                    None => {
                        bucket.insert(coord, payload);
                        self.len += 1;
                        Change::Created
                    }
                }
            }
            None => {
                let Some(bucket) = self.buckets.get_mut(&key) else {
                    return Change::Unchanged;
                };
                if bucket.swap_remove(&coord).is_none() {
                    return Change::Unchanged;
                }
                self.len -= 1;
                if bucket.is_empty() {
                    self.buckets.swap_remove(&key);
                }
                Change::Deleted
            }
        }
    }

    fn clear(&mut self) {
        self.buckets.clear();
        self.len = 0;
    }
}

// ── EditDatabase ────────────────────────────────────────────────

/// Persistent voxel edits across all LOD levels.
///
/// Registration is synchronous: when [`register_edits`](Self::register_edits)
/// returns, every coarser level already reflects the batch. Coarser bricks
/// are only ever derived, never submitted directly.
pub struct EditDatabase {
    config: EditConfig,
    levels: Vec<Level>,
}

impl EditDatabase {
    /// Create an empty database.
    pub fn new(config: EditConfig) -> Result<Self, EditError> {
        config.validate()?;
        let levels = (0..config.max_lod_levels).map(|_| Level::default()).collect();
        Ok(Self { config, levels })
    }

    /// The database configuration.
    pub fn config(&self) -> &EditConfig {
        &self.config
    }

    /// LOD-0 voxel size in world units.
    pub fn voxel_size(&self) -> f32 {
        self.config.voxel_size
    }

    /// Number of stored LOD levels.
    pub fn lod_levels(&self) -> usize {
        self.levels.len()
    }

    /// Apply a batch of LOD-0 edits and propagate them to every level.
    ///
    /// The batch is validated up front: if any payload is not exactly 216
    /// words, or any coordinate is not addressable, nothing is applied.
    /// Records apply in order, so a later record for the same brick wins.
    ///
    /// Propagation is breadth-first, one level at a time. Each changed
    /// brick dirties its parent `floor(c / 2)`, which is recomputed and
    /// exists only while one of its eight children has data. Existing
    /// neighbour parents that sample the changed brick into their padding
    /// ring are refreshed in place; they are never created or deleted here.
    pub fn register_edits(&mut self, batch: &[EditRecord]) -> Result<EditSummary, EditError> {
        Self::validate(batch)?;

        let mut summary = EditSummary {
            records: batch.len(),
            ..EditSummary::default()
        };
        let mut changed: IndexSet<BrickCoord> = IndexSet::new();
        for record in batch {
            let mut payload = passthrough_payload();
            payload.copy_from_slice(&record.payload);
            if self.levels[0].set(record.coord, Some(payload)) != Change::Unchanged {
                summary.changed += 1;
                changed.insert(record.coord);
            }
        }

        for lod in 1..self.levels.len() {
            if changed.is_empty() {
                break;
            }
            let dirty: IndexSet<BrickCoord> = changed.iter().map(|c| c.parent()).collect();
            let neighbours: IndexSet<BrickCoord> = changed
                .iter()
                .flat_map(|&c| covering_parents(c))
                .filter(|p| !dirty.contains(p) && self.levels[lod].get(*p).is_some())
                .collect();

            let mut next: IndexSet<BrickCoord> = IndexSet::new();
            for &parent in &dirty {
                let below = &self.levels[lod - 1];
                let computed = downsample(parent, |c| below.get(c));
                summary.recomputed += 1;
                match self.levels[lod].set(parent, computed) {
                    Change::Unchanged => continue,
                    Change::Created => summary.created += 1,
                    Change::Rewritten => summary.rewritten += 1,
                    Change::Deleted => summary.deleted += 1,
                }
                next.insert(parent);
            }
            // Padding is not sampled by the level above, so refreshed
            // neighbours do not dirty anything further up.
            for &parent in &neighbours {
                let below = &self.levels[lod - 1];
                let Some(computed) = downsample(parent, |c| below.get(c)) else {
                    continue;
                };
                summary.recomputed += 1;
                if self.levels[lod].set(parent, Some(computed)) == Change::Rewritten {
                    summary.rewritten += 1;
                }
            }
            log::trace!(
                "LOD {lod}: recomputed {} parents and {} neighbours, {} dirty above",
                dirty.len(),
                neighbours.len(),
                next.len()
            );
            changed = next;
        }

        log::debug!(
            "registered {} edits ({} changed): +{} ~{} -{} coarser bricks",
            summary.records,
            summary.changed,
            summary.created,
            summary.rewritten,
            summary.deleted
        );
        Ok(summary)
    }

    /// Register a single edit. Same semantics as a batch of one.
    pub fn register_edit(
        &mut self,
        coord: BrickCoord,
        payload: &[Voxel],
    ) -> Result<EditSummary, EditError> {
        self.register_edits(&[EditRecord::new(coord, payload.to_vec())])
    }

    /// Collect every entry at `lod` whose brick bounds touch `bounds`.
    ///
    /// `out` is cleared and reused so steady-state queries do not allocate.
    /// Only meta-chunks overlapping the query are visited; when the query
    /// spans more meta-chunks than are stored, the stored buckets are
    /// scanned instead.
    pub fn get_edits<'a>(
        &'a self,
        bounds: &Aabb,
        lod: usize,
        out: &mut Vec<EditRef<'a>>,
    ) -> Result<usize, EditError> {
        out.clear();
        let level = self.level(lod)?;
        if level.len == 0 {
            return Ok(0);
        }

        let size = self.config.brick_world_size(lod);
        let origin = self.config.world_origin;
        let mut lo = [0i64; 3];
        let mut hi = [0i64; 3];
        for axis in 0..3 {
            // A brick touches the query when b*size <= max and (b+1)*size >= min.
            let min = ((bounds.min[axis] - origin[axis]) / size).ceil() as i64 - 1;
            let max = ((bounds.max[axis] - origin[axis]) / size).floor() as i64;
            lo[axis] = min.div_euclid(META_CHUNK_BRICKS as i64);
            hi[axis] = max.div_euclid(META_CHUNK_BRICKS as i64);
            if hi[axis] < lo[axis] {
                return Ok(0);
            }
        }
        let span = (0..3).fold(1u128, |acc, a| acc.saturating_mul((hi[a] - lo[a] + 1) as u128));
        let addressable = (0..3).all(|a| lo[a] >= i32::MIN as i64 && hi[a] <= i32::MAX as i64);

        let mut push_bucket = |bucket: &'a Bucket| {
            for (&coord, payload) in bucket {
                if self.brick_bounds(coord, lod).intersects(bounds) {
                    out.push(EditRef {
                        coord,
                        payload: &**payload,
                    });
                }
            }
        };

        if !addressable || span > level.buckets.len() as u128 {
            for (key, bucket) in &level.buckets {
                let k = [key.x as i64, key.y as i64, key.z as i64];
                if (0..3).all(|a| k[a] >= lo[a] && k[a] <= hi[a]) {
                    push_bucket(bucket);
                }
            }
        } else {
            for z in lo[2]..=hi[2] {
                for y in lo[1]..=hi[1] {
                    for x in lo[0]..=hi[0] {
                        let key = MetaChunkCoord {
                            x: x as i32,
                            y: y as i32,
                            z: z as i32,
                        };
                        if let Some(bucket) = level.buckets.get(&key) {
                            push_bucket(bucket);
                        }
                    }
                }
            }
        }
        Ok(out.len())
    }

    /// Whether a LOD-0 edit exists at `coord`.
    pub fn has_edit(&self, coord: BrickCoord) -> bool {
        self.levels[0].get(coord).is_some()
    }

    /// Whether an entry exists at `coord` on `lod`. Out-of-range levels
    /// hold nothing.
    pub fn has_edit_at(&self, coord: BrickCoord, lod: usize) -> bool {
        self.get(coord, lod).is_some()
    }

    /// The stored payload at `coord` on `lod`.
    pub fn get(&self, coord: BrickCoord, lod: usize) -> Option<&BrickPayload> {
        self.levels.get(lod).and_then(|l| l.get(coord))
    }

    /// Number of entries stored at `lod`.
    pub fn edit_count(&self, lod: usize) -> usize {
        self.levels.get(lod).map_or(0, |l| l.len)
    }

    /// Number of non-empty meta-chunk buckets at `lod`.
    pub fn bucket_count(&self, lod: usize) -> usize {
        self.levels.get(lod).map_or(0, |l| l.buckets.len())
    }

    /// Drop every entry on every level.
    pub fn clear(&mut self) {
        for level in &mut self.levels {
            level.clear();
        }
        log::debug!("edit database cleared");
    }

    /// LOD-0 brick containing world position `pos`.
    pub fn brick_coordinate(&self, pos: [f32; 3]) -> BrickCoord {
        self.brick_coordinate_at(pos, 0)
    }

    /// Brick containing world position `pos` at `lod`.
    pub fn brick_coordinate_at(&self, pos: [f32; 3], lod: usize) -> BrickCoord {
        let size = self.config.brick_world_size(lod);
        let o = self.config.world_origin;
        BrickCoord::new(
            ((pos[0] - o[0]) / size).floor() as i32,
            ((pos[1] - o[1]) / size).floor() as i32,
            ((pos[2] - o[2]) / size).floor() as i32,
        )
    }

    /// World bounds of brick `coord` at `lod`, padding excluded.
    pub fn brick_bounds(&self, coord: BrickCoord, lod: usize) -> Aabb {
        let size = self.config.brick_world_size(lod);
        let o = self.config.world_origin;
        Aabb::cube(
            [
                o[0] + coord.x as f32 * size,
                o[1] + coord.y as f32 * size,
                o[2] + coord.z as f32 * size,
            ],
            size,
        )
    }

    /// Turn the LOD-0 voxels at the given world positions into air.
    ///
    /// Every brick whose padded slots cover a position is rewritten, so
    /// neighbours' padding stays consistent with the owning brick. Bricks
    /// without an edit start from all-passthrough. The rewritten bricks go
    /// through [`register_edits`](Self::register_edits).
    pub fn carve(&mut self, positions: &[[f32; 3]]) -> Result<EditSummary, EditError> {
        let mut bricks: IndexMap<BrickCoord, Box<BrickPayload>> = IndexMap::new();
        let vs = self.config.voxel_size;
        let o = self.config.world_origin;
        for (index, p) in positions.iter().enumerate() {
            let v = [
                ((p[0] - o[0]) / vs).floor() as i32,
                ((p[1] - o[1]) / vs).floor() as i32,
                ((p[2] - o[2]) / vs).floor() as i32,
            ];
            let owner = BrickCoord::new(
                floor_div(v[0], BRICK_SIZE),
                floor_div(v[1], BRICK_SIZE),
                floor_div(v[2], BRICK_SIZE),
            );
            if !owner.is_addressable() {
                let error = EditError::CoordinateOutOfRange {
                    index,
                    coord: owner,
                };
                log::warn!("rejecting carve of {} voxels: {error}", positions.len());
                return Err(error);
            }
            for (coord, slot) in covering_slots(v) {
                let payload = bricks.entry(coord).or_insert_with(|| {
                    self.levels[0]
                        .get(coord)
                        .map_or_else(passthrough_payload, |p| Box::new(*p))
                });
                payload[padded_index(slot[0], slot[1], slot[2])] = Voxel::air();
            }
        }
        let batch: Vec<EditRecord> = bricks
            .iter()
            .map(|(&coord, payload)| EditRecord::from_brick(coord, payload))
            .collect();
        log::debug!(
            "carving {} voxels across {} bricks",
            positions.len(),
            batch.len()
        );
        self.register_edits(&batch)
    }

    fn validate(batch: &[EditRecord]) -> Result<(), EditError> {
        for (index, record) in batch.iter().enumerate() {
            let error = if record.payload.len() != PADDED_BRICK_VOLUME {
                EditError::PayloadLength {
                    index,
                    len: record.payload.len(),
                }
            } else if !record.coord.is_addressable() {
                EditError::CoordinateOutOfRange {
                    index,
                    coord: record.coord,
                }
            } else {
                continue;
            };
            log::warn!("rejecting edit batch of {}: {error}", batch.len());
            return Err(error);
        }
        Ok(())
    }

    fn level(&self, lod: usize) -> Result<&Level, EditError> {
        self.levels.get(lod).ok_or(EditError::LodOutOfRange {
            lod,
            levels: self.levels.len(),
        })
    }
}
