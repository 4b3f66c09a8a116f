//! Brick-space geometry: coordinates, padding layout and bounding boxes.
//!
//! A brick is a 4³ block of logical voxels stored with one voxel of padding
//! on every face, so its payload is 6³ = 216 words. The padded slot of
//! logical voxel `(lx, ly, lz)` is `(lx + 1, ly + 1, lz + 1)`.

use std::fmt;

use crate::voxel::Voxel;

/// Logical voxels per brick edge.
pub const BRICK_SIZE: i32 = 4;

/// Padded voxels per brick edge (`BRICK_SIZE + 2`).
pub const PADDED_BRICK_SIZE: usize = 6;

/// Words per padded brick payload.
pub const PADDED_BRICK_VOLUME: usize = PADDED_BRICK_SIZE * PADDED_BRICK_SIZE * PADDED_BRICK_SIZE;

/// Bricks per meta-chunk edge (the coarse spatial-hash bucket).
pub const META_CHUNK_BRICKS: i32 = 64;

/// Maximum number of LOD levels the edit database keeps.
pub const MAX_LOD_LEVELS: usize = 6;

/// Largest brick coordinate magnitude the edit database accepts. Voxel and
/// downsampling arithmetic on addressable bricks stays inside `i32`.
pub const MAX_BRICK_COORD: i32 = 1 << 28;

/// One padded brick of voxel words.
pub type BrickPayload = [Voxel; PADDED_BRICK_VOLUME];

/// A fresh, fully passthrough brick payload.
pub fn passthrough_payload() -> Box<BrickPayload> {
    Box::new([Voxel::PASSTHROUGH; PADDED_BRICK_VOLUME])
}

/// Linear slot index of padded position `(x, y, z)`, x fastest.
#[inline]
pub fn padded_index(x: usize, y: usize, z: usize) -> usize {
    x + PADDED_BRICK_SIZE * (y + PADDED_BRICK_SIZE * z)
}

/// Floor division for a positive divisor.
#[inline]
pub fn floor_div(a: i32, b: i32) -> i32 {
    debug_assert!(b > 0, "floor_div requires a positive divisor");
    a.div_euclid(b)
}

/// Every `(brick, padded slot)` holding global voxel `v`: the owning
/// brick plus each neighbour whose padding ring duplicates it.
pub fn covering_slots(v: [i32; 3]) -> Vec<(BrickCoord, [usize; 3])> {
    let mut per_axis: [Vec<(i32, usize)>; 3] = Default::default();
    for axis in 0..3 {
        let brick = floor_div(v[axis], BRICK_SIZE);
        let local = v[axis].rem_euclid(BRICK_SIZE);
        per_axis[axis].push((brick, local as usize + 1));
        if local == 0 {
            per_axis[axis].push((brick - 1, BRICK_SIZE as usize + 1));
        }
        if local == BRICK_SIZE - 1 {
            per_axis[axis].push((brick + 1, 0));
        }
    }
    let mut out = Vec::with_capacity(8);
    for &(bz, sz) in &per_axis[2] {
        for &(by, sy) in &per_axis[1] {
            for &(bx, sx) in &per_axis[0] {
                out.push((BrickCoord::new(bx, by, bz), [sx, sy, sz]));
            }
        }
    }
    out
}

// ── BrickCoord ──────────────────────────────────────────────────

/// Integer brick coordinate at some LOD level.
///
/// At LOD `n` one brick spans `BRICK_SIZE * voxel_size * 2^n` world units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BrickCoord {
    /// X component.
    pub x: i32,
    /// Y component.
    pub y: i32,
    /// Z component.
    pub z: i32,
}

impl BrickCoord {
    /// Create a coordinate from components.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The brick one LOD level up that covers this one (`floor(c / 2)`).
    pub fn parent(self) -> Self {
        Self::new(floor_div(self.x, 2), floor_div(self.y, 2), floor_div(self.z, 2))
    }

    /// The meta-chunk bucket this brick hashes into.
    pub fn meta_chunk(self) -> MetaChunkCoord {
        MetaChunkCoord {
            x: floor_div(self.x, META_CHUNK_BRICKS),
            y: floor_div(self.y, META_CHUNK_BRICKS),
            z: floor_div(self.z, META_CHUNK_BRICKS),
        }
    }

    /// Components as an array.
    pub fn to_array(self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }

    /// Whether every component lies within `±MAX_BRICK_COORD`.
    pub fn is_addressable(self) -> bool {
        self.to_array()
            .iter()
            .all(|c| c.unsigned_abs() <= MAX_BRICK_COORD as u32)
    }
}

impl From<[i32; 3]> for BrickCoord {
    fn from(v: [i32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl fmt::Display for BrickCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Coordinate of a meta-chunk: `META_CHUNK_BRICKS`³ bricks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MetaChunkCoord {
    /// X component.
    pub x: i32,
    /// Y component.
    pub y: i32,
    /// Z component.
    pub z: i32,
}

// ── Aabb ────────────────────────────────────────────────────────

/// Axis-aligned bounding box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: [f32; 3],
    /// Maximum corner.
    pub max: [f32; 3],
}

impl Aabb {
    /// Create a box from two corners. The corners are reordered per axis.
    pub fn new(a: [f32; 3], b: [f32; 3]) -> Self {
        Self {
            min: [a[0].min(b[0]), a[1].min(b[1]), a[2].min(b[2])],
            max: [a[0].max(b[0]), a[1].max(b[1]), a[2].max(b[2])],
        }
    }

    /// A cube of edge `size` starting at `min`.
    pub fn cube(min: [f32; 3], size: f32) -> Self {
        Self::new(min, [min[0] + size, min[1] + size, min[2] + size])
    }

    /// Whether the boxes overlap. Touching faces count as overlap.
    pub fn intersects(&self, other: &Aabb) -> bool {
        (0..3).all(|i| self.min[i] <= other.max[i] && self.max[i] >= other.min[i])
    }

    /// Whether `p` lies inside the box (inclusive min, exclusive max).
    pub fn contains_point(&self, p: [f32; 3]) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] < self.max[i])
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: [
                self.min[0].min(other.min[0]),
                self.min[1].min(other.min[1]),
                self.min[2].min(other.min[2]),
            ],
            max: [
                self.max[0].max(other.max[0]),
                self.max[1].max(other.max[1]),
                self.max[2].max(other.max[2]),
            ],
        }
    }

    /// Box center.
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_volume_is_216() {
        assert_eq!(PADDED_BRICK_VOLUME, 216);
        assert_eq!(padded_index(5, 5, 5), 215);
        assert_eq!(padded_index(1, 0, 0), 1);
        assert_eq!(padded_index(0, 1, 0), 6);
        assert_eq!(padded_index(0, 0, 1), 36);
    }

    #[test]
    fn covering_slots_include_padding_duplicates() {
        // Interior voxel: only its owner.
        assert_eq!(
            covering_slots([1, 2, 1]),
            vec![(BrickCoord::new(0, 0, 0), [2, 3, 2])]
        );
        // On the low face in x: the left neighbour's high padding too.
        let slots = covering_slots([4, 1, 1]);
        assert_eq!(slots.len(), 2);
        assert!(slots.contains(&(BrickCoord::new(1, 0, 0), [1, 2, 2])));
        assert!(slots.contains(&(BrickCoord::new(0, 0, 0), [5, 2, 2])));
        // A corner voxel is duplicated into seven neighbours.
        assert_eq!(covering_slots([-1, -1, -1]).len(), 8);
    }

    #[test]
    fn parent_floors_negative_coordinates() {
        assert_eq!(BrickCoord::new(-1, 0, 1).parent(), BrickCoord::new(-1, 0, 0));
        assert_eq!(BrickCoord::new(-2, 3, -3).parent(), BrickCoord::new(-1, 1, -2));
    }

    #[test]
    fn addressable_range_is_symmetric() {
        let m = MAX_BRICK_COORD;
        assert!(BrickCoord::new(m, -m, 0).is_addressable());
        assert!(!BrickCoord::new(m + 1, 0, 0).is_addressable());
        assert!(!BrickCoord::new(0, -m - 1, 0).is_addressable());
        assert!(!BrickCoord::new(0, 0, i32::MIN).is_addressable());
        // The far corner voxel of the last brick still has room for padding.
        let v = BRICK_SIZE * m + BRICK_SIZE - 1;
        assert_eq!(covering_slots([v, v, v]).len(), 8);
    }

    #[test]
    fn meta_chunk_buckets() {
        assert_eq!(
            BrickCoord::new(63, 64, -1).meta_chunk(),
            MetaChunkCoord { x: 0, y: 1, z: -1 }
        );
    }

    #[test]
    fn aabb_touching_faces_intersect() {
        let a = Aabb::cube([0.0; 3], 1.0);
        let b = Aabb::cube([1.0, 0.0, 0.0], 1.0);
        let c = Aabb::cube([1.5, 0.0, 0.0], 1.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn aabb_new_reorders_corners() {
        let a = Aabb::new([1.0, -1.0, 2.0], [0.0, 1.0, 0.0]);
        assert_eq!(a.min, [0.0, -1.0, 0.0]);
        assert_eq!(a.max, [1.0, 1.0, 2.0]);
        assert_eq!(a.center(), [0.5, 0.0, 1.0]);
    }

    #[test]
    fn contains_point_is_half_open() {
        let a = Aabb::cube([0.0; 3], 1.0);
        assert!(a.contains_point([0.0, 0.5, 0.5]));
        assert!(!a.contains_point([1.0, 0.5, 0.5]));
    }

    #[test]
    fn passthrough_payload_is_all_passthrough() {
        assert!(passthrough_payload().iter().all(|v| v.is_passthrough()));
    }
}
