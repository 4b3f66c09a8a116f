//! 2× brick downsampling between adjacent LOD levels.
//!
//! Parent and child bricks are related through global logical voxel
//! coordinates. Padded slot `s` of parent brick `P` is parent voxel
//! `g = 4P + s - 1`; it covers child voxels `2g` and `2g + 1` on each axis,
//! and child voxel `c` lives in child brick `floor(c / 4)` at padded slot
//! `c mod 4 + 1`. A parent therefore reads from the 4³ block of child
//! bricks `2P - 1 ..= 2P + 2`: its eight children `2P ..= 2P + 1` fill the
//! logical interior and the neighbours' edges fill the padding ring.
//! Whether a parent exists depends on the interior alone.

use smallvec::SmallVec;
use strata_core::voxel::normalize;
use strata_core::{
    floor_div, padded_index, passthrough_payload, BrickCoord, BrickPayload, Voxel, BRICK_SIZE,
    PADDED_BRICK_SIZE,
};

/// Child bricks per axis that one parent reads from.
const WINDOW: usize = 4;

/// Reduce up to eight child samples to one parent voxel.
///
/// Passthrough samples are ignored. The result carries the mean distance,
/// the normalized mean normal (`+Y` when the normals cancel) and the most
/// frequent material, ties going to the material seen first. Returns
/// [`Voxel::PASSTHROUGH`] if every sample is passthrough.
pub fn aggregate(samples: &[Voxel]) -> Voxel {
    let mut count = 0u32;
    let mut sdf_sum = 0.0f32;
    let mut normal_sum = [0.0f32; 3];
    let mut materials: SmallVec<[(u8, u32); 8]> = SmallVec::new();

    for &v in samples.iter().filter(|v| !v.is_passthrough()) {
        let (material, sdf, n) = v.unpack();
        count += 1;
        sdf_sum += sdf;
        for (sum, c) in normal_sum.iter_mut().zip(n) {
            *sum += c;
        }
        match materials.iter_mut().find(|(m, _)| *m == material) {
            Some((_, hits)) => *hits += 1,
            None => materials.push((material, 1)),
        }
    }

    if count == 0 {
        return Voxel::PASSTHROUGH;
    }

    let mut mode = materials[0];
    for &entry in &materials[1..] {
        if entry.1 > mode.1 {
            mode = entry;
        }
    }
    Voxel::pack(mode.0, sdf_sum / count as f32, normalize(normal_sum))
}

/// Recompute parent brick `parent` from its children.
///
/// `child` looks up a child brick at the level below; missing bricks read
/// as passthrough. Returns `None` when every logical slot is passthrough,
/// in which case the parent must not be stored even if its padding ring
/// picked up data from a neighbour.
pub fn downsample<'a, F>(parent: BrickCoord, child: F) -> Option<Box<BrickPayload>>
where
    F: Fn(BrickCoord) -> Option<&'a BrickPayload>,
{
    let base = [2 * parent.x - 1, 2 * parent.y - 1, 2 * parent.z - 1];
    let mut window: [Option<&'a BrickPayload>; WINDOW * WINDOW * WINDOW] =
        [None; WINDOW * WINDOW * WINDOW];
    for wz in 0..WINDOW {
        for wy in 0..WINDOW {
            for wx in 0..WINDOW {
                window[wx + WINDOW * (wy + WINDOW * wz)] = child(BrickCoord::new(
                    base[0] + wx as i32,
                    base[1] + wy as i32,
                    base[2] + wz as i32,
                ));
            }
        }
    }
    if window.iter().all(Option::is_none) {
        return None;
    }

    let origin = [
        BRICK_SIZE * parent.x - 1,
        BRICK_SIZE * parent.y - 1,
        BRICK_SIZE * parent.z - 1,
    ];
    let sample = |c: [i32; 3]| -> Voxel {
        let brick = [
            floor_div(c[0], BRICK_SIZE),
            floor_div(c[1], BRICK_SIZE),
            floor_div(c[2], BRICK_SIZE),
        ];
        let w = [
            (brick[0] - base[0]) as usize,
            (brick[1] - base[1]) as usize,
            (brick[2] - base[2]) as usize,
        ];
        match window[w[0] + WINDOW * (w[1] + WINDOW * w[2])] {
            Some(payload) => {
                payload[padded_index(
                    c[0].rem_euclid(BRICK_SIZE) as usize + 1,
                    c[1].rem_euclid(BRICK_SIZE) as usize + 1,
                    c[2].rem_euclid(BRICK_SIZE) as usize + 1,
                )]
            }
            None => Voxel::PASSTHROUGH,
        }
    };

    let mut out = passthrough_payload();
    let mut any = false;
    let mut samples = [Voxel::PASSTHROUGH; 8];
    for sz in 0..PADDED_BRICK_SIZE {
        for sy in 0..PADDED_BRICK_SIZE {
            for sx in 0..PADDED_BRICK_SIZE {
                let g = [
                    origin[0] + sx as i32,
                    origin[1] + sy as i32,
                    origin[2] + sz as i32,
                ];
                let mut i = 0;
                for dz in 0..2 {
                    for dy in 0..2 {
                        for dx in 0..2 {
                            samples[i] = sample([2 * g[0] + dx, 2 * g[1] + dy, 2 * g[2] + dz]);
                            i += 1;
                        }
                    }
                }
                let v = aggregate(&samples);
                let interior = [sx, sy, sz].iter().all(|s| (1..=4).contains(s));
                if interior && !v.is_passthrough() {
                    any = true;
                }
                out[padded_index(sx, sy, sz)] = v;
            }
        }
    }
    any.then_some(out)
}

/// Every parent whose downsampling window includes `child`.
///
/// Two parents per axis: `child` feeds the logical interior of its own
/// parent and the padding ring of that parent's neighbour.
pub fn covering_parents(child: BrickCoord) -> impl Iterator<Item = BrickCoord> {
    let lo = [
        floor_div(child.x - 1, 2),
        floor_div(child.y - 1, 2),
        floor_div(child.z - 1, 2),
    ];
    (0..8).map(move |i| BrickCoord::new(lo[0] + (i & 1), lo[1] + ((i >> 1) & 1), lo[2] + (i >> 2)))
}
