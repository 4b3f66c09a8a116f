//! The packed 32-bit voxel word.
//!
//! Every component exchanges voxels as a single `u32`:
//!
//! ```text
//!  31      24 23      16 15       8 7        0
//! ┌──────────┬──────────┬──────────┬──────────┐
//! │ material │   sdf    │  oct.x   │  oct.y   │
//! └──────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! - **material**: 8-bit id. `255` is [`PASSTHROUGH_MATERIAL`], meaning "no
//!   data here; defer to procedural generation".
//! - **sdf**: signed distance clamped to `[-SDF_RANGE, SDF_RANGE]`,
//!   normalized to `[0, 1]` and quantized round-to-nearest to 8 bits.
//! - **oct.x / oct.y**: the surface normal, octahedral-mapped into `[-1, 1]²`
//!   and quantized round-to-nearest to 8 bits per component.
//!
//! Quantization error bounds: the decoded distance is within half a step
//! (`SDF_RANGE / 255`) of the clamped input; the decoded normal is within
//! the octahedral quantization error of the normalized input.

/// Signed distances are clamped to `[-SDF_RANGE, SDF_RANGE]` world units.
pub const SDF_RANGE: f32 = 4.0;

/// Reserved material id meaning "no edit here; use the procedural value".
pub const PASSTHROUGH_MATERIAL: u8 = 255;

/// Material id written by carving. Carved voxels are air: empty, not solid.
pub const AIR_MATERIAL: u8 = 0;

const MATERIAL_SHIFT: u32 = 24;
const SDF_SHIFT: u32 = 16;
const OCT_X_SHIFT: u32 = 8;

/// A packed voxel word.
///
/// `#[repr(transparent)]` over `u32` so brick payloads can be copied into
/// and out of the shared brick-data buffer word for word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Voxel(pub u32);

impl Voxel {
    /// The canonical passthrough word: `pack(255, +SDF_RANGE, +Z)`.
    ///
    /// Any word whose material is [`PASSTHROUGH_MATERIAL`] is treated as
    /// passthrough; this constant is what the edit database writes.
    pub const PASSTHROUGH: Voxel = Voxel(0xFFFF_8080);

    /// Pack a material id, signed distance and normal into one word.
    ///
    /// The normal does not need to be unit length; zero-length or non-finite
    /// normals encode as `+Z`. A NaN distance encodes as `+SDF_RANGE`
    /// (outside).
    pub fn pack(material: u8, sdf: f32, normal: [f32; 3]) -> Self {
        let word = (material as u32) << MATERIAL_SHIFT
            | (quantize_sdf(sdf) as u32) << SDF_SHIFT
            | encode_octahedral(normal) as u32;
        Self(word)
    }

    /// An air voxel (material 0, fully outside) facing `+Y`.
    pub fn air() -> Self {
        Self::pack(AIR_MATERIAL, SDF_RANGE, [0.0, 1.0, 0.0])
    }

    /// Decode all three components.
    pub fn unpack(self) -> (u8, f32, [f32; 3]) {
        (self.material(), self.sdf(), self.normal())
    }

    /// The 8-bit material id.
    pub fn material(self) -> u8 {
        (self.0 >> MATERIAL_SHIFT) as u8
    }

    /// The raw 8-bit quantized distance.
    pub fn sdf_bits(self) -> u8 {
        (self.0 >> SDF_SHIFT) as u8
    }

    /// The decoded signed distance in world units.
    pub fn sdf(self) -> f32 {
        dequantize_sdf(self.sdf_bits())
    }

    /// The raw 16-bit octahedral normal.
    pub fn normal_bits(self) -> u16 {
        self.0 as u16
    }

    /// The decoded unit normal.
    pub fn normal(self) -> [f32; 3] {
        decode_octahedral(self.normal_bits())
    }

    /// Whether this word carries no data (material 255).
    pub fn is_passthrough(self) -> bool {
        self.material() == PASSTHROUGH_MATERIAL
    }

    /// Whether this voxel is solid: carries data and lies inside the surface.
    pub fn is_solid(self) -> bool {
        !self.is_passthrough() && self.sdf() < 0.0
    }
}

impl Default for Voxel {
    fn default() -> Self {
        Self::PASSTHROUGH
    }
}

impl From<u32> for Voxel {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl From<Voxel> for u32 {
    fn from(v: Voxel) -> Self {
        v.0
    }
}

// ── Signed distance ─────────────────────────────────────────────

/// Quantize a signed distance to 8 bits.
pub fn quantize_sdf(sdf: f32) -> u8 {
    if sdf.is_nan() {
        return u8::MAX;
    }
    let t = (sdf.clamp(-SDF_RANGE, SDF_RANGE) + SDF_RANGE) / (2.0 * SDF_RANGE);
    (t * 255.0).round() as u8
}

/// Inverse of [`quantize_sdf`].
pub fn dequantize_sdf(bits: u8) -> f32 {
    bits as f32 / 255.0 * (2.0 * SDF_RANGE) - SDF_RANGE
}

// ── Octahedral normals ──────────────────────────────────────────

#[inline]
fn sign_not_zero(v: f32) -> f32 {
    if v >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

#[inline]
fn quantize_unit(v: f32) -> u8 {
    ((v.clamp(-1.0, 1.0) * 0.5 + 0.5) * 255.0).round() as u8
}

#[inline]
fn dequantize_unit(bits: u8) -> f32 {
    bits as f32 / 255.0 * 2.0 - 1.0
}

/// Octahedral-encode a normal into 16 bits (`x` high byte, `y` low byte).
pub fn encode_octahedral(n: [f32; 3]) -> u16 {
    let l1 = n[0].abs() + n[1].abs() + n[2].abs();
    let (mut x, mut y, z) = if l1 > 0.0 && l1.is_finite() {
        (n[0] / l1, n[1] / l1, n[2] / l1)
    } else {
        (0.0, 0.0, 1.0)
    };
    if z < 0.0 {
        let (fx, fy) = (x, y);
        x = (1.0 - fy.abs()) * sign_not_zero(fx);
        y = (1.0 - fx.abs()) * sign_not_zero(fy);
    }
    (quantize_unit(x) as u16) << OCT_X_SHIFT | quantize_unit(y) as u16
}

/// Decode a 16-bit octahedral normal back to a unit vector.
pub fn decode_octahedral(bits: u16) -> [f32; 3] {
    let mut x = dequantize_unit((bits >> OCT_X_SHIFT) as u8);
    let mut y = dequantize_unit(bits as u8);
    let z = 1.0 - x.abs() - y.abs();
    let t = (-z).max(0.0);
    x += if x >= 0.0 { -t } else { t };
    y += if y >= 0.0 { -t } else { t };
    normalize([x, y, z])
}

/// Normalize a vector, returning `+Y` for zero-length input.
pub fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len > f32::EPSILON && len.is_finite() {
        [v[0] / len, v[1] / len, v[2] / len]
    } else {
        [0.0, 1.0, 0.0]
    }
}
