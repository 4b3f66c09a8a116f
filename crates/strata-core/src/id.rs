//! Strongly-typed identifiers.

use std::fmt;

/// Identifies a logical voxel volume.
///
/// Volume IDs are assigned sequentially by the world orchestrator and are
/// never reused within one world, so a stale ID can always be told apart
/// from a live one by a registry lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeId(pub u32);

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for VolumeId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
