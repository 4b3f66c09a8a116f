//! Volume memory handles and allocation requests.
//!
//! A [`VolumeMemoryHandle`] is the immutable description of where one
//! volume's data lives in the shared arena. It is generation-scoped: the
//! embedded [`VolumeKey`] lets the pool reject a handle whose volume has
//! already been released instead of freeing someone else's pages.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use strata_core::PADDED_BRICK_VOLUME;

/// Counter for unique [`PoolId`] allocation.
static POOL_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instance identifier for a [`VolumePool`](crate::VolumePool).
///
/// Every key carries the id of the pool that issued it, so a handle from
/// one pool is never mistaken for a live handle of another with the same
/// slot and generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(u64);

impl PoolId {
    /// Allocate a fresh id, never returned before in this process.
    pub(crate) fn next() -> Self {
        Self(POOL_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generation-checked reference to a pool slot.
///
/// Slots are recycled; the generation is bumped on every release, so a key
/// copied before a release never matches the slot again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VolumeKey {
    pub(crate) pool: PoolId,
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

impl VolumeKey {
    /// The pool that issued this key.
    pub fn pool(&self) -> PoolId {
        self.pool
    }

    /// Pool slot index.
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Generation of the slot when this key was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// How much memory a new volume needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VolumeRequest {
    /// Node slots in the volume's virtual address space.
    pub nodes: u32,
    /// Padded bricks of voxel storage.
    pub bricks: u32,
}

/// Per-volume counter record.
///
/// Written by the generation pipeline as it fills a volume, read back when
/// the volume is saved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VolumeCounters {
    /// Nodes in use.
    pub node_count: u32,
    /// Payload words in use.
    pub payload_count: u32,
    /// Brick-data words written so far.
    pub brick_voxel_cursor: u32,
}

/// Where one volume's data lives in the shared arena.
///
/// Invariants, established by [`VolumePool::acquire`](crate::VolumePool::acquire):
///
/// - `pages().len() == ceil(requested_nodes / page_size)`
/// - `brick_data_len() == requested_bricks * 216`
///
/// Cloning a handle does not duplicate ownership: the pool accepts exactly
/// one release per acquire, and rejects every later one as stale.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct VolumeMemoryHandle {
    pub(crate) key: VolumeKey,
    pub(crate) page_table_offset: u32,
    pub(crate) brick_data_offset: u32,
    pub(crate) pages: Vec<u32>,
    pub(crate) requested_nodes: u32,
    pub(crate) requested_bricks: u32,
}

impl VolumeMemoryHandle {
    /// The pool key this handle was issued under.
    pub fn key(&self) -> VolumeKey {
        self.key
    }

    /// First slot of this volume's page-table slice.
    pub fn page_table_offset(&self) -> u32 {
        self.page_table_offset
    }

    /// First word of this volume's brick-data range.
    pub fn brick_data_offset(&self) -> u32 {
        self.brick_data_offset
    }

    /// Physical pages backing this volume, in virtual order.
    pub fn pages(&self) -> &[u32] {
        &self.pages
    }

    /// Number of physical pages.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Node count requested at acquire time.
    pub fn requested_nodes(&self) -> u32 {
        self.requested_nodes
    }

    /// Brick count requested at acquire time.
    pub fn requested_bricks(&self) -> u32 {
        self.requested_bricks
    }

    /// Length of the brick-data range in words.
    pub fn brick_data_len(&self) -> u32 {
        self.requested_bricks * PADDED_BRICK_VOLUME as u32
    }
}

impl fmt::Display for VolumeMemoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VolumeMemoryHandle(slot={}, gen={}, pages={}, table_off={}, brick_off={}, bricks={})",
            self.key.slot,
            self.key.generation,
            self.pages.len(),
            self.page_table_offset,
            self.brick_data_offset,
            self.requested_bricks
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(bricks: u32) -> VolumeMemoryHandle {
        VolumeMemoryHandle {
            key: VolumeKey {
                pool: PoolId::next(),
                slot: 2,
                generation: 7,
            },
            page_table_offset: 16,
            brick_data_offset: 432,
            pages: vec![5, 1, 9],
            requested_nodes: 5000,
            requested_bricks: bricks,
        }
    }

    #[test]
    fn brick_data_len_is_padded() {
        assert_eq!(handle(3).brick_data_len(), 3 * 216);
        assert_eq!(handle(0).brick_data_len(), 0);
    }

    #[test]
    fn accessors() {
        let h = handle(1);
        assert_eq!(h.key().slot(), 2);
        assert_eq!(h.key().generation(), 7);
        assert_eq!(h.page_count(), 3);
        assert_eq!(h.pages(), &[5, 1, 9]);
        assert_eq!(h.page_table_offset(), 16);
        assert_eq!(h.brick_data_offset(), 432);
        assert_eq!(h.requested_nodes(), 5000);
    }

    #[test]
    fn pool_ids_are_unique() {
        let a = PoolId::next();
        let b = PoolId::next();
        assert_ne!(a, b);
        assert_ne!(handle(1).key(), handle(1).key());
    }

    #[test]
    fn display_mentions_slot_and_generation() {
        let s = handle(1).to_string();
        assert!(s.contains("slot=2"));
        assert!(s.contains("gen=7"));
    }
}
