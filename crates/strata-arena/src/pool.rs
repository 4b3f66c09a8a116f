//! The volume pool: shared buffers, allocators and handle bookkeeping.
//!
//! [`VolumePool`] is the explicit owner of all arena state. Volumes are
//! created with [`acquire`](VolumePool::acquire) and returned with
//! [`release`](VolumePool::release); every read or write goes through a
//! [`VolumeMemoryHandle`] that is checked against the slot generation first.

use strata_core::{Voxel, PADDED_BRICK_VOLUME};

use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::handle::{PoolId, VolumeCounters, VolumeKey, VolumeMemoryHandle, VolumeRequest};
use crate::page::PageAllocator;
use crate::range::RangeAllocator;

// ── ArenaBuffers ────────────────────────────────────────────────

/// The shared word buffers every volume lives in.
///
/// Exposed read-only so device dispatches can bind them; only the pool
/// mutates them.
pub struct ArenaBuffers {
    nodes: Vec<u32>,
    payloads: Vec<u32>,
    page_table: Vec<u32>,
    brick_data: Vec<u32>,
    page_size: u32,
}

impl ArenaBuffers {
    fn new(config: &ArenaConfig) -> Self {
        let node_words = config.node_capacity() as usize;
        Self {
            nodes: vec![0; node_words],
            payloads: vec![0; node_words],
            page_table: vec![0; config.page_table_capacity as usize],
            brick_data: vec![Voxel::PASSTHROUGH.0; config.brick_data_capacity as usize],
            page_size: config.page_size,
        }
    }

    /// Shared node arena.
    pub fn nodes(&self) -> &[u32] {
        &self.nodes
    }

    /// Shared payload arena, addressed exactly like the node arena.
    pub fn payloads(&self) -> &[u32] {
        &self.payloads
    }

    /// Page-table buffer: one physical page index per slot.
    pub fn page_table(&self) -> &[u32] {
        &self.page_table
    }

    /// Shared brick-voxel storage.
    pub fn brick_data(&self) -> &[u32] {
        &self.brick_data
    }

    /// Node slots per page.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Resolve a virtual node index through the page table.
    ///
    /// No bounds checking beyond slice indexing; use
    /// [`VolumePool::resolve_node`] for checked resolution.
    pub fn resolve(&self, page_table_offset: u32, virtual_index: u32) -> usize {
        let page = self.page_table[(page_table_offset + virtual_index / self.page_size) as usize];
        (page * self.page_size + virtual_index % self.page_size) as usize
    }
}

// ── Slots ───────────────────────────────────────────────────────

struct Slot {
    generation: u32,
    counters: Option<VolumeCounters>,
}

// ── VolumePool ──────────────────────────────────────────────────

/// Owner of the shared arena and the allocators that carve it up.
///
/// Acquisition is all-or-nothing: if any of the three allocations (pages,
/// page-table slots, brick words) fails, the ones that succeeded are rolled
/// back before the error is returned.
pub struct VolumePool {
    id: PoolId,
    config: ArenaConfig,
    buffers: ArenaBuffers,
    pages: PageAllocator,
    page_table: RangeAllocator,
    brick_data: RangeAllocator,
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    live: usize,
}

impl VolumePool {
    /// Validate `config` and allocate the shared buffers.
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        Ok(Self {
            id: PoolId::next(),
            buffers: ArenaBuffers::new(&config),
            pages: PageAllocator::new(config.total_pages),
            page_table: RangeAllocator::new(config.page_table_capacity),
            brick_data: RangeAllocator::new(config.brick_data_capacity),
            slots: Vec::new(),
            free_slots: Vec::new(),
            live: 0,
            config,
        })
    }

    /// Reserve memory for a new volume.
    ///
    /// The volume's nodes and payloads start zeroed and its brick data
    /// starts as PASSTHROUGH. Exhaustion errors leave the pool unchanged.
    pub fn acquire(&mut self, request: VolumeRequest) -> Result<VolumeMemoryHandle, ArenaError> {
        let page_size = self.config.page_size;
        let page_count = request.nodes.div_ceil(page_size);
        let brick_words = request
            .bricks
            .checked_mul(PADDED_BRICK_VOLUME as u32)
            .ok_or(ArenaError::RangeExhausted {
                requested: u32::MAX,
                largest_free: self.brick_data.largest_free_range(),
            })?;

        let pages = self.pages.allocate(page_count)?;
        let page_table_offset = match self.page_table.allocate(page_count) {
            Ok(offset) => offset,
            Err(e) => {
                self.pages.free(&pages);
                return Err(e);
            }
        };
        let brick_data_offset = match self.brick_data.allocate(brick_words) {
            Ok(offset) => offset,
            Err(e) => {
                self.page_table.free(page_table_offset, page_count);
                self.pages.free(&pages);
                return Err(e);
            }
        };

        for (i, &page) in pages.iter().enumerate() {
            self.buffers.page_table[page_table_offset as usize + i] = page;
            let start = (page * page_size) as usize;
            let end = start + page_size as usize;
            self.buffers.nodes[start..end].fill(0);
            self.buffers.payloads[start..end].fill(0);
        }
        let brick_start = brick_data_offset as usize;
        self.buffers.brick_data[brick_start..brick_start + brick_words as usize]
            .fill(Voxel::PASSTHROUGH.0);

        let key = self.claim_slot();
        self.live += 1;
        log::debug!(
            "acquired volume slot {} (gen {}): {} pages, {} bricks",
            key.slot,
            key.generation,
            page_count,
            request.bricks
        );

        Ok(VolumeMemoryHandle {
            key,
            page_table_offset,
            brick_data_offset,
            pages,
            requested_nodes: request.nodes,
            requested_bricks: request.bricks,
        })
    }

    /// Return a volume's pages and ranges to the pool.
    ///
    /// Releasing a handle twice, or a handle from before a slot was
    /// recycled, fails with [`ArenaError::StaleHandle`] and frees nothing.
    pub fn release(&mut self, handle: &VolumeMemoryHandle) -> Result<(), ArenaError> {
        self.check(handle)?;

        self.pages.free(&handle.pages);
        self.page_table
            .free(handle.page_table_offset, handle.page_count());
        self.brick_data
            .free(handle.brick_data_offset, handle.brick_data_len());

        let slot = &mut self.slots[handle.key.slot as usize];
        slot.counters = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(handle.key.slot);
        self.live -= 1;
        log::debug!("released volume slot {}", handle.key.slot);
        Ok(())
    }

    /// Whether `handle` still refers to a live volume.
    pub fn contains(&self, handle: &VolumeMemoryHandle) -> bool {
        self.check(handle).is_ok()
    }

    /// Resolve a virtual node index to a physical arena index.
    pub fn resolve_node(
        &self,
        handle: &VolumeMemoryHandle,
        virtual_index: u32,
    ) -> Result<usize, ArenaError> {
        self.check(handle)?;
        let len = handle.page_count() * self.config.page_size;
        if virtual_index >= len {
            return Err(ArenaError::OutOfBounds {
                index: virtual_index,
                len,
            });
        }
        Ok(self
            .buffers
            .resolve(handle.page_table_offset, virtual_index))
    }

    /// Copy nodes `[start, start + out.len())` of a volume into `out`.
    pub fn read_nodes(
        &self,
        handle: &VolumeMemoryHandle,
        start: u32,
        out: &mut [u32],
    ) -> Result<(), ArenaError> {
        self.check_span(handle, start, out.len())?;
        for (i, word) in out.iter_mut().enumerate() {
            *word = self.buffers.nodes[self.buffers.resolve(handle.page_table_offset, start + i as u32)];
        }
        Ok(())
    }

    /// Write `data` to nodes `[start, start + data.len())` of a volume.
    pub fn write_nodes(
        &mut self,
        handle: &VolumeMemoryHandle,
        start: u32,
        data: &[u32],
    ) -> Result<(), ArenaError> {
        self.check_span(handle, start, data.len())?;
        for (i, &word) in data.iter().enumerate() {
            let phys = self.buffers.resolve(handle.page_table_offset, start + i as u32);
            self.buffers.nodes[phys] = word;
        }
        Ok(())
    }

    /// Copy payloads `[start, start + out.len())` of a volume into `out`.
    pub fn read_payloads(
        &self,
        handle: &VolumeMemoryHandle,
        start: u32,
        out: &mut [u32],
    ) -> Result<(), ArenaError> {
        self.check_span(handle, start, out.len())?;
        for (i, word) in out.iter_mut().enumerate() {
            *word =
                self.buffers.payloads[self.buffers.resolve(handle.page_table_offset, start + i as u32)];
        }
        Ok(())
    }

    /// Write `data` to payloads `[start, start + data.len())` of a volume.
    pub fn write_payloads(
        &mut self,
        handle: &VolumeMemoryHandle,
        start: u32,
        data: &[u32],
    ) -> Result<(), ArenaError> {
        self.check_span(handle, start, data.len())?;
        for (i, &word) in data.iter().enumerate() {
            let phys = self.buffers.resolve(handle.page_table_offset, start + i as u32);
            self.buffers.payloads[phys] = word;
        }
        Ok(())
    }

    /// A volume's brick-data range.
    pub fn brick_data(&self, handle: &VolumeMemoryHandle) -> Result<&[u32], ArenaError> {
        self.check(handle)?;
        let start = handle.brick_data_offset as usize;
        Ok(&self.buffers.brick_data[start..start + handle.brick_data_len() as usize])
    }

    /// A volume's brick-data range, mutably.
    pub fn brick_data_mut(
        &mut self,
        handle: &VolumeMemoryHandle,
    ) -> Result<&mut [u32], ArenaError> {
        self.check(handle)?;
        let start = handle.brick_data_offset as usize;
        Ok(&mut self.buffers.brick_data[start..start + handle.brick_data_len() as usize])
    }

    /// A volume's counter record.
    pub fn counters(&self, handle: &VolumeMemoryHandle) -> Result<VolumeCounters, ArenaError> {
        self.check(handle)?;
        Ok(self.slots[handle.key.slot as usize]
            .counters
            .unwrap_or_default())
    }

    /// Overwrite a volume's counter record.
    pub fn set_counters(
        &mut self,
        handle: &VolumeMemoryHandle,
        counters: VolumeCounters,
    ) -> Result<(), ArenaError> {
        self.check(handle)?;
        self.slots[handle.key.slot as usize].counters = Some(counters);
        Ok(())
    }

    /// Read-only view of the shared buffers for device bindings.
    pub fn buffers(&self) -> &ArenaBuffers {
        &self.buffers
    }

    /// The configuration this pool was built with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Number of live volumes.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Free pages in the node arena.
    pub fn free_pages(&self) -> u32 {
        self.pages.free_count()
    }

    /// Free page-table slots.
    pub fn free_page_table_slots(&self) -> u32 {
        self.page_table.free_space()
    }

    /// This pool's instance id, carried by every key it issues.
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Free brick-data words.
    pub fn free_brick_words(&self) -> u32 {
        self.brick_data.free_space()
    }

    fn claim_slot(&mut self) -> VolumeKey {
        if let Some(slot) = self.free_slots.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.counters = Some(VolumeCounters::default());
            return VolumeKey {
                pool: self.id,
                slot,
                generation: entry.generation,
            };
        }
        let slot = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            counters: Some(VolumeCounters::default()),
        });
        VolumeKey {
            pool: self.id,
            slot,
            generation: 0,
        }
    }

    fn check(&self, handle: &VolumeMemoryHandle) -> Result<(), ArenaError> {
        let key = handle.key;
        if key.pool != self.id {
            return Err(ArenaError::ForeignHandle {
                slot: key.slot,
                issuer: key.pool,
                pool: self.id,
            });
        }
        match self.slots.get(key.slot as usize) {
            Some(slot) if slot.generation == key.generation && slot.counters.is_some() => Ok(()),
            Some(slot) => Err(ArenaError::StaleHandle {
                slot: key.slot,
                handle_generation: key.generation,
                current_generation: slot.generation,
            }),
            None => Err(ArenaError::StaleHandle {
                slot: key.slot,
                handle_generation: key.generation,
                current_generation: 0,
            }),
        }
    }

    fn check_span(
        &self,
        handle: &VolumeMemoryHandle,
        start: u32,
        len: usize,
    ) -> Result<(), ArenaError> {
        self.check(handle)?;
        let capacity = handle.page_count() * self.config.page_size;
        let end = start as u64 + len as u64;
        if end > capacity as u64 {
            return Err(ArenaError::OutOfBounds {
                index: end.min(u32::MAX as u64) as u32,
                len: capacity,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ArenaConfig {
        ArenaConfig {
            page_size: 16,
            total_pages: 8,
            page_table_capacity: 8,
            brick_data_capacity: 216 * 4,
        }
    }

    fn pool() -> VolumePool {
        VolumePool::new(small_config()).unwrap()
    }

    #[test]
    fn acquire_sizes_follow_request() {
        let mut pool = pool();
        let h = pool
            .acquire(VolumeRequest {
                nodes: 33,
                bricks: 2,
            })
            .unwrap();
        assert_eq!(h.page_count(), 3); // ceil(33 / 16)
        assert_eq!(h.brick_data_len(), 2 * 216);
        assert_eq!(pool.free_pages(), 5);
        assert_eq!(pool.free_page_table_slots(), 5);
        assert_eq!(pool.free_brick_words(), 2 * 216);
        assert_eq!(pool.live_count(), 1);
    }

    #[test]
    fn release_returns_everything() {
        let mut pool = pool();
        let h = pool
            .acquire(VolumeRequest {
                nodes: 40,
                bricks: 3,
            })
            .unwrap();
        pool.release(&h).unwrap();
        assert_eq!(pool.free_pages(), 8);
        assert_eq!(pool.free_page_table_slots(), 8);
        assert_eq!(pool.free_brick_words(), 216 * 4);
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn double_release_is_rejected() {
        let mut pool = pool();
        let h = pool
            .acquire(VolumeRequest {
                nodes: 16,
                bricks: 1,
            })
            .unwrap();
        let copy = h.clone();
        pool.release(&h).unwrap();
        let free_before = pool.free_pages();
        assert!(matches!(
            pool.release(&copy),
            Err(ArenaError::StaleHandle { .. })
        ));
        assert_eq!(pool.free_pages(), free_before);
    }

    #[test]
    fn recycled_slot_rejects_old_handle() {
        let mut pool = pool();
        let old = pool
            .acquire(VolumeRequest { nodes: 16, bricks: 0 })
            .unwrap();
        pool.release(&old).unwrap();
        let new = pool
            .acquire(VolumeRequest { nodes: 16, bricks: 0 })
            .unwrap();
        assert_eq!(old.key().slot(), new.key().slot());
        assert!(!pool.contains(&old));
        assert!(pool.contains(&new));
        assert!(pool.brick_data(&old).is_err());
    }

    #[test]
    fn handle_from_another_pool_is_rejected() {
        let mut a = pool();
        let mut b = pool();
        let from_a = a
            .acquire(VolumeRequest { nodes: 16, bricks: 1 })
            .unwrap();
        let from_b = b
            .acquire(VolumeRequest { nodes: 16, bricks: 1 })
            .unwrap();
        assert_eq!(from_a.key().slot(), from_b.key().slot());
        assert_eq!(from_a.key().generation(), from_b.key().generation());
        assert_eq!(from_a.key().pool(), a.id());

        assert!(!b.contains(&from_a));
        assert!(matches!(
            b.brick_data(&from_a),
            Err(ArenaError::ForeignHandle { slot: 0, .. })
        ));
        let free = b.free_pages();
        assert!(matches!(
            b.release(&from_a),
            Err(ArenaError::ForeignHandle { .. })
        ));
        assert_eq!(b.free_pages(), free);
        assert!(b.contains(&from_b));
        a.release(&from_a).unwrap();
    }

    #[test]
    fn failed_brick_allocation_rolls_back_pages() {
        let mut pool = pool();
        let result = pool.acquire(VolumeRequest {
            nodes: 32,
            bricks: 5,
        });
        assert!(matches!(result, Err(ArenaError::RangeExhausted { .. })));
        assert_eq!(pool.free_pages(), 8);
        assert_eq!(pool.free_page_table_slots(), 8);
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn failed_page_table_allocation_rolls_back_pages() {
        let mut pool = VolumePool::new(ArenaConfig {
            page_table_capacity: 2,
            ..small_config()
        })
        .unwrap();
        let result = pool.acquire(VolumeRequest {
            nodes: 48,
            bricks: 0,
        });
        assert!(matches!(result, Err(ArenaError::RangeExhausted { .. })));
        assert_eq!(pool.free_pages(), 8);
    }

    #[test]
    fn page_exhaustion_is_reported() {
        let mut pool = pool();
        let result = pool.acquire(VolumeRequest {
            nodes: 16 * 9,
            bricks: 0,
        });
        assert_eq!(
            result,
            Err(ArenaError::PagesExhausted {
                requested: 9,
                available: 8,
            })
        );
    }

    #[test]
    fn nodes_resolve_through_page_table() {
        let mut pool = pool();
        // Fragment the page space so the second volume gets non-adjacent pages.
        let a = pool.acquire(VolumeRequest { nodes: 16, bricks: 0 }).unwrap();
        let b = pool.acquire(VolumeRequest { nodes: 16, bricks: 0 }).unwrap();
        let c = pool.acquire(VolumeRequest { nodes: 16, bricks: 0 }).unwrap();
        pool.release(&a).unwrap();
        pool.release(&c).unwrap();
        let v = pool.acquire(VolumeRequest { nodes: 32, bricks: 0 }).unwrap();

        for virt in [0u32, 15, 16, 31] {
            let phys = pool.resolve_node(&v, virt).unwrap();
            let page = v.pages()[(virt / 16) as usize];
            assert_eq!(phys, (page * 16 + virt % 16) as usize);
        }
        assert_eq!(
            pool.resolve_node(&v, 32),
            Err(ArenaError::OutOfBounds { index: 32, len: 32 })
        );
        drop(b);
    }

    #[test]
    fn node_and_payload_writes_cross_page_boundaries() {
        let mut pool = pool();
        let h = pool.acquire(VolumeRequest { nodes: 32, bricks: 0 }).unwrap();
        let data: Vec<u32> = (100..120).collect();
        pool.write_nodes(&h, 10, &data).unwrap();
        pool.write_payloads(&h, 10, &data).unwrap();

        let mut out = vec![0u32; 20];
        pool.read_nodes(&h, 10, &mut out).unwrap();
        assert_eq!(out, data);
        out.fill(0);
        pool.read_payloads(&h, 10, &mut out).unwrap();
        assert_eq!(out, data);

        assert!(matches!(
            pool.write_nodes(&h, 30, &[1, 2, 3]),
            Err(ArenaError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn fresh_brick_data_is_passthrough() {
        let mut pool = pool();
        let h = pool.acquire(VolumeRequest { nodes: 0, bricks: 2 }).unwrap();
        pool.brick_data_mut(&h).unwrap()[5] = 7;
        pool.release(&h).unwrap();
        let h = pool.acquire(VolumeRequest { nodes: 0, bricks: 2 }).unwrap();
        assert!(pool
            .brick_data(&h)
            .unwrap()
            .iter()
            .all(|&w| Voxel(w).is_passthrough()));
    }

    #[test]
    fn counters_round_trip_and_reset_on_reacquire() {
        let mut pool = pool();
        let h = pool.acquire(VolumeRequest { nodes: 16, bricks: 1 }).unwrap();
        let counters = VolumeCounters {
            node_count: 9,
            payload_count: 4,
            brick_voxel_cursor: 216,
        };
        pool.set_counters(&h, counters).unwrap();
        assert_eq!(pool.counters(&h).unwrap(), counters);
        pool.release(&h).unwrap();
        let h = pool.acquire(VolumeRequest { nodes: 16, bricks: 1 }).unwrap();
        assert_eq!(pool.counters(&h).unwrap(), VolumeCounters::default());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = VolumePool::new(ArenaConfig {
            page_size: 3,
            ..small_config()
        });
        assert!(matches!(result, Err(ArenaError::InvalidConfig { .. })));
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn free_space_tracks_live_volumes(
                ops in proptest::collection::vec((any::<bool>(), 0u32..64, 0u32..3), 1..50),
            ) {
                let config = ArenaConfig {
                    page_size: 16,
                    total_pages: 16,
                    page_table_capacity: 16,
                    brick_data_capacity: 216 * 6,
                };
                let mut pool = VolumePool::new(config).unwrap();
                let mut live: Vec<VolumeMemoryHandle> = Vec::new();
                for (is_alloc, nodes, bricks) in ops {
                    if is_alloc || live.is_empty() {
                        if let Ok(h) = pool.acquire(VolumeRequest { nodes, bricks }) {
                            live.push(h);
                        }
                    } else {
                        let h = live.swap_remove(nodes as usize % live.len());
                        pool.release(&h).unwrap();
                    }
                    let pages: u32 = live.iter().map(|h| h.page_count()).sum();
                    let words: u32 = live.iter().map(|h| h.brick_data_len()).sum();
                    prop_assert_eq!(pool.free_pages(), 16 - pages);
                    prop_assert_eq!(pool.free_page_table_slots(), 16 - pages);
                    prop_assert_eq!(pool.free_brick_words(), 216 * 6 - words);
                    prop_assert_eq!(pool.live_count(), live.len());
                }
            }

            #[test]
            fn live_volumes_never_share_pages(
                requests in proptest::collection::vec(0u32..64, 1..12),
            ) {
                let mut pool = VolumePool::new(ArenaConfig {
                    page_size: 16,
                    total_pages: 16,
                    page_table_capacity: 16,
                    brick_data_capacity: 0,
                }).unwrap();
                let mut seen = std::collections::HashSet::new();
                for nodes in requests {
                    if let Ok(h) = pool.acquire(VolumeRequest { nodes, bricks: 0 }) {
                        for &p in h.pages() {
                            prop_assert!(seen.insert(p));
                        }
                    }
                }
            }
        }
    }
}
