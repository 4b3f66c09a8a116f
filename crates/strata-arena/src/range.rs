//! Best-fit, coalescing allocation over a linear index space.
//!
//! [`RangeAllocator`] manages `[0, total_size)` as a sorted list of free
//! ranges. The pool runs two independent instances: one over page-table
//! slots (sized in pages) and one over brick-data storage (sized in words).

use crate::error::ArenaError;

/// A free run of indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FreeRange {
    start: u32,
    len: u32,
}

impl FreeRange {
    fn end(&self) -> u32 {
        self.start + self.len
    }
}

/// Best-fit allocator over `[0, total_size)`.
///
/// Allocation picks the free range with the smallest leftover among those
/// large enough, breaking ties by lowest start address, and carves the
/// allocation from the front of it. Freeing re-inserts the range in address
/// order and merges it with both neighbours, so two adjacent free ranges
/// never persist.
pub struct RangeAllocator {
    /// Free ranges, sorted by `start`, pairwise non-adjacent.
    free: Vec<FreeRange>,
    total_size: u32,
}

impl RangeAllocator {
    /// Create an allocator with the whole space free.
    pub fn new(total_size: u32) -> Self {
        let mut alloc = Self {
            free: Vec::new(),
            total_size,
        };
        alloc.reset();
        alloc
    }

    /// Allocate `size` contiguous indices and return the start offset.
    ///
    /// A zero-sized request succeeds with offset 0 and does not touch the
    /// free list. Fails with [`ArenaError::RangeExhausted`] if no free range
    /// is at least `size` long.
    pub fn allocate(&mut self, size: u32) -> Result<u32, ArenaError> {
        if size == 0 {
            return Ok(0);
        }

        let mut best: Option<(usize, u32)> = None;
        for (i, r) in self.free.iter().enumerate() {
            if r.len < size {
                continue;
            }
            let leftover = r.len - size;
            if best.is_none_or(|(_, best_leftover)| leftover < best_leftover) {
                best = Some((i, leftover));
                if leftover == 0 {
                    break;
                }
            }
        }

        let Some((i, leftover)) = best else {
            return Err(ArenaError::RangeExhausted {
                requested: size,
                largest_free: self.largest_free_range(),
            });
        };

        let offset = self.free[i].start;
        if leftover == 0 {
            self.free.remove(i);
        } else {
            self.free[i] = FreeRange {
                start: offset + size,
                len: leftover,
            };
        }
        Ok(offset)
    }

    /// Return `[offset, offset + size)` to the free list.
    ///
    /// Freeing a range that overlaps free space is a caller error (checked
    /// in debug builds only). A zero-sized free is a no-op.
    pub fn free(&mut self, offset: u32, size: u32) {
        if size == 0 {
            return;
        }
        debug_assert!(
            offset as u64 + size as u64 <= self.total_size as u64,
            "free of [{offset}, +{size}) past end {}",
            self.total_size
        );

        let idx = self.free.partition_point(|r| r.start < offset);
        debug_assert!(
            idx == 0 || self.free[idx - 1].end() <= offset,
            "free of [{offset}, +{size}) overlaps preceding free range"
        );
        debug_assert!(
            idx == self.free.len() || offset + size <= self.free[idx].start,
            "free of [{offset}, +{size}) overlaps following free range"
        );
        self.free.insert(idx, FreeRange { start: offset, len: size });

        // Merge with the following range.
        if idx + 1 < self.free.len() && self.free[idx].end() == self.free[idx + 1].start {
            self.free[idx].len += self.free[idx + 1].len;
            self.free.remove(idx + 1);
        }
        // Merge with the preceding range, independently of the above.
        if idx > 0 && self.free[idx - 1].end() == self.free[idx].start {
            self.free[idx - 1].len += self.free[idx].len;
            self.free.remove(idx);
        }
    }

    /// Restore a single free range covering the whole space.
    pub fn reset(&mut self) {
        self.free.clear();
        if self.total_size > 0 {
            self.free.push(FreeRange {
                start: 0,
                len: self.total_size,
            });
        }
    }

    /// Total free indices.
    pub fn free_space(&self) -> u32 {
        self.free.iter().map(|r| r.len).sum()
    }

    /// Number of disjoint free ranges.
    pub fn free_range_count(&self) -> usize {
        self.free.len()
    }

    /// Length of the largest free range, or 0 when full.
    pub fn largest_free_range(&self) -> u32 {
        self.free.iter().map(|r| r.len).max().unwrap_or(0)
    }

    /// Size of the index space.
    pub fn total_size(&self) -> u32 {
        self.total_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_allocations_pack_from_zero() {
        let mut r = RangeAllocator::new(100);
        assert_eq!(r.allocate(10).unwrap(), 0);
        assert_eq!(r.allocate(20).unwrap(), 10);
        assert_eq!(r.free_space(), 70);
    }

    #[test]
    fn best_fit_picks_smallest_leftover() {
        let mut r = RangeAllocator::new(100);
        let a = r.allocate(10).unwrap(); // [0, 10)
        let _b = r.allocate(5).unwrap(); // [10, 15)
        let c = r.allocate(4).unwrap(); // [15, 19)
        let _d = r.allocate(1).unwrap(); // [19, 20)
        r.free(a, 10);
        r.free(c, 4);
        // Free: [0,10), [15,19), [20,100). A request of 3 fits best in [15,19).
        assert_eq!(r.allocate(3).unwrap(), 15);
    }

    #[test]
    fn best_fit_ties_go_to_lowest_start() {
        let mut r = RangeAllocator::new(30);
        let a = r.allocate(5).unwrap(); // [0,5)
        let _ = r.allocate(5).unwrap(); // [5,10)
        let c = r.allocate(5).unwrap(); // [10,15)
        let _ = r.allocate(15).unwrap(); // [15,30)
        r.free(c, 5);
        r.free(a, 5);
        assert_eq!(r.allocate(5).unwrap(), 0);
        assert_eq!(r.allocate(5).unwrap(), 10);
    }

    #[test]
    fn exhaustion_reports_largest_free() {
        let mut r = RangeAllocator::new(10);
        r.allocate(4).unwrap();
        assert_eq!(
            r.allocate(7),
            Err(ArenaError::RangeExhausted {
                requested: 7,
                largest_free: 6,
            })
        );
        assert_eq!(r.free_space(), 6);
    }

    #[test]
    fn zero_sized_requests_are_free() {
        let mut r = RangeAllocator::new(10);
        assert_eq!(r.allocate(0).unwrap(), 0);
        r.free(0, 0);
        assert_eq!(r.free_space(), 10);
        assert_eq!(r.free_range_count(), 1);
    }

    #[test]
    fn adjacent_frees_coalesce_in_either_order() {
        for reverse in [false, true] {
            let mut r = RangeAllocator::new(30);
            let a = r.allocate(10).unwrap();
            let b = r.allocate(10).unwrap();
            let _guard = r.allocate(10).unwrap();
            if reverse {
                r.free(b, 10);
                r.free(a, 10);
            } else {
                r.free(a, 10);
                r.free(b, 10);
            }
            assert_eq!(r.free_range_count(), 1);
            assert_eq!(r.allocate(20).unwrap(), a);
        }
    }

    #[test]
    fn freeing_the_gap_merges_both_sides() {
        let mut r = RangeAllocator::new(30);
        let a = r.allocate(10).unwrap();
        let b = r.allocate(10).unwrap();
        let c = r.allocate(10).unwrap();
        r.free(a, 10);
        r.free(c, 10);
        assert_eq!(r.free_range_count(), 2);
        r.free(b, 10);
        assert_eq!(r.free_range_count(), 1);
        assert_eq!(r.largest_free_range(), 30);
    }

    #[test]
    fn reset_restores_whole_space() {
        let mut r = RangeAllocator::new(50);
        r.allocate(20).unwrap();
        r.allocate(5).unwrap();
        r.reset();
        assert_eq!(r.free_space(), 50);
        assert_eq!(r.allocate(50).unwrap(), 0);
    }

    #[test]
    fn independent_instances_do_not_share_state() {
        let mut slots = RangeAllocator::new(8);
        let mut words = RangeAllocator::new(8);
        slots.allocate(8).unwrap();
        assert_eq!(words.allocate(8).unwrap(), 0);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn free_space_equals_total_minus_live(
                ops in proptest::collection::vec((any::<bool>(), 1u32..40), 1..80),
            ) {
                let total = 256;
                let mut r = RangeAllocator::new(total);
                let mut live: Vec<(u32, u32)> = Vec::new();
                for (is_alloc, n) in ops {
                    if is_alloc || live.is_empty() {
                        if let Ok(offset) = r.allocate(n) {
                            live.push((offset, n));
                        }
                    } else {
                        let (offset, size) = live.swap_remove(n as usize % live.len());
                        r.free(offset, size);
                    }
                    let held: u32 = live.iter().map(|&(_, s)| s).sum();
                    prop_assert_eq!(r.free_space(), total - held);
                }
            }

            #[test]
            fn live_ranges_never_overlap(
                ops in proptest::collection::vec((any::<bool>(), 1u32..40), 1..80),
            ) {
                let mut r = RangeAllocator::new(256);
                let mut live: Vec<(u32, u32)> = Vec::new();
                for (is_alloc, n) in ops {
                    if is_alloc || live.is_empty() {
                        if let Ok(offset) = r.allocate(n) {
                            for &(o, s) in &live {
                                prop_assert!(
                                    offset + n <= o || o + s <= offset,
                                    "[{}, +{}) overlaps [{}, +{})", offset, n, o, s
                                );
                            }
                            live.push((offset, n));
                        }
                    } else {
                        let (offset, size) = live.swap_remove(n as usize % live.len());
                        r.free(offset, size);
                    }
                }
            }

            #[test]
            fn freeing_everything_leaves_one_range(
                sizes in proptest::collection::vec(1u32..30, 1..20),
                seed in any::<u64>(),
            ) {
                let mut r = RangeAllocator::new(1024);
                let mut live: Vec<(u32, u32)> = sizes
                    .iter()
                    .filter_map(|&n| r.allocate(n).ok().map(|o| (o, n)))
                    .collect();
                // Deterministic shuffle so frees arrive out of address order.
                let mut state = seed | 1;
                while !live.is_empty() {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    let (o, s) = live.swap_remove(state as usize % live.len());
                    r.free(o, s);
                }
                prop_assert_eq!(r.free_range_count(), 1);
                prop_assert_eq!(r.free_space(), 1024);
            }
        }
    }
}
