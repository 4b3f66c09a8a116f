//! Fixed-size page allocation over the shared node arena.
//!
//! [`PageAllocator`] hands out page indices from a free stack. Pages are
//! uniform, so fragmentation is impossible by construction and a request
//! either fits entirely or fails without side effects.

use crate::error::ArenaError;

/// Free-stack allocator over `total_pages` uniform pages.
///
/// Returned indices carry no contiguity guarantee; the page table maps a
/// volume's virtual pages onto whatever physical pages it was given.
///
/// # Contract
///
/// `free()` trusts its caller. Returning an index that is not currently held
/// (a double free) silently inflates the free count and will later hand the
/// same page to two volumes. The allocator does not try to detect this;
/// [`VolumePool`](crate::VolumePool) rules it out by only freeing pages
/// owned by a live, generation-checked handle.
pub struct PageAllocator {
    /// Free page indices. The top of the stack is handed out first.
    free: Vec<u32>,
    total_pages: u32,
}

impl PageAllocator {
    /// Create an allocator with every page free.
    ///
    /// A fresh allocator hands out pages in ascending index order.
    pub fn new(total_pages: u32) -> Self {
        Self {
            free: (0..total_pages).rev().collect(),
            total_pages,
        }
    }

    /// Take `n` free pages.
    ///
    /// Fails with [`ArenaError::PagesExhausted`] if fewer than `n` pages are
    /// free; the free set is untouched in that case.
    pub fn allocate(&mut self, n: u32) -> Result<Vec<u32>, ArenaError> {
        let available = self.free.len();
        if n as usize > available {
            return Err(ArenaError::PagesExhausted {
                requested: n,
                available: available as u32,
            });
        }
        let mut pages = self.free.split_off(available - n as usize);
        pages.reverse();
        Ok(pages)
    }

    /// Return pages to the free set.
    ///
    /// Indices outside the page universe are skipped with a warning, since
    /// handing them out later would address memory past the arena.
    pub fn free(&mut self, pages: &[u32]) {
        for &page in pages.iter().rev() {
            if page >= self.total_pages {
                log::warn!(
                    "ignoring free of page {page}: outside arena of {} pages",
                    self.total_pages
                );
                continue;
            }
            self.free.push(page);
        }
    }

    /// Number of free pages.
    pub fn free_count(&self) -> u32 {
        self.free.len() as u32
    }

    /// Number of pages currently handed out.
    pub fn used_count(&self) -> u32 {
        self.total_pages - self.free_count()
    }

    /// Size of the page universe.
    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }
}
