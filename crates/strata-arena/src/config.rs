//! Arena configuration parameters.

use crate::error::ArenaError;

/// Configuration for the shared volume arena.
///
/// Controls page sizing and the capacity of each shared buffer.
/// Validated by [`VolumePool::new`](crate::VolumePool::new); all values are
/// immutable after the pool is created.
#[derive(Clone, Debug)]
pub struct ArenaConfig {
    /// Node slots per page.
    ///
    /// Default: 2048. Must be a power of two.
    pub page_size: u32,

    /// Number of pages in the shared node arena.
    ///
    /// The node and payload buffers each hold `total_pages * page_size`
    /// words, so the product must fit in a `u32`.
    pub total_pages: u32,

    /// Number of slots in the shared page-table buffer.
    ///
    /// Each volume consumes one slot per allocated page. Default: equal to
    /// `total_pages`, which is always sufficient.
    pub page_table_capacity: u32,

    /// Number of words in the shared brick-data buffer.
    ///
    /// Each volume consumes `bricks * 216` words.
    pub brick_data_capacity: u32,
}

impl ArenaConfig {
    /// Default page size in node slots.
    pub const DEFAULT_PAGE_SIZE: u32 = 2048;

    /// Default page count: 4096 pages of 2048 nodes = 8M node slots.
    pub const DEFAULT_TOTAL_PAGES: u32 = 4096;

    /// Default brick-data capacity: 16M words (64MB).
    pub const DEFAULT_BRICK_DATA_CAPACITY: u32 = 16 * 1024 * 1024;

    /// Create a config with the given page count and brick-data capacity.
    ///
    /// Uses the default page size and a page table sized to `total_pages`.
    pub fn new(total_pages: u32, brick_data_capacity: u32) -> Self {
        Self {
            page_size: Self::DEFAULT_PAGE_SIZE,
            total_pages,
            page_table_capacity: total_pages,
            brick_data_capacity,
        }
    }

    /// Total node slots across all pages.
    pub fn node_capacity(&self) -> u64 {
        self.total_pages as u64 * self.page_size as u64
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.page_size == 0 || !self.page_size.is_power_of_two() {
            return Err(ArenaError::InvalidConfig {
                reason: format!("page_size {} must be a non-zero power of two", self.page_size),
            });
        }
        if self.total_pages == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "total_pages must be at least 1".into(),
            });
        }
        if self.node_capacity() > u32::MAX as u64 {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "node capacity {} exceeds u32 addressing",
                    self.node_capacity()
                ),
            });
        }
        if self.page_table_capacity == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "page_table_capacity must be at least 1".into(),
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TOTAL_PAGES, Self::DEFAULT_BRICK_DATA_CAPACITY)
    }
}
