//! Cumulative counters for a [`VoxelWorld`](crate::world::VoxelWorld).
//!
//! [`WorldMetrics`] complements the analyzer's own
//! [`AnalysisStats`](strata_integrity::AnalysisStats) with the
//! orchestration-level events only the world sees.

/// World-level counters. All values are cumulative since construction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorldMetrics {
    /// Volumes successfully created or loaded.
    pub volumes_created: u64,
    /// Volumes returned to the pool.
    pub volumes_returned: u64,
    /// Volume creations refused because the arena was exhausted.
    pub allocation_failures: u64,
    /// Edit batches accepted by the edit database.
    pub edit_batches: u64,
    /// Edit batches rejected for malformed payloads.
    pub edit_batches_rejected: u64,
    /// Analysis runs requested by edits or by the caller.
    pub analyses_requested: u64,
    /// Analysis requests the analyzer dropped because it was busy.
    pub analyses_dropped: u64,
    /// Islands handed back from `pump`.
    pub islands_reported: u64,
    /// Voxels carved under [`DebrisPolicy::Carve`](crate::config::DebrisPolicy::Carve).
    pub voxels_carved: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = WorldMetrics::default();
        assert_eq!(m.volumes_created, 0);
        assert_eq!(m.allocation_failures, 0);
        assert_eq!(m.voxels_carved, 0);
    }

    #[test]
    fn clone_preserves_counters() {
        let m = WorldMetrics {
            edit_batches: 3,
            islands_reported: 2,
            ..WorldMetrics::default()
        };
        assert_eq!(m.clone(), m);
    }
}
