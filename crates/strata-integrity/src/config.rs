//! Analyzer configuration.

use crate::error::AnalysisError;

/// Tuning for the structural analysis pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalyzerConfig {
    /// World Y of the ground plane. A solid voxel whose bottom face is at
    /// or below this height is grounded. Default: 0.0.
    pub ground_y: f32,
    /// Label relaxation dispatches issued between change-flag readbacks.
    /// Default: 64.
    pub dispatches_per_batch: u32,
    /// Hard cap on relaxation dispatches per volume. Reaching it with
    /// labels still changing truncates the run. Default: 4096.
    pub max_iterations: u32,
}

impl AnalyzerConfig {
    /// Default dispatches per batch.
    pub const DEFAULT_DISPATCHES_PER_BATCH: u32 = 64;
    /// Default iteration cap.
    pub const DEFAULT_MAX_ITERATIONS: u32 = 4096;

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.ground_y.is_finite() {
            return Err(AnalysisError::InvalidConfig {
                reason: format!("ground_y {} must be finite", self.ground_y),
            });
        }
        if self.dispatches_per_batch == 0 {
            return Err(AnalysisError::InvalidConfig {
                reason: "dispatches_per_batch must be at least 1".into(),
            });
        }
        if self.max_iterations == 0 {
            return Err(AnalysisError::InvalidConfig {
                reason: "max_iterations must be at least 1".into(),
            });
        }
        Ok(())
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            ground_y: 0.0,
            dispatches_per_batch: Self::DEFAULT_DISPATCHES_PER_BATCH,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
        }
    }
}
