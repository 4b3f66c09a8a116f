//! World configuration, validation, and error types.
//!
//! [`WorldConfig`] aggregates the configuration of every subsystem a
//! [`VoxelWorld`](crate::world::VoxelWorld) owns. [`validate()`](WorldConfig::validate)
//! checks all of them up front so construction fails before any buffer is
//! allocated.

use std::error::Error;
use std::fmt;

use strata_arena::{ArenaConfig, ArenaError};
use strata_edits::{EditConfig, EditError};
use strata_integrity::{AnalysisError, AnalyzerConfig};

// ── DebrisPolicy ───────────────────────────────────────────────────

/// What the world does with islands the analyzer reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DebrisPolicy {
    /// Hand reports to the caller and leave the voxels in place.
    #[default]
    Report,
    /// Also carve the island voxels out of the edit database and the
    /// volume's brick data before handing the reports back.
    Carve,
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`WorldConfig::validate()`].
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// Arena configuration is invalid.
    Arena(ArenaError),
    /// Edit database configuration is invalid.
    Edits(EditError),
    /// Analyzer configuration is invalid.
    Analysis(AnalysisError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arena(e) => write!(f, "arena: {e}"),
            Self::Edits(e) => write!(f, "edits: {e}"),
            Self::Analysis(e) => write!(f, "analysis: {e}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Arena(e) => Some(e),
            Self::Edits(e) => Some(e),
            Self::Analysis(e) => Some(e),
        }
    }
}

impl From<ArenaError> for ConfigError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}

impl From<EditError> for ConfigError {
    fn from(e: EditError) -> Self {
        Self::Edits(e)
    }
}

impl From<AnalysisError> for ConfigError {
    fn from(e: AnalysisError) -> Self {
        Self::Analysis(e)
    }
}

// ── WorldConfig ────────────────────────────────────────────────────

/// Complete configuration for constructing a [`VoxelWorld`](crate::world::VoxelWorld).
#[derive(Clone, Debug, Default)]
pub struct WorldConfig {
    /// Shared arena sizing.
    pub arena: ArenaConfig,
    /// Edit grid and LOD depth.
    pub edits: EditConfig,
    /// Structural analysis parameters.
    pub analyzer: AnalyzerConfig,
    /// Handling of reported islands.
    pub debris_policy: DebrisPolicy,
}

impl WorldConfig {
    /// Validate every subsystem's configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.arena.validate()?;
        self.edits.validate()?;
        self.analyzer.validate()?;
        Ok(())
    }
}
