//! Error types for the analysis pipeline and labeling devices.

use std::error::Error;
use std::fmt;

use strata_core::VolumeId;

use crate::device::ReadbackRequest;

/// A failure reported by a [`LabelingDevice`](crate::LabelingDevice).
///
/// Device errors abort the analysis of one volume; the queue continues.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceError {
    /// A kernel dispatch could not be issued or failed.
    Dispatch {
        /// Stage name, e.g. `"build_topology"`.
        stage: &'static str,
        /// Description of the failure.
        reason: String,
    },
    /// An asynchronous readback failed.
    Readback {
        /// What was being read.
        request: ReadbackRequest,
        /// Description of the failure.
        reason: String,
    },
    /// A readback arrived with data of the wrong shape for the stage.
    UnexpectedReadback {
        /// What the pipeline was waiting for.
        expected: ReadbackRequest,
    },
    /// The volume's memory was released while it was being analyzed.
    VolumeReleased {
        /// The volume.
        volume: VolumeId,
    },
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dispatch { stage, reason } => write!(f, "{stage} dispatch failed: {reason}"),
            Self::Readback { request, reason } => {
                write!(f, "readback of {request:?} failed: {reason}")
            }
            Self::UnexpectedReadback { expected } => {
                write!(f, "readback data does not match pending {expected:?}")
            }
            Self::VolumeReleased { volume } => {
                write!(f, "volume {volume} was released during analysis")
            }
        }
    }
}

impl Error for DeviceError {}

/// Errors constructing a [`StructuralAnalyzer`](crate::StructuralAnalyzer).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalysisError {
    /// The configuration failed validation.
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => write!(f, "invalid analyzer config: {reason}"),
        }
    }
}

impl Error for AnalysisError {}
