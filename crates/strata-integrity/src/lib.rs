//! Structural integrity analysis for Strata voxel volumes.
//!
//! After a destructive edit, [`StructuralAnalyzer`] finds solid voxels that
//! no longer connect to ground and reports them as islands. Volumes are
//! processed strictly one at a time so device scratch memory never exceeds
//! one volume's working set.
//!
//! # Pipeline
//!
//! ```text
//! analyze_world ─► queue (FIFO)
//!                    │
//!                    ▼  per volume
//!   BuildTopology ─► [active brick count] ─0─► release, next
//!        │ >0
//!        ▼
//!   InitLabels (ground plane + support volume below)
//!        ▼
//!   PropagateLabels ×batch ─► [change flag] ─changed && < cap─┐
//!        ▲                                                    │
//!        └────────────────────────────────────────────────────┘
//!        ▼ converged or capped
//!   CollectDebris ─► [count] ─>0─► [list] ─► IslandReport
//! ```
//!
//! Bracketed stages are asynchronous readbacks: the device answers on a
//! crossbeam channel and [`StructuralAnalyzer::pump`] resumes the pipeline
//! when they arrive. The kernels themselves sit behind the
//! [`LabelingDevice`] trait; [`CpuLabelingDevice`] is the host reference.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod analyzer;
pub mod config;
pub mod cpu;
pub mod device;
pub mod error;

pub use analyzer::{AnalysisStats, AnalysisTarget, IslandReport, StructuralAnalyzer};
pub use config::AnalyzerConfig;
pub use cpu::CpuLabelingDevice;
pub use device::{
    DebrisVoxel, DispatchParams, GroundSeed, LabelingDevice, Readback, ReadbackData,
    ReadbackRequest,
};
pub use error::{AnalysisError, DeviceError};
