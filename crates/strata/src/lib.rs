//! Strata: sparse, editable voxel volumes on a shared paged arena, with
//! structural integrity analysis.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Strata sub-crates. For most users, adding `strata` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use strata::prelude::*;
//!
//! let config = WorldConfig {
//!     arena: ArenaConfig::new(16, 216 * 64),
//!     edits: EditConfig::new(1.0),
//!     ..WorldConfig::default()
//! };
//! let mut world = VoxelWorld::new(config, CpuLabelingDevice::new()).unwrap();
//! let id = world.create_volume(VolumeSpec::new([0.0; 3], 2)).unwrap();
//! world.set_ready(id, true).unwrap();
//!
//! // One solid voxel hanging in the air, a brick above the ground.
//! let mut brick = strata::types::passthrough_payload();
//! brick[strata::types::padded_index(2, 2, 2)] = Voxel::pack(1, -1.0, [0.0, 1.0, 0.0]);
//! world
//!     .apply_edits(&[EditRecord::from_brick(BrickCoord::new(0, 1, 0), &brick)])
//!     .unwrap();
//!
//! assert!(world.analyze(None));
//! let reports = world.pump().unwrap();
//! assert_eq!(reports.len(), 1);
//! assert_eq!(reports[0].volume, id);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `strata-core` | Voxel word, brick geometry, IDs |
//! | [`arena`] | `strata-arena` | Page and range allocators, `VolumePool` |
//! | [`edits`] | `strata-edits` | Multi-LOD edit database and downsampling |
//! | [`integrity`] | `strata-integrity` | Labeling device contract and the analyzer |
//! | [`persist`] | `strata-persist` | Gzip-block volume files |
//! | [`engine`] | `strata-engine` | `VoxelWorld` orchestration |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Voxel encoding and brick geometry (`strata-core`).
pub use strata_core as types;

/// Shared volume memory (`strata-arena`).
///
/// [`arena::VolumePool`] hands out [`arena::VolumeMemoryHandle`]s backed by
/// a fixed page pool and two best-fit range allocators.
pub use strata_arena as arena;

/// Persistent edits across LODs (`strata-edits`).
pub use strata_edits as edits;

/// Floating-island detection (`strata-integrity`).
///
/// Implement [`integrity::LabelingDevice`] to run the kernels on a GPU;
/// [`integrity::CpuLabelingDevice`] is the host reference.
pub use strata_integrity as integrity;

/// Volume files (`strata-persist`).
pub use strata_persist as persist;

/// World orchestration (`strata-engine`).
pub use strata_engine as engine;

/// Common imports for typical Strata usage.
///
/// ```rust
/// use strata::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use strata_core::{Aabb, BrickCoord, Voxel, VolumeId};

    // Arena
    pub use strata_arena::{ArenaConfig, VolumeMemoryHandle, VolumePool};

    // Edits
    pub use strata_edits::{EditConfig, EditDatabase, EditRecord};

    // Integrity
    pub use strata_integrity::{
        AnalyzerConfig, CpuLabelingDevice, IslandReport, LabelingDevice, StructuralAnalyzer,
    };

    // Engine
    pub use strata_engine::{DebrisPolicy, VolumeSpec, VoxelWorld, WorldConfig, WorldError};
}
