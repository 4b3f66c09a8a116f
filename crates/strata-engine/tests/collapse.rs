//! Integration test: a structure spanning two stacked volumes loses its
//! support one cut at a time.
//!
//! Volume A sits on the ground and holds a pillar. Volume B sits on top of
//! A and holds the pillar's continuation plus an overhang. Cutting the
//! pillar inside A first detaches A's top voxel; once that is carved away,
//! B no longer rests on anything and the next analysis reports all of it.

use strata_core::{padded_index, BrickCoord, Voxel, VolumeId};
use strata_edits::{EditConfig, EditRecord};
use strata_engine::{DebrisPolicy, VolumeSpec, VoxelWorld, WorldConfig};
use strata_arena::ArenaConfig;
use strata_integrity::{CpuLabelingDevice, IslandReport};
use strata_test_utils::{brick_with_solid, init_logging, voxel_word_index};

fn collapse_world() -> (VoxelWorld<CpuLabelingDevice>, VolumeId, VolumeId) {
    init_logging();
    let config = WorldConfig {
        arena: ArenaConfig {
            page_size: 64,
            total_pages: 8,
            page_table_capacity: 8,
            brick_data_capacity: 216 * 8,
        },
        edits: EditConfig::new(1.0),
        debris_policy: DebrisPolicy::Carve,
        ..WorldConfig::default()
    };
    let mut world = VoxelWorld::new(config, CpuLabelingDevice::new()).unwrap();
    let a = world.create_volume(VolumeSpec::new([0.0; 3], 1)).unwrap();
    let b = world
        .create_volume(VolumeSpec::new([0.0, 4.0, 0.0], 1))
        .unwrap();
    world.set_ready(a, true).unwrap();
    world.set_ready(b, true).unwrap();

    let pillar = brick_with_solid(&[[1, 0, 1], [1, 1, 1], [1, 2, 1], [1, 3, 1]], 2);
    let top = brick_with_solid(&[[1, 0, 1], [1, 1, 1], [2, 1, 1], [3, 1, 1]], 2);
    world
        .apply_edits(&[
            EditRecord::from_brick(BrickCoord::new(0, 0, 0), &pillar),
            EditRecord::from_brick(BrickCoord::new(0, 1, 0), &top),
        ])
        .unwrap();
    (world, a, b)
}

fn run(world: &mut VoxelWorld<CpuLabelingDevice>) -> Vec<IslandReport> {
    assert!(world.analyze(None));
    let reports = world.pump().unwrap();
    assert!(!world.is_analyzing());
    reports
}

fn sorted_positions(report: &IslandReport) -> Vec<[f32; 3]> {
    let mut positions: Vec<[f32; 3]> = report.positions().copied().collect();
    positions.sort_by(|p, q| p.partial_cmp(q).unwrap());
    positions
}

#[test]
fn intact_structure_is_stable() {
    let (mut world, _, _) = collapse_world();
    assert!(!world.is_analyzing(), "building edits do not trigger analysis");
    assert!(run(&mut world).is_empty());
}

#[test]
fn cutting_the_pillar_collapses_both_volumes_in_turn() {
    let (mut world, a, b) = collapse_world();

    // Cut voxel (1,2,1) out of the pillar, keeping the rest of the brick.
    let mut cut = Box::new(*world.edits().get(BrickCoord::new(0, 0, 0), 0).unwrap());
    cut[padded_index(2, 3, 2)] = Voxel::air();
    world
        .apply_edits(&[EditRecord::from_brick(BrickCoord::new(0, 0, 0), &cut)])
        .unwrap();
    assert!(world.is_analyzing(), "removing material requests analysis");

    // First pass: only A's top voxel is loose. B still rests on it.
    let reports = world.pump().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].volume, a);
    assert_eq!(sorted_positions(&reports[0]), vec![[1.5, 3.5, 1.5]]);

    // Carving removed it from the edits and from A.
    let stored = world.edits().get(BrickCoord::new(0, 0, 0), 0).unwrap();
    assert!(!stored[padded_index(2, 4, 2)].is_solid());
    let entry = world.volume(a).unwrap();
    let data = world.pool().brick_data(entry.handle()).unwrap();
    assert!(!Voxel(data[voxel_word_index(1, [1, 3, 1])]).is_solid());

    // Second pass: B has lost its support and falls as one island.
    let reports = run(&mut world);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].volume, b);
    assert_eq!(reports[0].islands.len(), 1);
    assert_eq!(
        sorted_positions(&reports[0]),
        vec![
            [1.5, 4.5, 1.5],
            [1.5, 5.5, 1.5],
            [2.5, 5.5, 1.5],
            [3.5, 5.5, 1.5],
        ]
    );

    // Third pass: what remains is grounded.
    assert!(run(&mut world).is_empty());
    assert_eq!(world.metrics().voxels_carved, 5);
    assert_eq!(world.metrics().islands_reported, 2);
    assert_eq!(world.analyzer().stats().volumes_failed, 0);
}

#[test]
fn unready_support_does_not_hold_volume_up() {
    let (mut world, a, b) = collapse_world();
    world.set_ready(a, false).unwrap();
    let reports = run(&mut world);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].volume, b);
}

#[test]
fn inactive_volume_is_skipped() {
    let (mut world, a, b) = collapse_world();
    world.set_active(b, false).unwrap();
    // Leave A's top voxel floating without triggering analysis through edits.
    let index = voxel_word_index(1, [1, 2, 1]);
    world.brick_data_mut(a).unwrap()[index] = Voxel::air().0;
    assert!(world.volume(a).unwrap().is_active());

    let reports = run(&mut world);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].volume, a);
    assert_eq!(world.analyzer().stats().volumes_analyzed, 1);
}
