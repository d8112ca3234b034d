//! End-to-end tests of the per-timestep pipeline with a mock regridder.

mod common;

use common::{frame_value, hrrr_file, single_product_states, MockRegridder, RegridCall};
use forcing_engine::{
    AuxiliaryInputs, CycleBracketResolver, DomainDecomposition, ErrorCategory, ForcingConfig,
    ForcingEngine, ForcingError, ForcingPostProcessor, ForcingState, FrameSlot, OutputClock,
    PassThrough, ProductKey, ProductOutcome,
};
use test_utils::fixtures::times::{at, reference_cycle};
use test_utils::fixtures::grid::TINY;
use test_utils::{assert_frame_approx_eq, constant_frame, InputTree};

fn engine(
    key: ProductKey,
    tree: &InputTree,
    interpolation: u8,
    regridder: MockRegridder,
) -> ForcingEngine<CycleBracketResolver, MockRegridder, PassThrough> {
    let (grid, states) = single_product_states(key, tree, interpolation);
    ForcingEngine::new(
        states,
        grid,
        DomainDecomposition::serial(),
        CycleBracketResolver::new(reference_cycle()),
        regridder,
        PassThrough,
    )
}

fn hrrr_tree(hours: &[u32]) -> InputTree {
    let tree = InputTree::new();
    for &fhr in hours {
        tree.touch(&hrrr_file(fhr));
    }
    tree
}

/// Every cell of the HRRR output equals `value`.
fn assert_hrrr_output(
    engine: &ForcingEngine<CycleBracketResolver, MockRegridder, PassThrough>,
    value: f64,
) {
    let expected = constant_frame(engine.grid().forcing_shape(), value);
    assert_frame_approx_eq!(engine.final_forcings(ProductKey::Hrrr).unwrap(), expected, 1e-9);
}

#[test]
fn test_weighted_average_between_frames() {
    let tree = hrrr_tree(&[0, 1, 2]);
    let mut engine = engine(ProductKey::Hrrr, &tree, 2, MockRegridder::default());

    let report = engine.step(at(0, 30)).unwrap();
    assert_eq!(
        report.outcome(ProductKey::Hrrr),
        Some(&ProductOutcome::Assembled { regridded_frames: 2 })
    );

    let expected = 0.5 * frame_value(at(0, 0)) + 0.5 * frame_value(at(1, 0));
    assert_hrrr_output(&engine, expected);
}

#[test]
fn test_unchanged_bracket_is_not_regridded() {
    let tree = hrrr_tree(&[0, 1]);
    let regridder = MockRegridder::default();
    let mut engine = engine(ProductKey::Hrrr, &tree, 2, regridder.clone());

    engine.step(at(0, 15)).unwrap();
    let report = engine.step(at(0, 45)).unwrap();
    assert_eq!(
        report.outcome(ProductKey::Hrrr),
        Some(&ProductOutcome::Assembled { regridded_frames: 0 })
    );
    assert_eq!(regridder.calls().len(), 2);

    // At the next frame's valid time the output equals that frame.
    engine.step(at(1, 0)).unwrap();
    assert_eq!(regridder.calls().len(), 2);
    assert_hrrr_output(&engine, frame_value(at(1, 0)));
}

#[test]
fn test_advancing_bracket_regrids_only_next_frame() {
    let tree = hrrr_tree(&[0, 1, 2]);
    let regridder = MockRegridder::default();
    let mut engine = engine(ProductKey::Hrrr, &tree, 2, regridder.clone());

    engine.step(at(0, 30)).unwrap();
    let report = engine.step(at(1, 30)).unwrap();
    assert_eq!(
        report.outcome(ProductKey::Hrrr),
        Some(&ProductOutcome::Assembled { regridded_frames: 1 })
    );

    let calls = regridder.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(
        calls[2],
        RegridCall {
            product: ProductKey::Hrrr,
            slot: FrameSlot::Next,
            valid_time: at(2, 0),
        }
    );

    let expected = 0.5 * frame_value(at(1, 0)) + 0.5 * frame_value(at(2, 0));
    assert_hrrr_output(&engine, expected);
}

#[test]
fn test_missing_input_skips_product() {
    let tree = hrrr_tree(&[0]);
    let regridder = MockRegridder::default();
    let mut engine = engine(ProductKey::Hrrr, &tree, 2, regridder.clone()).with_missing_value(-9999.0);

    let report = engine.step(at(0, 30)).unwrap();
    match report.outcome(ProductKey::Hrrr) {
        Some(ProductOutcome::Skipped { missing }) => {
            assert_eq!(missing, &vec![tree.path().join(hrrr_file(1))]);
        }
        other => panic!("expected Skipped, got {:?}", other),
    }
    assert_eq!(report.skipped(), 1);
    assert!(regridder.calls().is_empty());
    assert_hrrr_output(&engine, -9999.0);

    // The file arrives; the same output time now assembles.
    tree.touch(&hrrr_file(1));
    let report = engine.step(at(0, 30)).unwrap();
    assert_eq!(
        report.outcome(ProductKey::Hrrr),
        Some(&ProductOutcome::Assembled { regridded_frames: 2 })
    );
}

#[test]
fn test_nearest_neighbor_picks_closer_frame() {
    let tree = hrrr_tree(&[0, 1]);
    let mut engine = engine(ProductKey::Hrrr, &tree, 1, MockRegridder::default());

    engine.step(at(0, 20)).unwrap();
    assert_hrrr_output(&engine, frame_value(at(0, 0)));

    engine.step(at(0, 30)).unwrap();
    assert_hrrr_output(&engine, frame_value(at(1, 0)));
}

#[test]
fn test_no_interpolation_uses_next_frame() {
    let tree = hrrr_tree(&[0, 1]);
    let mut engine = engine(ProductKey::Hrrr, &tree, 0, MockRegridder::default());

    engine.step(at(0, 10)).unwrap();
    assert_hrrr_output(&engine, frame_value(at(1, 0)));
}

#[test]
fn test_regrid_failure_aborts_step() {
    let tree = hrrr_tree(&[0, 1]);
    let mut engine = engine(ProductKey::Hrrr, &tree, 2, MockRegridder::failing());

    let err = engine.step(at(0, 30)).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Processing);
    assert!(!engine.state(ProductKey::Hrrr).unwrap().regrid_complete());
}

/// Rejects every product, as a downscaler missing its terrain would.
struct RejectAll;

impl ForcingPostProcessor for RejectAll {
    fn apply(
        &mut self,
        state: &mut ForcingState,
        _auxiliary: &AuxiliaryInputs,
    ) -> forcing_engine::Result<()> {
        Err(ForcingError::PostProcess {
            product: state.name().to_string(),
            reason: "terrain height not loaded".to_string(),
        })
    }
}

#[test]
fn test_post_process_failure_aborts_step() {
    let tree = hrrr_tree(&[0, 1]);
    let (grid, states) = single_product_states(ProductKey::Hrrr, &tree, 2);
    let mut engine = ForcingEngine::new(
        states,
        grid,
        DomainDecomposition::serial(),
        CycleBracketResolver::new(reference_cycle()),
        MockRegridder::default(),
        RejectAll,
    );

    let err = engine.step(at(0, 30)).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Processing);
    assert!(err.to_string().contains("terrain height not loaded"), "{}", err);
}

#[test]
fn test_products_processed_in_key_order() {
    let tree = hrrr_tree(&[0, 1]);
    tree.touch("gfs.20240115/00/gfs.t00z.pgrb2.0p50.f000");
    tree.touch("gfs.20240115/00/gfs.t00z.pgrb2.0p50.f003");

    let yaml = format!(
        r#"
input_forcings: [5, 3]
input_dirs: ["{dir}", "{dir}"]
forecast_horizons: [1080, 14400]
cycle_offsets: [0, 0]
temporal_interpolation: [2, 0]
output_frequency_minutes: 60
grid:
  nx_global: 4
  ny_global: 3
"#,
        dir = tree.path().display()
    );
    let config = ForcingConfig::from_yaml_str(&yaml).unwrap();
    let grid = forcing_engine::GridMetadata::serial(TINY.0, TINY.1);
    let states = forcing_engine::init_forcings(&config, &grid).unwrap();
    let mut engine = ForcingEngine::new(
        states,
        grid,
        DomainDecomposition::serial(),
        CycleBracketResolver::new(reference_cycle()),
        MockRegridder::default(),
        PassThrough,
    );

    let report = engine.step(at(0, 30)).unwrap();
    let keys: Vec<ProductKey> = report.outcomes.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![ProductKey::Gfs, ProductKey::Hrrr]);
    assert_eq!(report.assembled(), 2);
}

#[test]
fn test_run_hands_assembled_fields_to_sink() {
    let tree = hrrr_tree(&[0, 1, 2]);
    let mut engine = engine(ProductKey::Hrrr, &tree, 2, MockRegridder::default());

    // 02:30 needs f03, which is missing.
    let clock = OutputClock::new(at(0, 30), at(2, 30), 60).unwrap();
    let mut delivered = Vec::new();
    let steps = engine
        .run(clock, |now, key, field| {
            assert_eq!(field.shape(), &[8, TINY.1, TINY.0]);
            delivered.push((now, key));
            Ok(())
        })
        .unwrap();

    assert_eq!(steps, 3);
    assert_eq!(
        delivered,
        vec![(at(0, 30), ProductKey::Hrrr), (at(1, 30), ProductKey::Hrrr)]
    );
}
