//! Masked statistics, metrics table persistence and metric jobs.

use std::collections::BTreeMap;

use chrono::{Datelike, TimeZone, Utc};

use anomaly_engine::{AnomalyAligner, ClimatologyBuilder};
use event_metrics::{
    pixel_area_km2, JobOutcome, MaskedStatistics, MetricInputs, MetricJob, MetricRunner, MetricSettings,
    MetricsTable, UpdateOutcome,
};
use region_mask::{MaskBuilder, MaskStrategy, RegionMask, RegionPolygon};
use terra_common::{Axis, BooleanField, GriddedField, SpatialGrid};
use test_utils::{
    assert_approx_eq, create_constant_series, create_spatial_field, daily_dates, fixtures, grid_from_spec,
    temp_test_dir,
};

fn four_by_four() -> SpatialGrid {
    grid_from_spec(&fixtures::grid::FOUR_BY_FOUR)
}

fn unit_square_mask(grid: &SpatialGrid) -> RegionMask {
    let (x0, y0, x1, y1) = fixtures::region::UNIT_SQUARE;
    let square = RegionPolygon::rectangle(x0, y0, x1, y1).unwrap();
    MaskBuilder::new(MaskStrategy::Indexed).build(&[square], grid).unwrap()
}

fn row(values: &[f32]) -> GriddedField {
    let lons = (0..values.len()).map(|i| 20.0 + i as f64).collect();
    let grid = SpatialGrid::geographic(vec![50.0], lons).unwrap();
    create_spatial_field("values", &grid, values.to_vec())
}

// ============================================================================
// Masked statistics
// ============================================================================

#[test]
fn test_median_of_five() {
    let stats = MaskedStatistics::new(None);
    assert_eq!(stats.percentile(&row(&[1.0, 2.0, 3.0, 4.0, 5.0]), 50.0).unwrap(), 3.0);
}

#[test]
fn test_percentile_over_empty_scope() {
    let grid = four_by_four();
    let field = create_spatial_field("lst", &grid, vec![300.0; 16]);
    let far_away = RegionPolygon::rectangle(0.0, 0.0, 1.0, 1.0).unwrap();
    let mask = MaskBuilder::default().build(&[far_away], &grid).unwrap();

    let stats = MaskedStatistics::new(Some(&mask));
    assert_eq!(stats.percentile(&field, 95.0).unwrap_err().kind(), "InsufficientData");
    assert_eq!(stats.mean(&field).unwrap(), None);

    let all_nan = row(&[f32::NAN, f32::NAN]);
    let err = MaskedStatistics::new(None).percentile(&all_nan, 50.0).unwrap_err();
    assert_eq!(err.kind(), "InsufficientData");
}

#[test]
fn test_exceedance_is_strict() {
    let stats = MaskedStatistics::new(None);
    assert_eq!(stats.exceedance_count(&row(&[10.0, 20.0, 30.0]), 15.0).unwrap(), 2);
    assert_eq!(stats.exceedance_count(&row(&[10.0, 20.0, 30.0]), 20.0).unwrap(), 1);
}

#[test]
fn test_masked_mean_uses_inside_cells_only() {
    let grid = four_by_four();
    let field = create_spatial_field("lst", &grid, (0..16).map(|v| v as f32).collect());
    let mask = unit_square_mask(&grid);

    // square corners sit on cells (1,1) (1,2) (2,1) (2,2)
    let mean = MaskedStatistics::new(Some(&mask)).mean(&field).unwrap().unwrap();
    assert_approx_eq!(mean, 7.5, 1e-12);
    assert_approx_eq!(MaskedStatistics::new(None).mean(&field).unwrap().unwrap(), 7.5, 1e-12);
}

#[test]
fn test_exceedance_counts_every_time_step() {
    let grid = four_by_four();
    let dates = daily_dates(2024..=2024, Some(&[7]));
    let mut values = Vec::new();
    for date in &dates {
        let v = if date.day() % 2 == 0 { 310.0 } else { 300.0 };
        values.extend(std::iter::repeat(v).take(grid.len()));
    }
    let series = GriddedField::new("lst", vec![Axis::time("time", dates).unwrap()], grid.clone(), values).unwrap();
    let mask = unit_square_mask(&grid);

    // 15 even days in July, 4 cells inside the square
    let count = MaskedStatistics::new(Some(&mask)).exceedance_count(&series, 305.0).unwrap();
    assert_eq!(count, 15 * 4);
}

#[test]
fn test_mask_on_other_grid_is_rejected() {
    let grid = four_by_four();
    let mask = unit_square_mask(&grid);
    let other = create_spatial_field("lst", &grid_from_spec(&fixtures::grid::ONE_DEGREE_50N), vec![1.0; 25]);
    let err = MaskedStatistics::new(Some(&mask)).mean(&other).unwrap_err();
    assert_eq!(err.kind(), "CoordinateSystemMismatch");
}

#[test]
fn test_one_degree_pixel_area_near_50n() {
    let grid = grid_from_spec(&fixtures::grid::ONE_DEGREE_50N);
    let area = pixel_area_km2(&grid).unwrap();
    assert!((area - 7967.0).abs() / 7967.0 < 0.01, "area {}", area);

    let before = BooleanField::new("water_before", grid.clone(), vec![false; 25]).unwrap();
    let mut cells = vec![false; 25];
    cells[12] = true;
    let after = BooleanField::new("water_after", grid, cells).unwrap();

    let delta = MaskedStatistics::new(None).area_delta(&before, &after, area).unwrap();
    assert!((delta - 7967.0).abs() / 7967.0 < 0.01, "delta {}", delta);
    let shrink = MaskedStatistics::new(None).area_delta(&after, &before, area).unwrap();
    assert_approx_eq!(shrink, -delta, 1e-9);
}

#[test]
fn test_area_delta_respects_mask() {
    let grid = four_by_four();
    let mask = unit_square_mask(&grid);
    let before = BooleanField::new("before", grid.clone(), vec![false; 16]).unwrap();
    // cell (0,0) is outside the square, (1,1) inside
    let mut cells = vec![false; 16];
    cells[0] = true;
    cells[5] = true;
    let after = BooleanField::new("after", grid, cells).unwrap();

    let delta = MaskedStatistics::new(Some(&mask)).area_delta(&before, &after, 2.0).unwrap();
    assert_eq!(delta, 2.0);
}

// ============================================================================
// Metrics table
// ============================================================================

#[test]
fn test_table_round_trip_and_unknown_metric() {
    let dir = temp_test_dir();
    let path = dir.path().join("docs").join("metrics.csv");

    let mut table = MetricsTable::from_template(["mean_LST_anomaly_ukraine", "delta_ndvi"]);
    let at = Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap();
    assert_eq!(table.update_at("delta_ndvi", Some(-0.0425), at), UpdateOutcome::Updated);
    assert_eq!(table.update("heat_days_nowhere", Some(3.0)), UpdateOutcome::UnknownMetric);
    table.save(&path).unwrap();

    let loaded = MetricsTable::load(&path).unwrap();
    assert_eq!(loaded, table);
    assert_eq!(loaded.rows().len(), 2);
    assert_eq!(loaded.value("mean_LST_anomaly_ukraine"), None);
    assert_eq!(loaded.get("delta_ndvi").unwrap().updated_at, Some(at));
}

#[test]
fn test_load_missing_table() {
    let dir = temp_test_dir();
    let err = MetricsTable::load(dir.path().join("absent.csv")).unwrap_err();
    assert_eq!(err.kind(), "Storage");
}

// ============================================================================
// Metric jobs
// ============================================================================

fn rois() -> BTreeMap<String, Vec<RegionPolygon>> {
    let (x0, y0, x1, y1) = fixtures::region::UNIT_SQUARE;
    BTreeMap::from([("square".to_string(), vec![RegionPolygon::rectangle(x0, y0, x1, y1).unwrap()])])
}

fn jobs() -> Vec<MetricJob> {
    vec![
        MetricJob::MeanLstAnomaly { roi: "square".into() },
        MetricJob::HeatDays { roi: "square".into() },
        MetricJob::DeltaNdvi { roi: None },
        MetricJob::WaterAreaDelta { roi: "square".into() },
    ]
}

fn template() -> MetricsTable {
    MetricsTable::from_template(jobs().iter().map(MetricJob::metric_name))
}

#[test]
fn test_missing_inputs_leave_rows_untouched() {
    let rois = rois();
    let runner = MetricRunner::new(&rois, MaskBuilder::default(), MetricSettings::default());
    let mut table = template();
    let at = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();
    table.update_at("heat_days_square", Some(12.0), at);

    let summary = runner.run(&jobs(), &MetricInputs::default(), &mut table).unwrap();
    assert_eq!((summary.updated, summary.skipped), (0, 4));
    assert_eq!(table.value("heat_days_square"), Some(12.0));
    assert_eq!(table.get("heat_days_square").unwrap().updated_at, Some(at));
    assert!(table.get("delta_ndvi").unwrap().updated_at.is_none());
}

#[test]
fn test_unknown_roi_is_skipped() {
    let rois = rois();
    let runner = MetricRunner::new(&rois, MaskBuilder::default(), MetricSettings::default());
    let inputs = MetricInputs {
        lst_anomaly: Some(create_constant_series(
            &four_by_four(),
            &daily_dates(2024..=2024, Some(&[7])),
            1.0,
        )),
        ..MetricInputs::default()
    };
    let job = MetricJob::MeanLstAnomaly { roi: "atlantis".into() };
    let mut table = MetricsTable::from_template([job.metric_name()]);
    let summary = runner.run(&[job], &inputs, &mut table).unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(table.value("mean_LST_anomaly_atlantis"), None);
}

#[test]
fn test_metric_set_end_to_end() {
    let grid = four_by_four();
    let baseline = create_constant_series(&grid, &daily_dates(2018..=2019, Some(&[7, 8])), 300.0);

    // June is outside the event window and must not count
    let event_dates = daily_dates(2024..=2024, Some(&[6, 7, 8]));
    let mut values = Vec::new();
    for date in &event_dates {
        let v = match date.month() {
            6 => 400.0,
            7 => 300.0,
            _ => 310.0,
        };
        values.extend(std::iter::repeat(v).take(grid.len()));
    }
    let event = GriddedField::new(
        "lst",
        vec![Axis::time("time", event_dates).unwrap()],
        grid.clone(),
        values,
    )
    .unwrap();

    let clim = ClimatologyBuilder::new().build(&baseline, &[2018, 2019].into()).unwrap();
    let anomaly = AnomalyAligner::new().align(&event, &clim).unwrap().field;

    let ndvi_delta = create_spatial_field("ndvi_delta", &grid, vec![-0.05; 16]);
    let water_before = BooleanField::new("water", grid.clone(), vec![false; 16]).unwrap();
    let mut wet = vec![false; 16];
    wet[5] = true;
    wet[6] = true;
    let water_after = BooleanField::new("water", grid.clone(), wet).unwrap();

    let inputs = MetricInputs {
        lst_anomaly: Some(anomaly),
        lst_event: Some(event),
        lst_baseline: Some(baseline),
        ndvi_delta: Some(ndvi_delta),
        water_baseline: Some(water_before),
        water_event: Some(water_after),
    };

    let rois = rois();
    let runner = MetricRunner::new(&rois, MaskBuilder::default(), MetricSettings::default());
    let mut table = template();
    let summary = runner.run(&jobs(), &inputs, &mut table).unwrap();
    assert_eq!(summary.updated, 4);

    // July anomalies are 0, August 10 except 31 August (no baseline key)
    assert_approx_eq!(table.value("mean_LST_anomaly_square").unwrap(), 300.0 / 61.0, 1e-6);
    // threshold is 300; every August day in the 4 square cells exceeds it
    assert_eq!(table.value("heat_days_square"), Some(31.0 * 4.0));
    assert_approx_eq!(table.value("delta_ndvi").unwrap(), -0.05, 1e-6);

    let area = pixel_area_km2(&grid).unwrap();
    assert_approx_eq!(table.value("water_area_delta_km2_square").unwrap(), 2.0 * area, 1e-6);
}

#[test]
fn test_job_outcome_names_stage() {
    let rois = rois();
    let runner = MetricRunner::new(&rois, MaskBuilder::default(), MetricSettings::default());
    let outcome = runner
        .compute(&MetricJob::HeatDays { roi: "square".into() }, &MetricInputs::default())
        .unwrap();
    assert!(matches!(outcome, JobOutcome::Skipped { stage: "load", .. }));
}

#[test]
fn test_jobs_deserialize_from_yaml_shape() {
    let job: MetricJob = serde_json::from_str(r#"{"kind": "water_area_delta", "roi": "danube"}"#).unwrap();
    assert_eq!(job.metric_name(), "water_area_delta_km2_danube");
    let job: MetricJob = serde_json::from_str(r#"{"kind": "delta_ndvi"}"#).unwrap();
    assert_eq!(job, MetricJob::DeltaNdvi { roi: None });
}
