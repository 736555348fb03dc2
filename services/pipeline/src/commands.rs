//! Pipeline stages.
//!
//! Each stage reads its inputs from the configured paths, runs one library
//! operation and writes its product. `run_all` chains them.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use anomaly_engine::{indices, monthly_anomaly, period_delta, AnomalyAligner, ClimatologyBuilder};
use event_metrics::distribution::DEFAULT_BINS;
use event_metrics::{DistributionShift, MetricInputs, MetricRunner, MetricsTable, RunSummary};
use region_mask::{RegionMask, RegionPolygon, RoiFeatureCollection};

use crate::config::PipelineConfig;
use crate::field_io;

/// Stack dated slice documents from `dir` into one series at `output`.
pub fn stack(dir: &Path, name: &str, scale_factor: Option<f64>, output: &Path) -> Result<()> {
    let series = field_io::stack_directory(dir, name, scale_factor)?;
    field_io::write_field(output, &series)
}

/// Stack LST slices, falling back to the configuration for each argument
/// left unset: `paths.lst_slices`, `paths.lst_series` and
/// `thresholds.lst_scale_factor`. A slice that declares its own scale
/// factor keeps it.
pub fn stack_lst_with(
    config: &PipelineConfig,
    input: Option<&Path>,
    output: Option<&Path>,
    name: &str,
    scale_factor: Option<f64>,
) -> Result<()> {
    let dir = match input {
        Some(dir) => dir,
        None => config
            .paths
            .lst_slices
            .as_deref()
            .context("paths.lst_slices is not configured and no input was given")?,
    };
    let output = output.unwrap_or(config.paths.lst_series.as_path());
    let scale = scale_factor.unwrap_or(config.thresholds.lst_scale_factor);
    stack(dir, name, Some(scale), output)
}

/// Stack the configured LST slice directory into `paths.lst_series`.
pub fn stack_lst(config: &PipelineConfig) -> Result<()> {
    stack_lst_with(config, None, None, "lst", None)
}

/// Stack the configured raw NDVI slices into `paths.ndvi_series`, applying
/// `thresholds.ndvi_scale_factor`. The stored series is already scaled.
pub fn stack_ndvi(config: &PipelineConfig) -> Result<()> {
    let dir = config
        .paths
        .ndvi_slices
        .as_deref()
        .context("paths.ndvi_slices is not configured")?;
    let output = config
        .paths
        .ndvi_series
        .as_deref()
        .context("paths.ndvi_series is not configured")?;
    stack(dir, "ndvi", Some(config.thresholds.ndvi_scale_factor), output)
}

/// Day-of-year climatology of the LST series over the baseline years.
pub fn climatology(config: &PipelineConfig) -> Result<()> {
    let series = field_io::read_field(&config.paths.lst_series, None).context("Loading LST series")?;
    let clim = ClimatologyBuilder::new()
        .build(&series, &config.baseline.years())
        .context("Building LST climatology")?;
    let missing = clim.missing_keys();
    if !missing.is_empty() {
        info!(keys = missing.len(), "Day-of-year keys without baseline samples");
    }
    field_io::write_climatology(&config.paths.lst_climatology, &clim)
}

/// Event-year LST anomalies against the stored climatology.
pub fn anomalies(config: &PipelineConfig) -> Result<()> {
    let series = field_io::read_field(&config.paths.lst_series, None).context("Loading LST series")?;
    let event = series
        .select_years(&BTreeSet::from([config.event_year]))
        .context("Selecting event year")?;
    let clim = field_io::read_climatology(&config.paths.lst_climatology).context("Loading LST climatology")?;

    let result = AnomalyAligner::new()
        .align(&event, &clim)
        .context("Aligning event series with climatology")?;
    if let Some(first) = result.missing_keys.first() {
        warn!(dates = result.missing_keys.len(), first = %first, "Event dates without climatology");
    }
    field_io::write_field(&config.paths.lst_anomaly, &result.field)
}

/// Rasterize an ROI on the grid of the field at `field_path`.
pub fn mask(config: &PipelineConfig, roi: &str, field_path: &Path, output: &Path) -> Result<()> {
    let field = field_io::read_field(field_path, None)?;
    let polygons = load_roi(config, roi)?;
    let mask = config
        .mask
        .builder()
        .build(&polygons, field.grid())
        .with_context(|| format!("Building mask for ROI '{}'", roi))?;
    info!(roi, coverage = mask_coverage(&mask), "ROI mask");
    field_io::write_mask(output, &mask)
}

/// NDVI and MNDWI period deltas, water classification and the monthly
/// large-area anomaly, for whichever inputs are configured and present.
/// A configured input that does not exist skips its sub-stage with a warning.
pub fn seasonal(config: &PipelineConfig) -> Result<()> {
    let months = &config.periods.event_months;
    let paths = &config.paths;

    if let (Some(input), Some(output)) = (&paths.ndvi_series, &paths.ndvi_delta) {
        if inputs_present("ndvi_delta", &[input]) {
            let ndvi = field_io::read_field(input, None).context("Loading NDVI")?;
            let delta = period_delta(&ndvi, &config.baseline, config.event_year, months).context("NDVI delta")?;
            field_io::write_field(output, &delta.delta)?;
        }
    }

    if let (Some(green), Some(swir1)) = (&paths.green_series, &paths.swir1_series) {
        if inputs_present("mndwi", &[green, swir1]) {
            let green = field_io::read_field(green, None).context("Loading green band")?;
            let swir1 = field_io::read_field(swir1, None).context("Loading SWIR1 band")?;
            let mndwi = indices::mndwi(&green, &swir1).context("Computing MNDWI")?;
            let delta = period_delta(&mndwi, &config.baseline, config.event_year, months).context("MNDWI delta")?;

            if let Some(output) = &paths.mndwi_delta {
                field_io::write_field(output, &delta.delta)?;
            }
            let threshold = config.thresholds.mndwi_water;
            if let Some(output) = &paths.water_baseline {
                let water = indices::classify_water(&delta.baseline_mean, threshold)?;
                field_io::write_boolean(output, &water)?;
            }
            if let Some(output) = &paths.water_event {
                let water = indices::classify_water(&delta.event_mean, threshold)?;
                field_io::write_boolean(output, &water)?;
            }
        }
    }

    if let (Some(input), Some(output)) = (&paths.global_lst_series, &paths.global_anomaly) {
        if inputs_present("global_anomaly", &[input]) {
            let global = field_io::read_field(input, None).context("Loading global LST")?;
            let month = config.periods.global_focus_month;
            let anomaly = monthly_anomaly(&global, &config.baseline, config.event_year, month)
                .with_context(|| format!("Monthly anomaly for month {}", month))?;
            field_io::write_field(output, &anomaly.delta.with_name("lst_month_anomaly"))?;
        }
    }

    Ok(())
}

/// True when every input exists; otherwise warn and report the first gap.
fn inputs_present(stage: &str, inputs: &[&PathBuf]) -> bool {
    match inputs.iter().find(|path| !path.exists()) {
        Some(missing) => {
            warn!(stage, path = %missing.display(), "Input not found; skipping");
            false
        }
        None => true,
    }
}

/// Baseline vs event LST histogram over the event months.
pub fn distribution(config: &PipelineConfig) -> Result<DistributionShift> {
    let series = field_io::read_field(&config.paths.lst_series, None).context("Loading LST series")?;
    let window = series.select_months(&config.periods.event_months)?;
    let baseline = window.select_years(&config.baseline.years())?;
    let event = window.select_years(&BTreeSet::from([config.event_year]))?;

    let shift = DistributionShift::compute(baseline.values(), event.values(), DEFAULT_BINS)
        .context("Computing distribution shift")?;
    shift.save_csv(&config.paths.histogram_csv)?;
    info!(mean_shift = ?shift.mean_shift, tail_shift = ?shift.tail_shift, "Distribution shift");
    Ok(shift)
}

/// Compute the configured metrics and update the metrics table.
///
/// A missing table is created from the configured metric names.
pub fn metrics(config: &PipelineConfig) -> Result<RunSummary> {
    let path = &config.paths.metrics_csv;
    let mut table = if path.exists() {
        MetricsTable::load(path)?
    } else {
        warn!(path = %path.display(), "Metrics table not found; creating it from the configured jobs");
        MetricsTable::from_template(config.metrics.iter().map(|job| job.metric_name()))
    };

    let lst_series = field_io::read_optional_field(Some(config.paths.lst_series.as_path()))?;
    let inputs = MetricInputs {
        lst_anomaly: field_io::read_optional_field(Some(config.paths.lst_anomaly.as_path()))?,
        lst_event: lst_series
            .as_ref()
            .map(|s| s.select_years(&BTreeSet::from([config.event_year])))
            .transpose()?,
        lst_baseline: lst_series
            .as_ref()
            .map(|s| s.select_years(&config.baseline.years()))
            .transpose()?,
        ndvi_delta: field_io::read_optional_field(config.paths.ndvi_delta.as_deref())?,
        water_baseline: field_io::read_optional_boolean(config.paths.water_baseline.as_deref())?,
        water_event: field_io::read_optional_boolean(config.paths.water_event.as_deref())?,
    };

    let rois = load_rois(config)?;
    let runner = MetricRunner::new(&rois, config.mask.builder(), config.metric_settings());
    let summary = runner.run(&config.metrics, &inputs, &mut table).context("Running metric jobs")?;
    table.save(path)?;

    info!(
        updated = summary.updated,
        skipped = summary.skipped,
        unknown = summary.unknown,
        "Metrics updated"
    );
    Ok(summary)
}

/// Every stage in order. Optional stages without inputs are skipped.
pub fn run_all(config: &PipelineConfig) -> Result<RunSummary> {
    let start = Instant::now();

    if let Some(dir) = &config.paths.lst_slices {
        if inputs_present("stack_lst", &[dir]) {
            stack_lst(config)?;
        }
    }
    if let (Some(dir), Some(_)) = (&config.paths.ndvi_slices, &config.paths.ndvi_series) {
        if inputs_present("stack_ndvi", &[dir]) {
            stack_ndvi(config)?;
        }
    }
    climatology(config)?;
    anomalies(config)?;
    seasonal(config)?;
    if let Err(e) = distribution(config) {
        warn!(error = %format!("{:#}", e), "Skipping distribution histogram");
    }
    let summary = metrics(config)?;

    info!(elapsed_ms = start.elapsed().as_millis() as u64, "Pipeline finished");
    Ok(summary)
}

fn load_roi(config: &PipelineConfig, roi: &str) -> Result<Vec<RegionPolygon>> {
    let path = config
        .rois
        .get(roi)
        .with_context(|| format!("ROI '{}' is not configured", roi))?;
    let polygons = RoiFeatureCollection::load(path)
        .and_then(|c| c.to_polygons())
        .with_context(|| format!("Loading ROI '{}' from {:?}", roi, path))?;
    Ok(polygons)
}

/// Polygons of every ROI referenced by a metric job.
fn load_rois(config: &PipelineConfig) -> Result<BTreeMap<String, Vec<RegionPolygon>>> {
    let mut rois = BTreeMap::new();
    for name in config.metrics.iter().filter_map(|job| job.roi()) {
        if !rois.contains_key(name) {
            rois.insert(name.to_string(), load_roi(config, name)?);
        }
    }
    Ok(rois)
}

/// Fraction of grid cells a mask selects.
fn mask_coverage(mask: &RegionMask) -> f64 {
    let total = mask.cells().len();
    if total == 0 {
        0.0
    } else {
        mask.inside_count() as f64 / total as f64
    }
}
