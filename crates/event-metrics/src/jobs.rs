//! The reported metric set.
//!
//! Each job reads one or two products, restricts them to an ROI and the
//! event months, and writes one row of the metrics table. A job whose
//! inputs are missing, or whose data is too sparse, is skipped with a
//! warning and its row keeps its previous value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use region_mask::{MaskBuilder, RegionMask, RegionPolygon};
use terra_common::{BooleanField, GriddedField, MonthWindow, SpatialGrid, TerraError, TerraResult};

use crate::stats::{pixel_area_km2, MaskedStatistics};
use crate::table::{MetricsTable, UpdateOutcome};

/// One configured metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricJob {
    /// Masked mean LST anomaly over the event months.
    MeanLstAnomaly { roi: String },
    /// Event-month days above the baseline percentile threshold.
    HeatDays { roi: String },
    /// Mean of the July-August NDVI delta, optionally within an ROI.
    DeltaNdvi {
        #[serde(default)]
        roi: Option<String>,
    },
    /// Change in MNDWI water area between baseline and event.
    WaterAreaDelta { roi: String },
}

impl MetricJob {
    /// Row name in the metrics table.
    pub fn metric_name(&self) -> String {
        match self {
            MetricJob::MeanLstAnomaly { roi } => format!("mean_LST_anomaly_{}", roi),
            MetricJob::HeatDays { roi } => format!("heat_days_{}", roi),
            MetricJob::DeltaNdvi { .. } => "delta_ndvi".to_string(),
            MetricJob::WaterAreaDelta { roi } => format!("water_area_delta_km2_{}", roi),
        }
    }

    pub fn roi(&self) -> Option<&str> {
        match self {
            MetricJob::MeanLstAnomaly { roi } | MetricJob::HeatDays { roi } | MetricJob::WaterAreaDelta { roi } => {
                Some(roi)
            }
            MetricJob::DeltaNdvi { roi } => roi.as_deref(),
        }
    }
}

/// Products available to the jobs. Any of them may be absent.
#[derive(Debug, Clone, Default)]
pub struct MetricInputs {
    pub lst_anomaly: Option<GriddedField>,
    pub lst_event: Option<GriddedField>,
    pub lst_baseline: Option<GriddedField>,
    pub ndvi_delta: Option<GriddedField>,
    pub water_baseline: Option<BooleanField>,
    pub water_event: Option<BooleanField>,
}

/// Thresholds and windows shared by all jobs.
#[derive(Debug, Clone)]
pub struct MetricSettings {
    pub heat_percentile: f64,
    pub event_months: MonthWindow,
}

impl Default for MetricSettings {
    fn default() -> Self {
        Self {
            heat_percentile: 95.0,
            event_months: MonthWindow::july_august(),
        }
    }
}

/// Counts from one [`MetricRunner::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub updated: usize,
    pub skipped: usize,
    pub unknown: usize,
}

/// Result of one job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Value(f64),
    /// Not computed; `stage` names the missing input or empty step.
    Skipped { stage: &'static str, reason: String },
}

/// Runs metric jobs against a set of ROI polygons.
pub struct MetricRunner<'a> {
    rois: &'a BTreeMap<String, Vec<RegionPolygon>>,
    builder: MaskBuilder,
    settings: MetricSettings,
}

impl<'a> MetricRunner<'a> {
    pub fn new(rois: &'a BTreeMap<String, Vec<RegionPolygon>>, builder: MaskBuilder, settings: MetricSettings) -> Self {
        Self { rois, builder, settings }
    }

    /// Run every job and update its row.
    ///
    /// Skipped jobs leave their row untouched. Structural errors (grid
    /// mismatches, malformed fields) abort the run.
    pub fn run(&self, jobs: &[MetricJob], inputs: &MetricInputs, table: &mut MetricsTable) -> TerraResult<RunSummary> {
        let mut summary = RunSummary::default();
        for job in jobs {
            let metric = job.metric_name();
            match self.compute(job, inputs) {
                Ok(JobOutcome::Value(value)) => match table.update(&metric, Some(value)) {
                    UpdateOutcome::Updated => {
                        info!(metric = %metric, value, "Computed metric");
                        summary.updated += 1;
                    }
                    UpdateOutcome::UnknownMetric => summary.unknown += 1,
                },
                Ok(JobOutcome::Skipped { stage, reason }) => {
                    warn!(metric = %metric, stage, reason = %reason, "Skipping metric");
                    summary.skipped += 1;
                }
                Err(e) if e.is_structural() => {
                    error!(metric = %metric, error = %e, "Metric failed");
                    return Err(e);
                }
                Err(e) => {
                    warn!(metric = %metric, kind = e.kind(), error = %e, "Skipping metric");
                    summary.skipped += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Compute one job without touching the table.
    pub fn compute(&self, job: &MetricJob, inputs: &MetricInputs) -> TerraResult<JobOutcome> {
        match job {
            MetricJob::MeanLstAnomaly { roi } => {
                let Some(anomaly) = inputs.lst_anomaly.as_ref() else {
                    return Ok(skipped("load", "LST anomaly product is missing"));
                };
                let anomaly = self.event_window(anomaly)?;
                let mask = self.mask(roi, anomaly.grid())?;
                match MaskedStatistics::new(Some(&mask)).mean(&anomaly)? {
                    Some(mean) => Ok(JobOutcome::Value(mean)),
                    None => Ok(skipped("mean", "no anomaly samples inside the ROI")),
                }
            }
            MetricJob::HeatDays { roi } => {
                let (Some(baseline), Some(event)) = (inputs.lst_baseline.as_ref(), inputs.lst_event.as_ref()) else {
                    return Ok(skipped("load", "LST baseline or event series is missing"));
                };
                let baseline = self.event_window(baseline)?;
                let event = self.event_window(event)?;
                let mask = self.mask(roi, baseline.grid())?;
                let stats = MaskedStatistics::new(Some(&mask));

                let threshold = match stats.percentile(&baseline, self.settings.heat_percentile) {
                    Ok(t) => t,
                    Err(TerraError::InsufficientData(reason)) => return Ok(skipped("threshold", reason)),
                    Err(e) => return Err(e),
                };
                let days = stats.exceedance_count(&event, threshold)?;
                info!(roi = %roi, threshold, days, "Heat days against baseline threshold");
                Ok(JobOutcome::Value(days as f64))
            }
            MetricJob::DeltaNdvi { roi } => {
                let Some(delta) = inputs.ndvi_delta.as_ref() else {
                    return Ok(skipped("load", "NDVI delta product is missing"));
                };
                let mask = match roi {
                    Some(roi) => Some(self.mask(roi, delta.grid())?),
                    None => None,
                };
                match MaskedStatistics::new(mask.as_ref()).mean(delta)? {
                    Some(mean) => Ok(JobOutcome::Value(mean)),
                    None => Ok(skipped("mean", "NDVI delta has no valid samples in scope")),
                }
            }
            MetricJob::WaterAreaDelta { roi } => {
                let (Some(before), Some(after)) = (inputs.water_baseline.as_ref(), inputs.water_event.as_ref()) else {
                    return Ok(skipped("load", "water classification is missing"));
                };
                let mask = self.mask(roi, before.grid())?;
                let pixel_area = pixel_area_km2(before.grid())?;
                let delta = MaskedStatistics::new(Some(&mask)).area_delta(before, after, pixel_area)?;
                Ok(JobOutcome::Value(delta))
            }
        }
    }

    fn mask(&self, roi: &str, grid: &SpatialGrid) -> TerraResult<RegionMask> {
        let polygons = self
            .rois
            .get(roi)
            .ok_or_else(|| TerraError::invalid_parameter("roi", format!("no ROI named '{}' is configured", roi)))?;
        self.builder.build(polygons, grid)
    }

    fn event_window(&self, field: &GriddedField) -> TerraResult<GriddedField> {
        if field.time_axis().is_some() {
            field.select_months(&self.settings.event_months)
        } else {
            Ok(field.clone())
        }
    }
}

fn skipped(stage: &'static str, reason: impl Into<String>) -> JobOutcome {
    JobOutcome::Skipped {
        stage,
        reason: reason.into(),
    }
}
