//! Pipeline configuration.
//!
//! Every input and output location is part of the configuration; stages
//! whose optional paths are absent are skipped.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use event_metrics::{MetricJob, MetricSettings};
use region_mask::{MaskBuilder, MaskStrategy, SamplePosition};
use terra_common::{BaselineWindow, MonthWindow};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Inclusive baseline years
    pub baseline: BaselineWindow,

    /// Year of the extreme event
    pub event_year: i32,

    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    #[serde(default)]
    pub periods: PeriodsConfig,

    #[serde(default)]
    pub mask: MaskConfig,

    pub paths: PathsConfig,

    /// ROI name -> GeoJSON file
    #[serde(default)]
    pub rois: BTreeMap<String, PathBuf>,

    /// Metric jobs, in reporting order
    #[serde(default)]
    pub metrics: Vec<MetricJob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default = "default_heat_percentile")]
    pub heat_percentile: f64,

    /// MNDWI above this value is water
    #[serde(default)]
    pub mndwi_water: f32,

    #[serde(default = "default_lst_scale")]
    pub lst_scale_factor: f64,

    #[serde(default = "default_ndvi_scale")]
    pub ndvi_scale_factor: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            heat_percentile: default_heat_percentile(),
            mndwi_water: 0.0,
            lst_scale_factor: default_lst_scale(),
            ndvi_scale_factor: default_ndvi_scale(),
        }
    }
}

fn default_heat_percentile() -> f64 {
    95.0
}

fn default_lst_scale() -> f64 {
    0.02
}

fn default_ndvi_scale() -> f64 {
    0.0001
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodsConfig {
    /// Month of the large-area monthly anomaly
    #[serde(default = "default_focus_month")]
    pub global_focus_month: u32,

    #[serde(default = "MonthWindow::july_august")]
    pub event_months: MonthWindow,
}

impl Default for PeriodsConfig {
    fn default() -> Self {
        Self {
            global_focus_month: default_focus_month(),
            event_months: MonthWindow::july_august(),
        }
    }
}

fn default_focus_month() -> u32 {
    7
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaskConfig {
    #[serde(default)]
    pub strategy: MaskStrategy,

    #[serde(default)]
    pub sample_position: SamplePosition,
}

impl MaskConfig {
    pub fn builder(&self) -> MaskBuilder {
        MaskBuilder::new(self.strategy).with_sample_position(self.sample_position)
    }
}

/// Product locations. Relative paths are resolved against the directory
/// of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory of dated LST slice documents for `stack`
    #[serde(default)]
    pub lst_slices: Option<PathBuf>,
    pub lst_series: PathBuf,
    pub lst_climatology: PathBuf,
    pub lst_anomaly: PathBuf,

    /// Directory of dated raw NDVI slice documents, stacked into `ndvi_series`
    #[serde(default)]
    pub ndvi_slices: Option<PathBuf>,
    #[serde(default)]
    pub ndvi_series: Option<PathBuf>,
    #[serde(default)]
    pub ndvi_delta: Option<PathBuf>,

    #[serde(default)]
    pub green_series: Option<PathBuf>,
    #[serde(default)]
    pub swir1_series: Option<PathBuf>,
    #[serde(default)]
    pub mndwi_delta: Option<PathBuf>,
    #[serde(default)]
    pub water_baseline: Option<PathBuf>,
    #[serde(default)]
    pub water_event: Option<PathBuf>,

    #[serde(default)]
    pub global_lst_series: Option<PathBuf>,
    #[serde(default)]
    pub global_anomaly: Option<PathBuf>,

    pub metrics_csv: PathBuf,
    pub histogram_csv: PathBuf,
}

impl PathsConfig {
    fn resolve_all(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for path in [
            &mut self.lst_series,
            &mut self.lst_climatology,
            &mut self.lst_anomaly,
            &mut self.metrics_csv,
            &mut self.histogram_csv,
        ] {
            resolve(path);
        }
        for path in [
            &mut self.lst_slices,
            &mut self.ndvi_slices,
            &mut self.ndvi_series,
            &mut self.ndvi_delta,
            &mut self.green_series,
            &mut self.swir1_series,
            &mut self.mndwi_delta,
            &mut self.water_baseline,
            &mut self.water_event,
            &mut self.global_lst_series,
            &mut self.global_anomaly,
        ]
        .into_iter()
        .flatten()
        {
            resolve(path);
        }
    }
}

impl PipelineConfig {
    /// Make every relative path absolute against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        self.paths.resolve_all(base);
        for path in self.rois.values_mut() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.baseline.validate()?;
        ensure!(
            !self.baseline.contains(self.event_year),
            "event_year {} lies inside the baseline {}-{}",
            self.event_year,
            self.baseline.start_year,
            self.baseline.end_year
        );

        let p = self.thresholds.heat_percentile;
        ensure!(p > 0.0 && p < 100.0, "thresholds.heat_percentile must be in (0, 100), got {}", p);
        ensure!(
            self.thresholds.lst_scale_factor > 0.0 && self.thresholds.ndvi_scale_factor > 0.0,
            "scale factors must be positive"
        );
        ensure!(
            (1..=12).contains(&self.periods.global_focus_month),
            "periods.global_focus_month must be 1-12, got {}",
            self.periods.global_focus_month
        );

        for job in &self.metrics {
            if let Some(roi) = job.roi() {
                ensure!(
                    self.rois.contains_key(roi),
                    "metric '{}' refers to unknown ROI '{}'",
                    job.metric_name(),
                    roi
                );
            }
        }
        ensure!(
            self.paths.green_series.is_some() == self.paths.swir1_series.is_some(),
            "paths.green_series and paths.swir1_series must be configured together"
        );
        Ok(())
    }

    pub fn metric_settings(&self) -> MetricSettings {
        MetricSettings {
            heat_percentile: self.thresholds.heat_percentile,
            event_months: self.periods.event_months.clone(),
        }
    }
}
