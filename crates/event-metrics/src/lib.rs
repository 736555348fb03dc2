//! Masked statistics and the metrics table.
//!
//! [`MaskedStatistics`] restricts means, percentiles, exceedance counts and
//! area deltas to a [`region_mask::RegionMask`]. [`MetricsTable`] is the flat
//! `metric,value,updated_at` CSV the pipeline reports into, and
//! [`jobs::MetricRunner`] computes the configured metric set.

pub mod distribution;
pub mod jobs;
pub mod stats;
pub mod table;

pub use distribution::{DistributionShift, HistogramBin};
pub use jobs::{JobOutcome, MetricInputs, MetricJob, MetricRunner, MetricSettings, RunSummary};
pub use stats::{percentile, pixel_area_km2, MaskedStatistics};
pub use table::{MetricRow, MetricsTable, UpdateOutcome};
