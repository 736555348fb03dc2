//! Baseline vs event value distributions.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use terra_common::{TerraError, TerraResult};

use crate::stats::percentile;

/// Default number of histogram bins.
pub const DEFAULT_BINS: usize = 50;

/// Percentile that starts the upper tail.
pub const TAIL_PERCENTILE: f64 = 95.0;

/// One histogram bin, `[left, right)` except the last which is closed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub bin_left: f64,
    pub bin_right: f64,
    pub baseline_count: u64,
    pub event_count: u64,
}

/// Histogram of event values with baseline counts on the same edges.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionShift {
    pub bins: Vec<HistogramBin>,
    /// `mean(event) - mean(baseline)`; None without baseline samples.
    pub mean_shift: Option<f64>,
    /// Difference of the upper-tail means (values at or above the 95th
    /// percentile); None without baseline samples.
    pub tail_shift: Option<f64>,
}

#[derive(Serialize)]
struct HistogramRecord {
    bin_left: f64,
    bin_right: f64,
    baseline_count: u64,
    event_count: u64,
    mean_shift: Option<f64>,
    tail_shift_95p: Option<f64>,
}

impl DistributionShift {
    /// Bin edges span the event range; baseline values outside it are not
    /// counted. NaN and infinite samples are ignored on both sides.
    pub fn compute(baseline: &[f32], event: &[f32], bins: usize) -> TerraResult<Self> {
        if bins == 0 {
            return Err(TerraError::invalid_parameter("bins", "at least one bin is required"));
        }
        let event = finite(event);
        let baseline = finite(baseline);
        if event.is_empty() {
            return Err(TerraError::InsufficientData(
                "no event samples for the distribution histogram".to_string(),
            ));
        }

        let edges = bin_edges(&event, bins);
        let event_counts = histogram(&event, &edges);
        let baseline_counts = histogram(&baseline, &edges);

        let (mean_shift, tail_shift) = if baseline.is_empty() {
            warn!("No baseline samples; writing event distribution only");
            (None, None)
        } else {
            (
                Some(mean(&event) - mean(&baseline)),
                Some(tail_mean(&event)? - tail_mean(&baseline)?),
            )
        };

        let bins = edges
            .windows(2)
            .zip(event_counts.iter().zip(&baseline_counts))
            .map(|(w, (&event_count, &baseline_count))| HistogramBin {
                bin_left: w[0],
                bin_right: w[1],
                baseline_count,
                event_count,
            })
            .collect();

        Ok(Self {
            bins,
            mean_shift,
            tail_shift,
        })
    }

    /// Write the histogram as CSV. The shift columns are filled on the first
    /// row only.
    pub fn save_csv(&self, path: impl AsRef<Path>) -> TerraResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| TerraError::Storage(format!("failed to create {}: {}", parent.display(), e)))?;
        }
        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| TerraError::Storage(format!("failed to create {}: {}", path.display(), e)))?;
        for (i, bin) in self.bins.iter().enumerate() {
            let record = HistogramRecord {
                bin_left: bin.bin_left,
                bin_right: bin.bin_right,
                baseline_count: bin.baseline_count,
                event_count: bin.event_count,
                mean_shift: if i == 0 { self.mean_shift } else { None },
                tail_shift_95p: if i == 0 { self.tail_shift } else { None },
            };
            writer
                .serialize(record)
                .map_err(|e| TerraError::Serialization(format!("failed to write histogram row: {}", e)))?;
        }
        writer
            .flush()
            .map_err(|e| TerraError::Storage(format!("failed to flush {}: {}", path.display(), e)))?;
        info!(path = %path.display(), bins = self.bins.len(), "Wrote distribution histogram");
        Ok(())
    }
}

fn finite(values: &[f32]) -> Vec<f64> {
    values.iter().filter(|v| v.is_finite()).map(|&v| v as f64).collect()
}

/// Evenly spaced edges over `[min, max]`; a degenerate range is widened by
/// 0.5 on each side.
fn bin_edges(values: &[f64], bins: usize) -> Vec<f64> {
    let (mut lo, mut hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let mut edges: Vec<f64> = (0..bins).map(|i| lo + width * i as f64).collect();
    edges.push(hi);
    edges
}

fn histogram(values: &[f64], edges: &[f64]) -> Vec<u64> {
    let bins = edges.len() - 1;
    let (lo, hi) = (edges[0], edges[bins]);
    let mut counts = vec![0u64; bins];
    for &v in values {
        if v < lo || v > hi {
            continue;
        }
        // last bin is closed on the right
        let i = edges[1..].partition_point(|&e| e <= v).min(bins - 1);
        counts[i] += 1;
    }
    counts
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn tail_mean(values: &[f64]) -> TerraResult<f64> {
    let threshold = percentile(&mut values.to_vec(), TAIL_PERCENTILE)?;
    let tail: Vec<f64> = values.iter().copied().filter(|&v| v >= threshold).collect();
    Ok(mean(&tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bins_cover_event_range() {
        let event: Vec<f32> = (0..100).map(|v| v as f32).collect();
        let shift = DistributionShift::compute(&[], &event, 10).unwrap();
        assert_eq!(shift.bins.len(), 10);
        assert_eq!(shift.bins[0].bin_left, 0.0);
        assert_eq!(shift.bins[9].bin_right, 99.0);
        assert_eq!(shift.bins.iter().map(|b| b.event_count).sum::<u64>(), 100);
        // the maximum lands in the closed last bin
        assert_eq!(shift.bins[9].event_count, 10);
        assert!(shift.mean_shift.is_none());
    }

    #[test]
    fn test_shifts() {
        let baseline: Vec<f32> = (0..20).map(|v| v as f32).collect();
        let event: Vec<f32> = baseline.iter().map(|v| v + 3.0).chain([f32::NAN]).collect();
        let shift = DistributionShift::compute(&baseline, &event, 5).unwrap();
        assert!((shift.mean_shift.unwrap() - 3.0).abs() < 1e-9);
        assert!((shift.tail_shift.unwrap() - 3.0).abs() < 1e-9);
        // baseline values below the event range are not counted
        assert_eq!(shift.bins.iter().map(|b| b.baseline_count).sum::<u64>(), 17);
    }

    #[test]
    fn test_constant_event_values() {
        let shift = DistributionShift::compute(&[1.0], &[2.0, 2.0], 2).unwrap();
        assert_eq!(shift.bins[0].bin_left, 1.5);
        assert_eq!(shift.bins[1].bin_right, 2.5);
        assert_eq!(shift.bins[1].event_count, 2);
    }

    #[test]
    fn test_infinite_samples_ignored() {
        let event = [1.0, 2.0, 3.0, f32::INFINITY, f32::NEG_INFINITY];
        let baseline = [0.0, 1.0, 2.0, f32::INFINITY];
        let shift = DistributionShift::compute(&baseline, &event, 2).unwrap();
        assert_eq!(shift.bins[0].bin_left, 1.0);
        assert_eq!(shift.bins[1].bin_right, 3.0);
        assert!(shift.bins.iter().all(|b| b.bin_left.is_finite() && b.bin_right.is_finite()));
        assert_eq!(shift.bins.iter().map(|b| b.event_count).sum::<u64>(), 3);
        assert!((shift.mean_shift.unwrap() - 1.0).abs() < 1e-9);

        let err = DistributionShift::compute(&[1.0], &[f32::INFINITY], 2).unwrap_err();
        assert_eq!(err.kind(), "InsufficientData");
    }

    #[test]
    fn test_empty_event_is_an_error() {
        let err = DistributionShift::compute(&[1.0], &[f32::NAN], 50).unwrap_err();
        assert_eq!(err.kind(), "InsufficientData");
    }
}
