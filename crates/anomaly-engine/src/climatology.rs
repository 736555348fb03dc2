//! Day-of-year climatology.
//!
//! A climatology has one `DayOfYear` leading axis with every key 1..=366.
//! Key 366 only ever receives samples from leap years; there is no leap-day
//! folding. Keys without samples are all-NaN slices.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use chrono::Datelike;
use tracing::{debug, info};

use terra_common::time::MAX_DAY_OF_YEAR;
use terra_common::{day_of_year, Axis, AxisRole, GriddedField, SpatialGrid, TerraError, TerraResult};

/// Name of the day-of-year key axis.
pub const DOY_AXIS: &str = "doy";

/// Mean state per day of year over a set of baseline years.
#[derive(Debug, Clone)]
pub struct Climatology {
    field: GriddedField,
    baseline_years: BTreeSet<i32>,
    sample_counts: Vec<u32>,
}

impl Climatology {
    /// Reassemble a climatology, e.g. after reading it back from disk.
    ///
    /// The field must have a single `DayOfYear` axis holding keys 1..=366 and
    /// `sample_counts` one entry per key.
    pub fn from_parts(field: GriddedField, baseline_years: BTreeSet<i32>, sample_counts: Vec<u32>) -> TerraResult<Self> {
        let keys = match field.leading_axes() {
            [axis] if axis.role() == AxisRole::DayOfYear => axis.keys().unwrap_or(&[]),
            _ => {
                return Err(TerraError::InvalidAxisLayout(format!(
                    "climatology '{}' needs exactly one day-of-year axis, has {:?}",
                    field.name(),
                    field.axis_names()
                )))
            }
        };
        if !keys.iter().copied().eq(1..=MAX_DAY_OF_YEAR) {
            return Err(TerraError::InvalidAxisLayout(format!(
                "climatology '{}' must cover day-of-year keys 1..={}, found {} keys",
                field.name(),
                MAX_DAY_OF_YEAR,
                keys.len()
            )));
        }
        if sample_counts.len() != MAX_DAY_OF_YEAR as usize {
            return Err(TerraError::shape_mismatch("climatology sample counts", MAX_DAY_OF_YEAR, sample_counts.len()));
        }
        Ok(Self {
            field,
            baseline_years,
            sample_counts,
        })
    }

    pub fn field(&self) -> &GriddedField {
        &self.field
    }

    pub fn into_field(self) -> GriddedField {
        self.field
    }

    pub fn grid(&self) -> &SpatialGrid {
        self.field.grid()
    }

    pub fn baseline_years(&self) -> &BTreeSet<i32> {
        &self.baseline_years
    }

    pub fn sample_counts(&self) -> &[u32] {
        &self.sample_counts
    }

    /// Number of baseline time steps that fell on `doy`.
    pub fn sample_count(&self, doy: u16) -> u32 {
        doy.checked_sub(1)
            .and_then(|i| self.sample_counts.get(i as usize))
            .copied()
            .unwrap_or(0)
    }

    /// The 2-D mean slice for `doy`, or None for keys outside 1..=366.
    pub fn slice(&self, doy: u16) -> Option<&[f32]> {
        let n = self.grid().len();
        let i = doy.checked_sub(1)? as usize;
        if i >= MAX_DAY_OF_YEAR as usize {
            return None;
        }
        self.field.values().get(i * n..(i + 1) * n)
    }

    /// Keys that received at least one sample.
    pub fn covered_keys(&self) -> Vec<u16> {
        (1..=MAX_DAY_OF_YEAR).filter(|&k| self.sample_count(k) > 0).collect()
    }

    /// Keys without any baseline sample.
    pub fn missing_keys(&self) -> Vec<u16> {
        (1..=MAX_DAY_OF_YEAR).filter(|&k| self.sample_count(k) == 0).collect()
    }
}

/// Builds a [`Climatology`] from a daily series.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClimatologyBuilder;

impl ClimatologyBuilder {
    pub fn new() -> Self {
        Self
    }

    /// NaN-ignoring mean per day of year over the time steps whose year is in
    /// `baseline_years`.
    ///
    /// The series must have a time axis as its only leading axis. Samples are
    /// accumulated in time order in f64, so the result is bitwise
    /// reproducible for the same input.
    pub fn build(&self, series: &GriddedField, baseline_years: &BTreeSet<i32>) -> TerraResult<Climatology> {
        let start = Instant::now();
        let dates = baseline_dates(series)?;

        let mut groups: BTreeMap<u16, Vec<usize>> = BTreeMap::new();
        for (t, date) in dates.iter().enumerate() {
            if baseline_years.contains(&date.year()) {
                groups.entry(day_of_year(*date)).or_default().push(t);
            }
        }
        if groups.is_empty() {
            return Err(TerraError::EmptyBaseline {
                years: baseline_years.iter().copied().collect(),
            });
        }

        let n = series.grid().len();
        let values = series.values();
        let mut data = vec![f32::NAN; MAX_DAY_OF_YEAR as usize * n];
        let mut sample_counts = vec![0u32; MAX_DAY_OF_YEAR as usize];
        let mut sums = vec![0.0f64; n];
        let mut counts = vec![0u32; n];

        for (&doy, steps) in &groups {
            sums.iter_mut().for_each(|s| *s = 0.0);
            counts.iter_mut().for_each(|c| *c = 0);
            for &t in steps {
                for (j, &v) in values[t * n..(t + 1) * n].iter().enumerate() {
                    if !v.is_nan() {
                        sums[j] += v as f64;
                        counts[j] += 1;
                    }
                }
            }
            let k = doy as usize - 1;
            for (out, (&s, &c)) in data[k * n..(k + 1) * n].iter_mut().zip(sums.iter().zip(&counts)) {
                if c > 0 {
                    *out = (s / c as f64) as f32;
                }
            }
            sample_counts[k] = steps.len() as u32;
            debug!(doy, samples = steps.len(), "Accumulated climatology key");
        }

        let keys = Axis::day_of_year(DOY_AXIS, (1..=MAX_DAY_OF_YEAR).collect())?;
        let mut field = GriddedField::new(
            format!("{}_climatology", series.name()),
            vec![keys],
            series.grid().clone(),
            data,
        )?;
        if let Some(units) = series.units() {
            field = field.with_units(units);
        }

        let climatology = Climatology::from_parts(field, baseline_years.clone(), sample_counts)?;
        info!(
            field = %series.name(),
            baseline_years = ?baseline_years,
            time_steps = groups.values().map(Vec::len).sum::<usize>(),
            covered_keys = groups.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built day-of-year climatology"
        );
        Ok(climatology)
    }
}

fn baseline_dates(series: &GriddedField) -> TerraResult<&[chrono::NaiveDate]> {
    let time = series
        .time_axis()
        .ok_or_else(|| TerraError::AxisNotFound(format!("time axis in series '{}'", series.name())))?;
    if series.leading_axes().len() != 1 {
        return Err(TerraError::InvalidAxisLayout(format!(
            "series '{}' must have time as its only leading axis, has {:?}",
            series.name(),
            series.axis_names()
        )));
    }
    time.dates()
        .ok_or_else(|| TerraError::InvalidAxisLayout(format!("time axis '{}' carries no dates", time.name())))
}
