//! Period means and their event-minus-baseline deltas.
//!
//! Used for the July-August NDVI and MNDWI comparisons and for the single
//! focus-month anomaly over large regions.

use std::collections::BTreeSet;

use tracing::info;

use terra_common::{BaselineWindow, GriddedField, MonthWindow, ReduceOp, TerraError, TerraResult};

/// Baseline and event period means and their difference.
#[derive(Debug, Clone)]
pub struct PeriodDelta {
    pub baseline_mean: GriddedField,
    pub event_mean: GriddedField,
    /// `event_mean - baseline_mean`.
    pub delta: GriddedField,
    pub baseline_steps: usize,
    pub event_steps: usize,
}

/// Mean over `months` for the baseline years and for `event_year`, and the
/// difference.
///
/// Fails with `EmptyBaseline` when no baseline time step falls in the
/// window and with `InsufficientData` when no event time step does.
pub fn period_delta(
    series: &GriddedField,
    baseline: &BaselineWindow,
    event_year: i32,
    months: &MonthWindow,
) -> TerraResult<PeriodDelta> {
    let time = series
        .time_axis()
        .ok_or_else(|| TerraError::AxisNotFound(format!("time axis in series '{}'", series.name())))?
        .name()
        .to_string();

    let window = series.select_months(months)?;
    let base = window.select_years(&baseline.years())?;
    let event = window.select_years(&BTreeSet::from([event_year]))?;

    let baseline_steps = base.axis(&time)?.len();
    let event_steps = event.axis(&time)?.len();
    if baseline_steps == 0 {
        return Err(TerraError::EmptyBaseline {
            years: baseline.years().into_iter().collect(),
        });
    }
    if event_steps == 0 {
        return Err(TerraError::InsufficientData(format!(
            "no '{}' time steps in months {:?} of {}",
            series.name(),
            months.months(),
            event_year
        )));
    }

    let baseline_mean = base
        .reduce(&time, ReduceOp::Mean)?
        .with_name(format!("{}_base_mean", series.name()));
    let event_mean = event
        .reduce(&time, ReduceOp::Mean)?
        .with_name(format!("{}_event_mean", series.name()));
    let delta = event_mean
        .zip_with(&baseline_mean, |e, b| e - b)?
        .with_name(format!("{}_delta", series.name()));

    info!(
        field = %series.name(),
        months = ?months.months(),
        baseline_steps,
        event_steps,
        "Computed period delta"
    );

    Ok(PeriodDelta {
        baseline_mean,
        event_mean,
        delta,
        baseline_steps,
        event_steps,
    })
}

/// Event-month mean minus baseline mean of the same month.
pub fn monthly_anomaly(
    series: &GriddedField,
    baseline: &BaselineWindow,
    event_year: i32,
    month: u32,
) -> TerraResult<PeriodDelta> {
    period_delta(series, baseline, event_year, &MonthWindow::single(month)?)
}
