//! Align an event series with a climatology by day of year.

use chrono::NaiveDate;
use tracing::{info, warn};

use terra_common::{day_of_year, GriddedField, TerraError, TerraResult};

use crate::climatology::Climatology;

/// Anomaly series plus the dates whose key had no baseline samples.
#[derive(Debug, Clone)]
pub struct AnomalyResult {
    /// `event - climatology[doy(t)]`, on the event's own time axis.
    pub field: GriddedField,
    /// Event dates whose day-of-year key was never observed in the baseline;
    /// their output slices are all NaN.
    pub missing_keys: Vec<NaiveDate>,
}

/// Subtracts the matching climatology slice from each event time step.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnomalyAligner;

impl AnomalyAligner {
    pub fn new() -> Self {
        Self
    }

    pub fn align(&self, event: &GriddedField, climatology: &Climatology) -> TerraResult<AnomalyResult> {
        let dates = event
            .dates()
            .ok_or_else(|| TerraError::AxisNotFound(format!("time axis in event series '{}'", event.name())))?;
        if event.leading_axes().len() != 1 {
            return Err(TerraError::InvalidAxisLayout(format!(
                "event series '{}' must have time as its only leading axis, has {:?}",
                event.name(),
                event.axis_names()
            )));
        }
        event.ensure_same_grid(climatology.grid(), climatology.field().name())?;

        let n = event.grid().len();
        let mut data = Vec::with_capacity(event.values().len());
        let mut missing_keys = Vec::new();

        for (date, values) in dates.iter().zip(event.slices()) {
            let doy = day_of_year(*date);
            match climatology.slice(doy) {
                Some(clim) if climatology.sample_count(doy) > 0 => {
                    data.extend(values.iter().zip(clim).map(|(&v, &c)| v - c));
                }
                _ => {
                    data.extend(std::iter::repeat(f32::NAN).take(n));
                    missing_keys.push(*date);
                }
            }
        }

        if !missing_keys.is_empty() {
            warn!(
                field = %event.name(),
                missing = missing_keys.len(),
                first = %missing_keys[0],
                "Event dates without baseline samples for their day of year; anomalies set to NaN"
            );
        }

        let mut field = GriddedField::new(
            format!("{}_anomaly", event.name()),
            event.leading_axes().to_vec(),
            event.grid().clone(),
            data,
        )?;
        if let Some(units) = event.units() {
            field = field.with_units(units);
        }

        info!(
            field = %event.name(),
            time_steps = dates.len(),
            missing = missing_keys.len(),
            "Computed anomalies"
        );
        Ok(AnomalyResult { field, missing_keys })
    }
}
