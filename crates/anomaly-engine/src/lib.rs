//! Climatologies and anomalies for daily land-surface series.
//!
//! - [`ClimatologyBuilder`] groups baseline years by day of year.
//! - [`AnomalyAligner`] subtracts the matching climatology slice from each
//!   event time step.
//! - [`seasonal`] compares period means (July-August, a focus month).
//! - [`indices`] derives MNDWI/NDVI from reflectance bands.

pub mod anomaly;
pub mod climatology;
pub mod indices;
pub mod seasonal;

pub use anomaly::{AnomalyAligner, AnomalyResult};
pub use climatology::{Climatology, ClimatologyBuilder, DOY_AXIS};
pub use seasonal::{monthly_anomaly, period_delta, PeriodDelta};
