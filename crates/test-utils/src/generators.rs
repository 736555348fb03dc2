//! Test data generators for creating synthetic land-surface data.
//!
//! These generators create predictable, verifiable test fields that can be
//! used across the test suite. All values are deterministic.

use chrono::{Datelike, NaiveDate};
use terra_common::{Axis, GriddedField, SpatialGrid};

use crate::fixtures::grid::GridSpec;

/// Geographic grid built from a fixture spec (both axes ascending).
pub fn grid_from_spec(spec: &GridSpec) -> SpatialGrid {
    SpatialGrid::geographic(spec.lats(), spec.lons()).expect("fixture grid is valid")
}

/// Every calendar day of the given years, optionally restricted to months.
///
/// # Example
///
/// ```
/// use test_utils::daily_dates;
///
/// let dates = daily_dates(2023..=2024, None);
/// assert_eq!(dates.len(), 365 + 366);
/// let summer = daily_dates(2024..=2024, Some(&[7, 8]));
/// assert_eq!(summer.len(), 62);
/// ```
pub fn daily_dates(years: std::ops::RangeInclusive<i32>, months: Option<&[u32]>) -> Vec<NaiveDate> {
    years
        .flat_map(|year| {
            let days = if NaiveDate::from_ymd_opt(year, 2, 29).is_some() { 366 } else { 365 };
            (1..=days).filter_map(move |doy| NaiveDate::from_yo_opt(year, doy))
        })
        .filter(|d| months.map(|m| m.contains(&d.month())).unwrap_or(true))
        .collect()
}

/// Seasonal land-surface temperature in Kelvin.
///
/// `290 + 12 sin(2π (doy - 105) / 365)` plus a cool-to-warm gradient from
/// the first to the last row and a small deterministic jitter.
pub fn seasonal_lst(doy: u32, row: usize, col: usize, seed: u32) -> f32 {
    let season = 12.0 * (2.0 * std::f32::consts::PI * (doy as f32 - 105.0) / 365.0).sin();
    let gradient = row as f32 * 0.5;
    let jitter = (simple_hash(col as u32, row as u32 ^ doy, seed) % 1000) as f32 / 1000.0 - 0.5;
    290.0 + season + gradient + jitter
}

/// Daily LST series over `grid` following [`seasonal_lst`].
pub fn create_lst_series(grid: &SpatialGrid, dates: &[NaiveDate], seed: u32) -> GriddedField {
    let (ny, nx) = grid.shape();
    let mut data = Vec::with_capacity(dates.len() * ny * nx);
    for date in dates {
        for row in 0..ny {
            for col in 0..nx {
                data.push(seasonal_lst(date.ordinal(), row, col, seed));
            }
        }
    }
    series("lst", grid, dates, data).with_units("K")
}

/// Series where every sample equals `value`.
pub fn create_constant_series(grid: &SpatialGrid, dates: &[NaiveDate], value: f32) -> GriddedField {
    series("constant", grid, dates, vec![value; dates.len() * grid.len()])
}

/// Series where every sample of a date equals its day of year.
pub fn create_doy_series(grid: &SpatialGrid, dates: &[NaiveDate]) -> GriddedField {
    let data = dates
        .iter()
        .flat_map(|d| std::iter::repeat(d.ordinal() as f32).take(grid.len()))
        .collect();
    series("doy", grid, dates, data)
}

/// Copy of `field` with NaN at the given `(row, col)` cells in every slice.
pub fn with_missing_cells(field: &GriddedField, cells: &[(usize, usize)]) -> GriddedField {
    let (ny, nx) = field.grid().shape();
    let n = (ny * nx).max(1);
    let mut data = field.values().to_vec();
    for (i, v) in data.iter_mut().enumerate() {
        let cell = i % n;
        if cells.iter().any(|&(r, c)| r < ny && c < nx && r * nx + c == cell) {
            *v = f32::NAN;
        }
    }
    GriddedField::new(field.name(), field.leading_axes().to_vec(), field.grid().clone(), data)
        .expect("same shape as the input field")
}

/// 2-D field from row-major values.
pub fn create_spatial_field(name: &str, grid: &SpatialGrid, values: Vec<f32>) -> GriddedField {
    GriddedField::spatial(name, grid.clone(), values).expect("values match the grid")
}

fn series(name: &str, grid: &SpatialGrid, dates: &[NaiveDate], data: Vec<f32>) -> GriddedField {
    let time = Axis::time("time", dates.to_vec()).expect("dates are ascending");
    GriddedField::new(name, vec![time], grid.clone(), data).expect("generated shape is consistent")
}

/// Simple deterministic hash for reproducible test data.
pub fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}
