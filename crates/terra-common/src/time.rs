//! Calendar helpers: day-of-year keys, baseline and month windows, and
//! MODIS acquisition stamps.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{TerraError, TerraResult};

/// Largest day-of-year key (leap years only).
pub const MAX_DAY_OF_YEAR: u16 = 366;

/// 1-based ordinal day within the calendar year.
///
/// No leap-day normalization: 31 December is 365 in common years and 366 in
/// leap years.
pub fn day_of_year(date: NaiveDate) -> u16 {
    date.ordinal() as u16
}

/// Build a date from a year and a 1-based day of year.
pub fn date_from_year_doy(year: i32, doy: u32) -> Option<NaiveDate> {
    NaiveDate::from_yo_opt(year, doy)
}

/// Extract the acquisition date from a MODIS-style file name.
///
/// MODIS granules carry an `A{YYYY}{DDD}` stamp, e.g.
/// `MOD11A1.A2024183.h20v04.061.2024185.hdf` → 2024-07-01. The first stamp
/// is used; an out-of-range day of year yields None.
pub fn parse_acquisition_date(file_name: &str) -> Option<NaiveDate> {
    let bytes = file_name.as_bytes();
    for start in 0..bytes.len() {
        if bytes[start] != b'A' || start + 8 > bytes.len() {
            continue;
        }
        let digits = &bytes[start + 1..start + 8];
        if !digits.iter().all(u8::is_ascii_digit) {
            continue;
        }
        let stamp = &file_name[start + 1..start + 8];
        let year: i32 = stamp[..4].parse().ok()?;
        let doy: u32 = stamp[4..].parse().ok()?;
        return date_from_year_doy(year, doy);
    }
    None
}

/// Parse an ISO 8601 date or datetime into a calendar date.
pub fn parse_date(s: &str) -> TerraResult<NaiveDate> {
    let s = s.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }

    // Try full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }

    // Try without timezone
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(ndt.date());
    }

    Err(TerraError::invalid_parameter("date", format!("unrecognized date '{}'", s)))
}

/// Inclusive range of baseline years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineWindow {
    pub start_year: i32,
    pub end_year: i32,
}

impl BaselineWindow {
    pub fn new(start_year: i32, end_year: i32) -> TerraResult<Self> {
        let window = Self { start_year, end_year };
        window.validate()?;
        Ok(window)
    }

    /// Parse "2010-2019".
    pub fn parse(s: &str) -> TerraResult<Self> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| TerraError::invalid_parameter("baseline", format!("expected 'START-END', got '{}'", s)))?;
        let parse_year = |v: &str| {
            v.trim()
                .parse::<i32>()
                .map_err(|_| TerraError::invalid_parameter("baseline", format!("invalid year '{}'", v)))
        };
        Self::new(parse_year(start)?, parse_year(end)?)
    }

    pub fn validate(&self) -> TerraResult<()> {
        if self.start_year > self.end_year {
            return Err(TerraError::invalid_parameter(
                "baseline",
                format!("start_year {} is after end_year {}", self.start_year, self.end_year),
            ));
        }
        Ok(())
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.start_year && year <= self.end_year
    }

    /// All years in the window.
    pub fn years(&self) -> BTreeSet<i32> {
        (self.start_year..=self.end_year).collect()
    }
}

/// A set of calendar months (1-12) used to pre-filter time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct MonthWindow {
    months: Vec<u32>,
}

impl MonthWindow {
    pub fn new(months: impl IntoIterator<Item = u32>) -> TerraResult<Self> {
        let mut months: Vec<u32> = months.into_iter().collect();
        months.sort_unstable();
        months.dedup();
        if months.is_empty() {
            return Err(TerraError::invalid_parameter("months", "at least one month is required"));
        }
        if let Some(bad) = months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(TerraError::invalid_parameter("months", format!("month {} is outside 1-12", bad)));
        }
        Ok(Self { months })
    }

    /// The July-August summer window used for heat and vegetation metrics.
    pub fn july_august() -> Self {
        Self { months: vec![7, 8] }
    }

    pub fn single(month: u32) -> TerraResult<Self> {
        Self::new([month])
    }

    pub fn months(&self) -> &[u32] {
        &self.months
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.months.contains(&date.month())
    }
}

impl TryFrom<Vec<u32>> for MonthWindow {
    type Error = TerraError;

    fn try_from(months: Vec<u32>) -> Result<Self, Self::Error> {
        MonthWindow::new(months)
    }
}

impl From<MonthWindow> for Vec<u32> {
    fn from(window: MonthWindow) -> Self {
        window.months
    }
}
