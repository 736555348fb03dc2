//! Common types and utilities shared across the Terra Extremes crates.
//!
//! The central type is [`GriddedField`]: a float32 sample array with an
//! explicit list of named, role-tagged axes, laid out as
//! `leading axes ++ [y, x]` in row-major order. Every field declares its
//! [`CoordinateSystem`] up front so downstream code never has to guess
//! whether coordinates are degrees or metres.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod field;
pub mod grid;
pub mod time;

pub use bbox::BoundingBox;
pub use crs::{CoordinateSystem, LinearUnit};
pub use error::{TerraError, TerraResult};
pub use field::{BooleanField, GriddedField, ReduceOp};
pub use grid::{Axis, AxisRole, AxisValue, AxisValues, CurvilinearMesh, SpatialGrid};
pub use time::{day_of_year, BaselineWindow, MonthWindow};
