//! Labelled float grids and boolean grids.

use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use crate::grid::{Axis, AxisRole, AxisValue, SpatialGrid};
use crate::{CoordinateSystem, MonthWindow, TerraError, TerraResult};

/// NaN-ignoring reduction applied along one leading axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Mean,
    Sum,
    Min,
    Max,
    /// Number of valid samples (0 where everything is missing).
    Count,
}

/// A named float32 array over `leading axes ++ [y, x]`, row-major.
///
/// NaN marks missing samples. Fields are values: every operation returns a
/// new field and leaves the receiver untouched.
#[derive(Debug, Clone)]
pub struct GriddedField {
    name: String,
    units: Option<String>,
    leading: Vec<Axis>,
    grid: SpatialGrid,
    data: Vec<f32>,
}

impl GriddedField {
    /// Build a field, checking axis roles, unique axis names and data length.
    pub fn new(
        name: impl Into<String>,
        leading: Vec<Axis>,
        grid: SpatialGrid,
        data: Vec<f32>,
    ) -> TerraResult<Self> {
        let name = name.into();

        if let Some(axis) = leading.iter().find(|a| a.role().is_spatial()) {
            return Err(TerraError::InvalidAxisLayout(format!(
                "field '{}': spatial axis '{}' cannot be a leading axis",
                name,
                axis.name()
            )));
        }

        let mut seen = HashSet::new();
        for axis_name in leading
            .iter()
            .map(Axis::name)
            .chain([grid.y().name(), grid.x().name()])
        {
            if !seen.insert(axis_name) {
                return Err(TerraError::InvalidAxisLayout(format!(
                    "field '{}': duplicate axis name '{}'",
                    name, axis_name
                )));
            }
        }

        let expected: usize = leading.iter().map(Axis::len).product::<usize>() * grid.len();
        if data.len() != expected {
            let shape: Vec<usize> = leading
                .iter()
                .map(Axis::len)
                .chain([grid.y().len(), grid.x().len()])
                .collect();
            return Err(TerraError::shape_mismatch(
                format!("field '{}' with shape {:?}", name, shape),
                expected,
                data.len(),
            ));
        }

        Ok(Self {
            name,
            units: None,
            leading,
            grid,
            data,
        })
    }

    /// 2-D field with no leading axes.
    pub fn spatial(name: impl Into<String>, grid: SpatialGrid, data: Vec<f32>) -> TerraResult<Self> {
        Self::new(name, Vec::new(), grid, data)
    }

    /// Field with every sample set to `value`.
    pub fn filled(name: impl Into<String>, leading: Vec<Axis>, grid: SpatialGrid, value: f32) -> TerraResult<Self> {
        let len = leading.iter().map(Axis::len).product::<usize>() * grid.len();
        Self::new(name, leading, grid, vec![value; len])
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn crs(&self) -> &CoordinateSystem {
        self.grid.crs()
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn leading_axes(&self) -> &[Axis] {
        &self.leading
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    pub fn into_values(self) -> Vec<f32> {
        self.data
    }

    /// Axis names in storage order.
    pub fn axis_names(&self) -> Vec<&str> {
        self.all_axes().map(Axis::name).collect()
    }

    /// Axis lengths in storage order.
    pub fn shape(&self) -> Vec<usize> {
        self.all_axes().map(Axis::len).collect()
    }

    pub fn ndim(&self) -> usize {
        self.leading.len() + 2
    }

    /// Look up an axis by name.
    pub fn axis(&self, name: &str) -> TerraResult<&Axis> {
        self.all_axes()
            .find(|a| a.name() == name)
            .ok_or_else(|| self.axis_not_found(name))
    }

    /// The first leading axis with the `Time` role.
    pub fn time_axis(&self) -> Option<&Axis> {
        self.leading.iter().find(|a| a.role() == AxisRole::Time)
    }

    /// Dates of the time axis, if there is one.
    pub fn dates(&self) -> Option<&[NaiveDate]> {
        self.time_axis().and_then(Axis::dates)
    }

    /// Number of 2-D slices (product of leading axis lengths).
    pub fn slice_count(&self) -> usize {
        self.leading.iter().map(Axis::len).product()
    }

    /// Iterate over the 2-D slices in storage order.
    pub fn slices(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks(self.grid.len().max(1)).take(self.slice_count())
    }

    /// Number of non-NaN samples.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Keep the labels of `axis_name` accepted by `predicate`.
    ///
    /// Works on leading and spatial axes. Selecting nothing is allowed and
    /// yields a zero-length axis.
    pub fn select<F>(&self, axis_name: &str, predicate: F) -> TerraResult<GriddedField>
    where
        F: Fn(&AxisValue) -> bool,
    {
        let k = self.axis_position(axis_name)?;
        let axis = self.axis(axis_name)?;
        let indices = axis.matching_indices(predicate);
        Ok(self.take_along(k, &indices))
    }

    /// Keep time steps whose month is in `months`.
    pub fn select_months(&self, months: &MonthWindow) -> TerraResult<GriddedField> {
        let time = self.require_time_axis()?.name().to_string();
        self.select(&time, |v| v.as_date().map(|d| months.contains(d)).unwrap_or(false))
    }

    /// Keep time steps whose year is in `years`.
    pub fn select_years(&self, years: &BTreeSet<i32>) -> TerraResult<GriddedField> {
        let time = self.require_time_axis()?.name().to_string();
        self.select(&time, |v| v.as_date().map(|d| years.contains(&d.year())).unwrap_or(false))
    }

    /// Keep time steps within `[start, end]`.
    pub fn select_date_range(&self, start: NaiveDate, end: NaiveDate) -> TerraResult<GriddedField> {
        let time = self.require_time_axis()?.name().to_string();
        self.select(&time, |v| v.as_date().map(|d| d >= start && d <= end).unwrap_or(false))
    }

    /// Drop a leading axis by taking one of its indices.
    pub fn slice(&self, axis_name: &str, index: usize) -> TerraResult<GriddedField> {
        let k = self.leading_position(axis_name)?;
        let len = self.leading[k].len();
        if index >= len {
            return Err(TerraError::invalid_parameter(
                "index",
                format!("index {} out of range for axis '{}' of length {}", index, axis_name, len),
            ));
        }
        let taken = self.take_along(k, &[index]);
        let mut leading = taken.leading;
        leading.remove(k);
        Ok(GriddedField {
            name: self.name.clone(),
            units: self.units.clone(),
            leading,
            grid: taken.grid,
            data: taken.data,
        })
    }

    /// Reduce along a leading axis, ignoring NaN.
    ///
    /// Accumulation runs in axis order with an f64 accumulator, so repeated
    /// calls on the same input give bitwise-identical output.
    pub fn reduce(&self, axis_name: &str, op: ReduceOp) -> TerraResult<GriddedField> {
        let k = self.leading_position(axis_name)?;
        let dims = self.shape();
        let outer: usize = dims[..k].iter().product();
        let n = dims[k];
        let inner: usize = dims[k + 1..].iter().product();

        let mut out = Vec::with_capacity(outer * inner);
        let mut acc = vec![0.0f64; inner];
        let mut counts = vec![0u64; inner];
        for o in 0..outer {
            acc.iter_mut().for_each(|a| *a = initial(op));
            counts.iter_mut().for_each(|c| *c = 0);
            for i in 0..n {
                let base = (o * n + i) * inner;
                for (j, &v) in self.data[base..base + inner].iter().enumerate() {
                    if v.is_nan() {
                        continue;
                    }
                    let v = v as f64;
                    acc[j] = match op {
                        ReduceOp::Mean | ReduceOp::Sum => acc[j] + v,
                        ReduceOp::Min => acc[j].min(v),
                        ReduceOp::Max => acc[j].max(v),
                        ReduceOp::Count => acc[j],
                    };
                    counts[j] += 1;
                }
            }
            out.extend(acc.iter().zip(&counts).map(|(&a, &c)| finish(op, a, c)));
        }

        debug!(field = %self.name, axis = axis_name, op = ?op, "Reduced field");

        let mut leading = self.leading.clone();
        leading.remove(k);
        Ok(GriddedField {
            name: self.name.clone(),
            units: if op == ReduceOp::Count { None } else { self.units.clone() },
            leading,
            grid: self.grid.clone(),
            data: out,
        })
    }

    /// Apply `f` to every sample.
    pub fn map<F>(&self, f: F) -> GriddedField
    where
        F: Fn(f32) -> f32,
    {
        GriddedField {
            name: self.name.clone(),
            units: self.units.clone(),
            leading: self.leading.clone(),
            grid: self.grid.clone(),
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Combine two fields sample by sample.
    ///
    /// Both fields must share the same grid and leading axes.
    pub fn zip_with<F>(&self, other: &GriddedField, f: F) -> TerraResult<GriddedField>
    where
        F: Fn(f32, f32) -> f32,
    {
        self.ensure_same_grid(other.grid(), &other.name)?;
        if self.shape() != other.shape() {
            return Err(TerraError::shape_mismatch(
                format!("combining '{}' with '{}'", self.name, other.name),
                self.shape(),
                other.shape(),
            ));
        }
        if self.leading != other.leading {
            return Err(TerraError::InvalidAxisLayout(format!(
                "fields '{}' and '{}' have different leading axis labels",
                self.name, other.name
            )));
        }
        Ok(GriddedField {
            name: self.name.clone(),
            units: self.units.clone(),
            leading: self.leading.clone(),
            grid: self.grid.clone(),
            data: self.data.iter().zip(&other.data).map(|(&a, &b)| f(a, b)).collect(),
        })
    }

    /// Concatenate dated 2-D slices along a new time axis, sorted by date.
    pub fn stack_time(time_name: &str, mut slices: Vec<(NaiveDate, GriddedField)>) -> TerraResult<GriddedField> {
        if slices.is_empty() {
            return Err(TerraError::InsufficientData("no slices to stack".to_string()));
        }
        slices.sort_by_key(|(date, _)| *date);

        if let Some(w) = slices.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(TerraError::InvalidAxisLayout(format!("duplicate time step {}", w[0].0)));
        }

        let (_, first) = &slices[0];
        let mut data = Vec::with_capacity(slices.len() * first.grid.len());
        for (date, slice) in &slices {
            if !slice.leading.is_empty() {
                return Err(TerraError::InvalidAxisLayout(format!(
                    "slice for {} has leading axes {:?}",
                    date,
                    slice.leading.iter().map(Axis::name).collect::<Vec<_>>()
                )));
            }
            first.ensure_same_grid(slice.grid(), &format!("{} @ {}", slice.name, date))?;
            data.extend_from_slice(&slice.data);
        }

        let dates = slices.iter().map(|(d, _)| *d).collect();
        let mut field = GriddedField::new(
            first.name.clone(),
            vec![Axis::time(time_name, dates)?],
            first.grid.clone(),
            data,
        )?;
        field.units = first.units.clone();
        Ok(field)
    }

    /// Binary classification of a 2-D field. NaN samples are never `true`.
    pub fn classify<F>(&self, name: impl Into<String>, predicate: F) -> TerraResult<BooleanField>
    where
        F: Fn(f32) -> bool,
    {
        if !self.leading.is_empty() {
            return Err(TerraError::InvalidAxisLayout(format!(
                "classify needs a 2-D field, '{}' has {} leading axes",
                self.name,
                self.leading.len()
            )));
        }
        let cells = self.data.iter().map(|&v| !v.is_nan() && predicate(v)).collect();
        BooleanField::new(name, self.grid.clone(), cells)
    }

    /// Fail with `CoordinateSystemMismatch` unless `grid` equals this field's grid.
    pub fn ensure_same_grid(&self, grid: &SpatialGrid, other: &str) -> TerraResult<()> {
        if &self.grid != grid {
            return Err(TerraError::CoordinateSystemMismatch(format!(
                "'{}' and '{}' are on different grids: {}",
                self.name,
                other,
                self.grid.describe_difference(grid)
            )));
        }
        Ok(())
    }

    fn all_axes(&self) -> impl Iterator<Item = &Axis> {
        self.leading.iter().chain([self.grid.y(), self.grid.x()])
    }

    fn axis_position(&self, name: &str) -> TerraResult<usize> {
        self.all_axes()
            .position(|a| a.name() == name)
            .ok_or_else(|| self.axis_not_found(name))
    }

    fn leading_position(&self, name: &str) -> TerraResult<usize> {
        let k = self.axis_position(name)?;
        if k >= self.leading.len() {
            return Err(TerraError::InvalidAxisLayout(format!(
                "'{}' is a spatial axis of '{}'; a spatial grid always keeps both axes",
                name, self.name
            )));
        }
        Ok(k)
    }

    fn require_time_axis(&self) -> TerraResult<&Axis> {
        self.time_axis()
            .ok_or_else(|| TerraError::AxisNotFound(format!("time axis in field '{}'", self.name)))
    }

    fn axis_not_found(&self, name: &str) -> TerraError {
        TerraError::AxisNotFound(format!(
            "'{}' in field '{}' (axes: {:?})",
            name,
            self.name,
            self.axis_names()
        ))
    }

    /// Gather `indices` along storage axis `k`.
    fn take_along(&self, k: usize, indices: &[usize]) -> GriddedField {
        let dims = self.shape();
        let outer: usize = dims[..k].iter().product();
        let n = dims[k];
        let inner: usize = dims[k + 1..].iter().product();

        let mut data = Vec::with_capacity(outer * indices.len() * inner);
        for o in 0..outer {
            for &i in indices {
                let base = (o * n + i) * inner;
                data.extend_from_slice(&self.data[base..base + inner]);
            }
        }

        let nlead = self.leading.len();
        let mut leading = self.leading.clone();
        let grid = if k < nlead {
            leading[k] = leading[k].take(indices);
            self.grid.clone()
        } else if k == nlead {
            self.grid.take_rows(indices)
        } else {
            self.grid.take_cols(indices)
        };

        GriddedField {
            name: self.name.clone(),
            units: self.units.clone(),
            leading,
            grid,
            data,
        }
    }
}

fn initial(op: ReduceOp) -> f64 {
    match op {
        ReduceOp::Min => f64::INFINITY,
        ReduceOp::Max => f64::NEG_INFINITY,
        _ => 0.0,
    }
}

fn finish(op: ReduceOp, acc: f64, count: u64) -> f32 {
    match op {
        ReduceOp::Count => count as f32,
        _ if count == 0 => f32::NAN,
        ReduceOp::Mean => (acc / count as f64) as f32,
        _ => acc as f32,
    }
}

/// A named boolean grid: ROI masks and binary classifications.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanField {
    name: String,
    grid: SpatialGrid,
    cells: Vec<bool>,
}

impl BooleanField {
    pub fn new(name: impl Into<String>, grid: SpatialGrid, cells: Vec<bool>) -> TerraResult<Self> {
        let name = name.into();
        if cells.len() != grid.len() {
            return Err(TerraError::shape_mismatch(
                format!("boolean field '{}'", name),
                grid.shape(),
                cells.len(),
            ));
        }
        Ok(Self { name, grid, cells })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub fn get(&self, row: usize, col: usize) -> Option<bool> {
        let (ny, nx) = self.grid.shape();
        (row < ny && col < nx).then(|| self.cells[row * nx + col])
    }

    /// Number of `true` cells.
    pub fn count_true(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// `(row, col)` of every `true` cell in row-major order.
    pub fn true_positions(&self) -> Vec<(usize, usize)> {
        let nx = self.grid.x().len().max(1);
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c)
            .map(|(i, _)| (i / nx, i % nx))
            .collect()
    }
}
