//! Axes and spatial grids.
//!
//! A [`SpatialGrid`] is the (y, x) part of a field: two role-tagged axes, a
//! declared coordinate system and, for curvilinear products, a per-cell
//! longitude/latitude mesh. Two fields are spatially compatible exactly when
//! their grids compare equal.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{BoundingBox, CoordinateSystem, TerraError, TerraResult};

/// Semantic role of an axis, declared when the field is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisRole {
    /// Longitude or easting.
    X,
    /// Latitude or northing.
    Y,
    /// Calendar dates.
    Time,
    /// Cyclical day-of-year key (1..=366).
    DayOfYear,
    /// Any other labelled axis (band, member, ...).
    Other,
}

impl AxisRole {
    pub fn is_spatial(&self) -> bool {
        matches!(self, AxisRole::X | AxisRole::Y)
    }
}

/// The labels carried by an axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum AxisValues {
    /// Numeric coordinates, strictly monotonic.
    Coordinates(Vec<f64>),
    /// Calendar dates, strictly ascending.
    Dates(Vec<NaiveDate>),
    /// Integer keys, strictly ascending.
    Keys(Vec<u16>),
    /// Bare index axis of the given length (curvilinear grids).
    Indices(usize),
}

/// A single label, handed to selection predicates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisValue {
    Coordinate(f64),
    Date(NaiveDate),
    Key(u16),
    Index(usize),
}

impl AxisValue {
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            AxisValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_coordinate(&self) -> Option<f64> {
        match self {
            AxisValue::Coordinate(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<u16> {
        match self {
            AxisValue::Key(k) => Some(*k),
            _ => None,
        }
    }
}

impl AxisValues {
    pub fn len(&self) -> usize {
        match self {
            AxisValues::Coordinates(v) => v.len(),
            AxisValues::Dates(v) => v.len(),
            AxisValues::Keys(v) => v.len(),
            AxisValues::Indices(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<AxisValue> {
        match self {
            AxisValues::Coordinates(v) => v.get(i).map(|c| AxisValue::Coordinate(*c)),
            AxisValues::Dates(v) => v.get(i).map(|d| AxisValue::Date(*d)),
            AxisValues::Keys(v) => v.get(i).map(|k| AxisValue::Key(*k)),
            AxisValues::Indices(n) => (i < *n).then_some(AxisValue::Index(i)),
        }
    }

    fn take(&self, indices: &[usize]) -> AxisValues {
        match self {
            AxisValues::Coordinates(v) => AxisValues::Coordinates(indices.iter().map(|&i| v[i]).collect()),
            AxisValues::Dates(v) => AxisValues::Dates(indices.iter().map(|&i| v[i]).collect()),
            AxisValues::Keys(v) => AxisValues::Keys(indices.iter().map(|&i| v[i]).collect()),
            AxisValues::Indices(_) => AxisValues::Indices(indices.len()),
        }
    }
}

/// A named, role-tagged axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    name: String,
    role: AxisRole,
    values: AxisValues,
}

impl Axis {
    /// Create an axis, checking that the labels suit the role and are ordered.
    pub fn new(name: impl Into<String>, role: AxisRole, values: AxisValues) -> TerraResult<Self> {
        let axis = Self {
            name: name.into(),
            role,
            values,
        };
        axis.validate()?;
        Ok(axis)
    }

    /// Numeric coordinate axis (lon/lat or x/y).
    pub fn coordinates(name: impl Into<String>, role: AxisRole, values: Vec<f64>) -> TerraResult<Self> {
        Self::new(name, role, AxisValues::Coordinates(values))
    }

    /// Time axis of calendar dates.
    pub fn time(name: impl Into<String>, dates: Vec<NaiveDate>) -> TerraResult<Self> {
        Self::new(name, AxisRole::Time, AxisValues::Dates(dates))
    }

    /// Day-of-year key axis.
    pub fn day_of_year(name: impl Into<String>, keys: Vec<u16>) -> TerraResult<Self> {
        Self::new(name, AxisRole::DayOfYear, AxisValues::Keys(keys))
    }

    /// Bare index axis, used for curvilinear grids.
    pub fn indices(name: impl Into<String>, role: AxisRole, len: usize) -> TerraResult<Self> {
        Self::new(name, role, AxisValues::Indices(len))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> AxisRole {
        self.role
    }

    pub fn values(&self) -> &AxisValues {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, i: usize) -> Option<AxisValue> {
        self.values.get(i)
    }

    /// Coordinate values, if this is a numeric axis.
    pub fn coordinate_values(&self) -> Option<&[f64]> {
        match &self.values {
            AxisValues::Coordinates(v) => Some(v),
            _ => None,
        }
    }

    /// Dates, if this is a time axis.
    pub fn dates(&self) -> Option<&[NaiveDate]> {
        match &self.values {
            AxisValues::Dates(v) => Some(v),
            _ => None,
        }
    }

    /// Keys, if this is a key axis.
    pub fn keys(&self) -> Option<&[u16]> {
        match &self.values {
            AxisValues::Keys(v) => Some(v),
            _ => None,
        }
    }

    /// Indices of labels accepted by `predicate`, in axis order.
    pub fn matching_indices<F>(&self, predicate: F) -> Vec<usize>
    where
        F: Fn(&AxisValue) -> bool,
    {
        (0..self.len())
            .filter(|&i| self.value(i).map(|v| predicate(&v)).unwrap_or(false))
            .collect()
    }

    pub(crate) fn take(&self, indices: &[usize]) -> Axis {
        Axis {
            name: self.name.clone(),
            role: self.role,
            values: self.values.take(indices),
        }
    }

    fn validate(&self) -> TerraResult<()> {
        let compatible = match (&self.role, &self.values) {
            (AxisRole::X | AxisRole::Y, AxisValues::Coordinates(_) | AxisValues::Indices(_)) => true,
            (AxisRole::Time, AxisValues::Dates(_)) => true,
            (AxisRole::DayOfYear, AxisValues::Keys(_)) => true,
            (AxisRole::Other, AxisValues::Coordinates(_) | AxisValues::Keys(_) | AxisValues::Indices(_)) => true,
            _ => false,
        };
        if !compatible {
            return Err(TerraError::InvalidAxisLayout(format!(
                "axis '{}' with role {:?} cannot carry {} labels",
                self.name,
                self.role,
                self.values.kind_name()
            )));
        }

        match &self.values {
            AxisValues::Coordinates(v) => {
                if v.iter().any(|c| !c.is_finite()) {
                    return Err(TerraError::InvalidAxisLayout(format!(
                        "axis '{}' has non-finite coordinates",
                        self.name
                    )));
                }
                let ascending = v.windows(2).all(|w| w[1] > w[0]);
                let descending = v.windows(2).all(|w| w[1] < w[0]);
                if !(ascending || descending) {
                    return Err(TerraError::InvalidAxisLayout(format!(
                        "axis '{}' coordinates are not strictly monotonic",
                        self.name
                    )));
                }
            }
            AxisValues::Dates(v) => {
                if !v.windows(2).all(|w| w[1] > w[0]) {
                    return Err(TerraError::InvalidAxisLayout(format!(
                        "time axis '{}' dates are not strictly ascending",
                        self.name
                    )));
                }
            }
            AxisValues::Keys(v) => {
                if !v.windows(2).all(|w| w[1] > w[0]) {
                    return Err(TerraError::InvalidAxisLayout(format!(
                        "key axis '{}' is not strictly ascending",
                        self.name
                    )));
                }
            }
            AxisValues::Indices(_) => {}
        }
        Ok(())
    }
}

impl AxisValues {
    fn kind_name(&self) -> &'static str {
        match self {
            AxisValues::Coordinates(_) => "coordinate",
            AxisValues::Dates(_) => "date",
            AxisValues::Keys(_) => "key",
            AxisValues::Indices(_) => "index",
        }
    }
}

/// Per-cell longitude/latitude (degrees) for curvilinear grids, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvilinearMesh {
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
}

/// The spatial (y, x) part of a gridded field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialGrid {
    crs: CoordinateSystem,
    y: Axis,
    x: Axis,
    mesh: Option<CurvilinearMesh>,
}

impl SpatialGrid {
    /// Regular grid from 1-D coordinate axes.
    pub fn regular(crs: CoordinateSystem, y: Axis, x: Axis) -> TerraResult<Self> {
        if y.role() != AxisRole::Y || x.role() != AxisRole::X {
            return Err(TerraError::InvalidAxisLayout(format!(
                "regular grid needs (Y, X) axes, got ({:?}, {:?})",
                y.role(),
                x.role()
            )));
        }
        if y.coordinate_values().is_none() || x.coordinate_values().is_none() {
            return Err(TerraError::InvalidAxisLayout(
                "regular grid axes must carry coordinates".to_string(),
            ));
        }
        if y.name() == x.name() {
            return Err(TerraError::InvalidAxisLayout(format!(
                "y and x axes share the name '{}'",
                y.name()
            )));
        }
        Ok(Self { crs, y, x, mesh: None })
    }

    /// Geographic regular grid from latitude and longitude vectors.
    pub fn geographic(lat: Vec<f64>, lon: Vec<f64>) -> TerraResult<Self> {
        Self::regular(
            CoordinateSystem::Geographic,
            Axis::coordinates("lat", AxisRole::Y, lat)?,
            Axis::coordinates("lon", AxisRole::X, lon)?,
        )
    }

    /// Curvilinear grid: index axes plus a lon/lat mesh of `ny * nx` cells.
    pub fn curvilinear(
        crs: CoordinateSystem,
        y_name: &str,
        x_name: &str,
        ny: usize,
        nx: usize,
        mesh: CurvilinearMesh,
    ) -> TerraResult<Self> {
        let cells = ny * nx;
        if mesh.lon.len() != cells || mesh.lat.len() != cells {
            return Err(TerraError::shape_mismatch(
                "curvilinear mesh",
                [cells, cells],
                [mesh.lon.len(), mesh.lat.len()],
            ));
        }
        if y_name == x_name {
            return Err(TerraError::InvalidAxisLayout(format!(
                "y and x axes share the name '{}'",
                y_name
            )));
        }
        Ok(Self {
            crs,
            y: Axis::indices(y_name, AxisRole::Y, ny)?,
            x: Axis::indices(x_name, AxisRole::X, nx)?,
            mesh: Some(mesh),
        })
    }

    pub fn crs(&self) -> &CoordinateSystem {
        &self.crs
    }

    pub fn y(&self) -> &Axis {
        &self.y
    }

    pub fn x(&self) -> &Axis {
        &self.x
    }

    pub fn mesh(&self) -> Option<&CurvilinearMesh> {
        self.mesh.as_ref()
    }

    pub fn is_curvilinear(&self) -> bool {
        self.mesh.is_some()
    }

    /// (rows, columns).
    pub fn shape(&self) -> (usize, usize) {
        (self.y.len(), self.x.len())
    }

    /// Total number of grid cells.
    pub fn len(&self) -> usize {
        self.y.len() * self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinates of a cell as (x, y); lon/lat degrees on curvilinear grids.
    pub fn node(&self, row: usize, col: usize) -> Option<(f64, f64)> {
        let (ny, nx) = self.shape();
        if row >= ny || col >= nx {
            return None;
        }
        match &self.mesh {
            Some(mesh) => {
                let i = row * nx + col;
                Some((mesh.lon[i], mesh.lat[i]))
            }
            None => {
                let xs = self.x.coordinate_values()?;
                let ys = self.y.coordinate_values()?;
                Some((xs[col], ys[row]))
            }
        }
    }

    /// Extent of all cell coordinates.
    pub fn bbox(&self) -> Option<BoundingBox> {
        let (ny, nx) = self.shape();
        BoundingBox::from_points((0..ny).flat_map(|r| (0..nx).filter_map(move |c| self.node(r, c))))
    }

    /// Keep only the given rows, in order.
    pub(crate) fn take_rows(&self, rows: &[usize]) -> SpatialGrid {
        let nx = self.x.len();
        SpatialGrid {
            crs: self.crs.clone(),
            y: self.y.take(rows),
            x: self.x.clone(),
            mesh: self.mesh.as_ref().map(|m| CurvilinearMesh {
                lon: rows.iter().flat_map(|&r| m.lon[r * nx..(r + 1) * nx].iter().copied()).collect(),
                lat: rows.iter().flat_map(|&r| m.lat[r * nx..(r + 1) * nx].iter().copied()).collect(),
            }),
        }
    }

    /// Keep only the given columns, in order.
    pub(crate) fn take_cols(&self, cols: &[usize]) -> SpatialGrid {
        let (ny, nx) = self.shape();
        let pick = |values: &Vec<f64>| -> Vec<f64> {
            (0..ny)
                .flat_map(|r| cols.iter().map(move |&c| values[r * nx + c]))
                .collect()
        };
        SpatialGrid {
            crs: self.crs.clone(),
            y: self.y.clone(),
            x: self.x.take(cols),
            mesh: self.mesh.as_ref().map(|m| CurvilinearMesh {
                lon: pick(&m.lon),
                lat: pick(&m.lat),
            }),
        }
    }

    /// Describe the first difference between two grids, for error messages.
    pub fn describe_difference(&self, other: &SpatialGrid) -> String {
        if self.crs != other.crs {
            format!("CRS {} vs {}", self.crs, other.crs)
        } else if self.shape() != other.shape() {
            format!("shape {:?} vs {:?}", self.shape(), other.shape())
        } else if self.y != other.y {
            format!("'{}' axis coordinates differ", self.y.name())
        } else if self.x != other.x {
            format!("'{}' axis coordinates differ", self.x.name())
        } else {
            "curvilinear meshes differ".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_role_compatibility() {
        assert!(Axis::coordinates("lon", AxisRole::X, vec![0.0, 1.0]).is_ok());
        assert!(Axis::new("t", AxisRole::Time, AxisValues::Coordinates(vec![0.0])).is_err());
        assert!(Axis::new("doy", AxisRole::DayOfYear, AxisValues::Indices(3)).is_err());
    }

    #[test]
    fn test_axis_monotonicity() {
        assert!(Axis::coordinates("lat", AxisRole::Y, vec![51.0, 50.0, 49.0]).is_ok());
        assert!(Axis::coordinates("lat", AxisRole::Y, vec![49.0, 50.0, 50.0]).is_err());
        assert!(Axis::coordinates("lat", AxisRole::Y, vec![49.0, 51.0, 50.0]).is_err());
        assert!(Axis::coordinates("lat", AxisRole::Y, vec![49.0, f64::NAN]).is_err());

        let d = |day| NaiveDate::from_ymd_opt(2024, 7, day).unwrap();
        assert!(Axis::time("time", vec![d(1), d(3), d(10)]).is_ok());
        assert!(Axis::time("time", vec![d(3), d(1)]).is_err());
    }

    #[test]
    fn test_grid_node_and_bbox() {
        let grid = SpatialGrid::geographic(vec![51.0, 50.0], vec![20.0, 21.0, 22.0]).unwrap();
        assert_eq!(grid.shape(), (2, 3));
        assert_eq!(grid.node(1, 2), Some((22.0, 50.0)));
        assert_eq!(grid.node(2, 0), None);
        assert_eq!(grid.bbox(), Some(BoundingBox::new(20.0, 50.0, 22.0, 51.0)));
    }

    #[test]
    fn test_curvilinear_mesh_subsetting() {
        let mesh = CurvilinearMesh {
            lon: vec![10.0, 11.0, 12.0, 10.5, 11.5, 12.5],
            lat: vec![45.0, 45.1, 45.2, 44.0, 44.1, 44.2],
        };
        let grid = SpatialGrid::curvilinear(CoordinateSystem::Geographic, "y", "x", 2, 3, mesh).unwrap();
        assert!(grid.is_curvilinear());
        assert_eq!(grid.node(1, 1), Some((11.5, 44.1)));

        let cols = grid.take_cols(&[0, 2]);
        assert_eq!(cols.shape(), (2, 2));
        assert_eq!(cols.node(1, 1), Some((12.5, 44.2)));

        let rows = grid.take_rows(&[1]);
        assert_eq!(rows.shape(), (1, 3));
        assert_eq!(rows.node(0, 0), Some((10.5, 44.0)));
    }

    #[test]
    fn test_curvilinear_mesh_size_checked() {
        let mesh = CurvilinearMesh {
            lon: vec![0.0; 5],
            lat: vec![0.0; 6],
        };
        let err = SpatialGrid::curvilinear(CoordinateSystem::Geographic, "y", "x", 2, 3, mesh).unwrap_err();
        assert_eq!(err.kind(), "ShapeMismatch");
    }
}
