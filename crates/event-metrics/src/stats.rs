//! Statistics restricted to a region mask.
//!
//! Every operation takes all samples of a field (every time step) whose
//! cell lies inside the mask and whose value is not NaN. Month windows are
//! applied to the field beforehand with `GriddedField::select_months`.

use tracing::debug;

use region_mask::RegionMask;
use terra_common::{BooleanField, GriddedField, SpatialGrid, TerraError, TerraResult};

/// Kilometres per degree of latitude (and of longitude at the equator).
pub const KM_PER_DEGREE: f64 = 111.32;

/// Masked reductions over gridded fields.
///
/// Without a mask every cell is in scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskedStatistics<'a> {
    mask: Option<&'a RegionMask>,
}

impl<'a> MaskedStatistics<'a> {
    pub fn new(mask: Option<&'a RegionMask>) -> Self {
        Self { mask }
    }

    pub fn mask(&self) -> Option<&'a RegionMask> {
        self.mask
    }

    /// In-scope, non-NaN samples of `field` in storage order.
    pub fn scoped_values(&self, field: &GriddedField) -> TerraResult<Vec<f32>> {
        let cells = self.scope_cells(field.grid(), field.name())?;
        let n = field.grid().len().max(1);
        Ok(field
            .values()
            .iter()
            .enumerate()
            .filter(|(i, v)| !v.is_nan() && cells.map_or(true, |c| c[i % n]))
            .map(|(_, &v)| v)
            .collect())
    }

    /// Mean of the in-scope samples, None when there are none.
    pub fn mean(&self, field: &GriddedField) -> TerraResult<Option<f64>> {
        let values = self.scoped_values(field)?;
        if values.is_empty() {
            debug!(field = %field.name(), "No samples in scope for mean");
            return Ok(None);
        }
        let sum: f64 = values.iter().map(|&v| v as f64).sum();
        Ok(Some(sum / values.len() as f64))
    }

    /// `p`-th percentile (0 < p < 100) of the in-scope samples.
    pub fn percentile(&self, field: &GriddedField, p: f64) -> TerraResult<f64> {
        let mut values: Vec<f64> = self.scoped_values(field)?.into_iter().map(f64::from).collect();
        if values.is_empty() {
            return Err(TerraError::InsufficientData(format!(
                "no samples of '{}' in scope for the {} percentile",
                field.name(),
                p
            )));
        }
        percentile(&mut values, p)
    }

    /// Number of in-scope samples strictly above `threshold`, over all time
    /// steps.
    pub fn exceedance_count(&self, field: &GriddedField, threshold: f64) -> TerraResult<u64> {
        let values = self.scoped_values(field)?;
        Ok(values.iter().filter(|&&v| v as f64 > threshold).count() as u64)
    }

    /// `(count(b) - count(a)) * pixel_area` over in-scope cells.
    ///
    /// Both classifications must be on the same grid (and on the mask grid).
    pub fn area_delta(&self, a: &BooleanField, b: &BooleanField, pixel_area: f64) -> TerraResult<f64> {
        if a.grid() != b.grid() {
            return Err(TerraError::CoordinateSystemMismatch(format!(
                "'{}' and '{}' are on different grids: {}",
                a.name(),
                b.name(),
                a.grid().describe_difference(b.grid())
            )));
        }
        let cells = self.scope_cells(a.grid(), a.name())?;
        let count = |field: &BooleanField| {
            field
                .cells()
                .iter()
                .enumerate()
                .filter(|(i, &c)| c && cells.map_or(true, |m| m[*i]))
                .count() as i64
        };
        let (count_a, count_b) = (count(a), count(b));
        debug!(a = %a.name(), b = %b.name(), count_a, count_b, pixel_area, "Area delta");
        Ok((count_b - count_a) as f64 * pixel_area)
    }

    fn scope_cells(&self, grid: &SpatialGrid, what: &str) -> TerraResult<Option<&'a [bool]>> {
        match self.mask {
            Some(mask) => {
                mask.ensure_compatible(grid, what)?;
                Ok(Some(mask.cells()))
            }
            None => Ok(None),
        }
    }
}

/// Percentile with linear interpolation between order statistics, at rank
/// `p / 100 * (n - 1)`. Sorts `values` in place.
pub fn percentile(values: &mut [f64], p: f64) -> TerraResult<f64> {
    if !(p > 0.0 && p < 100.0) {
        return Err(TerraError::invalid_parameter(
            "percentile",
            format!("{} is outside the open interval (0, 100)", p),
        ));
    }
    if values.is_empty() {
        return Err(TerraError::InsufficientData("percentile of an empty sample".to_string()));
    }
    values.sort_by(f64::total_cmp);

    let rank = p / 100.0 * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Ok(values[lo] + (values[hi] - values[lo]) * frac)
}

/// Nominal area of one grid cell in km².
///
/// Geographic grids use the mean spacing in degrees times 111.32 km, with
/// longitude scaled by the cosine of the mean latitude. Projected grids
/// multiply the mean spacings in their linear unit. Curvilinear meshes are
/// lon/lat degrees and are treated as geographic.
pub fn pixel_area_km2(grid: &SpatialGrid) -> TerraResult<f64> {
    if let Some(mesh) = grid.mesh() {
        let (ny, nx) = grid.shape();
        if ny < 2 || nx < 2 {
            return Err(TerraError::InsufficientData(format!(
                "curvilinear grid of {}x{} cells has no spacing",
                ny, nx
            )));
        }
        let mut dlon = Vec::with_capacity(ny * (nx - 1));
        let mut dlat = Vec::with_capacity((ny - 1) * nx);
        for r in 0..ny {
            for c in 0..nx {
                let i = r * nx + c;
                if c + 1 < nx {
                    dlon.push((mesh.lon[i + 1] - mesh.lon[i]).abs());
                }
                if r + 1 < ny {
                    dlat.push((mesh.lat[i + nx] - mesh.lat[i]).abs());
                }
            }
        }
        let mean_lat = mesh.lat.iter().sum::<f64>() / mesh.lat.len() as f64;
        return Ok(geographic_area(mean(&dlon), mean(&dlat), mean_lat));
    }

    let xs = axis_coordinates(grid.x().coordinate_values(), grid.x().name())?;
    let ys = axis_coordinates(grid.y().coordinate_values(), grid.y().name())?;
    let dx = mean_spacing(xs);
    let dy = mean_spacing(ys);

    match grid.crs().linear_unit() {
        None => Ok(geographic_area(dx, dy, mean(ys))),
        Some(unit) => Ok(dx * unit.kilometres() * dy * unit.kilometres()),
    }
}

fn geographic_area(dlon: f64, dlat: f64, mean_lat: f64) -> f64 {
    dlon * KM_PER_DEGREE * mean_lat.to_radians().cos() * dlat * KM_PER_DEGREE
}

fn axis_coordinates<'g>(values: Option<&'g [f64]>, name: &str) -> TerraResult<&'g [f64]> {
    match values {
        Some(v) if v.len() >= 2 => Ok(v),
        _ => Err(TerraError::InsufficientData(format!(
            "axis '{}' needs at least two coordinates to derive a cell size",
            name
        ))),
    }
}

fn mean_spacing(coords: &[f64]) -> f64 {
    let steps: Vec<f64> = coords.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    mean(&steps)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use terra_common::{Axis, AxisRole, CoordinateSystem};

    #[test]
    fn test_percentile_interpolates() {
        assert_eq!(percentile(&mut [1.0, 2.0, 3.0, 4.0, 5.0], 50.0).unwrap(), 3.0);
        assert_eq!(percentile(&mut [5.0, 1.0, 4.0, 2.0, 3.0], 25.0).unwrap(), 2.0);
        assert!((percentile(&mut [10.0, 20.0], 95.0).unwrap() - 19.5).abs() < 1e-12);
        assert_eq!(percentile(&mut [7.0], 90.0).unwrap(), 7.0);
    }

    #[test]
    fn test_percentile_rejects_bounds() {
        for p in [0.0, 100.0, -1.0, f64::NAN] {
            let err = percentile(&mut [1.0, 2.0], p).unwrap_err();
            assert_eq!(err.kind(), "InvalidParameter");
        }
        assert_eq!(percentile(&mut [], 50.0).unwrap_err().kind(), "InsufficientData");
    }

    #[test]
    fn test_projected_pixel_area() {
        let grid = SpatialGrid::regular(
            CoordinateSystem::from_code("EPSG:3035", None).unwrap(),
            Axis::coordinates("y", AxisRole::Y, vec![0.0, 500.0, 1000.0]).unwrap(),
            Axis::coordinates("x", AxisRole::X, vec![0.0, 250.0]).unwrap(),
        )
        .unwrap();
        assert!((pixel_area_km2(&grid).unwrap() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_single_coordinate_axis() {
        let grid = SpatialGrid::geographic(vec![50.0], vec![10.0, 11.0]).unwrap();
        assert_eq!(pixel_area_km2(&grid).unwrap_err().kind(), "InsufficientData");
    }
}
