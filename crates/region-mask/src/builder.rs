//! Rasterize polygons onto a spatial grid.

use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

use terra_common::{BooleanField, SpatialGrid, TerraError, TerraResult};

use crate::mask::RegionMask;
use crate::polygon::RegionPolygon;
use crate::strategy::{IndexedLocator, MaskStrategy, NaiveLocator, RowLocator, SamplePosition};

/// Builds [`RegionMask`]s with an explicit strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskBuilder {
    strategy: MaskStrategy,
    sample_position: SamplePosition,
}

impl MaskBuilder {
    pub fn new(strategy: MaskStrategy) -> Self {
        Self {
            strategy,
            sample_position: SamplePosition::Node,
        }
    }

    pub fn with_sample_position(mut self, position: SamplePosition) -> Self {
        self.sample_position = position;
        self
    }

    pub fn strategy(&self) -> MaskStrategy {
        self.strategy
    }

    /// Mask of the union of `polygons` over `grid`.
    pub fn build(&self, polygons: &[RegionPolygon], grid: &SpatialGrid) -> TerraResult<RegionMask> {
        if polygons.is_empty() {
            return Err(TerraError::EmptyRegionSet);
        }

        let start = Instant::now();
        let rows = sample_rows(grid, self.sample_position)?;

        let cells: Vec<bool> = match self.strategy {
            MaskStrategy::Indexed => {
                let locator = IndexedLocator::new(polygons);
                rows.par_iter()
                    .map(|row| locator.locate_row(row))
                    .collect::<Vec<_>>()
                    .into_iter()
                    .flatten()
                    .collect()
            }
            MaskStrategy::Naive => {
                let locator = NaiveLocator::new(polygons);
                rows.iter().flat_map(|row| locator.locate_row(row)).collect()
            }
        };

        let field = BooleanField::new("roi_mask", grid.clone(), cells)?;
        let mask = RegionMask::from_field(field, polygons.len(), self.strategy);

        let (ny, nx) = grid.shape();
        info!(
            strategy = %self.strategy,
            polygons = polygons.len(),
            edges = polygons.iter().map(RegionPolygon::edge_count).sum::<usize>(),
            rows = ny,
            cols = nx,
            inside = mask.inside_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built region mask"
        );
        if mask.inside_count() == 0 && !grid.is_empty() {
            warn!("Region mask selects no grid cells; statistics over it will be empty");
        }

        Ok(mask)
    }
}

/// Sample points per mesh row, in (x, y) order.
fn sample_rows(grid: &SpatialGrid, position: SamplePosition) -> TerraResult<Vec<Vec<(f64, f64)>>> {
    let (ny, nx) = grid.shape();

    if let Some(mesh) = grid.mesh() {
        if position == SamplePosition::CellCorner {
            return Err(TerraError::invalid_parameter(
                "sample_position",
                "cell-corner sampling needs regular 1-D coordinate axes",
            ));
        }
        debug!(rows = ny, cols = nx, "Sampling curvilinear mesh");
        return Ok((0..ny)
            .map(|r| (0..nx).map(|c| (mesh.lon[r * nx + c], mesh.lat[r * nx + c])).collect())
            .collect());
    }

    if !grid.crs().is_geographic() {
        return Err(TerraError::CoordinateSystemMismatch(format!(
            "ROI polygons are in degrees but the grid is in {}; reproject the grid or provide a lon/lat mesh",
            grid.crs()
        )));
    }

    let coords = |axis: &terra_common::Axis| -> TerraResult<Vec<f64>> {
        let values = axis.coordinate_values().ok_or_else(|| {
            TerraError::InvalidAxisLayout(format!("axis '{}' has no coordinates", axis.name()))
        })?;
        match position {
            SamplePosition::Node => Ok(values.to_vec()),
            SamplePosition::CellCorner => cell_centres(values, axis.name()),
        }
    };
    let xs = coords(grid.x())?;
    let ys = coords(grid.y())?;

    Ok(ys.iter().map(|&y| xs.iter().map(|&x| (x, y)).collect()).collect())
}

fn cell_centres(corners: &[f64], axis: &str) -> TerraResult<Vec<f64>> {
    if corners.len() < 2 {
        return Err(TerraError::InsufficientData(format!(
            "axis '{}' needs at least two coordinates for cell-corner sampling",
            axis
        )));
    }
    let last_step = corners[corners.len() - 1] - corners[corners.len() - 2];
    Ok(corners
        .iter()
        .enumerate()
        .map(|(i, &c)| match corners.get(i + 1) {
            Some(&next) => (c + next) / 2.0,
            None => c + last_step / 2.0,
        })
        .collect())
}
