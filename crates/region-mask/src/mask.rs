//! Boolean region masks bound to one spatial grid.

use terra_common::{BooleanField, GriddedField, SpatialGrid, TerraError, TerraResult};

use crate::strategy::MaskStrategy;

/// A rasterized ROI: `true` = inside or on the boundary.
///
/// Masks are read-only after construction and can be shared across threads
/// and reused for any field on an equal grid.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMask {
    field: BooleanField,
    polygon_count: usize,
    strategy: MaskStrategy,
}

impl RegionMask {
    /// Wrap an existing boolean field, e.g. one read back from disk.
    pub fn from_field(field: BooleanField, polygon_count: usize, strategy: MaskStrategy) -> Self {
        Self {
            field,
            polygon_count,
            strategy,
        }
    }

    pub fn name(&self) -> &str {
        self.field.name()
    }

    pub fn grid(&self) -> &SpatialGrid {
        self.field.grid()
    }

    pub fn cells(&self) -> &[bool] {
        self.field.cells()
    }

    pub fn as_field(&self) -> &BooleanField {
        &self.field
    }

    pub fn polygon_count(&self) -> usize {
        self.polygon_count
    }

    pub fn strategy(&self) -> MaskStrategy {
        self.strategy
    }

    pub fn inside_count(&self) -> usize {
        self.field.count_true()
    }

    pub fn is_compatible(&self, grid: &SpatialGrid) -> bool {
        self.grid() == grid
    }

    /// Fail with `CoordinateSystemMismatch` unless `grid` is the mask grid.
    pub fn ensure_compatible(&self, grid: &SpatialGrid, what: &str) -> TerraResult<()> {
        if !self.is_compatible(grid) {
            return Err(TerraError::CoordinateSystemMismatch(format!(
                "mask '{}' does not match the grid of '{}': {}",
                self.name(),
                what,
                self.grid().describe_difference(grid)
            )));
        }
        Ok(())
    }

    /// Set every sample outside the mask to NaN, for each 2-D slice.
    pub fn apply(&self, field: &GriddedField) -> TerraResult<GriddedField> {
        self.ensure_compatible(field.grid(), field.name())?;
        let cells = self.cells();
        let n = cells.len().max(1);
        let masked: Vec<f32> = field
            .values()
            .iter()
            .enumerate()
            .map(|(i, &v)| if cells[i % n] { v } else { f32::NAN })
            .collect();
        GriddedField::new(field.name(), field.leading_axes().to_vec(), field.grid().clone(), masked)
            .map(|f| match field.units() {
                Some(units) => f.with_units(units),
                None => f,
            })
    }
}
