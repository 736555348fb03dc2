//! Spectral indices from surface reflectance bands.

use terra_common::{BooleanField, GriddedField, TerraResult};

/// `(a - b) / (a + b)`, NaN where the denominator is zero.
pub fn normalized_difference(a: &GriddedField, b: &GriddedField, name: &str) -> TerraResult<GriddedField> {
    let index = a.zip_with(b, |x, y| {
        let sum = x + y;
        if sum == 0.0 {
            f32::NAN
        } else {
            (x - y) / sum
        }
    })?;
    Ok(index.with_name(name))
}

/// Modified Normalized Difference Water Index, `(green - swir1) / (green + swir1)`.
pub fn mndwi(green: &GriddedField, swir1: &GriddedField) -> TerraResult<GriddedField> {
    normalized_difference(green, swir1, "mndwi")
}

/// Normalized Difference Vegetation Index, `(nir - red) / (nir + red)`.
pub fn ndvi(red: &GriddedField, nir: &GriddedField) -> TerraResult<GriddedField> {
    normalized_difference(nir, red, "ndvi")
}

/// Water where MNDWI is strictly above `threshold`.
pub fn classify_water(mndwi: &GriddedField, threshold: f32) -> TerraResult<BooleanField> {
    mndwi.classify("water", |v| v > threshold)
}
