//! JSON documents for fields, climatologies and masks.
//!
//! Decoded rasters arrive as field documents: axes with explicit roles, a
//! CRS code, optional curvilinear mesh and a flat row-major value list in
//! which `null` marks a missing sample. Raw integer products can carry a
//! `fill_value` (mapped to NaN) and a `scale_factor` (applied after).

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use anomaly_engine::Climatology;
use region_mask::{MaskStrategy, RegionMask};
use terra_common::time::parse_acquisition_date;
use terra_common::{Axis, BooleanField, CoordinateSystem, CurvilinearMesh, GriddedField, SpatialGrid};

/// Spatial part of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridDocument {
    pub crs: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs_unit: Option<String>,
    pub y: Axis,
    pub x: Axis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<CurvilinearMesh>,
}

impl GridDocument {
    pub fn from_grid(grid: &SpatialGrid) -> Self {
        let crs_unit = grid.crs().linear_unit().map(|u| match u {
            terra_common::LinearUnit::Metre => "m".to_string(),
            terra_common::LinearUnit::Kilometre => "km".to_string(),
        });
        Self {
            crs: grid.crs().code().to_string(),
            crs_unit,
            y: grid.y().clone(),
            x: grid.x().clone(),
            mesh: grid.mesh().cloned(),
        }
    }

    /// Rebuild the grid through the validating constructors.
    pub fn to_grid(&self) -> Result<SpatialGrid> {
        let crs = CoordinateSystem::from_code(&self.crs, self.crs_unit.as_deref())
            .with_context(|| format!("Invalid CRS '{}'", self.crs))?;
        let grid = match &self.mesh {
            Some(mesh) => SpatialGrid::curvilinear(
                crs,
                self.y.name(),
                self.x.name(),
                self.y.len(),
                self.x.len(),
                mesh.clone(),
            )?,
            None => SpatialGrid::regular(crs, revalidate(&self.y)?, revalidate(&self.x)?)?,
        };
        Ok(grid)
    }
}

/// A gridded field on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    /// Leading axes, outermost first.
    #[serde(default)]
    pub axes: Vec<Axis>,
    #[serde(flatten)]
    pub grid: GridDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_value: Option<f64>,
    pub values: Vec<Option<f32>>,
}

impl FieldDocument {
    pub fn from_field(field: &GriddedField) -> Self {
        Self {
            name: field.name().to_string(),
            units: field.units().map(str::to_string),
            axes: field.leading_axes().to_vec(),
            grid: GridDocument::from_grid(field.grid()),
            scale_factor: None,
            fill_value: None,
            values: field.values().iter().map(|&v| (!v.is_nan()).then_some(v)).collect(),
        }
    }

    /// Decode into a field, applying the fill value and then the scale
    /// factor. `default_scale` is used when the document has none.
    pub fn into_field(self, default_scale: Option<f64>) -> Result<GriddedField> {
        let grid = self.grid.to_grid()?;
        let leading = self.axes.iter().map(revalidate).collect::<Result<Vec<_>>>()?;
        let scale = self.scale_factor.or(default_scale);
        let fill = self.fill_value;

        let data = self
            .values
            .into_iter()
            .map(|v| match v {
                None => f32::NAN,
                Some(raw) if fill.is_some_and(|f| raw as f64 == f) => f32::NAN,
                Some(raw) => match scale {
                    Some(s) => (raw as f64 * s) as f32,
                    None => raw,
                },
            })
            .collect();

        let field = GriddedField::new(self.name, leading, grid, data)?;
        Ok(match self.units {
            Some(units) => field.with_units(units),
            None => field,
        })
    }
}

/// A climatology with its per-key sample counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimatologyDocument {
    pub baseline_years: BTreeSet<i32>,
    pub sample_counts: Vec<u32>,
    pub field: FieldDocument,
}

/// A boolean field (ROI mask or water classification).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BooleanDocument {
    pub name: String,
    #[serde(flatten)]
    pub grid: GridDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<MaskStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon_count: Option<usize>,
    pub cells: Vec<bool>,
}

impl BooleanDocument {
    pub fn from_field(field: &BooleanField) -> Self {
        Self {
            name: field.name().to_string(),
            grid: GridDocument::from_grid(field.grid()),
            strategy: None,
            polygon_count: None,
            cells: field.cells().to_vec(),
        }
    }

    pub fn from_mask(mask: &RegionMask) -> Self {
        Self {
            strategy: Some(mask.strategy()),
            polygon_count: Some(mask.polygon_count()),
            ..Self::from_field(mask.as_field())
        }
    }

    pub fn into_field(self) -> Result<BooleanField> {
        Ok(BooleanField::new(self.name, self.grid.to_grid()?, self.cells)?)
    }
}

fn revalidate(axis: &Axis) -> Result<Axis> {
    Axis::new(axis.name(), axis.role(), axis.values().clone())
        .with_context(|| format!("Invalid axis '{}'", axis.name()))
}

// ============================================================================
// Reading and writing
// ============================================================================

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {:?}", path))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let text = serde_json::to_string(value)?;
    fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))?;
    debug!(path = %path.display(), "Wrote document");
    Ok(())
}

pub fn read_field(path: &Path, default_scale: Option<f64>) -> Result<GriddedField> {
    let doc: FieldDocument = read_json(path)?;
    doc.into_field(default_scale)
        .with_context(|| format!("Invalid field document {:?}", path))
}

/// Read a field if `path` is configured and exists.
pub fn read_optional_field(path: Option<&Path>) -> Result<Option<GriddedField>> {
    match path {
        Some(p) if p.exists() => Ok(Some(read_field(p, None)?)),
        Some(p) => {
            warn!(path = %p.display(), "Configured product does not exist");
            Ok(None)
        }
        None => Ok(None),
    }
}

pub fn write_field(path: &Path, field: &GriddedField) -> Result<()> {
    write_json(path, &FieldDocument::from_field(field))?;
    info!(path = %path.display(), field = %field.name(), shape = ?field.shape(), "Wrote field");
    Ok(())
}

pub fn read_climatology(path: &Path) -> Result<Climatology> {
    let doc: ClimatologyDocument = read_json(path)?;
    let field = doc.field.into_field(None)?;
    Ok(Climatology::from_parts(field, doc.baseline_years, doc.sample_counts)?)
}

pub fn write_climatology(path: &Path, climatology: &Climatology) -> Result<()> {
    let doc = ClimatologyDocument {
        baseline_years: climatology.baseline_years().clone(),
        sample_counts: climatology.sample_counts().to_vec(),
        field: FieldDocument::from_field(climatology.field()),
    };
    write_json(path, &doc)?;
    info!(path = %path.display(), covered_keys = climatology.covered_keys().len(), "Wrote climatology");
    Ok(())
}

pub fn read_boolean(path: &Path) -> Result<BooleanField> {
    let doc: BooleanDocument = read_json(path)?;
    doc.into_field()
}

pub fn read_optional_boolean(path: Option<&Path>) -> Result<Option<BooleanField>> {
    match path {
        Some(p) if p.exists() => Ok(Some(read_boolean(p)?)),
        _ => Ok(None),
    }
}

pub fn write_boolean(path: &Path, field: &BooleanField) -> Result<()> {
    write_json(path, &BooleanDocument::from_field(field))
}

pub fn write_mask(path: &Path, mask: &RegionMask) -> Result<()> {
    write_json(path, &BooleanDocument::from_mask(mask))?;
    info!(path = %path.display(), inside = mask.inside_count(), "Wrote mask");
    Ok(())
}

// ============================================================================
// Slice discovery
// ============================================================================

/// Dated slice documents under `dir`, sorted by date.
///
/// Files without an acquisition stamp in their name are skipped.
pub fn discover_slices(dir: &Path) -> Result<Vec<(NaiveDate, PathBuf)>> {
    if !dir.is_dir() {
        bail!("Slice directory {:?} does not exist", dir);
    }
    let mut slices = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", dir))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        match parse_acquisition_date(&name) {
            Some(date) => slices.push((date, path.to_path_buf())),
            None => debug!(file = %name, "Skipping file without acquisition date"),
        }
    }
    slices.sort();
    Ok(slices)
}

/// Read every dated 2-D slice under `dir` and stack them along `time`.
pub fn stack_directory(dir: &Path, name: &str, default_scale: Option<f64>) -> Result<GriddedField> {
    let slices = discover_slices(dir)?;
    if slices.is_empty() {
        bail!("No dated slice documents found under {:?}", dir);
    }
    let mut fields = Vec::with_capacity(slices.len());
    for (date, path) in &slices {
        let field = read_field(path, default_scale)?.with_name(name);
        fields.push((*date, field));
    }
    let stacked = GriddedField::stack_time("time", fields)
        .with_context(|| format!("Failed to stack slices under {:?}", dir))?;
    info!(dir = %dir.display(), slices = slices.len(), field = name, "Stacked slices");
    Ok(stacked)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLICE: &str = r#"{
        "name": "LST_Day_1km",
        "units": "K",
        "crs": "EPSG:4326",
        "y": {"name": "lat", "role": "y", "values": {"kind": "coordinates", "values": [50.0, 51.0]}},
        "x": {"name": "lon", "role": "x", "values": {"kind": "coordinates", "values": [20.0, 21.0]}},
        "scale_factor": 0.02,
        "fill_value": 0,
        "values": [15000, 0, null, 14500]
    }"#;

    #[test]
    fn test_fill_then_scale() {
        let doc: FieldDocument = serde_json::from_str(SLICE).unwrap();
        let field = doc.into_field(None).unwrap();
        assert_eq!(field.values()[0], 300.0);
        assert!(field.values()[1].is_nan());
        assert!(field.values()[2].is_nan());
        assert_eq!(field.values()[3], 290.0);
        assert_eq!(field.units(), Some("K"));
    }

    #[test]
    fn test_document_scale_overrides_default() {
        let doc: FieldDocument = serde_json::from_str(SLICE).unwrap();
        let field = doc.into_field(Some(1.0)).unwrap();
        assert_eq!(field.values()[0], 300.0);
    }

    #[test]
    fn test_unordered_axis_is_rejected() {
        let text = SLICE.replace("[50.0, 51.0]", "[51.0, 51.0]");
        let doc: FieldDocument = serde_json::from_str(&text).unwrap();
        assert!(doc.into_field(None).is_err());
    }
}
