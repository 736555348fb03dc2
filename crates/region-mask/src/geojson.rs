//! GeoJSON types for region-of-interest files.
//!
//! ROI files are plain GeoJSON FeatureCollections in WGS84 degrees. Only
//! Polygon and MultiPolygon geometries describe an area; any other geometry
//! type is rejected when the collection is converted to polygons.
//!
//! See: <https://datatracker.ietf.org/doc/html/rfc7946>

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use terra_common::{TerraError, TerraResult};

use crate::polygon::RegionPolygon;

/// A GeoJSON FeatureCollection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoiFeatureCollection {
    /// Type identifier (always "FeatureCollection").
    #[serde(rename = "type")]
    pub type_: String,

    pub features: Vec<RoiFeature>,
}

impl RoiFeatureCollection {
    pub fn new() -> Self {
        Self {
            type_: "FeatureCollection".to_string(),
            features: Vec::new(),
        }
    }

    pub fn with_feature(mut self, feature: RoiFeature) -> Self {
        self.features.push(feature);
        self
    }

    /// Read a collection from a GeoJSON file.
    pub fn load(path: impl AsRef<Path>) -> TerraResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TerraError::Storage(format!("reading ROI {}: {}", path.display(), e)))?;
        text.parse()
    }

    /// Convert every feature into validated polygons, in feature order.
    ///
    /// MultiPolygons expand into one polygon per member.
    pub fn to_polygons(&self) -> TerraResult<Vec<RegionPolygon>> {
        let mut polygons = Vec::new();
        for (i, feature) in self.features.iter().enumerate() {
            let label = feature.label(i);
            match &feature.geometry {
                RoiGeometry::Polygon { coordinates } => {
                    polygons.push(polygon_from_rings(coordinates, &label)?);
                }
                RoiGeometry::MultiPolygon { coordinates } => {
                    for rings in coordinates {
                        polygons.push(polygon_from_rings(rings, &label)?);
                    }
                }
                other => {
                    return Err(TerraError::InvalidGeometry(format!(
                        "feature {} has {} geometry; only Polygon and MultiPolygon describe a region",
                        label,
                        other.type_name()
                    )));
                }
            }
        }
        Ok(polygons)
    }
}

impl Default for RoiFeatureCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for RoiFeatureCollection {
    type Err = TerraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let collection: RoiFeatureCollection = serde_json::from_str(s)?;
        if collection.type_ != "FeatureCollection" {
            return Err(TerraError::Serialization(format!(
                "expected a FeatureCollection, got '{}'",
                collection.type_
            )));
        }
        Ok(collection)
    }
}

/// A GeoJSON Feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoiFeature {
    /// Type identifier (always "Feature").
    #[serde(rename = "type")]
    pub type_: String,

    /// Feature identifier; GeoJSON allows strings and numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,

    pub geometry: RoiGeometry,

    #[serde(default)]
    pub properties: Option<HashMap<String, serde_json::Value>>,
}

impl RoiFeature {
    pub fn polygon(rings: Vec<Vec<[f64; 2]>>) -> Self {
        Self {
            type_: "Feature".to_string(),
            id: None,
            geometry: RoiGeometry::Polygon { coordinates: rings },
            properties: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(serde_json::Value::String(id.into()));
        self
    }

    /// Human readable label for log and error messages.
    fn label(&self, index: usize) -> String {
        match &self.id {
            Some(serde_json::Value::String(s)) => format!("'{}'", s),
            Some(other) => format!("'{}'", other),
            None => format!("#{}", index),
        }
    }
}

/// GeoJSON geometry types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum RoiGeometry {
    Point {
        coordinates: [f64; 2],
    },

    LineString {
        coordinates: Vec<[f64; 2]>,
    },

    /// Array of linear rings (first is exterior, rest are holes), each an
    /// array of [longitude, latitude] pairs.
    Polygon {
        coordinates: Vec<Vec<[f64; 2]>>,
    },

    MultiPolygon {
        coordinates: Vec<Vec<Vec<[f64; 2]>>>,
    },
}

impl RoiGeometry {
    fn type_name(&self) -> &'static str {
        match self {
            RoiGeometry::Point { .. } => "Point",
            RoiGeometry::LineString { .. } => "LineString",
            RoiGeometry::Polygon { .. } => "Polygon",
            RoiGeometry::MultiPolygon { .. } => "MultiPolygon",
        }
    }
}

fn polygon_from_rings(rings: &[Vec<[f64; 2]>], label: &str) -> TerraResult<RegionPolygon> {
    let to_points = |ring: &Vec<[f64; 2]>| ring.iter().map(|c| (c[0], c[1])).collect::<Vec<_>>();
    let (exterior, holes) = rings
        .split_first()
        .ok_or_else(|| TerraError::InvalidGeometry(format!("feature {} has a polygon with no rings", label)))?;
    RegionPolygon::new(to_points(exterior), holes.iter().map(to_points).collect())
        .map_err(|e| match e {
            TerraError::InvalidGeometry(msg) => TerraError::InvalidGeometry(format!("feature {}: {}", label, msg)),
            other => other,
        })
}
