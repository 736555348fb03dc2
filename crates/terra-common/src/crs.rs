//! Coordinate reference system declarations.
//!
//! A grid never infers its CRS from axis names. Decoders state whether the
//! coordinates are geographic degrees or a projected linear unit, and the
//! area estimation in `event-metrics` branches on that declaration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Linear unit of a projected coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinearUnit {
    Metre,
    Kilometre,
}

impl LinearUnit {
    /// Parse a unit string ("m", "metre", "km", ...).
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        match s.trim().to_lowercase().as_str() {
            "m" | "metre" | "metres" | "meter" | "meters" => Ok(LinearUnit::Metre),
            "km" | "kilometre" | "kilometres" | "kilometer" | "kilometers" => {
                Ok(LinearUnit::Kilometre)
            }
            _ => Err(CrsParseError::UnsupportedUnit(s.to_string())),
        }
    }

    /// Number of kilometres in one unit.
    pub fn kilometres(&self) -> f64 {
        match self {
            LinearUnit::Metre => 0.001,
            LinearUnit::Kilometre => 1.0,
        }
    }
}

/// Declared coordinate system of a grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinateSystem {
    /// WGS84 longitude/latitude in degrees.
    Geographic,
    /// Projected easting/northing in a linear unit.
    Projected { code: String, unit: LinearUnit },
}

impl CoordinateSystem {
    /// Parse a CRS code, with an optional linear unit for projected systems.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326", "CRS:84", "WGS84" (geographic)
    /// - "EPSG:3857", "SR-ORG:6842" (projected, metres unless `unit` says otherwise)
    pub fn from_code(code: &str, unit: Option<&str>) -> Result<Self, CrsParseError> {
        let normalized = code.trim().to_uppercase();
        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" | "OGC:CRS84" | "WGS84" => {
                if let Some(u) = unit {
                    return Err(CrsParseError::UnitOnGeographic(u.to_string()));
                }
                Ok(CoordinateSystem::Geographic)
            }
            "" => Err(CrsParseError::Empty),
            _ => {
                if !normalized.contains(':') {
                    return Err(CrsParseError::UnsupportedCrs(code.to_string()));
                }
                let unit = match unit {
                    Some(u) => LinearUnit::parse(u)?,
                    None => LinearUnit::Metre,
                };
                Ok(CoordinateSystem::Projected {
                    code: normalized,
                    unit,
                })
            }
        }
    }

    /// Check if this is a geographic (lon/lat degrees) system.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CoordinateSystem::Geographic)
    }

    /// Linear unit for projected systems.
    pub fn linear_unit(&self) -> Option<LinearUnit> {
        match self {
            CoordinateSystem::Geographic => None,
            CoordinateSystem::Projected { unit, .. } => Some(*unit),
        }
    }

    /// Authority code ("EPSG:4326" for geographic).
    pub fn code(&self) -> &str {
        match self {
            CoordinateSystem::Geographic => "EPSG:4326",
            CoordinateSystem::Projected { code, .. } => code,
        }
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateSystem::Geographic => write!(f, "EPSG:4326"),
            CoordinateSystem::Projected { code, unit } => write!(f, "{} ({:?})", code, unit),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Unsupported linear unit: {0}")]
    UnsupportedUnit(String),

    #[error("Geographic CRS cannot declare a linear unit ({0})")]
    UnitOnGeographic(String),

    #[error("Empty CRS code")]
    Empty,
}
