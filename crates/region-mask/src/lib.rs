//! Region-of-interest masks.
//!
//! Turns GeoJSON polygons into a boolean [`RegionMask`] aligned with a
//! [`terra_common::SpatialGrid`]. Membership is inside-or-on-boundary of any
//! polygon. Two interchangeable strategies are available (see
//! [`MaskStrategy`]); they must produce identical masks.
//!
//! ```ignore
//! let polygons = RoiFeatureCollection::load("roi/lake.geojson")?.to_polygons()?;
//! let mask = MaskBuilder::new(MaskStrategy::Indexed).build(&polygons, field.grid())?;
//! let masked = mask.apply(&field)?;
//! ```

pub mod builder;
pub mod geojson;
pub mod mask;
pub mod polygon;
pub mod strategy;

pub use builder::MaskBuilder;
pub use geojson::{RoiFeature, RoiFeatureCollection, RoiGeometry};
pub use mask::RegionMask;
pub use polygon::RegionPolygon;
pub use strategy::{MaskStrategy, SamplePosition};
