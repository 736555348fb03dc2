//! Common test fixtures for the anomaly and masking tests.
//!
//! This module provides pre-defined grids, regions and periods that
//! represent common scenarios in the pipeline.

/// Region extents as (min_lon, min_lat, max_lon, max_lat).
pub mod region {
    /// Central Europe box used for heatwave scenarios
    pub const CENTRAL_EUROPE: (f64, f64, f64, f64) = (14.0, 45.0, 24.0, 52.0);

    /// Danube delta, used for water-extent scenarios
    pub const DANUBE_DELTA: (f64, f64, f64, f64) = (28.5, 44.8, 29.8, 45.5);

    /// The unit square [21,22]x[49,50] inside the 4x4 fixture grid
    pub const UNIT_SQUARE: (f64, f64, f64, f64) = (21.0, 49.0, 22.0, 50.0);
}

/// Common grid specifications for testing.
pub mod grid {
    /// 4x4 one-degree grid, lon 20..23, lat 48..51 (ascending)
    pub const FOUR_BY_FOUR: GridSpec = GridSpec {
        width: 4,
        height: 4,
        lon_start: 20.0,
        lat_start: 48.0,
        step: 1.0,
    };

    /// One-degree cells near 50N for area checks
    pub const ONE_DEGREE_50N: GridSpec = GridSpec {
        width: 5,
        height: 5,
        lon_start: 10.0,
        lat_start: 48.0,
        step: 1.0,
    };

    /// 0.01 degree grid of one million points for mask benchmarks
    pub const DENSE_1000: GridSpec = GridSpec {
        width: 1000,
        height: 1000,
        lon_start: 14.0,
        lat_start: 45.0,
        step: 0.01,
    };

    /// Grid specification for testing.
    #[derive(Debug, Clone, Copy)]
    pub struct GridSpec {
        pub width: usize,
        pub height: usize,
        pub lon_start: f64,
        pub lat_start: f64,
        pub step: f64,
    }

    impl GridSpec {
        /// Returns the total number of grid cells.
        pub fn size(&self) -> usize {
            self.width * self.height
        }

        /// Longitudes, ascending.
        pub fn lons(&self) -> Vec<f64> {
            (0..self.width).map(|i| self.lon_start + i as f64 * self.step).collect()
        }

        /// Latitudes, ascending.
        pub fn lats(&self) -> Vec<f64> {
            (0..self.height).map(|i| self.lat_start + i as f64 * self.step).collect()
        }
    }
}

/// Common periods for testing.
pub mod period {
    /// Baseline used by the original analyses
    pub const BASELINE: (i32, i32) = (2010, 2019);

    /// A short three-year baseline for fast tests
    pub const SHORT_BASELINE: (i32, i32) = (2017, 2019);

    /// Event year
    pub const EVENT_YEAR: i32 = 2024;

    /// July and August
    pub const SUMMER_MONTHS: [u32; 2] = [7, 8];
}

/// MODIS product file names.
pub mod files {
    pub const LST_2024_07_01: &str = "MOD11A1.A2024183.h19v04.061.2024185.json";
    pub const LST_2024_07_02: &str = "MOD11A1.A2024184.h19v04.061.2024186.json";
    pub const NDVI_2024_07_11: &str = "MOD13Q1.A2024193.h19v04.061.json";
}

/// GeoJSON FeatureCollection with one polygon per `(min_lon, min_lat,
/// max_lon, max_lat)` rectangle.
pub fn rectangles_geojson(rects: &[(f64, f64, f64, f64)]) -> String {
    let features: Vec<String> = rects
        .iter()
        .enumerate()
        .map(|(i, (x0, y0, x1, y1))| {
            format!(
                r#"{{"type": "Feature", "id": "roi-{i}", "properties": {{}}, "geometry": {{"type": "Polygon", "coordinates": [[[{x0}, {y0}], [{x1}, {y0}], [{x1}, {y1}], [{x0}, {y1}], [{x0}, {y0}]]]}}}}"#
            )
        })
        .collect();
    format!(r#"{{"type": "FeatureCollection", "features": [{}]}}"#, features.join(", "))
}
