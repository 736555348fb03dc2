//! Integration tests for mask construction and application.

use rand::{rngs::StdRng, Rng, SeedableRng};
use region_mask::{MaskBuilder, MaskStrategy, RegionPolygon, RoiFeatureCollection, SamplePosition};
use terra_common::{Axis, AxisRole, CoordinateSystem, CurvilinearMesh, SpatialGrid};
use test_utils::{
    create_constant_series, daily_dates, fixtures, grid_from_spec, rectangles_geojson, temp_test_dir,
    write_test_file,
};

const STRATEGIES: [MaskStrategy; 2] = [MaskStrategy::Indexed, MaskStrategy::Naive];

fn unit_square() -> Vec<RegionPolygon> {
    let (x0, y0, x1, y1) = fixtures::region::UNIT_SQUARE;
    vec![RegionPolygon::rectangle(x0, y0, x1, y1).unwrap()]
}

// ============================================================================
// The 4x4 fixture grid (lon 20..23, lat 48..51) and the square [21,22]x[49,50]
// ============================================================================

#[test]
fn test_cell_corner_sampling_selects_one_cell() {
    let grid = grid_from_spec(&fixtures::grid::FOUR_BY_FOUR);
    for strategy in STRATEGIES {
        let mask = MaskBuilder::new(strategy)
            .with_sample_position(SamplePosition::CellCorner)
            .build(&unit_square(), &grid)
            .unwrap();
        assert_eq!(mask.inside_count(), 1, "{strategy}");
        // row 1 is lat 49, column 1 is lon 21
        assert_eq!(mask.as_field().true_positions(), vec![(1, 1)], "{strategy}");
    }
}

#[test]
fn test_node_sampling_includes_boundary_nodes() {
    let grid = grid_from_spec(&fixtures::grid::FOUR_BY_FOUR);
    for strategy in STRATEGIES {
        let mask = MaskBuilder::new(strategy).build(&unit_square(), &grid).unwrap();
        assert_eq!(mask.inside_count(), 4, "{strategy}");
        assert_eq!(
            mask.as_field().true_positions(),
            vec![(1, 1), (1, 2), (2, 1), (2, 2)],
            "{strategy}"
        );
        assert_eq!(mask.polygon_count(), 1);
        assert_eq!(mask.strategy(), strategy);
    }
}

#[test]
fn test_vertex_on_grid_point_is_inside() {
    // triangle whose vertex (22, 50) sits exactly on a grid node
    let triangle = RegionPolygon::new(vec![(22.0, 50.0), (25.0, 50.5), (25.0, 52.5)], vec![]).unwrap();
    let grid = grid_from_spec(&fixtures::grid::FOUR_BY_FOUR);
    for strategy in STRATEGIES {
        let mask = MaskBuilder::new(strategy).build(&[triangle.clone()], &grid).unwrap();
        assert_eq!(mask.as_field().get(2, 2), Some(true), "{strategy}");
        assert_eq!(mask.inside_count(), 1, "{strategy}");
    }
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_empty_region_set() {
    let grid = grid_from_spec(&fixtures::grid::FOUR_BY_FOUR);
    for strategy in STRATEGIES {
        let err = MaskBuilder::new(strategy).build(&[], &grid).unwrap_err();
        assert_eq!(err.kind(), "EmptyRegionSet");
    }
}

#[test]
fn test_projected_grid_rejected() {
    let crs = CoordinateSystem::from_code("EPSG:3857", None).unwrap();
    let y = Axis::coordinates("y", AxisRole::Y, vec![0.0, 1000.0]).unwrap();
    let x = Axis::coordinates("x", AxisRole::X, vec![0.0, 1000.0]).unwrap();
    let grid = SpatialGrid::regular(crs, y, x).unwrap();
    let err = MaskBuilder::default().build(&unit_square(), &grid).unwrap_err();
    assert_eq!(err.kind(), "CoordinateSystemMismatch");
}

#[test]
fn test_cell_corner_needs_two_coordinates() {
    let grid = SpatialGrid::geographic(vec![49.5], vec![21.0, 21.5]).unwrap();
    let err = MaskBuilder::default()
        .with_sample_position(SamplePosition::CellCorner)
        .build(&unit_square(), &grid)
        .unwrap_err();
    assert_eq!(err.kind(), "InsufficientData");
}

// ============================================================================
// Curvilinear meshes
// ============================================================================

fn rotated_mesh() -> SpatialGrid {
    // 3x3 mesh sheared to the east with increasing latitude
    let (ny, nx) = (3, 3);
    let mut lon = Vec::new();
    let mut lat = Vec::new();
    for r in 0..ny {
        for c in 0..nx {
            lon.push(20.5 + c as f64 * 0.5 + r as f64 * 0.2);
            lat.push(49.0 + r as f64 * 0.5);
        }
    }
    // the projected CRS is what the data were gridded in; the mesh is degrees
    let crs = CoordinateSystem::from_code("SR-ORG:6842", None).unwrap();
    SpatialGrid::curvilinear(crs, "y", "x", ny, nx, CurvilinearMesh { lon, lat }).unwrap()
}

#[test]
fn test_curvilinear_mesh_is_tested_directly() {
    let grid = rotated_mesh();
    for strategy in STRATEGIES {
        let mask = MaskBuilder::new(strategy).build(&unit_square(), &grid).unwrap();
        // row 0: lon 20.5, 21.0, 21.5; row 1: 20.7, 21.2, 21.7; row 2: 20.9, 21.4, 21.9
        assert_eq!(
            mask.cells(),
            &[false, true, true, false, true, true, false, true, true],
            "{strategy}"
        );
    }
}

#[test]
fn test_cell_corner_on_curvilinear_rejected() {
    let err = MaskBuilder::default()
        .with_sample_position(SamplePosition::CellCorner)
        .build(&unit_square(), &rotated_mesh())
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidParameter");
}

// ============================================================================
// Holes, unions and GeoJSON input
// ============================================================================

#[test]
fn test_hole_interior_excluded_and_hole_boundary_included() {
    let donut = RegionPolygon::new(
        vec![(19.5, 47.5), (23.5, 47.5), (23.5, 51.5), (19.5, 51.5)],
        vec![vec![(21.0, 49.0), (22.0, 49.0), (22.0, 50.0), (21.0, 50.0)]],
    )
    .unwrap();
    let grid = SpatialGrid::geographic(vec![49.0, 49.5, 50.0], vec![21.0, 21.5, 22.0]).unwrap();
    for strategy in STRATEGIES {
        let mask = MaskBuilder::new(strategy).build(&[donut.clone()], &grid).unwrap();
        assert_eq!(mask.inside_count(), 8, "{strategy}");
        assert_eq!(mask.as_field().get(1, 1), Some(false), "{strategy}");
    }
}

#[test]
fn test_multiple_polygons_union() {
    let text = rectangles_geojson(&[(20.0, 48.0, 20.5, 48.5), (22.5, 50.5, 23.5, 51.5)]);
    let polygons = text.parse::<RoiFeatureCollection>().unwrap().to_polygons().unwrap();
    let grid = grid_from_spec(&fixtures::grid::FOUR_BY_FOUR);
    let mask = MaskBuilder::default().build(&polygons, &grid).unwrap();
    assert_eq!(mask.as_field().true_positions(), vec![(0, 0), (3, 3)]);
    assert_eq!(mask.polygon_count(), 2);
}

#[test]
fn test_load_roi_from_file() {
    let dir = temp_test_dir();
    let path = write_test_file(dir.path(), "lake.geojson", &rectangles_geojson(&[fixtures::region::UNIT_SQUARE]));
    let polygons = RoiFeatureCollection::load(&path).unwrap().to_polygons().unwrap();
    assert_eq!(polygons.len(), 1);

    let err = RoiFeatureCollection::load(dir.path().join("missing.geojson")).unwrap_err();
    assert_eq!(err.kind(), "Storage");
}

// ============================================================================
// Applying masks
// ============================================================================

#[test]
fn test_apply_broadcasts_over_time() {
    let grid = grid_from_spec(&fixtures::grid::FOUR_BY_FOUR);
    let dates = daily_dates(2024..=2024, Some(&[7]));
    let series = create_constant_series(&grid, &dates, 300.0);
    let mask = MaskBuilder::default().build(&unit_square(), &grid).unwrap();

    let masked = mask.apply(&series).unwrap();
    assert_eq!(masked.shape(), series.shape());
    assert_eq!(masked.valid_count(), dates.len() * 4);
    for slice in masked.slices() {
        assert!(slice[5] == 300.0 && slice[0].is_nan());
    }
}

#[test]
fn test_apply_on_other_grid_fails() {
    let grid = grid_from_spec(&fixtures::grid::FOUR_BY_FOUR);
    let mask = MaskBuilder::default().build(&unit_square(), &grid).unwrap();

    // same shape, shifted coordinates
    let shifted = SpatialGrid::geographic(vec![48.5, 49.5, 50.5, 51.5], vec![20.0, 21.0, 22.0, 23.0]).unwrap();
    assert!(!mask.is_compatible(&shifted));
    let field = create_constant_series(&shifted, &daily_dates(2024..=2024, Some(&[7])), 1.0);
    assert_eq!(mask.apply(&field).unwrap_err().kind(), "CoordinateSystemMismatch");
}

// ============================================================================
// Strategy agreement
// ============================================================================

/// Star-shaped (hence simple) polygon around a centre.
fn random_star(rng: &mut StdRng, cx: f64, cy: f64) -> RegionPolygon {
    let n = rng.gen_range(5..14);
    let vertices = (0..n)
        .map(|i| {
            let angle = (i as f64 + rng.gen_range(0.1..0.9)) / n as f64 * std::f64::consts::TAU;
            let radius = rng.gen_range(0.3..2.0);
            (cx + radius * angle.cos(), cy + radius * angle.sin())
        })
        .collect();
    RegionPolygon::new(vertices, vec![]).unwrap()
}

#[test]
fn test_strategies_agree_on_random_inputs() {
    let mut rng = StdRng::seed_from_u64(20240701);
    for _ in 0..20 {
        let ny = rng.gen_range(5..40);
        let nx = rng.gen_range(5..40);
        let step = rng.gen_range(0.05..0.3);
        let lat0 = rng.gen_range(40.0..55.0);
        let lon0 = rng.gen_range(10.0..25.0);
        let lats: Vec<f64> = (0..ny).map(|i| lat0 + i as f64 * step).collect();
        let lons: Vec<f64> = (0..nx).map(|i| lon0 + i as f64 * step).collect();
        let grid = SpatialGrid::geographic(lats, lons).unwrap();

        let polygons: Vec<RegionPolygon> = (0..rng.gen_range(1..4))
            .map(|_| {
                let cx = lon0 + rng.gen_range(0.0..nx as f64 * step);
                let cy = lat0 + rng.gen_range(0.0..ny as f64 * step);
                random_star(&mut rng, cx, cy)
            })
            .collect();

        for position in [SamplePosition::Node, SamplePosition::CellCorner] {
            let indexed = MaskBuilder::new(MaskStrategy::Indexed)
                .with_sample_position(position)
                .build(&polygons, &grid)
                .unwrap();
            let naive = MaskBuilder::new(MaskStrategy::Naive)
                .with_sample_position(position)
                .build(&polygons, &grid)
                .unwrap();
            assert_eq!(indexed.cells(), naive.cells());
        }
    }
}

#[test]
fn test_strategies_agree_on_grid_aligned_polygons() {
    // vertices and edges fall exactly on grid nodes
    let grid = SpatialGrid::geographic(
        (0..21).map(|i| 45.0 + i as f64 * 0.25).collect(),
        (0..21).map(|i| 20.0 + i as f64 * 0.25).collect(),
    )
    .unwrap();
    let polygons = vec![
        RegionPolygon::new(vec![(20.5, 45.5), (23.0, 45.5), (23.0, 47.0), (21.75, 49.0), (20.5, 47.0)], vec![])
            .unwrap(),
        RegionPolygon::rectangle(23.5, 48.0, 25.0, 50.0).unwrap(),
    ];
    let indexed = MaskBuilder::new(MaskStrategy::Indexed).build(&polygons, &grid).unwrap();
    let naive = MaskBuilder::new(MaskStrategy::Naive).build(&polygons, &grid).unwrap();
    assert_eq!(indexed.cells(), naive.cells());
    assert!(indexed.inside_count() > 0);
}

#[test]
fn test_strategies_agree_on_nodes_along_diagonal_edges() {
    let mut rng = StdRng::seed_from_u64(20240815);
    for _ in 0..30 {
        let a = (rng.gen_range(10.0..20.0), rng.gen_range(40.0..50.0));
        let c = (a.0 + rng.gen_range(0.5..3.0), a.1 + rng.gen_range(0.5..3.0));
        let b = (c.0 + rng.gen_range(0.1..2.0), a.1 - rng.gen_range(0.1..2.0));
        let polygons = vec![RegionPolygon::new(vec![a, b, c], vec![]).unwrap()];

        // grid nodes interpolated along the edge a -> c
        let n = rng.gen_range(7..40);
        let lons: Vec<f64> = (0..=n).map(|k| a.0 + (c.0 - a.0) * k as f64 / n as f64).collect();
        let lats: Vec<f64> = (0..=n).map(|k| a.1 + (c.1 - a.1) * k as f64 / n as f64).collect();
        let grid = SpatialGrid::geographic(lats, lons).unwrap();

        let indexed = MaskBuilder::new(MaskStrategy::Indexed).build(&polygons, &grid).unwrap();
        let naive = MaskBuilder::new(MaskStrategy::Naive).build(&polygons, &grid).unwrap();
        assert_eq!(indexed.cells(), naive.cells());
        // corner a is always a grid node
        assert!(indexed.inside_count() >= 1);
    }
}

#[test]
fn test_exact_diagonal_nodes_are_inside() {
    // the edge (20, 48) -> (23, 51) passes exactly through (21, 49) and (22, 50)
    let grid = grid_from_spec(&fixtures::grid::FOUR_BY_FOUR);
    let polygons = vec![RegionPolygon::new(vec![(20.0, 48.0), (23.0, 48.0), (23.0, 51.0)], vec![]).unwrap()];
    for strategy in STRATEGIES {
        let mask = MaskBuilder::new(strategy).build(&polygons, &grid).unwrap();
        // on or below the diagonal: 4 + 3 + 2 + 1 nodes
        assert_eq!(mask.inside_count(), 10, "{strategy}");
    }
}
