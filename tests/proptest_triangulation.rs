//! Property-based tests for triangulation invariants.
//!
//! Every triangulation built from arbitrary points must:
//! - keep the half-edge structure consistent (twins pair up, faces close)
//! - orient every triangle counter-clockwise
//! - be Delaunay
//! - locate each vertex in a face incident to it, whatever the locator
//! - ignore a second insertion of an existing point

use eikmesh::geometry::{orient2d, BoundingBox};
use eikmesh::locate::LocatorKind;
use eikmesh::triangulation::Triangulation;
use nalgebra::Point2;
use proptest::prelude::*;

// =============================================================================
// TEST CONFIGURATION
// =============================================================================

const SIZE: f64 = 100.0;

const LOCATORS: [LocatorKind; 3] = [LocatorKind::Walk, LocatorKind::Hierarchy, LocatorKind::DelaunayTree];

/// Strategy for points inside the bound
fn point_2d() -> impl Strategy<Value = Point2<f64>> {
    (0.0..SIZE, 0.0..SIZE).prop_map(|(x, y)| Point2::new(x, y))
}

/// Strategy for a small point set (3-60 points)
fn point_set() -> impl Strategy<Value = Vec<Point2<f64>>> {
    prop::collection::vec(point_2d(), 3..=60)
}

/// Strategy for points on a coarse integer grid, full of cocircular quads
/// and collinear runs
fn grid_point_set() -> impl Strategy<Value = Vec<Point2<f64>>> {
    prop::collection::vec((0u32..8, 0u32..8), 3..=40)
        .prop_map(|cells| cells.into_iter().map(|(i, j)| Point2::new(i as f64, j as f64)).collect())
}

fn build(points: &[Point2<f64>], kind: LocatorKind, finish: bool) -> Triangulation {
    let bound = BoundingBox::from_origin_size(0.0, 0.0, SIZE, SIZE);
    let mut triangulation = Triangulation::new(bound, kind);
    for p in points {
        triangulation.insert(*p).unwrap();
    }
    if finish {
        triangulation.finish().unwrap();
    }
    triangulation
}

// =============================================================================
// STRUCTURE
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_topology_is_consistent(points in point_set()) {
        for finish in [false, true] {
            let t = build(&points, LocatorKind::Walk, finish);
            let mesh = t.mesh();
            prop_assert!(mesh.check_invariants().is_ok(), "{:?}", mesh.check_invariants());
            for e in mesh.halfedge_ids() {
                prop_assert_eq!(mesh.twin(mesh.twin(e)), e);
            }
            for f in mesh.inner_triangle_ids() {
                let e = mesh.face_edge(f);
                prop_assert_eq!(mesh.next(mesh.next(mesh.next(e))), e);
            }
        }
    }

    #[test]
    fn prop_triangles_are_ccw(points in point_set()) {
        let t = build(&points, LocatorKind::Hierarchy, true);
        let mesh = t.mesh();
        for f in mesh.inner_triangle_ids() {
            let [a, b, c] = mesh.triangle_vertices(f);
            prop_assert!(orient2d(mesh.position(a), mesh.position(b), mesh.position(c)) > 0.0);
        }
    }

    #[test]
    fn prop_is_delaunay(points in point_set()) {
        for kind in LOCATORS {
            let t = build(&points, kind, true);
            prop_assert!(t.is_delaunay(), "{:?}: {:?}", kind, t.non_delaunay_edges());
        }
    }

    #[test]
    fn prop_degenerate_input_is_delaunay(points in grid_point_set()) {
        let t = build(&points, LocatorKind::Walk, true);
        prop_assert!(t.mesh().is_valid());
        prop_assert!(t.is_delaunay());
    }
}

// =============================================================================
// LOCATION
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_vertices_locate_in_incident_faces(points in point_set()) {
        let triangulations: Vec<Triangulation> =
            LOCATORS.iter().map(|&kind| build(&points, kind, true)).collect();
        let reference = &triangulations[0];
        let mesh = reference.mesh();
        for v in reference.vertices() {
            let p = mesh.position(v);
            let f = reference.locate(p);
            prop_assert!(f.is_some(), "vertex {:?} at {:?} not located", v, p);
            if let Some(f) = f {
                prop_assert!(mesh.face_vertices(f).any(|w| w == v));
            }
            // The same points in the same order give the same mesh, so the
            // canonical faces must agree.
            for other in &triangulations[1..] {
                prop_assert_eq!(other.locate(p), f, "{:?} disagrees", other.locator_kind());
            }
        }
    }

    #[test]
    fn prop_insertion_is_idempotent(points in point_set(), pick in any::<prop::sample::Index>()) {
        let mut t = build(&points, LocatorKind::DelaunayTree, false);
        let vertices = t.num_vertices();
        let halfedges = t.mesh().num_halfedges();
        let p = points[pick.index(points.len())];
        t.insert(p).unwrap();
        prop_assert_eq!(t.num_vertices(), vertices);
        prop_assert_eq!(t.mesh().num_halfedges(), halfedges);
    }
}
