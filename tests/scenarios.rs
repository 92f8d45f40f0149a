//! End-to-end scenarios for triangulation, holes and mesh generation.

use eikmesh::prelude::*;
use eikmesh::field::{difference, DistanceFunction};
use eikmesh::io;
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn square_with_center(kind: LocatorKind) -> Triangulation {
    let bound = BoundingBox::from_origin_size(-1.0, -1.0, 3.0, 3.0);
    let mut t = Triangulation::new(bound, kind);
    for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.5, 0.5)] {
        t.insert(Point2::new(x, y)).unwrap();
    }
    t.finish().unwrap();
    t
}

#[test]
fn square_with_center_has_four_triangles() {
    for kind in [LocatorKind::Walk, LocatorKind::Hierarchy, LocatorKind::DelaunayTree] {
        let t = square_with_center(kind);
        let mesh = t.mesh();
        assert_eq!(mesh.num_faces(), 4);
        let center = t
            .vertices()
            .find(|&v| *mesh.position(v) == Point2::new(0.5, 0.5))
            .unwrap();
        for f in t.faces() {
            assert!(mesh.face_vertices(f).any(|v| v == center));
        }
        assert!(t.is_delaunay());
    }
}

#[test]
fn random_points_are_located_by_every_locator() {
    let mut rng = StdRng::seed_from_u64(300);
    let points: Vec<Point2<f64>> = (0..100)
        .map(|_| Point2::new(rng.gen_range(0.0..300.0), rng.gen_range(0.0..300.0)))
        .collect();
    let bound = BoundingBox::from_origin_size(0.0, 0.0, 300.0, 300.0);

    let mut faces = Vec::new();
    for kind in [LocatorKind::Walk, LocatorKind::Hierarchy, LocatorKind::DelaunayTree] {
        let mut t: Triangulation = Triangulation::new(bound, kind);
        t.insert_all(&points).unwrap();
        t.finish().unwrap();
        assert!(t.mesh().is_valid());
        assert!(t.is_delaunay());
        let located: Vec<Option<FaceId>> = points.iter().map(|p| t.locate(p)).collect();
        assert!(located.iter().all(Option::is_some), "{:?}", kind);
        faces.push(located);
    }
    assert_eq!(faces[0], faces[1]);
    assert_eq!(faces[0], faces[2]);
}

#[test]
fn split_interior_edge_gives_four_faces() {
    let bound = BoundingBox::from_origin_size(-1.0, -2.0, 4.0, 4.0);
    let mut t: Triangulation = Triangulation::new(bound, LocatorKind::Walk);
    for (x, y) in [(0.0, 0.0), (2.0, 0.0), (1.0, 1.5), (1.0, -1.5)] {
        t.insert(Point2::new(x, y)).unwrap();
    }
    t.finish().unwrap();

    let mesh = t.mesh();
    assert_eq!(mesh.num_faces(), 2);
    let diagonal = mesh.edges().find(|&e| !mesh.is_boundary_edge(e)).unwrap();
    let midpoint = mesh.edge_midpoint(diagonal);
    let v = t.split_edge(diagonal).unwrap();

    let mesh = t.mesh();
    assert!(mesh.is_valid(), "{:?}", mesh.check_invariants());
    assert_eq!(*mesh.position(v), midpoint);
    assert_eq!(mesh.num_faces(), 4);
    assert_eq!(mesh.adjacent_faces(v).filter(|&f| !mesh.is_border(f)).count(), 4);
    assert!(t.is_delaunay());
}

#[test]
fn merged_hole_is_excluded_from_streamed_triangles() {
    let n = 6;
    let bound = BoundingBox::from_origin_size(0.0, 0.0, n as f64, n as f64);
    let mut t: Triangulation = Triangulation::new(bound, LocatorKind::Hierarchy);
    for j in 0..=n {
        for i in 0..=n {
            t.insert(Point2::new(i as f64, j as f64)).unwrap();
        }
    }
    t.finish().unwrap();
    let total = t.faces().count();

    let in_region = |c: Point2<f64>| c.x > 2.0 && c.x < 4.0 && c.y > 2.0 && c.y < 4.0;
    let seed = t.locate(&Point2::new(3.1, 2.9)).unwrap();
    let holes = t
        .create_hole(seed, |mesh, f| in_region(mesh.face_centroid(f)), true)
        .unwrap();

    assert_eq!(holes.len(), 1);
    assert!(t.mesh().is_hole(holes[0]));
    assert!(t.mesh().is_valid());
    assert_eq!(t.faces().count(), total - 8);
    assert!(t.stream_triangles().all(|tri| !in_region(tri.centroid())));
    assert_eq!(t.locate(&Point2::new(3.0, 3.0)), None);
}

#[test]
fn annulus_reaches_high_quality() {
    // |6 - |p|| - 4: a ring between radii 2 and 10.
    let ring = |p: &Point2<f64>| (6.0 - p.coords.norm()).abs() - 4.0;
    let bound = BoundingBox::from_origin_size(-10.0, -10.0, 20.0, 20.0);
    let options = EikMeshOptions::default().with_max_iterations(300);
    let mut eikmesh = EikMesh::new(ring, Uniform(0.2), bound, options);

    let report = eikmesh.improve().unwrap();
    let mesh = eikmesh.mesh();
    assert!(mesh.is_valid(), "{:?}", mesh.check_invariants());
    assert!(report.quality.mean > 0.9, "{}", report.quality);
    assert_eq!(report.quality.below, 0, "{}", report.quality);
    assert!(eikmesh.triangulation().is_delaunay());
    // The inner circle is a hole, not part of the domain.
    assert_eq!(eikmesh.triangulation().locate(&Point2::origin()), None);
    if report.converged {
        for b in mesh.border_halfedges() {
            let p = mesh.position(mesh.target(b));
            assert!(ring(p).abs() < 1e-2, "{:?} at distance {}", p, ring(p));
        }
    }
}

#[test]
fn square_with_hole_keeps_fixed_corners() {
    let domain = difference(Rectangle::new(-1.0, -1.0, 2.0, 2.0), Circle::new(Point2::origin(), 0.4));
    let corners = vec![
        Point2::new(-1.0, -1.0),
        Point2::new(1.0, -1.0),
        Point2::new(1.0, 1.0),
        Point2::new(-1.0, 1.0),
    ];
    let bound = BoundingBox::from_origin_size(-1.0, -1.0, 2.0, 2.0);
    let options = EikMeshOptions::default().with_max_iterations(60).sequential();
    let mut eikmesh = EikMesh::new(domain, Uniform(0.15), bound, options).with_fixed_points(corners.clone());

    let report = eikmesh.improve().unwrap();
    assert!(report.quality.mean > 0.8, "{}", report.quality);
    let mesh = eikmesh.mesh();
    for c in &corners {
        assert!(mesh.vertex_ids().any(|v| mesh.is_fixed(v) && mesh.position(v) == c));
    }
    for f in eikmesh.triangulation().faces() {
        assert!(domain.distance(&mesh.face_centroid(f)) < 0.0);
    }
}

#[test]
fn generated_mesh_survives_obj_round_trip() {
    let dir = std::env::temp_dir().join(format!("eikmesh-scenario-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("disc.obj");

    let bound = BoundingBox::from_origin_size(-1.0, -1.0, 2.0, 2.0);
    let options = EikMeshOptions::default().with_max_iterations(20);
    let mut eikmesh = EikMesh::new(Circle::new(Point2::origin(), 1.0), Uniform(0.25), bound, options);
    eikmesh.improve().unwrap();
    io::save(eikmesh.mesh(), &path).unwrap();

    let loaded: Mesh = io::load(&path).unwrap();
    assert!(loaded.is_valid());
    assert_eq!(loaded.num_vertices(), eikmesh.triangulation().num_vertices());
    assert_eq!(loaded.num_faces(), eikmesh.triangulation().faces().count());
    let stats = mesh_quality(&loaded, 0.01);
    assert!((stats.mean - eikmesh.quality().mean).abs() < 1e-9);

    std::fs::remove_dir_all(&dir).unwrap();
}
