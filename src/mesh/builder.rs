//! Mesh construction utilities.
//!
//! This module provides functions for building planar half-edge meshes from
//! face-vertex lists, as found in mesh file formats, and for converting them
//! back.

use std::collections::HashMap;

use nalgebra::Point2;

use super::halfedge::{Mesh, VertexData};
use super::index::{HalfEdgeId, VertexId};
use crate::error::{MeshError, Result};
use crate::geometry::Polygon;

/// Build a half-edge mesh from vertices and triangle faces.
///
/// Faces must be given in counter-clockwise order.
///
/// # Example
/// ```
/// use eikmesh::mesh::{build_from_triangles, Mesh};
/// use nalgebra::Point2;
///
/// let vertices = vec![
///     Point2::new(0.0, 0.0),
///     Point2::new(1.0, 0.0),
///     Point2::new(0.5, 1.0),
/// ];
/// let faces = vec![[0, 1, 2]];
///
/// let mesh: Mesh = build_from_triangles(&vertices, &faces).unwrap();
/// assert_eq!(mesh.num_vertices(), 3);
/// assert_eq!(mesh.num_faces(), 1);
/// ```
pub fn build_from_triangles<V: VertexData>(
    vertices: &[Point2<f64>],
    faces: &[[usize; 3]],
) -> Result<Mesh<V>> {
    let polygons: Vec<Vec<usize>> = faces.iter().map(|f| f.to_vec()).collect();
    build_from_polygons(vertices, &polygons)
}

/// Build a half-edge mesh from vertices and polygonal faces.
///
/// Every face must have at least three distinct vertices in counter-clockwise
/// order, every directed edge may be used by at most one face and every
/// vertex must be used by some face. The input is validated completely
/// before anything is built.
pub fn build_from_polygons<V: VertexData>(
    vertices: &[Point2<f64>],
    faces: &[Vec<usize>],
) -> Result<Mesh<V>> {
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }

    let mut used = vec![false; vertices.len()];
    let mut directed: HashMap<(usize, usize), usize> = HashMap::new();
    for (fi, face) in faces.iter().enumerate() {
        if face.len() < 3 {
            return Err(MeshError::DegenerateFace { face: fi });
        }
        for (i, &vi) in face.iter().enumerate() {
            if vi >= vertices.len() {
                return Err(MeshError::InvalidVertexIndex { face: fi, vertex: vi });
            }
            if face[..i].contains(&vi) {
                return Err(MeshError::DegenerateFace { face: fi });
            }
            used[vi] = true;
        }
        let polygon = Polygon::new(face.iter().map(|&i| vertices[i]).collect());
        if polygon.signed_area() <= 0.0 {
            return Err(MeshError::DegenerateFace { face: fi });
        }
        let n = face.len();
        for i in 0..n {
            let key = (face[i], face[(i + 1) % n]);
            if directed.insert(key, fi).is_some() {
                return Err(MeshError::topology(format!(
                    "edge ({}, {}) is used twice in the same direction",
                    key.0, key.1
                )));
            }
        }
    }
    if let Some(unused) = used.iter().position(|&u| !u) {
        return Err(MeshError::topology(format!(
            "vertex {} is not used by any face",
            unused
        )));
    }

    let mut mesh = Mesh::with_capacity(vertices.len(), faces.len());

    let vertex_ids: Vec<VertexId> = vertices.iter().map(|&pos| mesh.alloc_vertex(pos)).collect();

    // Map from directed edge (v0, v1) to half-edge ID
    let mut edge_map: HashMap<(usize, usize), HalfEdgeId> = HashMap::new();

    // First pass: create all inner half-edges and faces
    for face in faces {
        let n = face.len();
        let f = mesh.alloc_face(false);
        let hes: Vec<HalfEdgeId> = (0..n).map(|_| mesh.alloc_halfedge()).collect();
        for i in 0..n {
            let he = hes[i];
            mesh.set_target(he, vertex_ids[face[(i + 1) % n]]);
            mesh.set_face(he, f);
            mesh.link_next(he, hes[(i + 1) % n]);
            mesh.set_vertex_edge(vertex_ids[face[(i + 1) % n]], he);
            edge_map.insert((face[i], face[(i + 1) % n]), he);
        }
        mesh.set_face_edge(f, hes[0]);
    }

    // Second pass: link twins, creating border half-edges where missing.
    // Sorted so the resulting handles do not depend on hash order.
    let mut keys: Vec<(usize, usize)> = edge_map.keys().copied().collect();
    keys.sort_unstable();
    let border = mesh.border_face();
    let mut border_edges = Vec::new();
    for (v0, v1) in keys {
        let he = edge_map[&(v0, v1)];
        if let Some(&twin) = edge_map.get(&(v1, v0)) {
            mesh.link_twins(he, twin);
        } else {
            let bhe = mesh.alloc_halfedge();
            mesh.set_target(bhe, vertex_ids[v0]);
            mesh.set_face(bhe, border);
            mesh.link_twins(he, bhe);
            border_edges.push(bhe);
        }
    }

    // Third pass: link border half-edges into loops
    link_border_loops(&mut mesh, &border_edges);

    // Fourth pass: ensure boundary vertices point to border half-edges
    for v in vertex_ids {
        mesh.fix_vertex_edge(v);
    }

    Ok(mesh)
}

/// Link border half-edges into loops.
///
/// The successor of a border half-edge ending at `v` is the border half-edge
/// leaving `v` that comes first when turning clockwise from the incoming
/// direction. At ordinary boundary vertices there is only one candidate; at
/// vertices pinched between two border wedges the angle picks the wedge.
fn link_border_loops<V: VertexData>(mesh: &mut Mesh<V>, border_edges: &[HalfEdgeId]) {
    let mut leaving: HashMap<VertexId, Vec<HalfEdgeId>> = HashMap::new();
    for &bhe in border_edges {
        leaving.entry(mesh.source(bhe)).or_default().push(bhe);
    }

    for &bhe in border_edges {
        let v = mesh.target(bhe);
        let Some(candidates) = leaving.get(&v) else {
            continue;
        };
        let next = if candidates.len() == 1 {
            candidates[0]
        } else {
            let center = *mesh.position(v);
            let angle = |u: VertexId| {
                let d = mesh.position(u) - center;
                d.y.atan2(d.x)
            };
            let incoming = angle(mesh.source(bhe));
            let clockwise = |he: HalfEdgeId| {
                let a = (incoming - angle(mesh.target(he))).rem_euclid(std::f64::consts::TAU);
                if a == 0.0 {
                    std::f64::consts::TAU
                } else {
                    a
                }
            };
            candidates
                .iter()
                .copied()
                .min_by(|&a, &b| clockwise(a).total_cmp(&clockwise(b)))
                .unwrap_or(candidates[0])
        };
        mesh.link_next(bhe, next);
    }
    if let Some(&first) = border_edges.first() {
        let border = mesh.border_face();
        mesh.set_face_edge(border, first);
    }
}

/// Convert the inner triangles of a mesh to a face-vertex representation.
///
/// Live vertices are renumbered densely in handle order. Hole and
/// non-triangular faces are skipped.
///
/// Returns (vertices, faces) tuple.
pub fn to_face_vertex<V: VertexData>(mesh: &Mesh<V>) -> (Vec<Point2<f64>>, Vec<[usize; 3]>) {
    let mut remap = vec![usize::MAX; mesh.vertex_capacity()];
    let mut vertices = Vec::with_capacity(mesh.num_vertices());
    for (v, vertex) in mesh.vertices() {
        remap[v.index()] = vertices.len();
        vertices.push(vertex.position);
    }

    let faces: Vec<[usize; 3]> = mesh
        .inner_triangle_ids()
        .map(|f| {
            let [v0, v1, v2] = mesh.triangle_vertices(f);
            [remap[v0.index()], remap[v1.index()], remap[v2.index()]]
        })
        .collect();

    (vertices, faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> (Vec<Point2<f64>>, Vec<[usize; 3]>) {
        // Two triangles sharing the edge 0-1
        let vertices = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.5, 1.0),
            Point2::new(0.5, -1.0),
        ];
        let faces = vec![[0, 1, 2], [1, 0, 3]];
        (vertices, faces)
    }

    #[test]
    fn test_single_triangle() {
        let vertices = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.5, 1.0),
        ];
        let mesh: Mesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();

        assert_eq!(mesh.num_vertices(), 3);
        assert_eq!(mesh.num_faces(), 1);
        // 3 inner half-edges + 3 border half-edges
        assert_eq!(mesh.num_halfedges(), 6);
        assert!(mesh.is_valid());
        for v in mesh.vertex_ids() {
            assert!(mesh.is_boundary_vertex(v));
        }
    }

    #[test]
    fn test_two_triangles() {
        let (vertices, faces) = two_triangles();
        let mesh: Mesh = build_from_triangles(&vertices, &faces).unwrap();

        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_faces(), 2);
        // 6 inner half-edges + 4 border half-edges
        assert_eq!(mesh.num_halfedges(), 10);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_pinched_vertex() {
        // Two triangles touching only at vertex 2.
        let vertices = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        let faces = vec![[0, 1, 2], [2, 3, 4]];
        let mesh: Mesh = build_from_triangles(&vertices, &faces).unwrap();
        assert!(mesh.is_valid(), "{:?}", mesh.check_invariants());
        assert_eq!(mesh.valence(VertexId::new(2)), 4);
    }

    #[test]
    fn test_mixed_polygons() {
        let vertices = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
            Point2::new(2.0, 0.5),
        ];
        let faces = vec![vec![0, 1, 2, 3], vec![1, 4, 2]];
        let mesh: Mesh = build_from_polygons(&vertices, &faces).unwrap();
        assert!(mesh.is_valid());
        assert_eq!(mesh.num_edges(), 6);
        assert_eq!(mesh.inner_triangle_ids().count(), 1);
    }

    #[test]
    fn test_roundtrip() {
        let (vertices, faces) = two_triangles();
        let mesh: Mesh = build_from_triangles(&vertices, &faces).unwrap();

        let (out_verts, out_faces) = to_face_vertex(&mesh);

        assert_eq!(vertices.len(), out_verts.len());
        assert_eq!(faces.len(), out_faces.len());
        for (v_in, v_out) in vertices.iter().zip(out_verts.iter()) {
            assert!((v_in - v_out).norm() < 1e-10);
        }
    }

    #[test]
    fn test_invalid_input() {
        let vertices = vec![Point2::new(0.0, 0.0)];
        let result: Result<Mesh> = build_from_triangles(&vertices, &[[0, 1, 2]]);
        assert!(matches!(result, Err(MeshError::InvalidVertexIndex { .. })));

        let vertices = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.5, 1.0),
        ];
        let result: Result<Mesh> = build_from_triangles(&vertices, &[[0, 0, 2]]);
        assert!(matches!(result, Err(MeshError::DegenerateFace { .. })));

        // Clockwise
        let result: Result<Mesh> = build_from_triangles(&vertices, &[[0, 2, 1]]);
        assert!(matches!(result, Err(MeshError::DegenerateFace { .. })));

        let result: Result<Mesh> = build_from_triangles(&vertices, &[]);
        assert!(matches!(result, Err(MeshError::EmptyMesh)));
    }
}
