//! Remembering visibility walk.
//!
//! Starting from a hint face, the walk repeatedly crosses an edge whose
//! supporting line separates the current face from the query point, never
//! crossing back over the edge it just came through. On a convex
//! triangulation this always terminates in the containing face. When the
//! mesh is not convex (after `finish`, or around holes), or the step budget
//! runs out, every triangle is tested instead.
//!
//! # References
//!
//! - O. Devillers, S. Pion, and M. Teillaud, "Walking in a Triangulation",
//!   International Journal of Foundations of Computer Science, 2001.

use nalgebra::Point2;

use super::Location;
use crate::geometry::{signed_distance, Tolerance};
use crate::mesh::{FaceId, HalfEdgeId, Mesh, VertexData, VertexId};

/// Signed distance of `p` from the line through an edge, positive on the
/// left of the half-edge.
///
/// The determinant is always evaluated with the endpoints in handle order,
/// so both half-edges of a twin pair see exactly opposite values.
pub(crate) fn edge_side<V: VertexData>(mesh: &Mesh<V>, he: HalfEdgeId, p: &Point2<f64>) -> f64 {
    let a = mesh.source(he);
    let b = mesh.target(he);
    if a < b {
        signed_distance(mesh.position(a), mesh.position(b), p)
    } else {
        -signed_distance(mesh.position(b), mesh.position(a), p)
    }
}

/// Faces the walk may enter.
#[inline]
fn walkable<V: VertexData>(mesh: &Mesh<V>, f: FaceId) -> bool {
    !mesh.is_boundary_face(f) && mesh.is_triangle(f)
}

/// Whether the closed triangle `f` contains `p`, up to tolerance.
pub(crate) fn face_contains<V: VertexData>(
    mesh: &Mesh<V>,
    f: FaceId,
    p: &Point2<f64>,
    tol: &Tolerance,
) -> bool {
    mesh.face_halfedges(f)
        .all(|he| edge_side(mesh, he, p) >= -tol.distance)
}

/// Pick a face to start walking from.
pub(crate) fn start_face<V: VertexData>(mesh: &Mesh<V>, hint: Option<FaceId>) -> Option<FaceId> {
    match hint {
        Some(f) if mesh.face_alive(f) && walkable(mesh, f) => Some(f),
        _ => mesh.face_ids().find(|&f| walkable(mesh, f)),
    }
}

/// A face incident to `v` that the walk may start from.
pub(crate) fn vertex_face<V: VertexData>(mesh: &Mesh<V>, v: VertexId) -> Option<FaceId> {
    if !mesh.vertex_alive(v) {
        return None;
    }
    mesh.adjacent_faces(v).find(|&f| walkable(mesh, f))
}

/// Locate `p` by walking from `hint`.
pub fn walk<V: VertexData>(
    mesh: &Mesh<V>,
    p: &Point2<f64>,
    hint: Option<FaceId>,
    tol: &Tolerance,
) -> Location {
    let Some(mut face) = start_face(mesh, hint) else {
        return Location::Outside;
    };
    let mut entry: Option<HalfEdgeId> = None;
    let budget = mesh.num_faces() + 16;

    for _ in 0..budget {
        let first = match entry {
            Some(he) => mesh.next(he),
            None => mesh.face_edge(face),
        };
        let mut crossed = false;
        let mut blocked = false;
        let mut he = first;
        for _ in 0..3 {
            if Some(he) != entry && edge_side(mesh, he, p) < -tol.distance {
                let twin = mesh.twin(he);
                let neighbor = mesh.face_of(twin);
                if walkable(mesh, neighbor) {
                    face = neighbor;
                    entry = Some(twin);
                    crossed = true;
                    break;
                }
                blocked = true;
            }
            he = mesh.next(he);
        }
        if !crossed {
            if blocked {
                break;
            }
            return classify(mesh, face, p, tol);
        }
    }
    scan(mesh, p, tol)
}

/// Test every triangle of the mesh.
pub fn scan<V: VertexData>(mesh: &Mesh<V>, p: &Point2<f64>, tol: &Tolerance) -> Location {
    mesh.face_ids()
        .filter(|&f| walkable(mesh, f))
        .find(|&f| face_contains(mesh, f, p, tol))
        .map_or(Location::Outside, |f| classify(mesh, f, p, tol))
}

/// Classify `p` against a face known to contain it, and report the
/// canonical face for the result.
pub(crate) fn classify<V: VertexData>(
    mesh: &Mesh<V>,
    f: FaceId,
    p: &Point2<f64>,
    tol: &Tolerance,
) -> Location {
    for v in mesh.face_vertices(f) {
        if tol.coincident(mesh.position(v), p) {
            let face = canonical_vertex_face(mesh, v).unwrap_or(f);
            return Location::OnVertex { vertex: v, face };
        }
    }
    for he in mesh.face_halfedges(f) {
        if edge_side(mesh, he, p).abs() > tol.distance {
            continue;
        }
        let a = mesh.position(mesh.source(he));
        let d = mesh.edge_vector(he);
        let len2 = d.norm_squared();
        let t = if len2 > 0.0 { (p - a).dot(&d) / len2 } else { 0.0 };
        if t > 0.0 && t < 1.0 {
            return canonical_edge(mesh, he);
        }
    }
    Location::InFace(f)
}

/// The smallest triangle handle around a vertex.
fn canonical_vertex_face<V: VertexData>(mesh: &Mesh<V>, v: VertexId) -> Option<FaceId> {
    mesh.adjacent_faces(v).filter(|&f| walkable(mesh, f)).min()
}

fn canonical_edge<V: VertexData>(mesh: &Mesh<V>, he: HalfEdgeId) -> Location {
    let twin = mesh.twin(he);
    let edge = if walkable(mesh, mesh.face_of(twin)) && mesh.face_of(twin) < mesh.face_of(he) {
        twin
    } else {
        he
    };
    Location::OnEdge {
        edge,
        face: mesh.face_of(edge),
    }
}
