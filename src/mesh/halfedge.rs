//! Planar half-edge mesh data structure.
//!
//! This module provides an arena-based half-edge (doubly-connected edge list)
//! representation of planar polygonal meshes. All connectivity queries are
//! O(1) and elements are referred to by the index handles of
//! [`index`](super::index).
//!
//! # Structure
//!
//! - Each edge is split into two **half-edges** pointing in opposite directions
//! - Each half-edge knows its **twin**, its **next** and **prev** half-edge
//!   around its face (counter-clockwise), the **vertex it points to** and its
//!   **face**
//! - Each vertex stores one half-edge *ending* at it
//! - Each face stores one half-edge on its boundary
//!
//! # Border and Holes
//!
//! The region outside the mesh is a single explicit **border face** created
//! together with the mesh. Every edge on the outer boundary has its twin on
//! the border face, so `twin` is never null. A vertex on the boundary stores a
//! border half-edge as its incident edge.
//!
//! Faces can additionally be flagged as **holes**: they stay part of the
//! topology but are not part of the meshed domain.
//!
//! # Element Lifetime
//!
//! Destroyed elements are tombstoned. Their slots are queued and only handed
//! out again after [`Mesh::end_epoch`], so handles held during an operation
//! never silently start naming a different element.

use std::collections::HashMap;

use nalgebra::{Point2, Vector2};

use super::index::{FaceId, HalfEdgeId, VertexId};
use crate::error::{MeshError, Result};
use crate::geometry::{orient2d, BoundingBox, Polygon, Triangle};

/// Payload attached to every vertex of a [`Mesh`].
///
/// Blanket-implemented for every type meeting the bounds, `()` included.
pub trait VertexData: Clone + Default + Send + Sync + 'static {}

impl<T> VertexData for T where T: Clone + Default + Send + Sync + 'static {}

/// A vertex in the half-edge mesh.
#[derive(Debug, Clone)]
pub struct Vertex<V = ()> {
    /// The planar position of this vertex.
    pub position: Point2<f64>,

    /// One half-edge ending at this vertex.
    /// For boundary vertices, this is a border half-edge.
    pub(crate) halfedge: HalfEdgeId,

    /// Fixed vertices are never moved by mesh improvement.
    pub fixed: bool,

    /// Force accumulated during the last improvement step.
    pub force: Vector2<f64>,

    /// Displacement applied during the last improvement step.
    pub displacement: Vector2<f64>,

    /// User payload.
    pub data: V,

    pub(crate) destroyed: bool,
}

impl<V: Default> Vertex<V> {
    /// Create a new vertex at the given position.
    pub fn new(position: Point2<f64>) -> Self {
        Self {
            position,
            halfedge: HalfEdgeId::invalid(),
            fixed: false,
            force: Vector2::zeros(),
            displacement: Vector2::zeros(),
            data: V::default(),
            destroyed: false,
        }
    }
}

impl<V> Vertex<V> {
    /// The half-edge ending at this vertex.
    #[inline]
    pub fn halfedge(&self) -> HalfEdgeId {
        self.halfedge
    }

    /// Whether this vertex has been destroyed.
    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

/// A half-edge in the mesh.
#[derive(Debug, Clone, Copy)]
pub struct HalfEdge {
    /// The vertex this half-edge points to.
    pub(crate) vertex: VertexId,

    /// The opposite half-edge.
    pub(crate) twin: HalfEdgeId,

    /// The next half-edge around the face (counter-clockwise).
    pub(crate) next: HalfEdgeId,

    /// The previous half-edge around the face.
    /// Redundant with `next`, kept in sync by every operation.
    pub(crate) prev: HalfEdgeId,

    /// The face this half-edge belongs to.
    pub(crate) face: FaceId,

    pub(crate) destroyed: bool,
}

impl HalfEdge {
    /// Create a new unlinked half-edge.
    pub fn new() -> Self {
        Self {
            vertex: VertexId::invalid(),
            twin: HalfEdgeId::invalid(),
            next: HalfEdgeId::invalid(),
            prev: HalfEdgeId::invalid(),
            face: FaceId::invalid(),
            destroyed: false,
        }
    }

    /// Whether this half-edge has been destroyed.
    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl Default for HalfEdge {
    fn default() -> Self {
        Self::new()
    }
}

/// A face in the mesh.
#[derive(Debug, Clone, Copy)]
pub struct Face {
    /// One half-edge on the boundary of this face.
    pub(crate) halfedge: HalfEdgeId,
    pub(crate) border: bool,
    pub(crate) hole: bool,
    pub(crate) destroyed: bool,
}

impl Face {
    /// Create a new face with the given half-edge.
    pub fn new(halfedge: HalfEdgeId) -> Self {
        Self {
            halfedge,
            border: false,
            hole: false,
            destroyed: false,
        }
    }

    /// Whether this is the border face.
    #[inline]
    pub fn is_border(&self) -> bool {
        self.border
    }

    /// Whether this face is flagged as a hole.
    #[inline]
    pub fn is_hole(&self) -> bool {
        self.hole
    }

    /// Whether this face has been destroyed.
    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl Default for Face {
    fn default() -> Self {
        Self::new(HalfEdgeId::invalid())
    }
}

#[derive(Debug, Clone, Default)]
struct Slots {
    vertices: Vec<VertexId>,
    halfedges: Vec<HalfEdgeId>,
    faces: Vec<FaceId>,
}

impl Slots {
    fn append(&mut self, other: &mut Slots) {
        self.vertices.append(&mut other.vertices);
        self.halfedges.append(&mut other.halfedges);
        self.faces.append(&mut other.faces);
    }
}

/// A planar half-edge mesh.
///
/// `V` is an optional per-vertex payload.
///
/// # Example
///
/// ```
/// use eikmesh::mesh::Mesh;
///
/// let mut mesh: Mesh = Mesh::new();
/// let a = mesh.create_vertex(0.0, 0.0);
/// let b = mesh.create_vertex(1.0, 0.0);
/// let c = mesh.create_vertex(0.0, 1.0);
/// let f = mesh.create_face(&[a, b, c]).unwrap();
///
/// assert_eq!(mesh.num_faces(), 1);
/// assert_eq!(mesh.face_vertices(f).count(), 3);
/// assert!(mesh.is_valid());
/// ```
#[derive(Debug, Clone)]
pub struct Mesh<V = ()> {
    /// All vertex slots, live and destroyed.
    pub(crate) vertices: Vec<Vertex<V>>,

    /// All half-edge slots, live and destroyed.
    pub(crate) halfedges: Vec<HalfEdge>,

    /// All face slots, live and destroyed. Slot 0 is the border face.
    pub(crate) faces: Vec<Face>,

    border: FaceId,
    free: Slots,
    retired: Slots,
    live_vertices: usize,
    live_halfedges: usize,
    live_faces: usize,
}

/// A full copy of a mesh that can be restored later.
#[derive(Debug, Clone)]
pub struct MeshSnapshot<V = ()>(Mesh<V>);

impl<V: VertexData> Default for Mesh<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: VertexData> Mesh<V> {
    /// Create a new empty mesh containing only the border face.
    pub fn new() -> Self {
        Self::with_capacity(0, 0)
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(num_vertices: usize, num_faces: usize) -> Self {
        // A planar triangulation has about 3F half-edges plus its boundary.
        let num_halfedges = num_faces * 3 + num_faces / 2;

        let mut faces = Vec::with_capacity(num_faces + 1);
        let mut border = Face::default();
        border.border = true;
        faces.push(border);

        Self {
            vertices: Vec::with_capacity(num_vertices),
            halfedges: Vec::with_capacity(num_halfedges),
            faces,
            border: FaceId::new(0),
            free: Slots::default(),
            retired: Slots::default(),
            live_vertices: 0,
            live_halfedges: 0,
            live_faces: 0,
        }
    }

    // ==================== Accessors ====================

    /// Number of live vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.live_vertices
    }

    /// Number of live half-edges.
    #[inline]
    pub fn num_halfedges(&self) -> usize {
        self.live_halfedges
    }

    /// Number of live edges (twin pairs).
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.live_halfedges / 2
    }

    /// Number of live faces, excluding the border face.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.live_faces
    }

    /// Number of vertex slots, live or destroyed.
    ///
    /// Suitable for sizing scratch arrays indexed by [`VertexId::index`].
    #[inline]
    pub fn vertex_capacity(&self) -> usize {
        self.vertices.len()
    }

    /// Number of face slots, live or destroyed.
    #[inline]
    pub fn face_capacity(&self) -> usize {
        self.faces.len()
    }

    /// Whether the mesh has no faces besides the border.
    pub fn is_empty(&self) -> bool {
        self.live_faces == 0
    }

    /// The border face.
    #[inline]
    pub fn border_face(&self) -> FaceId {
        self.border
    }

    /// Get a vertex by ID.
    #[inline]
    pub fn vertex(&self, id: VertexId) -> &Vertex<V> {
        &self.vertices[id.index()]
    }

    /// Get a mutable vertex by ID.
    #[inline]
    pub fn vertex_mut(&mut self, id: VertexId) -> &mut Vertex<V> {
        &mut self.vertices[id.index()]
    }

    /// Get a half-edge by ID.
    #[inline]
    pub fn halfedge(&self, id: HalfEdgeId) -> &HalfEdge {
        &self.halfedges[id.index()]
    }

    /// Get a face by ID.
    #[inline]
    pub fn face(&self, id: FaceId) -> &Face {
        &self.faces[id.index()]
    }

    /// Get the position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId) -> &Point2<f64> {
        &self.vertex(v).position
    }

    /// Set the position of a vertex.
    #[inline]
    pub fn set_position(&mut self, v: VertexId, pos: Point2<f64>) {
        self.vertex_mut(v).position = pos;
    }

    /// Whether a vertex is fixed.
    #[inline]
    pub fn is_fixed(&self, v: VertexId) -> bool {
        self.vertex(v).fixed
    }

    /// Mark a vertex as fixed or free.
    #[inline]
    pub fn set_fixed(&mut self, v: VertexId, fixed: bool) {
        self.vertex_mut(v).fixed = fixed;
    }

    /// The payload of a vertex.
    #[inline]
    pub fn data(&self, v: VertexId) -> &V {
        &self.vertex(v).data
    }

    /// Mutable payload of a vertex.
    #[inline]
    pub fn data_mut(&mut self, v: VertexId) -> &mut V {
        &mut self.vertex_mut(v).data
    }

    // ==================== Liveness ====================

    /// Whether `v` names a live vertex.
    #[inline]
    pub fn vertex_alive(&self, v: VertexId) -> bool {
        v.is_valid() && v.index() < self.vertices.len() && !self.vertices[v.index()].destroyed
    }

    /// Whether `e` names a live half-edge.
    #[inline]
    pub fn halfedge_alive(&self, e: HalfEdgeId) -> bool {
        e.is_valid() && e.index() < self.halfedges.len() && !self.halfedges[e.index()].destroyed
    }

    /// Whether `f` names a live face.
    #[inline]
    pub fn face_alive(&self, f: FaceId) -> bool {
        f.is_valid() && f.index() < self.faces.len() && !self.faces[f.index()].destroyed
    }

    pub(crate) fn check_vertex(&self, v: VertexId) -> Result<()> {
        if self.vertex_alive(v) {
            Ok(())
        } else {
            Err(MeshError::InvalidHandle(format!("{:?}", v)))
        }
    }

    pub(crate) fn check_halfedge(&self, e: HalfEdgeId) -> Result<()> {
        if self.halfedge_alive(e) {
            Ok(())
        } else {
            Err(MeshError::InvalidHandle(format!("{:?}", e)))
        }
    }

    pub(crate) fn check_face(&self, f: FaceId) -> Result<()> {
        if self.face_alive(f) {
            Ok(())
        } else {
            Err(MeshError::InvalidHandle(format!("{:?}", f)))
        }
    }

    // ==================== Topology Queries ====================

    /// Get the twin (opposite) half-edge.
    #[inline]
    pub fn twin(&self, he: HalfEdgeId) -> HalfEdgeId {
        self.halfedge(he).twin
    }

    /// Get the next half-edge around the face.
    #[inline]
    pub fn next(&self, he: HalfEdgeId) -> HalfEdgeId {
        self.halfedge(he).next
    }

    /// Get the previous half-edge around the face.
    #[inline]
    pub fn prev(&self, he: HalfEdgeId) -> HalfEdgeId {
        self.halfedge(he).prev
    }

    /// Get the vertex a half-edge points to.
    #[inline]
    pub fn target(&self, he: HalfEdgeId) -> VertexId {
        self.halfedge(he).vertex
    }

    /// Get the vertex a half-edge starts from.
    #[inline]
    pub fn source(&self, he: HalfEdgeId) -> VertexId {
        self.target(self.twin(he))
    }

    /// Get the face of a half-edge.
    #[inline]
    pub fn face_of(&self, he: HalfEdgeId) -> FaceId {
        self.halfedge(he).face
    }

    /// Get the half-edge stored at a vertex (it ends at the vertex).
    #[inline]
    pub fn vertex_edge(&self, v: VertexId) -> HalfEdgeId {
        self.vertex(v).halfedge
    }

    /// Get the half-edge stored at a face.
    #[inline]
    pub fn face_edge(&self, f: FaceId) -> HalfEdgeId {
        self.face(f).halfedge
    }

    /// Whether `f` is the border face.
    #[inline]
    pub fn is_border(&self, f: FaceId) -> bool {
        self.face(f).border
    }

    /// Whether `f` is flagged as a hole.
    #[inline]
    pub fn is_hole(&self, f: FaceId) -> bool {
        self.face(f).hole
    }

    /// Whether `f` is the border or a hole.
    #[inline]
    pub fn is_boundary_face(&self, f: FaceId) -> bool {
        let face = self.face(f);
        face.border || face.hole
    }

    /// Whether a half-edge lies on the border face.
    #[inline]
    pub fn is_border_halfedge(&self, he: HalfEdgeId) -> bool {
        self.is_border(self.face_of(he))
    }

    /// Whether either side of an edge is the border or a hole.
    #[inline]
    pub fn is_boundary_edge(&self, he: HalfEdgeId) -> bool {
        self.is_boundary_face(self.face_of(he)) || self.is_boundary_face(self.face_of(self.twin(he)))
    }

    /// Whether a vertex is adjacent to the border face.
    pub fn is_border_vertex(&self, v: VertexId) -> bool {
        self.incident_halfedges(v).any(|he| self.is_border_halfedge(he))
    }

    /// Whether a vertex is adjacent to the border or to a hole.
    pub fn is_boundary_vertex(&self, v: VertexId) -> bool {
        self.incident_halfedges(v)
            .any(|he| self.is_boundary_face(self.face_of(he)))
    }

    /// Number of edges incident to a vertex.
    pub fn valence(&self, v: VertexId) -> usize {
        self.incident_halfedges(v).count()
    }

    /// Whether a face is bounded by exactly three half-edges.
    pub fn is_triangle(&self, f: FaceId) -> bool {
        let e0 = self.face_edge(f);
        if !e0.is_valid() {
            return false;
        }
        let e1 = self.next(e0);
        let e2 = self.next(e1);
        e1 != e0 && e2 != e0 && self.next(e2) == e0
    }

    /// Whether a face is a live triangle of the meshed domain (not border, not hole).
    pub fn is_inner_triangle(&self, f: FaceId) -> bool {
        self.face_alive(f) && !self.is_boundary_face(f) && self.is_triangle(f)
    }

    /// The half-edge from `from` to `to`, if the two vertices are connected.
    pub fn find_halfedge(&self, from: VertexId, to: VertexId) -> Option<HalfEdgeId> {
        self.incident_halfedges(to).find(|&he| self.source(he) == from)
    }

    /// The three vertices of a triangular face, in counter-clockwise order
    /// starting at the source of the face's stored half-edge.
    pub fn triangle_vertices(&self, f: FaceId) -> [VertexId; 3] {
        let e0 = self.face_edge(f);
        let e1 = self.next(e0);
        [self.source(e0), self.target(e0), self.target(e1)]
    }

    // ==================== Iteration ====================

    /// Iterate over live vertex IDs.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.destroyed)
            .map(|(i, _)| VertexId::new(i))
    }

    /// Iterate over live vertices with their IDs.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex<V>)> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.destroyed)
            .map(|(i, v)| (VertexId::new(i), v))
    }

    /// Iterate over live half-edge IDs.
    pub fn halfedge_ids(&self) -> impl Iterator<Item = HalfEdgeId> + '_ {
        self.halfedges
            .iter()
            .enumerate()
            .filter(|(_, he)| !he.destroyed)
            .map(|(i, _)| HalfEdgeId::new(i))
    }

    /// Iterate over live edges, one half-edge per twin pair.
    pub fn edges(&self) -> impl Iterator<Item = HalfEdgeId> + '_ {
        self.halfedge_ids().filter(move |&he| he < self.twin(he))
    }

    /// Iterate over live faces, excluding the border face.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.destroyed && !f.border)
            .map(|(i, _)| FaceId::new(i))
    }

    /// Iterate over live triangles of the meshed domain.
    pub fn inner_triangle_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.face_ids().filter(move |&f| !self.is_hole(f) && self.is_triangle(f))
    }

    /// Iterate over every half-edge on the border face, across all border loops.
    pub fn border_halfedges(&self) -> impl Iterator<Item = HalfEdgeId> + '_ {
        let border = self.border;
        self.halfedge_ids()
            .filter(move |&he| self.face_of(he) == border)
    }

    // ==================== Geometry ====================

    /// The triangle formed by the first three corners of a face.
    pub fn to_triangle(&self, f: FaceId) -> Triangle {
        let [a, b, c] = self.triangle_vertices(f);
        Triangle::new(*self.position(a), *self.position(b), *self.position(c))
    }

    /// The polygon formed by the corners of a face.
    pub fn to_polygon(&self, f: FaceId) -> Polygon {
        Polygon::new(self.face_vertices(f).map(|v| *self.position(v)).collect())
    }

    /// Area of a face.
    pub fn face_area(&self, f: FaceId) -> f64 {
        if self.is_triangle(f) {
            self.to_triangle(f).area()
        } else {
            self.to_polygon(f).area()
        }
    }

    /// Centroid of a face.
    pub fn face_centroid(&self, f: FaceId) -> Point2<f64> {
        if self.is_triangle(f) {
            self.to_triangle(f).centroid()
        } else {
            self.to_polygon(f).centroid()
        }
    }

    /// Length of an edge.
    pub fn edge_length(&self, he: HalfEdgeId) -> f64 {
        (self.position(self.target(he)) - self.position(self.source(he))).norm()
    }

    /// Vector from the source to the target of a half-edge.
    pub fn edge_vector(&self, he: HalfEdgeId) -> Vector2<f64> {
        self.position(self.target(he)) - self.position(self.source(he))
    }

    /// Midpoint of an edge.
    pub fn edge_midpoint(&self, he: HalfEdgeId) -> Point2<f64> {
        nalgebra::center(self.position(self.source(he)), self.position(self.target(he)))
    }

    /// Bounding box of all live vertices.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.vertices().map(|(_, v)| &v.position))
    }

    // ==================== Element Management ====================

    pub(crate) fn alloc_vertex(&mut self, position: Point2<f64>) -> VertexId {
        self.live_vertices += 1;
        if let Some(v) = self.free.vertices.pop() {
            self.vertices[v.index()] = Vertex::new(position);
            v
        } else {
            self.vertices.push(Vertex::new(position));
            VertexId::new(self.vertices.len() - 1)
        }
    }

    pub(crate) fn alloc_halfedge(&mut self) -> HalfEdgeId {
        self.live_halfedges += 1;
        if let Some(he) = self.free.halfedges.pop() {
            self.halfedges[he.index()] = HalfEdge::new();
            he
        } else {
            self.halfedges.push(HalfEdge::new());
            HalfEdgeId::new(self.halfedges.len() - 1)
        }
    }

    pub(crate) fn alloc_face(&mut self, hole: bool) -> FaceId {
        self.live_faces += 1;
        let mut face = Face::default();
        face.hole = hole;
        if let Some(f) = self.free.faces.pop() {
            self.faces[f.index()] = face;
            f
        } else {
            self.faces.push(face);
            FaceId::new(self.faces.len() - 1)
        }
    }

    /// Allocate a twin pair `(from -> to, to -> from)`. Faces and next
    /// pointers are left for the caller.
    pub(crate) fn alloc_edge_pair(&mut self, from: VertexId, to: VertexId) -> (HalfEdgeId, HalfEdgeId) {
        let a = self.alloc_halfedge();
        let b = self.alloc_halfedge();
        self.halfedges[a.index()].vertex = to;
        self.halfedges[b.index()].vertex = from;
        self.link_twins(a, b);
        (a, b)
    }

    pub(crate) fn destroy_vertex(&mut self, v: VertexId) {
        let vertex = &mut self.vertices[v.index()];
        if !vertex.destroyed {
            vertex.destroyed = true;
            vertex.halfedge = HalfEdgeId::invalid();
            self.live_vertices -= 1;
            self.retired.vertices.push(v);
        }
    }

    pub(crate) fn destroy_halfedge(&mut self, he: HalfEdgeId) {
        let halfedge = &mut self.halfedges[he.index()];
        if !halfedge.destroyed {
            halfedge.destroyed = true;
            self.live_halfedges -= 1;
            self.retired.halfedges.push(he);
        }
    }

    pub(crate) fn destroy_face(&mut self, f: FaceId) {
        let face = &mut self.faces[f.index()];
        if !face.destroyed && !face.border {
            face.destroyed = true;
            self.live_faces -= 1;
            self.retired.faces.push(f);
        }
    }

    /// End the current epoch: slots destroyed so far become reusable.
    pub fn end_epoch(&mut self) {
        self.free.append(&mut self.retired);
    }

    // ==================== Raw Linking ====================

    #[inline]
    pub(crate) fn link_next(&mut self, he: HalfEdgeId, next: HalfEdgeId) {
        self.halfedges[he.index()].next = next;
        self.halfedges[next.index()].prev = he;
    }

    #[inline]
    pub(crate) fn link_twins(&mut self, a: HalfEdgeId, b: HalfEdgeId) {
        self.halfedges[a.index()].twin = b;
        self.halfedges[b.index()].twin = a;
    }

    #[inline]
    pub(crate) fn set_target(&mut self, he: HalfEdgeId, v: VertexId) {
        self.halfedges[he.index()].vertex = v;
    }

    #[inline]
    pub(crate) fn set_face(&mut self, he: HalfEdgeId, f: FaceId) {
        self.halfedges[he.index()].face = f;
    }

    #[inline]
    pub(crate) fn set_face_edge(&mut self, f: FaceId, he: HalfEdgeId) {
        self.faces[f.index()].halfedge = he;
    }

    #[inline]
    pub(crate) fn set_vertex_edge(&mut self, v: VertexId, he: HalfEdgeId) {
        self.vertices[v.index()].halfedge = he;
    }

    #[inline]
    pub(crate) fn set_hole(&mut self, f: FaceId, hole: bool) {
        self.faces[f.index()].hole = hole;
    }

    /// Point the vertex at a border half-edge if it has one, otherwise at a
    /// hole half-edge, otherwise keep any live incident half-edge.
    pub(crate) fn fix_vertex_edge(&mut self, v: VertexId) {
        let mut fallback = None;
        let mut hole = None;
        for he in self.incident_halfedges(v) {
            let f = self.face_of(he);
            if self.is_border(f) {
                self.set_vertex_edge(v, he);
                return;
            }
            if hole.is_none() && self.is_hole(f) {
                hole = Some(he);
            }
            if fallback.is_none() {
                fallback = Some(he);
            }
        }
        if let Some(he) = hole.or(fallback) {
            self.set_vertex_edge(v, he);
        }
    }

    // ==================== Public Construction ====================

    /// Create an isolated vertex at `(x, y)`.
    ///
    /// The vertex has no incident edge until a face is created on it.
    pub fn create_vertex(&mut self, x: f64, y: f64) -> VertexId {
        self.alloc_vertex(Point2::new(x, y))
    }

    /// Create a face from an ordered list of isolated vertices.
    ///
    /// The vertices must be distinct, unused by any other face and in
    /// counter-clockwise order. The face's outside becomes a new loop of the
    /// border face.
    pub fn create_face(&mut self, vertices: &[VertexId]) -> Result<FaceId> {
        let n = vertices.len();
        if n < 3 {
            return Err(MeshError::topology("a face needs at least three vertices"));
        }
        for (i, &v) in vertices.iter().enumerate() {
            self.check_vertex(v)?;
            if self.vertex_edge(v).is_valid() {
                return Err(MeshError::topology(format!("{:?} already has edges", v)));
            }
            if vertices[..i].contains(&v) {
                return Err(MeshError::DegenerateFace { face: self.faces.len() });
            }
        }
        let polygon = Polygon::new(vertices.iter().map(|&v| *self.position(v)).collect());
        if polygon.signed_area() <= 0.0 {
            return Err(MeshError::DegenerateFace { face: self.faces.len() });
        }

        let f = self.alloc_face(false);
        let border = self.border;
        let mut inner = Vec::with_capacity(n);
        let mut outer = Vec::with_capacity(n);
        for i in 0..n {
            let (e, t) = self.alloc_edge_pair(vertices[i], vertices[(i + 1) % n]);
            self.set_face(e, f);
            self.set_face(t, border);
            inner.push(e);
            outer.push(t);
        }
        for i in 0..n {
            self.link_next(inner[i], inner[(i + 1) % n]);
            // outer[i] ends at vertices[i]; outer[i - 1] starts there.
            self.link_next(outer[i], outer[(i + n - 1) % n]);
            self.set_vertex_edge(vertices[i], outer[i]);
        }
        self.set_face_edge(f, inner[0]);
        if !self.face_alive_with_edges(border) {
            self.set_face_edge(border, outer[0]);
        }
        Ok(f)
    }

    fn face_alive_with_edges(&self, f: FaceId) -> bool {
        let he = self.face_edge(f);
        self.halfedge_alive(he) && self.face_of(he) == f
    }

    /// Set `next(he) = next` after checking local consistency.
    pub fn try_set_next(&mut self, he: HalfEdgeId, next: HalfEdgeId) -> Result<()> {
        self.check_halfedge(he)?;
        self.check_halfedge(next)?;
        if he == next {
            return Err(MeshError::topology("a half-edge cannot follow itself"));
        }
        if self.halfedge_alive(self.twin(next)) && self.source(next) != self.target(he) {
            return Err(MeshError::topology(format!(
                "{:?} does not start where {:?} ends",
                next, he
            )));
        }
        let old_next = self.next(he);
        if self.halfedge_alive(old_next) && old_next != next {
            return Err(MeshError::topology(format!(
                "{:?} is already followed by {:?}",
                he, old_next
            )));
        }
        let old_prev = self.prev(next);
        if self.halfedge_alive(old_prev) && old_prev != he {
            return Err(MeshError::topology(format!(
                "{:?} already follows {:?}",
                next, old_prev
            )));
        }
        if self.face_of(he) != self.face_of(next) {
            return Err(MeshError::topology(format!(
                "{:?} and {:?} lie on different faces",
                he, next
            )));
        }
        self.link_next(he, next);
        Ok(())
    }

    /// Make `a` and `b` twins after checking they point in opposite directions.
    pub fn try_set_twin(&mut self, a: HalfEdgeId, b: HalfEdgeId) -> Result<()> {
        self.check_halfedge(a)?;
        self.check_halfedge(b)?;
        if a == b {
            return Err(MeshError::topology("a half-edge cannot be its own twin"));
        }
        if self.target(a) == self.target(b) {
            return Err(MeshError::topology(format!(
                "{:?} and {:?} point to the same vertex",
                a, b
            )));
        }
        for (e, other) in [(a, b), (b, a)] {
            let old = self.twin(e);
            if self.halfedge_alive(old) && old != other {
                return Err(MeshError::topology(format!(
                    "{:?} is already paired with {:?}",
                    e, old
                )));
            }
        }
        self.link_twins(a, b);
        Ok(())
    }

    /// Set the face of a half-edge.
    pub fn try_set_face(&mut self, he: HalfEdgeId, f: FaceId) -> Result<()> {
        self.check_halfedge(he)?;
        self.check_face(f)?;
        self.set_face(he, f);
        Ok(())
    }

    /// Set the vertex a half-edge points to.
    pub fn try_set_target(&mut self, he: HalfEdgeId, v: VertexId) -> Result<()> {
        self.check_halfedge(he)?;
        self.check_vertex(v)?;
        self.set_target(he, v);
        Ok(())
    }

    // ==================== Snapshots ====================

    /// Copy the whole mesh.
    pub fn snapshot(&self) -> MeshSnapshot<V> {
        MeshSnapshot(self.clone())
    }

    /// Replace the mesh with a previously taken snapshot.
    pub fn restore(&mut self, snapshot: MeshSnapshot<V>) {
        *self = snapshot.0;
    }

    // ==================== Validation ====================

    /// Check the structural invariants of the mesh.
    ///
    /// Verifies that twins are mutual, that `next`/`prev` agree and stay on
    /// one face, that consecutive half-edges share their vertex, that every
    /// face loop closes, that every live vertex is reachable by rotation and
    /// that boundary vertices store a border half-edge.
    pub fn check_invariants(&self) -> Result<()> {
        let fail = |msg: String| Err(MeshError::Topology(msg));
        let mut arriving: HashMap<VertexId, usize> = HashMap::new();

        for he in self.halfedge_ids() {
            let h = self.halfedge(he);
            if !self.halfedge_alive(h.twin) || h.twin == he || self.twin(h.twin) != he {
                return fail(format!("{:?} has a broken twin", he));
            }
            if !self.halfedge_alive(h.next) || self.prev(h.next) != he {
                return fail(format!("{:?} has a broken next", he));
            }
            if !self.halfedge_alive(h.prev) || self.next(h.prev) != he {
                return fail(format!("{:?} has a broken prev", he));
            }
            if !self.face_alive(h.face) || self.face_of(h.next) != h.face {
                return fail(format!("{:?} leaves its face", he));
            }
            if !self.vertex_alive(h.vertex) {
                return fail(format!("{:?} points to a dead vertex", he));
            }
            if self.source(h.next) != h.vertex {
                return fail(format!("{:?} and its next do not share a vertex", he));
            }
            *arriving.entry(h.vertex).or_insert(0) += 1;
        }

        for f in self.face_ids().chain(std::iter::once(self.border)) {
            let start = self.face_edge(f);
            if !start.is_valid() {
                if f == self.border {
                    continue;
                }
                return fail(format!("{:?} has no edge", f));
            }
            if !self.halfedge_alive(start) || self.face_of(start) != f {
                return fail(format!("{:?} stores a foreign edge", f));
            }
            let mut he = start;
            let mut steps = 0;
            loop {
                he = self.next(he);
                steps += 1;
                if he == start {
                    break;
                }
                if steps > self.live_halfedges {
                    return fail(format!("{:?} has an open loop", f));
                }
            }
            if steps < 3 && !self.is_boundary_face(f) {
                return fail(format!("{:?} has fewer than three edges", f));
            }
        }

        for (v, vertex) in self.vertices() {
            if !vertex.halfedge.is_valid() {
                return fail(format!("{:?} is orphaned", v));
            }
            if !self.halfedge_alive(vertex.halfedge) || self.target(vertex.halfedge) != v {
                return fail(format!("{:?} stores a foreign edge", v));
            }
            let rotated = self.incident_halfedges(v).count();
            if Some(&rotated) != arriving.get(&v) {
                return fail(format!("{:?} is not reachable by rotation", v));
            }
            if self.is_border_vertex(v) && !self.is_border_halfedge(vertex.halfedge) {
                return fail(format!("boundary vertex {:?} does not store a border edge", v));
            }
        }
        Ok(())
    }

    /// Whether [`check_invariants`](Self::check_invariants) passes.
    pub fn is_valid(&self) -> bool {
        self.check_invariants().is_ok()
    }
}

/// Signed area test used by operations that must not invert faces.
pub(crate) fn is_ccw(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> bool {
    orient2d(a, b, c) > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> (Mesh, [VertexId; 4]) {
        let mut mesh = Mesh::new();
        let a = mesh.create_vertex(0.0, 0.0);
        let b = mesh.create_vertex(1.0, 0.0);
        let c = mesh.create_vertex(1.0, 1.0);
        let d = mesh.create_vertex(0.0, 1.0);
        mesh.create_face(&[a, b, c, d]).unwrap();
        (mesh, [a, b, c, d])
    }

    #[test]
    fn test_create_face() {
        let (mesh, [a, b, ..]) = square();
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_edges(), 4);
        assert_eq!(mesh.num_faces(), 1);
        assert!(mesh.check_invariants().is_ok());

        let ab = mesh.find_halfedge(a, b).unwrap();
        assert!(!mesh.is_border_halfedge(ab));
        assert!(mesh.is_border_halfedge(mesh.twin(ab)));
        assert!(mesh.is_border_vertex(a));
        assert!(mesh.is_border_halfedge(mesh.vertex_edge(a)));
    }

    #[test]
    fn test_create_face_rejects_clockwise() {
        let mut mesh: Mesh = Mesh::new();
        let a = mesh.create_vertex(0.0, 0.0);
        let b = mesh.create_vertex(0.0, 1.0);
        let c = mesh.create_vertex(1.0, 0.0);
        assert!(matches!(
            mesh.create_face(&[a, b, c]),
            Err(MeshError::DegenerateFace { .. })
        ));
        assert_eq!(mesh.num_faces(), 0);
    }

    #[test]
    fn test_border_loop_closes() {
        let (mesh, _) = square();
        let start = mesh.face_edge(mesh.border_face());
        let mut he = start;
        let mut count = 0;
        loop {
            assert!(mesh.is_border_halfedge(he));
            he = mesh.next(he);
            count += 1;
            if he == start {
                break;
            }
        }
        assert_eq!(count, 4);
        assert_eq!(mesh.border_halfedges().count(), 4);
    }

    #[test]
    fn test_checked_setters() {
        let (mut mesh, [a, b, c, d]) = square();
        let ab = mesh.find_halfedge(a, b).unwrap();
        let cb = mesh.find_halfedge(c, b).unwrap();
        let cd = mesh.find_halfedge(c, d).unwrap();
        assert!(mesh.try_set_twin(ab, ab).is_err());
        assert!(matches!(mesh.try_set_twin(ab, cb), Err(MeshError::Topology(_))));
        assert!(matches!(mesh.try_set_next(ab, cd), Err(MeshError::Topology(_))));
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_setters_keep_existing_pairs() {
        let mut mesh: Mesh = Mesh::new();
        let a = mesh.create_vertex(0.0, 0.0);
        let b = mesh.create_vertex(1.0, 0.0);
        let c = mesh.create_vertex(0.0, 1.0);
        let f = mesh.create_face(&[a, b, c]).unwrap();
        let e0 = mesh.face_edge(f);
        let e1 = mesh.next(e0);
        let e2 = mesh.next(e1);

        // Opposite directions, but both already have twins.
        let t = mesh.twin(e2);
        assert_ne!(mesh.target(e0), mesh.target(t));
        assert!(matches!(mesh.try_set_twin(e0, t), Err(MeshError::Topology(_))));
        assert!(mesh.is_valid(), "{:?}", mesh.check_invariants());

        // Would orphan the current successor of e0.
        let outside = mesh.next(mesh.twin(e0));
        assert_eq!(mesh.source(outside), mesh.target(e2));
        assert!(matches!(mesh.try_set_next(e2, outside), Err(MeshError::Topology(_))));
        assert!(mesh.is_valid(), "{:?}", mesh.check_invariants());

        // Restating existing relations is fine.
        let twin = mesh.twin(e0);
        mesh.try_set_twin(e0, twin).unwrap();
        mesh.try_set_next(e0, e1).unwrap();
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_destroyed_slots_wait_for_epoch() {
        let mut mesh: Mesh = Mesh::new();
        let v = mesh.create_vertex(0.0, 0.0);
        mesh.destroy_vertex(v);
        assert!(!mesh.vertex_alive(v));
        let w = mesh.create_vertex(1.0, 1.0);
        assert_ne!(v, w);
        mesh.destroy_vertex(w);
        mesh.end_epoch();
        let x = mesh.create_vertex(2.0, 2.0);
        assert!(x == v || x == w);
        assert_eq!(mesh.num_vertices(), 1);
    }

    #[test]
    fn test_snapshot_restore() {
        let (mut mesh, [a, ..]) = square();
        let snapshot = mesh.snapshot();
        mesh.set_position(a, Point2::new(-5.0, -5.0));
        mesh.restore(snapshot);
        assert_eq!(*mesh.position(a), Point2::new(0.0, 0.0));
    }

    #[test]
    fn test_vertex_payload() {
        let mut mesh: Mesh<u32> = Mesh::new();
        let v = mesh.create_vertex(0.0, 0.0);
        assert_eq!(*mesh.data(v), 0);
        *mesh.data_mut(v) = 7;
        assert_eq!(*mesh.data(v), 7);
    }
}
