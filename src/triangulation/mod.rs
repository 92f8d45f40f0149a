//! Incremental Delaunay triangulation.
//!
//! Points are inserted one at a time into a large super triangle that is
//! created by [`Triangulation::init`]. Each insertion locates the point,
//! splits the containing face (or the edge the point lies on) and restores
//! the Delaunay property by flipping edges. [`Triangulation::finish`] removes
//! the super triangle again, repairs the convex hull and leaves only the
//! faces spanned by the inserted points.
//!
//! # Example
//!
//! ```
//! use eikmesh::geometry::BoundingBox;
//! use eikmesh::locate::LocatorKind;
//! use eikmesh::triangulation::Triangulation;
//! use nalgebra::Point2;
//!
//! let bound = BoundingBox::from_origin_size(-1.0, -1.0, 3.0, 3.0);
//! let mut triangulation: Triangulation = Triangulation::new(bound, LocatorKind::Walk);
//! for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.5, 0.5)] {
//!     triangulation.insert(Point2::new(x, y)).unwrap();
//! }
//! triangulation.finish().unwrap();
//!
//! assert_eq!(triangulation.mesh().num_faces(), 4);
//! assert!(triangulation.is_delaunay());
//! ```

mod finish;
mod holes;
mod legalize;

use nalgebra::Point2;

use crate::error::{MeshError, Result};
use crate::geometry::{BoundingBox, Tolerance, Triangle};
use crate::locate::{vertex_face, Location, LocatorKind, PointLocator};
use crate::mesh::{FaceId, HalfEdgeId, Mesh, VertexData, VertexId};

/// Number of perturbed retries for an ambiguous insertion.
const MAX_RETRIES: u32 = 4;

/// In-radius of the super triangle relative to the extent of the bound.
const SUPER_TRIANGLE_SCALE: f64 = 1000.0;

/// Golden angle, spreads successive perturbation directions.
const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

/// Lifecycle of a [`Triangulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriangulationState {
    /// No super triangle yet.
    Uninitialized,
    /// Points are being inserted into the super triangle.
    Building,
    /// The super triangle has been removed.
    Finished,
}

/// An incremental Delaunay triangulation over a [`Mesh`].
#[derive(Debug, Clone)]
pub struct Triangulation<V = ()> {
    mesh: Mesh<V>,
    bound: BoundingBox,
    locator: PointLocator,
    tolerance: Tolerance,
    state: TriangulationState,
    super_vertices: [VertexId; 3],
    last_face: Option<FaceId>,
}

impl<V: VertexData> Triangulation<V> {
    /// Create an uninitialized triangulation for points inside `bound`.
    pub fn new(bound: BoundingBox, kind: LocatorKind) -> Self {
        Self::with_tolerance(bound, kind, Tolerance::for_extent(bound.extent()))
    }

    /// Create an uninitialized triangulation with an explicit tolerance.
    pub fn with_tolerance(bound: BoundingBox, kind: LocatorKind, tolerance: Tolerance) -> Self {
        Self {
            mesh: Mesh::new(),
            bound,
            locator: PointLocator::new(kind, &bound, tolerance),
            tolerance,
            state: TriangulationState::Uninitialized,
            super_vertices: [VertexId::invalid(); 3],
            last_face: None,
        }
    }

    /// Wrap an existing mesh as a finished triangulation.
    pub fn from_mesh(mesh: Mesh<V>, kind: LocatorKind) -> Result<Self> {
        let bound = mesh.bounding_box().ok_or(MeshError::EmptyMesh)?;
        let tolerance = Tolerance::for_extent(bound.extent());
        let mut locator = PointLocator::new(kind, &bound, tolerance);
        locator.on_init(&mesh);
        for v in mesh.vertex_ids() {
            locator.on_vertex_inserted(&mesh, v);
        }
        Ok(Self {
            mesh,
            bound,
            locator,
            tolerance,
            state: TriangulationState::Finished,
            super_vertices: [VertexId::invalid(); 3],
            last_face: None,
        })
    }

    /// Create the super triangle.
    ///
    /// The super triangle is equilateral, centered on the bound, with an
    /// in-radius a thousand times the bound's extent.
    pub fn init(&mut self) -> Result<()> {
        if self.state != TriangulationState::Uninitialized {
            return Err(MeshError::InvalidState(
                "triangulation is already initialized".into(),
            ));
        }
        let extent = self.bound.extent();
        let extent = if extent > 0.0 && extent.is_finite() { extent } else { 1.0 };
        let center = self.bound.center();
        let radius = 2.0 * SUPER_TRIANGLE_SCALE * extent;

        let mut corners = [VertexId::invalid(); 3];
        for (i, degrees) in [-90.0f64, 30.0, 150.0].into_iter().enumerate() {
            let angle = degrees.to_radians();
            corners[i] = self.mesh.create_vertex(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            );
        }
        let face = self.mesh.create_face(&corners)?;
        for &v in &corners {
            self.mesh.set_fixed(v, true);
        }

        self.super_vertices = corners;
        self.last_face = Some(face);
        self.locator.on_init(&self.mesh);
        self.state = TriangulationState::Building;
        Ok(())
    }

    // ==================== Accessors ====================

    /// Current lifecycle state.
    pub fn state(&self) -> TriangulationState {
        self.state
    }

    /// The underlying mesh.
    pub fn mesh(&self) -> &Mesh<V> {
        &self.mesh
    }

    pub(crate) fn mesh_mut(&mut self) -> &mut Mesh<V> {
        &mut self.mesh
    }

    /// Consume the triangulation and return its mesh.
    pub fn into_mesh(self) -> Mesh<V> {
        self.mesh
    }

    /// The region points may be inserted into while building.
    pub fn bound(&self) -> &BoundingBox {
        &self.bound
    }

    /// The tolerance used by all geometric decisions.
    pub fn tolerance(&self) -> &Tolerance {
        &self.tolerance
    }

    /// The point locator.
    pub fn locator(&self) -> &PointLocator {
        &self.locator
    }

    /// The point-location strategy.
    pub fn locator_kind(&self) -> LocatorKind {
        self.locator.kind()
    }

    /// Whether `v` is one of the super-triangle corners.
    pub fn is_super_vertex(&self, v: VertexId) -> bool {
        v.is_valid() && self.super_vertices.contains(&v)
    }

    /// Whether a face has a super-triangle corner.
    pub fn is_super_face(&self, f: FaceId) -> bool {
        self.state == TriangulationState::Building
            && self.mesh.face_vertices(f).any(|v| self.is_super_vertex(v))
    }

    /// Number of inserted vertices, super-triangle corners excluded.
    pub fn num_vertices(&self) -> usize {
        self.vertices().count()
    }

    /// Iterate over inserted vertices, super-triangle corners excluded.
    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.mesh.vertex_ids().filter(move |&v| !self.is_super_vertex(v))
    }

    /// Iterate over the triangles of the meshed domain.
    ///
    /// Hole faces and faces of the super triangle are skipped.
    pub fn faces(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.mesh
            .inner_triangle_ids()
            .filter(move |&f| !self.is_super_face(f))
    }

    /// Stream the triangles of the meshed domain as geometry.
    pub fn stream_triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.faces().map(move |f| self.mesh.to_triangle(f))
    }

    // ==================== Location ====================

    /// The face containing `p`, or `None` outside the triangulated region.
    pub fn locate(&self, p: &Point2<f64>) -> Option<FaceId> {
        self.locate_detailed(p).face()
    }

    /// Locate `p` and report whether it lies on a vertex or an edge.
    pub fn locate_detailed(&self, p: &Point2<f64>) -> Location {
        if self.state == TriangulationState::Uninitialized {
            return Location::Outside;
        }
        self.locator
            .locate(&self.mesh, p, self.last_face, &self.tolerance)
    }

    // ==================== Insertion ====================

    /// Insert a point.
    ///
    /// Inserting a point that coincides with an existing vertex returns that
    /// vertex and changes nothing.
    ///
    /// # Errors
    ///
    /// [`MeshError::PointOutsideDomain`] if the point lies outside the bound
    /// while building, or outside the mesh once finished.
    pub fn insert(&mut self, p: Point2<f64>) -> Result<VertexId> {
        self.insert_with(p, V::default(), false)
    }

    /// Insert a point with a payload and a fixed flag.
    ///
    /// The payload and flag are only applied to a newly created vertex,
    /// except that inserting a fixed point on an existing vertex fixes it.
    pub fn insert_with(&mut self, p: Point2<f64>, data: V, fixed: bool) -> Result<VertexId> {
        if !(p.x.is_finite() && p.y.is_finite()) {
            return Err(MeshError::invalid_param(
                "point",
                format!("({}, {})", p.x, p.y),
                "coordinates must be finite",
            ));
        }
        if self.state == TriangulationState::Uninitialized {
            self.init()?;
        }
        if self.state == TriangulationState::Building
            && !self.bound.contains(&p, self.tolerance.distance)
        {
            return Err(MeshError::PointOutsideDomain { x: p.x, y: p.y });
        }

        let mut q = p;
        for attempt in 0..=MAX_RETRIES {
            match self.insert_once(q) {
                Ok((v, true)) => {
                    *self.mesh.data_mut(v) = data;
                    self.mesh.set_fixed(v, fixed);
                    return Ok(v);
                }
                Ok((v, false)) => {
                    if fixed {
                        self.mesh.set_fixed(v, true);
                    }
                    return Ok(v);
                }
                Err(MeshError::DegeneratePredicate { .. }) if attempt < MAX_RETRIES => {
                    q = self.perturb(&p, attempt + 1);
                    log::debug!(
                        "ambiguous insertion at ({}, {}), retrying at ({}, {})",
                        p.x,
                        p.y,
                        q.x,
                        q.y
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Err(MeshError::DegeneratePredicate { x: p.x, y: p.y })
    }

    /// Insert many points, stopping at the first error.
    pub fn insert_all<'a, I>(&mut self, points: I) -> Result<Vec<VertexId>>
    where
        I: IntoIterator<Item = &'a Point2<f64>>,
    {
        points.into_iter().map(|p| self.insert(*p)).collect()
    }

    /// A deterministic offset of `p`, growing with `attempt`.
    fn perturb(&self, p: &Point2<f64>, attempt: u32) -> Point2<f64> {
        let angle = attempt as f64 * GOLDEN_ANGLE;
        let radius = self.tolerance.distance.max(f64::EPSILON) * 10f64.powi(attempt as i32 + 1);
        Point2::new(p.x + radius * angle.cos(), p.y + radius * angle.sin())
    }

    /// One insertion attempt. Returns the vertex and whether it is new.
    fn insert_once(&mut self, q: Point2<f64>) -> Result<(VertexId, bool)> {
        let v = match self.locate_detailed(&q) {
            Location::Outside => return Err(MeshError::PointOutsideDomain { x: q.x, y: q.y }),
            Location::OnVertex { vertex, .. } => return Ok((vertex, false)),
            Location::OnEdge { edge, .. } => self.insert_on_edge(edge, q)?,
            Location::InFace(f) => self.insert_in_face(f, q)?,
        };
        self.locator.on_vertex_inserted(&self.mesh, v);
        Ok((v, true))
    }

    fn insert_in_face(&mut self, f: FaceId, q: Point2<f64>) -> Result<VertexId> {
        for he in self.mesh.face_halfedges(f) {
            let a = self.mesh.position(self.mesh.source(he));
            let b = self.mesh.position(self.mesh.target(he));
            if !self.tolerance.is_strictly_ccw(a, b, &q) {
                return Err(MeshError::DegeneratePredicate { x: q.x, y: q.y });
            }
        }
        let v = self.mesh.split_triangle(f, q)?;
        self.after_split(&[f], v);
        Ok(v)
    }

    fn insert_on_edge(&mut self, edge: HalfEdgeId, q: Point2<f64>) -> Result<VertexId> {
        let mut parents = Vec::with_capacity(2);
        for side in [edge, self.mesh.twin(edge)] {
            let f = self.mesh.face_of(side);
            if self.mesh.is_border(f) || !self.mesh.is_triangle(f) {
                continue;
            }
            let a = self.mesh.position(self.mesh.source(side));
            let b = self.mesh.position(self.mesh.target(side));
            let c = self.mesh.position(self.mesh.target(self.mesh.next(side)));
            if !(self.tolerance.is_strictly_ccw(a, &q, c) && self.tolerance.is_strictly_ccw(&q, b, c)) {
                return Err(MeshError::DegeneratePredicate { x: q.x, y: q.y });
            }
            parents.push(f);
        }
        let v = self.mesh.split_edge(edge, q)?;
        self.after_split(&parents, v);
        Ok(v)
    }

    pub(crate) fn notify_replace(&mut self, parents: &[FaceId], children: &[FaceId]) {
        self.locator.on_replace(&self.mesh, parents, children);
    }

    /// Rebuild the locator's search structure from the current mesh, after
    /// vertices moved or faces were merged.
    pub(crate) fn rebuild_locator(&mut self) {
        self.locator.on_init(&self.mesh);
        if !self.last_face.is_some_and(|f| self.mesh.is_inner_triangle(f)) {
            self.last_face = self.mesh.inner_triangle_ids().next();
        }
    }

    fn after_split(&mut self, parents: &[FaceId], v: VertexId) {
        let children: Vec<FaceId> = self.mesh.adjacent_faces(v).collect();
        self.notify_replace(parents, &children);
        let link = self.link_edges(v);
        self.legalize(link);
        self.last_face = vertex_face(&self.mesh, v);
    }

    /// Split an edge at its midpoint and restore the Delaunay property.
    pub fn split_edge(&mut self, e: HalfEdgeId) -> Result<VertexId> {
        self.mesh.check_halfedge(e)?;
        let p = self.mesh.edge_midpoint(e);
        self.split_edge_at(e, p)
    }

    /// Split an edge at a point on it and restore the Delaunay property.
    pub fn split_edge_at(&mut self, e: HalfEdgeId, p: Point2<f64>) -> Result<VertexId> {
        self.mesh.check_halfedge(e)?;
        let a = *self.mesh.position(self.mesh.source(e));
        let d = self.mesh.edge_vector(e);
        let t = (p - a).dot(&d) / d.norm_squared();
        if crate::locate::edge_side(&self.mesh, e, &p).abs() > self.tolerance.distance
            || !(t > 0.0 && t < 1.0)
            || self.tolerance.coincident(&a, &p)
            || self.tolerance.coincident(self.mesh.position(self.mesh.target(e)), &p)
        {
            return Err(MeshError::topology(format!(
                "({}, {}) does not lie inside {:?}",
                p.x, p.y, e
            )));
        }
        let v = self.insert_on_edge(e, p)?;
        self.locator.on_vertex_inserted(&self.mesh, v);
        Ok(v)
    }
}
