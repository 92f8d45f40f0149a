//! Removing the super triangle and repairing the convex hull.

use std::collections::HashSet;

use nalgebra::Point2;

use super::{Triangulation, TriangulationState};
use crate::error::{MeshError, Result};
use crate::geometry::{orient2d, Triangle};
use crate::locate::{edge_side, vertex_face};
use crate::mesh::{FaceId, HalfEdgeId, VertexData, VertexId};

impl<V: VertexData> Triangulation<V> {
    /// Remove the super triangle and the faces attached to it.
    ///
    /// Faces with a super-triangle corner, and hole faces connected to them,
    /// are merged into the border. Because the super triangle is finite,
    /// some convex-hull edges may be missing afterwards; they are restored
    /// by closing reflex border corners. Points that lost all their faces
    /// are inserted again, and hole regions that are still enclosed by the
    /// mesh are merged into single polygonal hole faces.
    pub fn finish(&mut self) -> Result<()> {
        match self.state {
            TriangulationState::Uninitialized => self.init()?,
            TriangulationState::Building => {}
            TriangulationState::Finished => {
                return Err(MeshError::InvalidState(
                    "triangulation is already finished".into(),
                ))
            }
        }

        let region = self.outer_region();
        let mut lost = Vec::new();
        if !region.is_empty() {
            let border = self.mesh.border_face();
            let removed = self.mesh.merge_region(&region, border)?;
            for v in removed {
                if !self.is_super_vertex(v) {
                    let vertex = self.mesh.vertex(v);
                    lost.push((vertex.position, vertex.data.clone(), vertex.fixed));
                }
            }
        }
        self.super_vertices = [VertexId::invalid(); 3];
        self.state = TriangulationState::Finished;
        self.last_face = None;

        let ears = self.repair_hull();
        let mut reinserted = 0;
        for (p, data, fixed) in lost {
            match self.reinsert(p, data, fixed) {
                Ok(_) => reinserted += 1,
                Err(err) => log::warn!("point ({}, {}) lost while finishing: {}", p.x, p.y, err),
            }
        }
        let holes = self.merge_enclosed_holes()?;

        self.mesh.end_epoch();
        self.locator.on_init(&self.mesh);
        self.last_face = self.mesh.inner_triangle_ids().next();
        log::debug!(
            "finished triangulation: {} faces removed, {} hull ears, {} points reinserted, {} holes",
            region.len(),
            ears,
            reinserted,
            holes
        );
        Ok(())
    }

    /// Faces with a super-triangle corner plus hole faces reachable from them.
    fn outer_region(&self) -> Vec<FaceId> {
        let mesh = self.mesh();
        let mut region: Vec<FaceId> = mesh.face_ids().filter(|&f| self.is_super_face(f)).collect();
        let mut seen: HashSet<FaceId> = region.iter().copied().collect();
        let mut i = 0;
        while i < region.len() {
            let f = region[i];
            for g in mesh.face_neighbors(f) {
                if mesh.is_hole(g) && seen.insert(g) {
                    region.push(g);
                }
            }
            i += 1;
        }
        region
    }

    fn reinsert(&mut self, p: Point2<f64>, data: V, fixed: bool) -> Result<VertexId> {
        match self.insert_with(p, data.clone(), fixed) {
            Err(MeshError::PointOutsideDomain { .. }) => self.insert_outside_hull(p, data, fixed),
            other => other,
        }
    }

    /// Attach a point outside the mesh to the border edge it sees best.
    fn insert_outside_hull(&mut self, p: Point2<f64>, data: V, fixed: bool) -> Result<VertexId> {
        let mesh = self.mesh();
        let tol = self.tolerance();
        let border: Vec<HalfEdgeId> = mesh.border_halfedges().collect();
        let mut visible: Vec<(f64, HalfEdgeId)> = border
            .iter()
            .copied()
            .filter(|&b| {
                tol.is_strictly_ccw(mesh.position(mesh.source(b)), mesh.position(mesh.target(b)), &p)
            })
            .map(|b| (edge_side(mesh, b, &p), b))
            .collect();
        visible.sort_by(|x, y| y.0.total_cmp(&x.0));
        let b = visible
            .into_iter()
            .map(|(_, b)| b)
            .find(|&b| {
                let u = mesh.source(b);
                let w = mesh.target(b);
                let (pu, pw) = (*mesh.position(u), *mesh.position(w));
                self.region_is_clear(&border, [pu, pw, p], &[u, w], &[(p, pu), (p, pw)])
            })
            .ok_or(MeshError::PointOutsideDomain { x: p.x, y: p.y })?;

        let v = self.mesh.extend_border(b, p)?;
        *self.mesh.data_mut(v) = data;
        self.mesh.set_fixed(v, fixed);
        if let Some(f) = vertex_face(&self.mesh, v) {
            self.notify_replace(&[], &[f]);
        }
        self.legalize(vec![b]);
        self.repair_hull();
        self.locator.on_vertex_inserted(&self.mesh, v);
        Ok(v)
    }

    /// Close reflex border corners until the outer boundary is convex.
    /// Returns the number of triangles added.
    pub(crate) fn repair_hull(&mut self) -> usize {
        let mut ears = 0;
        while let Some(b1) = self.find_hull_ear() {
            let b2 = self.mesh.next(b1);
            match self.mesh.close_border_corner(b1) {
                Ok(f) => {
                    self.notify_replace(&[], &[f]);
                    self.legalize(vec![b1, b2]);
                    ears += 1;
                }
                Err(err) => {
                    log::debug!("hull repair stopped: {}", err);
                    break;
                }
            }
        }
        ears
    }

    /// A border half-edge `a -> b` whose successor `b -> c` turns so that
    /// the triangle `(a, b, c)` lies outside the mesh and is empty.
    fn find_hull_ear(&self) -> Option<HalfEdgeId> {
        let mesh = self.mesh();
        let tol = self.tolerance();
        let border: Vec<HalfEdgeId> = mesh.border_halfedges().collect();
        border.iter().copied().find(|&b1| {
            let b2 = mesh.next(b1);
            if mesh.next(mesh.next(b2)) == b1 {
                return false;
            }
            let a = mesh.source(b1);
            let b = mesh.target(b1);
            let c = mesh.target(b2);
            if a == c {
                return false;
            }
            let (pa, pb, pc) = (*mesh.position(a), *mesh.position(b), *mesh.position(c));
            tol.is_strictly_ccw(&pa, &pb, &pc)
                && mesh.find_halfedge(a, c).is_none()
                && self.region_is_clear(&border, [pa, pb, pc], &[a, b, c], &[(pa, pc)])
        })
    }

    /// Whether no border vertex outside `skip` lies in the triangle and no
    /// border edge crosses one of the new segments.
    fn region_is_clear(
        &self,
        border: &[HalfEdgeId],
        corners: [Point2<f64>; 3],
        skip: &[VertexId],
        segments: &[(Point2<f64>, Point2<f64>)],
    ) -> bool {
        let mesh = self.mesh();
        let tol = self.tolerance();
        let triangle = Triangle::new(corners[0], corners[1], corners[2]);
        border.iter().all(|&he| {
            let u = mesh.source(he);
            let w = mesh.target(he);
            if !skip.contains(&w) && triangle.contains(mesh.position(w), tol) {
                return false;
            }
            if skip.contains(&u) || skip.contains(&w) {
                return true;
            }
            let (pu, pw) = (mesh.position(u), mesh.position(w));
            segments.iter().all(|(s, t)| !segments_cross(s, t, pu, pw))
        })
    }

    /// Merge connected hole faces into one polygonal hole face each, or into
    /// the border when they touch it. Returns the number of hole faces left.
    fn merge_enclosed_holes(&mut self) -> Result<usize> {
        let mesh = self.mesh();
        let mut seen: HashSet<FaceId> = HashSet::new();
        let mut components: Vec<Vec<FaceId>> = Vec::new();
        for f in mesh.face_ids().filter(|&f| mesh.is_hole(f)) {
            if !seen.insert(f) {
                continue;
            }
            let mut component = vec![f];
            let mut i = 0;
            while i < component.len() {
                for g in mesh.face_neighbors(component[i]) {
                    if mesh.is_hole(g) && seen.insert(g) {
                        component.push(g);
                    }
                }
                i += 1;
            }
            components.push(component);
        }

        let mut holes = 0;
        for component in components {
            let touches_border = component.iter().any(|&f| {
                self.mesh
                    .face_halfedges(f)
                    .any(|he| self.mesh.is_border_halfedge(self.mesh.twin(he)))
            });
            if touches_border {
                let border = self.mesh.border_face();
                self.mesh.merge_region(&component, border)?;
            } else if component.len() > 1 {
                self.mesh.merge_into_hole(&component)?;
                holes += 1;
            } else {
                holes += 1;
            }
        }
        Ok(holes)
    }
}

/// Whether two segments cross at a single point interior to both.
fn segments_cross(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>, d: &Point2<f64>) -> bool {
    let d1 = orient2d(a, b, c);
    let d2 = orient2d(a, b, d);
    let d3 = orient2d(c, d, a);
    let d4 = orient2d(c, d, b);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;
    use crate::locate::LocatorKind;

    #[test]
    fn test_segments_cross() {
        let p = |x, y| Point2::new(x, y);
        assert!(segments_cross(&p(0.0, 0.0), &p(2.0, 2.0), &p(0.0, 2.0), &p(2.0, 0.0)));
        assert!(!segments_cross(&p(0.0, 0.0), &p(1.0, 1.0), &p(1.0, 1.0), &p(2.0, 0.0)));
        assert!(!segments_cross(&p(0.0, 0.0), &p(1.0, 0.0), &p(0.0, 1.0), &p(1.0, 1.0)));
    }

    #[test]
    fn test_finish_twice_fails() {
        let bound = BoundingBox::from_origin_size(0.0, 0.0, 1.0, 1.0);
        let mut t: Triangulation = Triangulation::new(bound, LocatorKind::Walk);
        t.insert(Point2::new(0.0, 0.0)).unwrap();
        t.insert(Point2::new(1.0, 0.0)).unwrap();
        t.insert(Point2::new(0.0, 1.0)).unwrap();
        t.finish().unwrap();
        assert_eq!(t.mesh().num_faces(), 1);
        assert!(matches!(t.finish(), Err(MeshError::InvalidState(_))));
    }

    #[test]
    fn test_finish_produces_convex_hull() {
        // Points along a shallow arc: the super triangle cuts hull edges
        // between them unless the hull is repaired.
        let bound = BoundingBox::from_origin_size(-100.0, 0.0, 200.0, 10.0);
        let mut t: Triangulation = Triangulation::new(bound, LocatorKind::Walk);
        for i in 0..=40 {
            let x = -100.0 + 5.0 * i as f64;
            let y = 10.0 - 1e-3 * x * x;
            t.insert(Point2::new(x, y)).unwrap();
        }
        t.insert(Point2::new(0.0, 0.0)).unwrap();
        t.finish().unwrap();
        let mesh = t.mesh();
        assert!(mesh.is_valid(), "{:?}", mesh.check_invariants());
        assert_eq!(t.num_vertices(), 42);
        // Every border corner turns the same way.
        for b in mesh.border_halfedges() {
            let a = mesh.position(mesh.source(b));
            let c = mesh.position(mesh.target(b));
            let n = mesh.position(mesh.target(mesh.next(b)));
            assert!(orient2d(a, c, n) <= t.tolerance().distance * (c - a).norm());
        }
        assert!(t.is_delaunay());
    }

    #[test]
    fn test_finish_empty() {
        let bound = BoundingBox::from_origin_size(0.0, 0.0, 1.0, 1.0);
        let mut t: Triangulation = Triangulation::new(bound, LocatorKind::Walk);
        t.finish().unwrap();
        assert!(t.mesh().is_empty());
        assert_eq!(t.mesh().num_vertices(), 0);
    }
}
