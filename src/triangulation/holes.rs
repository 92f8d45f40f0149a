//! Holes and boundary editing.

use std::collections::HashSet;

use super::Triangulation;
use crate::error::{MeshError, Result};
use crate::locate::vertex_face;
use crate::mesh::{FaceId, HalfEdgeId, Mesh, VertexData, VertexId};

impl<V: VertexData> Triangulation<V> {
    /// Turn the faces connected to `seed` that satisfy `predicate` into a hole.
    ///
    /// The region grows from `seed` across shared edges, never entering
    /// existing holes, the border or the super triangle. With `merge` the
    /// region becomes a single polygonal hole face; otherwise each face
    /// keeps its triangle and is flagged as a hole. Returns the hole faces,
    /// or nothing when `seed` itself fails the predicate.
    ///
    /// Hole faces are excluded from [`Triangulation::faces`] and
    /// [`Triangulation::stream_triangles`].
    pub fn create_hole<F>(&mut self, seed: FaceId, mut predicate: F, merge: bool) -> Result<Vec<FaceId>>
    where
        F: FnMut(&Mesh<V>, FaceId) -> bool,
    {
        self.mesh.check_face(seed)?;
        if self.mesh.is_boundary_face(seed) || self.is_super_face(seed) {
            return Err(MeshError::topology(format!(
                "{:?} is not a face of the meshed domain",
                seed
            )));
        }
        if !predicate(&self.mesh, seed) {
            return Ok(Vec::new());
        }

        let mut region = vec![seed];
        let mut seen = HashSet::from([seed]);
        let mut i = 0;
        while i < region.len() {
            let neighbors: Vec<FaceId> = self.mesh.face_neighbors(region[i]).collect();
            for g in neighbors {
                if self.mesh.is_hole(g) || self.is_super_face(g) || !seen.insert(g) {
                    continue;
                }
                if predicate(&self.mesh, g) {
                    region.push(g);
                }
            }
            i += 1;
        }

        if !merge {
            for &f in &region {
                self.mesh.set_hole(f, true);
            }
            log::debug!("flagged {} faces as hole", region.len());
            return Ok(region);
        }

        let (hole, removed) = self.mesh.merge_into_hole(&region)?;
        self.locator.on_init(&self.mesh);
        self.last_face = None;
        log::debug!(
            "merged {} faces into hole {:?}, {} vertices removed",
            region.len(),
            hole,
            removed.len()
        );
        Ok(vec![hole])
    }

    /// Remove faces from the meshed domain.
    ///
    /// Each connected part of `region` that touches the border is merged
    /// into the border. Other parts are merged into an adjacent hole, or
    /// become a new hole. Returns the vertices left without edges.
    pub fn remove_faces(&mut self, region: &[FaceId]) -> Result<Vec<VertexId>> {
        for &f in region {
            self.mesh.check_face(f)?;
            if self.mesh.is_border(f) || self.is_super_face(f) {
                return Err(MeshError::topology(format!("{:?} cannot be removed", f)));
            }
        }
        let members: HashSet<FaceId> = region.iter().copied().collect();
        let mut seen: HashSet<FaceId> = HashSet::with_capacity(members.len());
        let mut components: Vec<Vec<FaceId>> = Vec::new();
        for &f in region {
            if !seen.insert(f) {
                continue;
            }
            let mut component = vec![f];
            let mut i = 0;
            while i < component.len() {
                for g in self.mesh.face_neighbors(component[i]) {
                    if members.contains(&g) && seen.insert(g) {
                        component.push(g);
                    }
                }
                i += 1;
            }
            components.push(component);
        }

        let mut removed = Vec::new();
        for component in components {
            let target = self.removal_target(&component);
            match target {
                Some(t) => removed.extend(self.mesh.merge_region(&component, t)?),
                None => removed.extend(self.mesh.merge_into_hole(&component)?.1),
            }
        }
        self.locator.on_init(&self.mesh);
        self.last_face = None;
        Ok(removed)
    }

    /// The border if `component` touches it, otherwise an adjacent hole.
    fn removal_target(&self, component: &[FaceId]) -> Option<FaceId> {
        let mesh = self.mesh();
        let inside: HashSet<FaceId> = component.iter().copied().collect();
        let outside: Vec<FaceId> = component
            .iter()
            .flat_map(|&f| mesh.face_halfedges(f))
            .map(|he| mesh.face_of(mesh.twin(he)))
            .filter(|g| !inside.contains(g))
            .collect();
        outside
            .iter()
            .copied()
            .find(|&g| mesh.is_border(g))
            .or_else(|| outside.iter().copied().find(|&g| mesh.is_hole(g)))
    }

    /// Remove a boundary vertex by collapsing it onto a boundary neighbour.
    ///
    /// Neighbours along the boundary are tried nearest first; the first
    /// collapse that keeps the mesh valid wins. Returns the vertex `v` was
    /// merged into.
    pub fn collapse_vertex_at_boundary(&mut self, v: VertexId) -> Result<VertexId> {
        self.mesh.check_vertex(v)?;
        if self.mesh.is_fixed(v) {
            return Err(MeshError::topology(format!("{:?} is fixed", v)));
        }
        if !self.mesh.is_boundary_vertex(v) {
            return Err(MeshError::topology(format!("{:?} is not on the boundary", v)));
        }

        let mesh = self.mesh();
        let p = *mesh.position(v);
        let mut candidates: Vec<(f64, VertexId)> = mesh
            .incident_halfedges(v)
            .filter(|&he| mesh.is_boundary_edge(he))
            .map(|he| mesh.source(he))
            .map(|w| ((mesh.position(w) - p).norm_squared(), w))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
        candidates.dedup_by_key(|c| c.1);
        let parents: Vec<FaceId> = mesh.adjacent_faces(v).filter(|&f| !mesh.is_border(f)).collect();

        let mut last_err = None;
        for (_, into) in candidates {
            match self.mesh.collapse_boundary_edge(v, into) {
                Ok(()) => {
                    let children: Vec<FaceId> = self
                        .mesh
                        .adjacent_faces(into)
                        .filter(|&f| !self.mesh.is_border(f))
                        .collect();
                    self.notify_replace(&parents, &children);
                    let mut stack: Vec<HalfEdgeId> = self.mesh.incident_halfedges(into).collect();
                    stack.extend(self.link_edges(into));
                    self.legalize(stack);
                    self.last_face = vertex_face(&self.mesh, into);
                    return Ok(into);
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| MeshError::topology(format!("{:?} has no boundary neighbour", v))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;
    use crate::locate::LocatorKind;
    use nalgebra::Point2;

    fn grid(n: usize) -> Triangulation {
        grid_with(n, LocatorKind::Walk)
    }

    fn grid_with(n: usize, kind: LocatorKind) -> Triangulation {
        let bound = BoundingBox::from_origin_size(0.0, 0.0, n as f64, n as f64);
        let mut t = Triangulation::new(bound, kind);
        for j in 0..=n {
            for i in 0..=n {
                t.insert(Point2::new(i as f64, j as f64)).unwrap();
            }
        }
        t.finish().unwrap();
        t
    }

    fn in_center(mesh: &Mesh<()>, f: FaceId, lo: f64, hi: f64) -> bool {
        let c = mesh.face_centroid(f);
        c.x > lo && c.x < hi && c.y > lo && c.y < hi
    }

    #[test]
    fn test_create_hole_excludes_faces() {
        let mut t = grid(4);
        let seed = t.locate(&Point2::new(2.1, 1.9)).unwrap();
        let holes = t
            .create_hole(seed, |mesh, f| in_center(mesh, f, 1.0, 3.0), false)
            .unwrap();
        assert_eq!(holes.len(), 8);
        assert!(t.mesh().is_valid());
        assert_eq!(t.faces().count(), 32 - 8);
        for tri in t.stream_triangles() {
            let c = tri.centroid();
            assert!(!(c.x > 1.0 && c.x < 3.0 && c.y > 1.0 && c.y < 3.0));
        }
    }

    #[test]
    fn test_flagged_hole_is_not_located() {
        for kind in [LocatorKind::Walk, LocatorKind::Hierarchy, LocatorKind::DelaunayTree] {
            let mut t = grid_with(4, kind);
            let seed = t.locate(&Point2::new(2.1, 1.9)).unwrap();
            t.create_hole(seed, |mesh, f| in_center(mesh, f, 1.0, 3.0), false)
                .unwrap();

            assert_eq!(t.locate(&Point2::new(2.1, 1.9)), None, "{:?}", kind);
            assert_eq!(t.locate(&Point2::new(1.6, 2.5)), None, "{:?}", kind);
            assert!(matches!(
                t.insert(Point2::new(2.1, 1.9)),
                Err(MeshError::PointOutsideDomain { .. })
            ));
            let holes = t.mesh().face_ids().filter(|&f| t.mesh().is_hole(f)).count();
            assert_eq!(holes, 8);

            // The hole's rim still belongs to the surrounding triangles.
            let f = t.locate(&Point2::new(1.0, 1.0)).unwrap();
            assert!(!t.mesh().is_hole(f));
            let f = t.locate(&Point2::new(0.5, 0.4)).unwrap();
            assert!(!t.mesh().is_hole(f));
            assert!(t.mesh().is_valid());
        }
    }

    #[test]
    fn test_create_merged_hole() {
        let mut t = grid(4);
        let seed = t.locate(&Point2::new(2.1, 1.9)).unwrap();
        let holes = t
            .create_hole(seed, |mesh, f| in_center(mesh, f, 1.0, 3.0), true)
            .unwrap();
        assert_eq!(holes.len(), 1);
        let mesh = t.mesh();
        assert!(mesh.is_valid(), "{:?}", mesh.check_invariants());
        assert!(mesh.is_hole(holes[0]));
        assert_eq!(mesh.face_halfedges(holes[0]).count(), 8);
        // The center vertex lost all its edges.
        assert_eq!(mesh.num_vertices(), 24);
        assert_eq!(t.faces().count(), 24);
        assert_eq!(t.locate(&Point2::new(2.0, 2.0)), None);
    }

    #[test]
    fn test_create_hole_rejected_seed() {
        let mut t = grid(2);
        let seed = t.mesh().inner_triangle_ids().next().unwrap();
        assert!(t.create_hole(seed, |_, _| false, true).unwrap().is_empty());
        let border = t.mesh().border_face();
        assert!(t.create_hole(border, |_, _| true, true).is_err());
    }

    #[test]
    fn test_remove_faces_at_border() {
        let mut t = grid(3);
        let corner = t.locate(&Point2::new(0.2, 0.1)).unwrap();
        t.remove_faces(&[corner]).unwrap();
        assert!(t.mesh().is_valid(), "{:?}", t.mesh().check_invariants());
        assert_eq!(t.faces().count(), 17);
        assert_eq!(t.locate(&Point2::new(0.2, 0.1)), None);
    }

    #[test]
    fn test_remove_interior_faces_makes_hole() {
        let mut t = grid(4);
        let region: Vec<FaceId> = t
            .mesh()
            .face_ids()
            .filter(|&f| in_center(t.mesh(), f, 1.0, 2.0))
            .collect();
        assert_eq!(region.len(), 2);
        t.remove_faces(&region).unwrap();
        let mesh = t.mesh();
        assert!(mesh.is_valid(), "{:?}", mesh.check_invariants());
        assert_eq!(mesh.face_ids().filter(|&f| mesh.is_hole(f)).count(), 1);
        assert_eq!(t.faces().count(), 30);
    }

    #[test]
    fn test_collapse_vertex_at_boundary() {
        let mut t = grid(3);
        let v = t
            .vertices()
            .find(|&v| *t.mesh().position(v) == Point2::new(1.0, 0.0))
            .unwrap();
        let into = t.collapse_vertex_at_boundary(v).unwrap();
        let mesh = t.mesh();
        assert!(mesh.is_valid(), "{:?}", mesh.check_invariants());
        assert!(!mesh.vertex_alive(v));
        assert!(mesh.is_border_vertex(into));
        assert_eq!(t.num_vertices(), 15);
        assert_eq!(t.faces().count(), 17);
        assert!(t.is_delaunay());
    }

    #[test]
    fn test_collapse_rejects_fixed_and_interior() {
        let mut t = grid(2);
        let center = t
            .vertices()
            .find(|&v| *t.mesh().position(v) == Point2::new(1.0, 1.0))
            .unwrap();
        assert!(t.collapse_vertex_at_boundary(center).is_err());
        let corner = t
            .vertices()
            .find(|&v| *t.mesh().position(v) == Point2::new(0.0, 0.0))
            .unwrap();
        t.mesh_mut().set_fixed(corner, true);
        assert!(t.collapse_vertex_at_boundary(corner).is_err());
    }
}
