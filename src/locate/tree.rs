//! Delaunay tree: a history DAG of triangles.
//!
//! Every triangle the triangulation creates becomes a node. When a flip or a
//! split destroys triangles, the new triangles are attached as children of
//! every destroyed one, so the children of a node cover the node's region.
//! Locating descends from the roots into whichever child contains the
//! point; the leaf reached is a triangle of the live mesh.
//!
//! Nodes are never removed. The tree only tracks the triangulation while it
//! is being built: once faces are merged or vertices move, leaves go stale
//! and are detected as such, and the locator falls back to walking from a
//! vertex of the stale leaf.

use nalgebra::Point2;

use super::walk::vertex_face;
use crate::geometry::{Tolerance, Triangle};
use crate::mesh::{FaceId, Mesh, VertexData, VertexId};

const NO_NODE: usize = usize::MAX;

#[derive(Debug, Clone)]
struct Node {
    triangle: [VertexId; 3],
    face: FaceId,
    children: Vec<usize>,
}

/// History DAG of the triangles of a triangulation.
#[derive(Debug, Clone, Default)]
pub struct DelaunayTree {
    nodes: Vec<Node>,
    roots: Vec<usize>,
    /// Current leaf for each face slot.
    face_node: Vec<usize>,
}

impl DelaunayTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triangles recorded so far.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        let mut depth = vec![0usize; self.nodes.len()];
        // Children are always created after their parents.
        for i in (0..self.nodes.len()).rev() {
            depth[i] = 1 + self.nodes[i]
                .children
                .iter()
                .map(|&c| depth[c])
                .max()
                .unwrap_or(0);
        }
        self.roots.iter().map(|&r| depth[r]).max().unwrap_or(0)
    }

    pub(crate) fn on_init<V: VertexData>(&mut self, mesh: &Mesh<V>) {
        self.nodes.clear();
        self.roots.clear();
        self.face_node.clear();
        let faces: Vec<FaceId> = mesh.inner_triangle_ids().collect();
        self.roots = faces.iter().map(|&f| self.push(mesh, f)).collect();
    }

    pub(crate) fn on_replace<V: VertexData>(&mut self, mesh: &Mesh<V>, parents: &[FaceId], children: &[FaceId]) {
        let parent_nodes: Vec<usize> = parents
            .iter()
            .filter_map(|f| self.face_node.get(f.index()).copied())
            .filter(|&n| n != NO_NODE)
            .collect();
        let child_nodes: Vec<usize> = children
            .iter()
            .filter(|&&f| mesh.is_inner_triangle(f))
            .map(|&f| self.push(mesh, f))
            .collect();
        if parent_nodes.is_empty() {
            self.roots.extend(child_nodes);
            return;
        }
        for p in parent_nodes {
            self.nodes[p].children.extend_from_slice(&child_nodes);
        }
    }

    fn push<V: VertexData>(&mut self, mesh: &Mesh<V>, f: FaceId) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node {
            triangle: mesh.triangle_vertices(f),
            face: f,
            children: Vec::new(),
        });
        if self.face_node.len() <= f.index() {
            self.face_node.resize(f.index() + 1, NO_NODE);
        }
        self.face_node[f.index()] = id;
        id
    }

    fn contains<V: VertexData>(&self, mesh: &Mesh<V>, node: usize, p: &Point2<f64>, tol: &Tolerance) -> bool {
        let [a, b, c] = self.nodes[node].triangle;
        if !(mesh.vertex_alive(a) && mesh.vertex_alive(b) && mesh.vertex_alive(c)) {
            return false;
        }
        Triangle::new(*mesh.position(a), *mesh.position(b), *mesh.position(c)).contains(p, tol)
    }

    fn is_current<V: VertexData>(&self, mesh: &Mesh<V>, node: usize) -> bool {
        let n = &self.nodes[node];
        mesh.face_alive(n.face)
            && self.face_node.get(n.face.index()) == Some(&node)
            && mesh.is_triangle(n.face)
            && {
                let mut live = mesh.triangle_vertices(n.face);
                let mut recorded = n.triangle;
                live.sort_unstable();
                recorded.sort_unstable();
                live == recorded
            }
    }

    /// A face to start walking from.
    pub(crate) fn hint<V: VertexData>(&self, mesh: &Mesh<V>, p: &Point2<f64>, tol: &Tolerance) -> Option<FaceId> {
        let mut node = self
            .roots
            .iter()
            .copied()
            .find(|&r| self.contains(mesh, r, p, tol))?;
        loop {
            let next = self.nodes[node]
                .children
                .iter()
                .copied()
                .find(|&c| self.contains(mesh, c, p, tol));
            match next {
                Some(child) => node = child,
                None => break,
            }
        }
        if self.is_current(mesh, node) {
            Some(self.nodes[node].face)
        } else {
            self.nodes[node]
                .triangle
                .iter()
                .find_map(|&v| vertex_face(mesh, v))
        }
    }
}
