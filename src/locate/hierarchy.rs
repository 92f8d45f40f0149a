//! Delaunay hierarchy.
//!
//! Level 0 is the triangulation itself. Each inserted vertex is copied to
//! level 1 with probability `1 / ratio`, from there to level 2 with the same
//! probability, and so on. Levels are small Delaunay triangulations of their
//! own, and every level vertex remembers the vertex it was copied from.
//!
//! Locating walks the top level, steps down through the vertex nearest to
//! the query point and uses it as the start of the walk one level below.
//!
//! # References
//!
//! - O. Devillers, "The Delaunay Hierarchy", International Journal of
//!   Foundations of Computer Science, 2002.

use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::walk::{vertex_face, walk};
use super::LocatorKind;
use crate::geometry::{BoundingBox, Tolerance};
use crate::mesh::{FaceId, Mesh, VertexData, VertexId};
use crate::triangulation::Triangulation;

/// Options for the Delaunay hierarchy.
#[derive(Debug, Clone)]
pub struct HierarchyOptions {
    /// Expected number of vertices per vertex of the level above.
    pub ratio: u32,

    /// Maximum number of levels above the triangulation itself.
    pub max_levels: usize,

    /// Seed for level sampling.
    pub seed: u64,
}

impl Default for HierarchyOptions {
    fn default() -> Self {
        Self {
            ratio: 30,
            max_levels: 5,
            seed: 0x5eed,
        }
    }
}

impl HierarchyOptions {
    /// Set the sampling ratio.
    pub fn with_ratio(mut self, ratio: u32) -> Self {
        self.ratio = ratio.max(2);
        self
    }

    /// Set the maximum number of levels.
    pub fn with_max_levels(mut self, levels: usize) -> Self {
        self.max_levels = levels;
        self
    }

    /// Set the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone)]
struct Level {
    triangulation: Triangulation<()>,
    /// Vertex one level down, indexed by this level's vertex handle.
    down: Vec<VertexId>,
}

/// A stack of coarser triangulations used to find a good walk start.
#[derive(Debug, Clone)]
pub struct DelaunayHierarchy {
    bound: BoundingBox,
    tolerance: Tolerance,
    options: HierarchyOptions,
    levels: Vec<Level>,
    rng: StdRng,
}

impl DelaunayHierarchy {
    /// Create an empty hierarchy over `bound`.
    pub fn new(bound: BoundingBox, tolerance: Tolerance, options: HierarchyOptions) -> Self {
        let rng = StdRng::seed_from_u64(options.seed);
        Self {
            bound,
            tolerance,
            options,
            levels: Vec::new(),
            rng,
        }
    }

    /// Number of levels above the triangulation.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Number of vertices of each level, bottom-up.
    pub fn level_sizes(&self) -> Vec<usize> {
        self.levels
            .iter()
            .map(|l| l.triangulation.num_vertices())
            .collect()
    }

    pub(crate) fn on_vertex_inserted<V: VertexData>(&mut self, mesh: &Mesh<V>, v: VertexId) {
        let p = *mesh.position(v);
        let mut lower = v;
        for k in 0..self.options.max_levels {
            if self.rng.gen_range(0..self.options.ratio.max(2)) != 0 {
                break;
            }
            if self.levels.len() == k {
                let triangulation =
                    Triangulation::with_tolerance(self.bound, LocatorKind::Walk, self.tolerance);
                self.levels.push(Level {
                    triangulation,
                    down: Vec::new(),
                });
            }
            let level = &mut self.levels[k];
            let w = match level.triangulation.insert(p) {
                Ok(w) => w,
                Err(err) => {
                    log::debug!("hierarchy level {} rejected ({}, {}): {}", k + 1, p.x, p.y, err);
                    break;
                }
            };
            if level.down.len() <= w.index() {
                level.down.resize(w.index() + 1, VertexId::invalid());
            }
            level.down[w.index()] = lower;
            lower = w;
        }
    }

    /// A face of the bottom triangulation near `p`.
    pub(crate) fn hint<V: VertexData>(&self, mesh: &Mesh<V>, p: &Point2<f64>) -> Option<FaceId> {
        let mut vertex: Option<VertexId> = None;
        for level in self.levels.iter().rev() {
            let level_mesh = level.triangulation.mesh();
            let start = vertex.and_then(|w| vertex_face(level_mesh, w));
            let face = walk(level_mesh, p, start, &self.tolerance).face()?;
            vertex = level_mesh
                .face_vertices(face)
                .filter(|w| level.down.get(w.index()).is_some_and(|d| d.is_valid()))
                .min_by(|&a, &b| {
                    let da = (level_mesh.position(a) - p).norm_squared();
                    let db = (level_mesh.position(b) - p).norm_squared();
                    da.total_cmp(&db)
                })
                .map(|w| level.down[w.index()]);
        }
        vertex.and_then(|v| vertex_face(mesh, v))
    }
}
