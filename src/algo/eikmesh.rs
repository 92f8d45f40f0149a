//! EikMesh: mesh generation by force relaxation.
//!
//! The domain is the negative region of a signed distance function and the
//! desired local edge length is given by an edge-length field. Points are
//! scattered inside the domain with a density matching the field and
//! triangulated. Every step then treats the edges as compressed springs:
//!
//! 1. The desired length of each edge is the field at its midpoint, scaled
//!    so that the desired lengths are slightly longer than the actual ones
//!    on average. Each edge pushes its endpoints apart by the difference.
//! 2. Free vertices move along their summed force, capped to a fraction of
//!    the local edge length.
//! 3. Boundary vertices, and vertices that left the domain, are projected
//!    onto the boundary by Newton steps along the distance gradient. A
//!    vertex whose projection does not converge stays where it was.
//! 4. Moves that invert a triangle are undone, the triangulation is made
//!    Delaunay again by flips, and triangles outside the domain, boundary
//!    slivers and very short boundary edges are removed.
//!
//! Relaxation stops when the largest interior displacement falls below a
//! tolerance relative to the local edge length, or after an iteration cap.
//!
//! # Example
//!
//! ```
//! use eikmesh::algo::{EikMesh, EikMeshOptions};
//! use eikmesh::field::{Circle, Uniform};
//! use eikmesh::geometry::BoundingBox;
//! use nalgebra::Point2;
//!
//! let disc = Circle::new(Point2::origin(), 1.0);
//! let bound = BoundingBox::from_origin_size(-1.0, -1.0, 2.0, 2.0);
//! let options = EikMeshOptions::default().with_max_iterations(30);
//! let mut eikmesh = EikMesh::new(disc, Uniform(0.25), bound, options);
//!
//! let report = eikmesh.improve().unwrap();
//! assert!(report.quality.mean > 0.8);
//! assert!(eikmesh.mesh().is_valid());
//! ```
//!
//! # References
//!
//! - P.-O. Persson and G. Strang, "A Simple Mesh Generator in MATLAB",
//!   SIAM Review, 2004.
//! - B. Zönnchen and G. Köster, "A Parallel Generator for Sparse Unstructured
//!   Meshes to Solve the Eikonal Equation", Journal of Computational Science,
//!   2019.

use std::collections::HashMap;

use nalgebra::{Point2, Vector2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::quality::{face_quality, mesh_quality, QualityStats};
use super::Progress;
use crate::error::{MeshError, Result};
use crate::field::{DistanceFunction, EdgeLengthFunction};
use crate::geometry::{orient2d, BoundingBox};
use crate::locate::LocatorKind;
use crate::mesh::{FaceId, HalfEdgeId, Mesh, VertexId};
use crate::triangulation::{Triangulation, TriangulationState};

/// Quality below which [`EikMesh::quality`] counts a triangle as a sliver.
pub const SLIVER_QUALITY: f64 = 0.01;

/// Samples per axis when estimating the smallest edge length of the field.
const EDGE_LENGTH_SAMPLES: usize = 64;

/// Upper limit on scattered candidate points.
const MAX_CANDIDATES: f64 = 5e7;

/// Inserted points between two progress reports during initialization.
const PROGRESS_INTERVAL: usize = 256;

/// How the initial points are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scatter {
    /// Rows of a hexagonal lattice, thinned by the edge-length field.
    #[default]
    Grid,
    /// Uniformly random points, thinned by the edge-length field.
    Random,
}

/// Options for [`EikMesh`].
#[derive(Debug, Clone)]
pub struct EikMeshOptions {
    /// Maximum number of relaxation steps.
    pub max_iterations: usize,

    /// Factor from force to displacement.
    pub time_step: f64,

    /// Ratio of desired to actual edge length on average.
    /// Values above 1 keep the mesh under pressure so it fills the domain.
    pub force_scale: f64,

    /// Only let edges push, never pull.
    pub repulsive_only: bool,

    /// Convergence threshold on the largest interior displacement, relative
    /// to the local edge length.
    pub convergence_tolerance: f64,

    /// Largest displacement per step, relative to the local edge length.
    pub max_step: f64,

    /// Newton steps allowed to project a vertex onto the boundary.
    pub projection_steps: usize,

    /// Accepted boundary distance, relative to the smallest edge length.
    pub boundary_tolerance: f64,

    /// Boundary triangles below this quality are removed.
    pub min_boundary_quality: f64,

    /// Boundary edges shorter than this fraction of the local edge length
    /// are collapsed.
    pub boundary_collapse: f64,

    /// Edge length used to scatter the initial points. Sampled from the
    /// field when `None`.
    pub initial_edge_length: Option<f64>,

    /// Initial point placement.
    pub scatter: Scatter,

    /// Seed for point thinning and random scatter.
    pub seed: u64,

    /// Point locator of the underlying triangulation.
    pub locator: LocatorKind,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for EikMeshOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            time_step: 0.2,
            force_scale: 1.2,
            repulsive_only: true,
            convergence_tolerance: 1e-3,
            max_step: 0.25,
            projection_steps: 6,
            boundary_tolerance: 1e-3,
            min_boundary_quality: 0.2,
            boundary_collapse: 0.3,
            initial_edge_length: None,
            scatter: Scatter::Grid,
            seed: 0x5eed,
            locator: LocatorKind::Walk,
            parallel: true,
        }
    }
}

impl EikMeshOptions {
    /// Set the iteration cap.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Set the time step.
    pub fn with_time_step(mut self, time_step: f64) -> Self {
        self.time_step = time_step;
        self
    }

    /// Set the force scale.
    pub fn with_force_scale(mut self, force_scale: f64) -> Self {
        self.force_scale = force_scale;
        self
    }

    /// Let edges longer than desired pull their endpoints together.
    pub fn allow_attraction(mut self) -> Self {
        self.repulsive_only = false;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_convergence_tolerance(mut self, tolerance: f64) -> Self {
        self.convergence_tolerance = tolerance;
        self
    }

    /// Set the relative displacement cap.
    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }

    /// Set the number of Newton projection steps.
    pub fn with_projection_steps(mut self, steps: usize) -> Self {
        self.projection_steps = steps;
        self
    }

    /// Set the relative boundary tolerance.
    pub fn with_boundary_tolerance(mut self, tolerance: f64) -> Self {
        self.boundary_tolerance = tolerance;
        self
    }

    /// Set the quality below which boundary triangles are removed.
    pub fn with_min_boundary_quality(mut self, quality: f64) -> Self {
        self.min_boundary_quality = quality.clamp(0.0, 1.0);
        self
    }

    /// Set the relative length below which boundary edges are collapsed.
    pub fn with_boundary_collapse(mut self, fraction: f64) -> Self {
        self.boundary_collapse = fraction;
        self
    }

    /// Scatter the initial points with this edge length.
    pub fn with_initial_edge_length(mut self, h: f64) -> Self {
        self.initial_edge_length = Some(h);
        self
    }

    /// Set the initial point placement.
    pub fn with_scatter(mut self, scatter: Scatter) -> Self {
        self.scatter = scatter;
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the point locator.
    pub fn with_locator(mut self, locator: LocatorKind) -> Self {
        self.locator = locator;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    fn validate(&self) -> Result<()> {
        let positive = [
            ("time_step", self.time_step),
            ("force_scale", self.force_scale),
            ("convergence_tolerance", self.convergence_tolerance),
            ("max_step", self.max_step),
            ("boundary_tolerance", self.boundary_tolerance),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(MeshError::invalid_param(name, value, "must be positive and finite"));
            }
        }
        if self.projection_steps == 0 {
            return Err(MeshError::invalid_param("projection_steps", 0, "must be at least 1"));
        }
        if let Some(h) = self.initial_edge_length {
            if !(h > 0.0 && h.is_finite()) {
                return Err(MeshError::invalid_param("initial_edge_length", h, "must be positive and finite"));
            }
        }
        Ok(())
    }
}

/// What one relaxation step did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepReport {
    /// One-based number of this step.
    pub iteration: usize,
    /// Vertices moved.
    pub moved: usize,
    /// Moves undone because they inverted a triangle.
    pub reverted: usize,
    /// Vertices kept in place because boundary projection diverged.
    pub projection_failures: usize,
    /// Edge flips restoring the Delaunay property.
    pub flips: usize,
    /// Triangles removed from the domain.
    pub removed_faces: usize,
    /// Boundary vertices removed by edge collapse.
    pub collapsed_vertices: usize,
    /// Largest interior displacement relative to the local edge length.
    pub max_relative_displacement: f64,
    /// Whether this step met the convergence criterion.
    pub converged: bool,
}

/// Summary of a relaxation run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImproveReport {
    /// Steps performed in total.
    pub iterations: usize,
    /// Whether the displacement criterion was met before the cap.
    pub converged: bool,
    /// Largest relative interior displacement of the last step.
    pub max_relative_displacement: f64,
    /// Projection failures over the run.
    pub projection_failures: usize,
    /// Flips over the run.
    pub flips: usize,
    /// Removed triangles over the run.
    pub removed_faces: usize,
    /// Collapsed boundary vertices over the run.
    pub collapsed_vertices: usize,
    /// Quality of the final mesh.
    pub quality: QualityStats,
}

impl ImproveReport {
    fn add(&mut self, step: &StepReport) {
        self.max_relative_displacement = step.max_relative_displacement;
        self.projection_failures += step.projection_failures;
        self.flips += step.flips;
        self.removed_faces += step.removed_faces;
        self.collapsed_vertices += step.collapsed_vertices;
    }
}

/// A planned vertex move.
struct Move {
    vertex: VertexId,
    force: Vector2<f64>,
    /// `None` when boundary projection failed.
    target: Option<Point2<f64>>,
    interior: bool,
}

/// Mesh generator and improver.
pub struct EikMesh {
    distance: Box<dyn DistanceFunction>,
    edge_length: Box<dyn EdgeLengthFunction>,
    bound: BoundingBox,
    options: EikMeshOptions,
    fixed_points: Vec<Point2<f64>>,
    initial_points: Option<Vec<Point2<f64>>>,
    triangulation: Triangulation,
    initialized: bool,
    /// Smallest edge length of the field.
    h0: f64,
    iteration: usize,
    converged: bool,
}

impl std::fmt::Debug for EikMesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EikMesh")
            .field("bound", &self.bound)
            .field("options", &self.options)
            .field("iteration", &self.iteration)
            .field("converged", &self.converged)
            .finish_non_exhaustive()
    }
}

impl EikMesh {
    /// Create an improver for the domain `distance < 0` inside `bound`.
    pub fn new<D, H>(distance: D, edge_length: H, bound: BoundingBox, options: EikMeshOptions) -> Self
    where
        D: DistanceFunction + 'static,
        H: EdgeLengthFunction + 'static,
    {
        let triangulation = Triangulation::new(bound, options.locator);
        Self {
            distance: Box::new(distance),
            edge_length: Box::new(edge_length),
            bound,
            options,
            fixed_points: Vec::new(),
            initial_points: None,
            triangulation,
            initialized: false,
            h0: 0.0,
            iteration: 0,
            converged: false,
        }
    }

    /// Improve an existing finished triangulation instead of scattering points.
    pub fn from_triangulation<D, H>(
        triangulation: Triangulation,
        distance: D,
        edge_length: H,
        options: EikMeshOptions,
    ) -> Result<Self>
    where
        D: DistanceFunction + 'static,
        H: EdgeLengthFunction + 'static,
    {
        if triangulation.state() != TriangulationState::Finished {
            return Err(MeshError::InvalidState(
                "only finished triangulations can be improved".into(),
            ));
        }
        options.validate()?;
        let bound = *triangulation.bound();
        let mut eikmesh = Self::new(distance, edge_length, bound, options);
        eikmesh.h0 = match eikmesh.options.initial_edge_length {
            Some(h) => h,
            None => eikmesh.smallest_edge_length()?,
        };
        eikmesh.triangulation = triangulation;
        eikmesh.initialized = true;
        Ok(eikmesh)
    }

    /// Points that are inserted as fixed vertices and never move.
    pub fn with_fixed_points(mut self, points: Vec<Point2<f64>>) -> Self {
        self.fixed_points = points;
        self
    }

    /// Start from these points instead of scattering.
    pub fn with_initial_points(mut self, points: Vec<Point2<f64>>) -> Self {
        self.initial_points = Some(points);
        self
    }

    /// Scatter points and build the initial triangulation.
    ///
    /// Called by the first [`step`](Self::step) if not called before.
    pub fn initialize(&mut self) -> Result<()> {
        self.initialize_reporting(&Progress::none())
    }

    /// Point insertion is reported as the first of `max_iterations` steps.
    fn initialize_reporting(&mut self, progress: &Progress) -> Result<()> {
        if self.initialized {
            return Err(MeshError::InvalidState("EikMesh is already initialized".into()));
        }
        self.options.validate()?;
        if !(self.bound.width() > 0.0 && self.bound.height() > 0.0) {
            return Err(MeshError::invalid_param(
                "bound",
                format!("{}x{}", self.bound.width(), self.bound.height()),
                "must have a positive area",
            ));
        }
        let h0 = match self.options.initial_edge_length {
            Some(h) => h,
            None => self.smallest_edge_length()?,
        };
        self.h0 = h0;
        let points = match self.initial_points.take() {
            Some(points) => points,
            None => self.scatter(h0)?,
        };

        let mut triangulation = Triangulation::new(self.bound.expanded(h0), self.options.locator);
        for p in &self.fixed_points {
            triangulation.insert_with(*p, (), true)?;
        }
        let mut skipped = 0;
        for (i, p) in points.iter().enumerate() {
            match triangulation.insert(*p) {
                Ok(_) => {}
                Err(MeshError::PointOutsideDomain { .. }) => skipped += 1,
                Err(err) => return Err(err),
            }
            if i % PROGRESS_INTERVAL == 0 || i + 1 == points.len() {
                progress.report_sub(i + 1, points.len(), 0, self.options.max_iterations, "inserting");
            }
        }
        if skipped > 0 {
            log::warn!("{} initial points outside the bound were skipped", skipped);
        }
        triangulation.finish()?;
        if triangulation.mesh().num_faces() == 0 {
            return Err(MeshError::EmptyMesh);
        }
        self.triangulation = triangulation;

        let geps = self.options.boundary_tolerance * h0;
        let outside = self.outside_faces(geps);
        if !outside.is_empty() {
            self.triangulation.remove_faces(&outside)?;
        }
        self.triangulation.mesh_mut().end_epoch();
        self.triangulation.rebuild_locator();
        self.initialized = true;
        self.iteration = 0;
        self.converged = false;
        log::info!(
            "initialized EikMesh with {} vertices and {} triangles (h0 = {})",
            self.triangulation.num_vertices(),
            self.triangulation.faces().count(),
            h0
        );
        Ok(())
    }

    /// Smallest value of the edge-length field over a sample of the domain.
    fn smallest_edge_length(&self) -> Result<f64> {
        let n = EDGE_LENGTH_SAMPLES;
        let mut h0 = f64::INFINITY;
        for j in 0..=n {
            for i in 0..=n {
                let p = Point2::new(
                    self.bound.min.x + self.bound.width() * i as f64 / n as f64,
                    self.bound.min.y + self.bound.height() * j as f64 / n as f64,
                );
                if self.distance.distance(&p) <= 0.0 {
                    h0 = h0.min(self.edge_length.edge_length(&p));
                }
            }
        }
        if h0 == f64::INFINITY {
            return Err(MeshError::invalid_param(
                "distance",
                "no sample inside the domain",
                "the domain must intersect the bound",
            ));
        }
        if !(h0 > 0.0 && h0.is_finite()) {
            return Err(MeshError::invalid_param("edge_length", h0, "must be positive and finite"));
        }
        Ok(h0)
    }

    /// Candidate points inside the domain with a density following the field.
    fn scatter(&self, h0: f64) -> Result<Vec<Point2<f64>>> {
        let bound = &self.bound;
        let row = h0 * 3f64.sqrt() / 2.0;
        if bound.width() * bound.height() / (h0 * row) > MAX_CANDIDATES {
            return Err(MeshError::invalid_param("edge_length", h0, "too small for the bound"));
        }
        let mut rng = StdRng::seed_from_u64(self.options.seed);
        let candidates: Vec<Point2<f64>> = match self.options.scatter {
            Scatter::Grid => {
                let rows = (bound.height() / row).floor() as usize + 1;
                let cols = (bound.width() / h0).floor() as usize + 1;
                let mut points = Vec::with_capacity(rows * cols);
                for j in 0..rows {
                    let shift = if j % 2 == 1 { 0.5 * h0 } else { 0.0 };
                    for i in 0..cols {
                        let x = bound.min.x + shift + i as f64 * h0;
                        if x <= bound.max.x {
                            points.push(Point2::new(x, bound.min.y + j as f64 * row));
                        }
                    }
                }
                points
            }
            Scatter::Random => {
                let n = (bound.width() * bound.height() / (h0 * row)).ceil() as usize;
                (0..n)
                    .map(|_| {
                        Point2::new(
                            rng.gen_range(bound.min.x..bound.max.x),
                            rng.gen_range(bound.min.y..bound.max.y),
                        )
                    })
                    .collect()
            }
        };

        let points = candidates
            .into_iter()
            .filter(|p| self.distance.distance(p) <= 0.0)
            .filter(|p| self.fixed_points.iter().all(|q| (p - q).norm() >= 0.5 * h0))
            .filter(|p| {
                let ratio = h0 / self.edge_length.edge_length(p);
                rng.gen::<f64>() < ratio * ratio
            })
            .collect();
        Ok(points)
    }

    // ==================== Relaxation ====================

    /// Perform one relaxation step.
    pub fn step(&mut self) -> Result<StepReport> {
        if !self.initialized {
            self.initialize()?;
        }
        let geps = self.options.boundary_tolerance * self.h0;
        let scale = self.length_scale();
        let moves = self.plan_moves(scale, geps);

        let mut moved: Vec<(VertexId, Point2<f64>)> = Vec::with_capacity(moves.len());
        let mut projection_failures = 0;
        let mesh = self.triangulation.mesh_mut();
        for m in &moves {
            let vertex = mesh.vertex_mut(m.vertex);
            vertex.force = m.force;
            match m.target {
                Some(q) => {
                    moved.push((m.vertex, vertex.position));
                    vertex.displacement = q - vertex.position;
                    vertex.position = q;
                }
                None => {
                    vertex.displacement = Vector2::zeros();
                    projection_failures += 1;
                }
            }
        }
        if projection_failures > 0 {
            log::debug!("boundary projection diverged for {} vertices", projection_failures);
        }

        let reverted = self.revert_inversions(&moved);
        let flips = self.triangulation.legalize_all();

        let mut removed_faces = 0;
        let outside = self.outside_faces(geps);
        if !outside.is_empty() {
            removed_faces += outside.len();
            self.triangulation.remove_faces(&outside)?;
        }
        removed_faces += self.remove_boundary_slivers();
        let collapsed_vertices = self.collapse_short_boundary_edges(scale);

        self.triangulation.mesh_mut().end_epoch();
        self.triangulation.rebuild_locator();

        let max_relative_displacement = self.max_relative_displacement(&moves, scale);
        self.iteration += 1;
        self.converged = max_relative_displacement < self.options.convergence_tolerance
            && removed_faces == 0
            && collapsed_vertices == 0;

        Ok(StepReport {
            iteration: self.iteration,
            moved: moved.len() - reverted,
            reverted,
            projection_failures,
            flips,
            removed_faces,
            collapsed_vertices,
            max_relative_displacement,
            converged: self.converged,
        })
    }

    /// Whether relaxation converged or hit the iteration cap.
    pub fn is_finished(&self) -> bool {
        self.converged || self.iteration >= self.options.max_iterations
    }

    /// Relax until finished.
    pub fn improve(&mut self) -> Result<ImproveReport> {
        self.improve_with_progress(&Progress::none())
    }

    /// Relax until finished, reporting after every step.
    pub fn improve_with_progress(&mut self, progress: &Progress) -> Result<ImproveReport> {
        if !self.initialized {
            self.initialize_reporting(progress)?;
        }
        let mut report = ImproveReport::default();
        while !self.is_finished() {
            let step = self.step()?;
            report.add(&step);
            progress.report(self.iteration, self.options.max_iterations, "relaxing");
        }
        report.iterations = self.iteration;
        report.converged = self.converged;
        report.quality = self.quality();
        if self.converged {
            log::info!("EikMesh converged after {} steps: {}", self.iteration, report.quality);
        } else {
            log::warn!(
                "EikMesh stopped after {} steps without converging (displacement {:.3e}): {}",
                self.iteration,
                report.max_relative_displacement,
                report.quality
            );
        }
        Ok(report)
    }

    /// Scale turning field values into desired edge lengths.
    fn length_scale(&self) -> f64 {
        let mesh = self.triangulation.mesh();
        let (mut actual, mut desired) = (0.0, 0.0);
        for e in mesh.edges().filter(|&e| has_inner_side(mesh, e)) {
            let h = self.edge_length.edge_length(&mesh.edge_midpoint(e));
            actual += mesh.edge_vector(e).norm_squared();
            desired += h * h;
        }
        if actual > 0.0 && desired > 0.0 {
            self.options.force_scale * (actual / desired).sqrt()
        } else {
            self.options.force_scale
        }
    }

    /// Expected edge length near `p`.
    fn local_length(&self, p: &Point2<f64>, scale: f64) -> f64 {
        scale * self.edge_length.edge_length(p) / self.options.force_scale
    }

    fn plan_moves(&self, scale: f64, geps: f64) -> Vec<Move> {
        let mesh = self.triangulation.mesh();
        let free: Vec<VertexId> = mesh.vertex_ids().filter(|&v| !mesh.is_fixed(v)).collect();
        if self.options.parallel {
            free.par_iter().map(|&v| self.plan_move(mesh, v, scale, geps)).collect()
        } else {
            free.iter().map(|&v| self.plan_move(mesh, v, scale, geps)).collect()
        }
    }

    fn plan_move(&self, mesh: &Mesh, v: VertexId, scale: f64, geps: f64) -> Move {
        let p = *mesh.position(v);
        let mut force = Vector2::zeros();
        for he in mesh.incident_halfedges(v) {
            if !has_inner_side(mesh, he) {
                continue;
            }
            let u = mesh.position(mesh.source(he));
            let d = p - u;
            let len = d.norm();
            if len <= 0.0 {
                continue;
            }
            let desired = scale * self.edge_length.edge_length(&nalgebra::center(&p, u));
            let mut magnitude = desired - len;
            if self.options.repulsive_only {
                magnitude = magnitude.max(0.0);
            }
            force += d * (magnitude / len);
        }

        let mut step = force * self.options.time_step;
        let cap = self.options.max_step * self.local_length(&p, scale);
        let norm = step.norm();
        if norm > cap {
            step *= cap / norm;
        }
        let q = p + step;
        let boundary = mesh.is_boundary_vertex(v);
        let target = if boundary || self.distance.distance(&q) > 0.0 {
            self.project(q, geps)
        } else {
            Some(q)
        };
        Move {
            vertex: v,
            force,
            target,
            interior: !boundary,
        }
    }

    /// Newton iteration onto the zero level set.
    fn project(&self, mut q: Point2<f64>, tolerance: f64) -> Option<Point2<f64>> {
        for _ in 0..self.options.projection_steps {
            let d = self.distance.distance(&q);
            if d.abs() <= tolerance {
                return Some(q);
            }
            let g = self.distance.gradient(&q);
            let g2 = g.norm_squared();
            if !(g2 > 0.0 && g2.is_finite()) {
                return None;
            }
            q -= g * (d / g2);
        }
        (self.distance.distance(&q).abs() <= tolerance).then_some(q)
    }

    /// Undo moves until no triangle is inverted. Returns the number of
    /// vertices put back.
    fn revert_inversions(&mut self, moved: &[(VertexId, Point2<f64>)]) -> usize {
        let mut origin: HashMap<VertexId, Point2<f64>> = moved.iter().copied().collect();
        let mut suspects: Vec<VertexId> = moved.iter().map(|m| m.0).collect();
        let mut reverted = 0;
        loop {
            let mesh = self.triangulation.mesh();
            let mut bad: Vec<VertexId> = Vec::new();
            for &v in &suspects {
                for f in mesh.adjacent_faces(v) {
                    if mesh.is_border(f) || !mesh.is_triangle(f) {
                        continue;
                    }
                    let [a, b, c] = mesh.triangle_vertices(f);
                    if orient2d(mesh.position(a), mesh.position(b), mesh.position(c)) <= 0.0 {
                        bad.extend([a, b, c].into_iter().filter(|w| origin.contains_key(w)));
                    }
                }
            }
            bad.sort_unstable();
            bad.dedup();
            if bad.is_empty() {
                break;
            }
            let mesh = self.triangulation.mesh_mut();
            suspects.clear();
            for w in bad {
                if let Some(p) = origin.remove(&w) {
                    let vertex = mesh.vertex_mut(w);
                    vertex.position = p;
                    vertex.displacement = Vector2::zeros();
                    suspects.push(w);
                    reverted += 1;
                }
            }
        }
        if reverted > 0 {
            log::debug!("undid {} moves that inverted triangles", reverted);
        }
        reverted
    }

    /// Triangles whose centroid is not inside the domain.
    fn outside_faces(&self, geps: f64) -> Vec<FaceId> {
        let mesh = self.triangulation.mesh();
        self.triangulation
            .faces()
            .filter(|&f| self.distance.distance(&mesh.face_centroid(f)) > -geps)
            .collect()
    }

    /// Remove poor triangles on the boundary whose removal keeps the
    /// boundary manifold.
    fn remove_boundary_slivers(&mut self) -> usize {
        let mesh = self.triangulation.mesh();
        let candidates: Vec<FaceId> = self
            .triangulation
            .faces()
            .filter(|&f| {
                mesh.face_halfedges(f)
                    .any(|he| mesh.is_boundary_face(mesh.face_of(mesh.twin(he))))
            })
            .filter(|&f| face_quality(mesh, f) < self.options.min_boundary_quality)
            .collect();

        let mut removed = 0;
        for f in candidates {
            if !self.triangulation.mesh().is_inner_triangle(f) || !self.sliver_is_removable(f) {
                continue;
            }
            match self.triangulation.remove_faces(&[f]) {
                Ok(_) => removed += 1,
                Err(err) => log::debug!("keeping sliver {:?}: {}", f, err),
            }
        }
        removed
    }

    fn sliver_is_removable(&self, f: FaceId) -> bool {
        let mesh = self.triangulation.mesh();
        let open: Vec<HalfEdgeId> = mesh
            .face_halfedges(f)
            .filter(|&he| mesh.is_boundary_face(mesh.face_of(mesh.twin(he))))
            .collect();
        match open[..] {
            [e] => !mesh.is_boundary_vertex(mesh.target(mesh.next(e))),
            [e1, e2] => {
                let corner = if mesh.next(e1) == e2 { mesh.target(e1) } else { mesh.target(e2) };
                mesh.face_of(mesh.twin(e1)) == mesh.face_of(mesh.twin(e2)) && !mesh.is_fixed(corner)
            }
            _ => false,
        }
    }

    /// Collapse boundary edges much shorter than the local edge length.
    fn collapse_short_boundary_edges(&mut self, scale: f64) -> usize {
        let mesh = self.triangulation.mesh();
        let candidates: Vec<(VertexId, VertexId)> = mesh
            .edges()
            .filter(|&e| mesh.is_boundary_edge(e))
            .filter(|&e| {
                let limit = self.options.boundary_collapse * self.local_length(&mesh.edge_midpoint(e), scale);
                mesh.edge_length(e) < limit
            })
            .map(|e| (mesh.source(e), mesh.target(e)))
            .collect();

        let mut collapsed = 0;
        for (a, b) in candidates {
            let mesh = self.triangulation.mesh();
            if !mesh.vertex_alive(a) || !mesh.vertex_alive(b) || mesh.find_halfedge(a, b).is_none() {
                continue;
            }
            let v = match (mesh.is_fixed(a), mesh.is_fixed(b)) {
                (_, false) => b,
                (false, true) => a,
                (true, true) => continue,
            };
            match self.triangulation.collapse_vertex_at_boundary(v) {
                Ok(_) => collapsed += 1,
                Err(err) => log::debug!("keeping short boundary edge at {:?}: {}", v, err),
            }
        }
        collapsed
    }

    fn max_relative_displacement(&self, moves: &[Move], scale: f64) -> f64 {
        let mesh = self.triangulation.mesh();
        let relative = |m: &&Move| {
            let vertex = mesh.vertex(m.vertex);
            vertex.displacement.norm() / self.local_length(&vertex.position, scale)
        };
        let alive: Vec<&Move> = moves.iter().filter(|m| mesh.vertex_alive(m.vertex)).collect();
        let interior = alive.iter().filter(|m| m.interior).map(relative).fold(f64::NEG_INFINITY, f64::max);
        if interior.is_finite() {
            interior
        } else {
            alive.iter().map(relative).fold(0.0, f64::max)
        }
    }

    // ==================== Accessors ====================

    /// Quality statistics of the current mesh.
    pub fn quality(&self) -> QualityStats {
        mesh_quality(self.mesh(), SLIVER_QUALITY)
    }

    /// The current mesh.
    pub fn mesh(&self) -> &Mesh {
        self.triangulation.mesh()
    }

    /// The underlying triangulation.
    pub fn triangulation(&self) -> &Triangulation {
        &self.triangulation
    }

    /// Consume the improver and return its mesh.
    pub fn into_mesh(self) -> Mesh {
        self.triangulation.into_mesh()
    }

    /// Number of steps performed.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// The options.
    pub fn options(&self) -> &EikMeshOptions {
        &self.options
    }

    /// Signed distance of `p` to the domain boundary.
    pub fn distance(&self, p: &Point2<f64>) -> f64 {
        self.distance.distance(p)
    }
}

/// Whether an edge has a meshed triangle on at least one side.
fn has_inner_side(mesh: &Mesh, e: HalfEdgeId) -> bool {
    !mesh.is_boundary_face(mesh.face_of(e)) || !mesh.is_boundary_face(mesh.face_of(mesh.twin(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Circle, Rectangle, Uniform};

    fn disc(options: EikMeshOptions) -> EikMesh {
        let bound = BoundingBox::from_origin_size(-1.0, -1.0, 2.0, 2.0);
        EikMesh::new(Circle::new(Point2::origin(), 1.0), Uniform(0.2), bound, options)
    }

    #[test]
    fn test_default_options() {
        let options = EikMeshOptions::default();
        assert_eq!(options.time_step, 0.2);
        assert_eq!(options.force_scale, 1.2);
        assert!(options.repulsive_only);
        assert!(options.parallel);
        assert!(!options.clone().sequential().parallel);
        assert!(!options.allow_attraction().repulsive_only);
    }

    #[test]
    fn test_invalid_options() {
        let mut eikmesh = disc(EikMeshOptions::default().with_time_step(0.0));
        assert!(matches!(
            eikmesh.initialize(),
            Err(MeshError::InvalidParameter { name: "time_step", .. })
        ));
    }

    #[test]
    fn test_initialize_scatters_inside_domain() {
        let mut eikmesh = disc(EikMeshOptions::default());
        eikmesh.initialize().unwrap();
        assert!(eikmesh.initialize().is_err());
        let mesh = eikmesh.mesh();
        assert!(mesh.is_valid(), "{:?}", mesh.check_invariants());
        // Roughly pi / (sqrt(3) / 2 * 0.04) points.
        let n = eikmesh.triangulation().num_vertices();
        assert!(n > 60 && n < 120, "{}", n);
        for v in mesh.vertex_ids() {
            assert!(eikmesh.distance(mesh.position(v)) <= 0.0);
        }
    }

    #[test]
    fn test_random_scatter() {
        let mut eikmesh = disc(EikMeshOptions::default().with_scatter(Scatter::Random));
        eikmesh.initialize().unwrap();
        assert!(eikmesh.mesh().is_valid());
        assert!(eikmesh.triangulation().num_vertices() > 50);
    }

    #[test]
    fn test_improve_disc() {
        let mut eikmesh = disc(EikMeshOptions::default().with_max_iterations(100));
        let report = eikmesh.improve().unwrap();
        let mesh = eikmesh.mesh();
        assert!(mesh.is_valid(), "{:?}", mesh.check_invariants());
        assert!(eikmesh.is_finished());
        assert!(report.quality.mean > 0.85, "{}", report.quality);
        assert_eq!(report.quality.below, 0);
        assert!(eikmesh.triangulation().is_delaunay());
        for b in mesh.border_halfedges() {
            let p = mesh.position(mesh.target(b));
            assert!(eikmesh.distance(p).abs() < 0.02, "{:?}", p);
        }
    }

    #[test]
    fn test_fixed_points_do_not_move() {
        let corners = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let bound = BoundingBox::from_origin_size(0.0, 0.0, 1.0, 1.0);
        let mut eikmesh = EikMesh::new(
            Rectangle::new(0.0, 0.0, 1.0, 1.0),
            Uniform(0.25),
            bound,
            EikMeshOptions::default().with_max_iterations(20),
        )
        .with_fixed_points(corners.clone());
        eikmesh.improve().unwrap();
        let mesh = eikmesh.mesh();
        for c in &corners {
            assert!(mesh.vertex_ids().any(|v| mesh.is_fixed(v) && mesh.position(v) == c));
        }
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let mut a = disc(EikMeshOptions::default());
        let mut b = disc(EikMeshOptions::default().sequential());
        for _ in 0..5 {
            a.step().unwrap();
            b.step().unwrap();
        }
        let pa: Vec<_> = a.mesh().vertex_ids().map(|v| *a.mesh().position(v)).collect();
        let pb: Vec<_> = b.mesh().vertex_ids().map(|v| *b.mesh().position(v)).collect();
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_projection() {
        let eikmesh = disc(EikMeshOptions::default());
        let q = eikmesh.project(Point2::new(1.5, 0.0), 1e-9).unwrap();
        assert!((q - Point2::new(1.0, 0.0)).norm() < 1e-9);

        let flat = EikMesh::new(
            |_: &Point2<f64>| 1.0,
            Uniform(1.0),
            BoundingBox::from_origin_size(0.0, 0.0, 1.0, 1.0),
            EikMeshOptions::default(),
        );
        assert!(flat.project(Point2::new(0.5, 0.5), 1e-9).is_none());
    }

    #[test]
    fn test_from_triangulation_requires_finished() {
        let bound = BoundingBox::from_origin_size(0.0, 0.0, 1.0, 1.0);
        let t = Triangulation::new(bound, LocatorKind::Walk);
        let result = EikMesh::from_triangulation(
            t,
            Rectangle::new(0.0, 0.0, 1.0, 1.0),
            Uniform(0.5),
            EikMeshOptions::default(),
        );
        assert!(matches!(result, Err(MeshError::InvalidState(_))));
    }

    #[test]
    fn test_improve_reports_insertion_and_steps() {
        use std::sync::{Arc, Mutex};

        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let progress = Progress::new(move |current, total, message: &str| {
            sink.lock().unwrap().push((current, total, message.to_string()));
        });
        let mut eikmesh = disc(EikMeshOptions::default().with_max_iterations(5));
        let report = eikmesh.improve_with_progress(&progress).unwrap();

        let log = log.lock().unwrap();
        let inserting: Vec<&(usize, usize, String)> = log.iter().filter(|r| r.2 == "inserting").collect();
        assert!(!inserting.is_empty());
        assert!(inserting.iter().all(|r| r.1 == 5000 && r.0 <= 1000));
        assert_eq!(inserting.last().map(|r| r.0), Some(1000));
        let relaxing: Vec<usize> = log.iter().filter(|r| r.2 == "relaxing").map(|r| r.0).collect();
        assert_eq!(relaxing, (1..=report.iterations).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_iterations_is_finished() {
        let mut eikmesh = disc(EikMeshOptions::default().with_max_iterations(0));
        let report = eikmesh.improve().unwrap();
        assert_eq!(report.iterations, 0);
        assert!(!report.converged);
        assert!(report.quality.count > 0);
    }
}
