//! EikMesh CLI - planar mesh generation command-line tool.
//!
//! Usage: eikmesh <COMMAND> [OPTIONS]
//!
//! Run `eikmesh --help` for available commands.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use eikmesh::algo::{mesh_quality, min_angle_degrees, EikMesh, EikMeshOptions, Progress, Scatter};
use eikmesh::field::{annulus, difference, Circle, DistanceAdaptive, DistanceFunction, Rectangle, Uniform};
use eikmesh::geometry::BoundingBox;
use eikmesh::io::{self, poly};
use eikmesh::locate::LocatorKind;
use eikmesh::mesh::Mesh;
use eikmesh::triangulation::Triangulation;

#[derive(Parser)]
#[command(name = "eikmesh")]
#[command(author, version, about = "Planar mesh generation CLI", long_about = None)]
struct Cli {
    /// More log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a mesh for a domain with EikMesh
    Generate {
        /// Built-in domain
        #[arg(short, long, value_enum, default_value = "disc", conflicts_with = "pslg")]
        shape: Shape,

        /// Domain bounded by the segments of a .poly file
        #[arg(long)]
        pslg: Option<PathBuf>,

        /// Edge length (on the boundary when grading)
        #[arg(short = 'l', long, default_value = "0.1")]
        edge_length: f64,

        /// Growth of the edge length per unit of distance to the boundary
        #[arg(short, long)]
        grading: Option<f64>,

        /// Maximum number of relaxation steps
        #[arg(short, long, default_value = "500")]
        iterations: usize,

        /// Initial point placement
        #[arg(long, value_enum, default_value = "grid")]
        scatter: ScatterArg,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Point location strategy
        #[arg(long, value_enum, default_value = "walk")]
        locator: LocatorArg,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,

        /// Output mesh file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Delaunay-triangulate random points
    Triangulate {
        /// Number of points
        #[arg(short, long, default_value = "1000")]
        points: usize,

        /// Side length of the square the points are drawn from
        #[arg(long, default_value = "1.0")]
        size: f64,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Point location strategy
        #[arg(long, value_enum, default_value = "walk")]
        locator: LocatorArg,

        /// Output mesh file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Display mesh information
    Info {
        /// Input mesh file
        input: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Shape {
    /// Unit disc
    Disc,
    /// Ring with radii 0.4 and 1
    Annulus,
    /// Square [-1, 1]^2 with a circular hole of radius 0.4
    SquareHole,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ScatterArg {
    /// Hexagonal lattice
    Grid,
    /// Uniform random points
    Random,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LocatorArg {
    /// Visibility walk
    Walk,
    /// Delaunay hierarchy
    Hierarchy,
    /// Delaunay tree
    Tree,
}

impl From<LocatorArg> for LocatorKind {
    fn from(arg: LocatorArg) -> Self {
        match arg {
            LocatorArg::Walk => LocatorKind::Walk,
            LocatorArg::Hierarchy => LocatorKind::Hierarchy,
            LocatorArg::Tree => LocatorKind::DelaunayTree,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Generate {
            shape,
            pslg,
            edge_length,
            grading,
            iterations,
            scatter,
            seed,
            locator,
            sequential,
            out,
        } => {
            let options = EikMeshOptions::default()
                .with_max_iterations(iterations)
                .with_initial_edge_length(edge_length)
                .with_scatter(match scatter {
                    ScatterArg::Grid => Scatter::Grid,
                    ScatterArg::Random => Scatter::Random,
                })
                .with_seed(seed)
                .with_locator(locator.into())
                .with_parallel(!sequential);
            let eikmesh = match pslg {
                Some(path) => pslg_eikmesh(&path, edge_length, grading, options)?,
                None => shape_eikmesh(shape, edge_length, grading, options),
            };
            cmd_generate(eikmesh, &out, sequential)?;
        }

        Commands::Triangulate {
            points,
            size,
            seed,
            locator,
            out,
        } => {
            cmd_triangulate(points, size, seed, locator.into(), &out)?;
        }

        Commands::Info { input } => {
            cmd_info(&input)?;
        }
    }

    Ok(())
}

/// Create a progress reporter that displays a progress bar on the terminal.
fn create_progress() -> Progress {
    let max_percent = Arc::new(AtomicUsize::new(0));

    Progress::new(move |current, total, message| {
        if total == 0 {
            return;
        }

        let raw_percent = if current >= total {
            100
        } else {
            ((current * 100) + (total / 2)) / total
        };

        // Never move backwards.
        let previous = max_percent.fetch_max(raw_percent, Ordering::Relaxed);
        if raw_percent <= previous && raw_percent != 100 {
            return;
        }

        let bar_width = 30;
        let filled = (raw_percent * bar_width) / 100;
        let bar = "=".repeat(filled);
        let space = " ".repeat(bar_width - filled);
        eprint!("\r[{}{}] {:3}% {}", bar, space, raw_percent, message);
        let _ = std::io::stderr().flush();

        if current >= total {
            eprintln!();
        }
    })
}

fn build_eikmesh<D>(
    distance: D,
    bound: BoundingBox,
    edge_length: f64,
    grading: Option<f64>,
    options: EikMeshOptions,
) -> EikMesh
where
    D: DistanceFunction + Clone + 'static,
{
    match grading {
        Some(growth) => {
            let field = DistanceAdaptive::new(distance.clone(), edge_length, growth, f64::INFINITY);
            EikMesh::new(distance, field, bound, options)
        }
        None => EikMesh::new(distance, Uniform(edge_length), bound, options),
    }
}

fn shape_eikmesh(shape: Shape, edge_length: f64, grading: Option<f64>, options: EikMeshOptions) -> EikMesh {
    let bound = BoundingBox::from_origin_size(-1.0, -1.0, 2.0, 2.0);
    match shape {
        Shape::Disc => build_eikmesh(Circle::new(Point2::origin(), 1.0), bound, edge_length, grading, options),
        Shape::Annulus => build_eikmesh(annulus(Point2::origin(), 0.4, 1.0), bound, edge_length, grading, options),
        Shape::SquareHole => {
            let domain = difference(Rectangle::new(-1.0, -1.0, 2.0, 2.0), Circle::new(Point2::origin(), 0.4));
            let corners = vec![
                Point2::new(-1.0, -1.0),
                Point2::new(1.0, -1.0),
                Point2::new(1.0, 1.0),
                Point2::new(-1.0, 1.0),
            ];
            build_eikmesh(domain, bound, edge_length, grading, options).with_fixed_points(corners)
        }
    }
}

fn pslg_eikmesh(
    path: &Path,
    edge_length: f64,
    grading: Option<f64>,
    options: EikMeshOptions,
) -> Result<EikMesh, Box<dyn std::error::Error>> {
    let pslg = poly::load(path)?;
    let bound = pslg.bounding_box().ok_or("the PSLG has no points")?;
    println!(
        "Loaded: {} points, {} segments, {} holes",
        pslg.points.len(),
        pslg.segments.len(),
        pslg.holes.len()
    );
    let eikmesh = build_eikmesh(pslg.distance_function(), bound, edge_length, grading, options);
    Ok(eikmesh.with_fixed_points(pslg.points))
}

fn cmd_generate(mut eikmesh: EikMesh, output: &Path, sequential: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mode = if sequential { "sequential" } else { "parallel" };
    let progress = create_progress();

    let start = Instant::now();
    eikmesh.initialize()?;
    println!(
        "Initial mesh: {} vertices, {} triangles",
        eikmesh.triangulation().num_vertices(),
        eikmesh.triangulation().faces().count()
    );
    println!(
        "Relaxing (at most {} steps, {})...",
        eikmesh.options().max_iterations,
        mode
    );
    let report = eikmesh.improve_with_progress(&progress)?;
    let elapsed = start.elapsed();

    println!(
        "Result: {} vertices, {} triangles after {} steps ({})",
        eikmesh.triangulation().num_vertices(),
        eikmesh.triangulation().faces().count(),
        report.iterations,
        if report.converged { "converged" } else { "not converged" }
    );
    println!("Quality: {}", report.quality);
    if report.projection_failures > 0 {
        println!("Boundary projection failures: {}", report.projection_failures);
    }

    io::save(eikmesh.mesh(), output)?;
    println!("Saved: {} ({:.2?})", output.display(), elapsed);

    Ok(())
}

fn cmd_triangulate(
    points: usize,
    size: f64,
    seed: u64,
    locator: LocatorKind,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if !(size > 0.0) {
        return Err("size must be positive".into());
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let samples: Vec<Point2<f64>> = (0..points)
        .map(|_| Point2::new(rng.gen_range(0.0..size), rng.gen_range(0.0..size)))
        .collect();

    let bound = BoundingBox::from_origin_size(0.0, 0.0, size, size);
    let mut triangulation: Triangulation = Triangulation::new(bound, locator);
    let progress = create_progress();

    let start = Instant::now();
    for (i, p) in samples.iter().enumerate() {
        triangulation.insert(*p)?;
        progress.report(i + 1, points, "inserting");
    }
    triangulation.finish()?;
    let elapsed = start.elapsed();

    println!(
        "Result: {} vertices, {} triangles ({:?} locator, {:.2?})",
        triangulation.num_vertices(),
        triangulation.faces().count(),
        locator,
        elapsed
    );
    println!("Delaunay: {}", triangulation.is_delaunay());

    io::save(triangulation.mesh(), output)?;
    println!("Saved: {}", output.display());

    Ok(())
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mesh: Mesh = io::load(input)?;

    println!("File: {}", input.display());
    println!("Vertices: {}", mesh.num_vertices());
    println!("Faces: {}", mesh.num_faces());
    println!("Half-edges: {}", mesh.num_halfedges());

    let mut total_area = 0.0;
    let mut min_area = f64::MAX;
    let mut max_area = 0.0_f64;
    for f in mesh.inner_triangle_ids() {
        let area = mesh.face_area(f);
        total_area += area;
        min_area = min_area.min(area);
        max_area = max_area.max(area);
    }
    println!("Area: {:.6}", total_area);
    println!("Triangle area range: [{:.6}, {:.6}]", min_area, max_area);

    if let Some(bound) = mesh.bounding_box() {
        println!(
            "Bounding box: ({:.3}, {:.3}) to ({:.3}, {:.3})",
            bound.min.x, bound.min.y, bound.max.x, bound.max.y
        );
    }

    let boundary = mesh.vertex_ids().filter(|&v| mesh.is_boundary_vertex(v)).count();
    let holes = mesh.face_ids().filter(|&f| mesh.is_hole(f)).count();
    println!("Boundary vertices: {}", boundary);
    println!("Holes: {}", holes);

    println!("Quality: {}", mesh_quality(&mesh, 0.01));
    println!("Smallest angle: {:.2} deg", min_angle_degrees(&mesh));

    Ok(())
}
