//! Mesh generation and quality algorithms.
//!
//! - **EikMesh**: force-based generation and improvement of triangle meshes
//!   for domains given by signed distance functions
//! - **Quality**: per-triangle and per-mesh quality measures
//! - **Progress**: callbacks for long-running runs

pub mod eikmesh;
pub mod progress;
pub mod quality;

pub use eikmesh::{EikMesh, EikMeshOptions, ImproveReport, Scatter, StepReport};
pub use progress::Progress;
pub use quality::{face_quality, mesh_quality, min_angle_degrees, triangle_quality, QualityStats};
