//! Error types for eikmesh.
//!
//! This module defines all error types used throughout the library.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur during mesh operations.
#[derive(Error, Debug)]
pub enum MeshError {
    /// The mesh has no faces.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face has duplicate vertices or zero area.
    #[error("face {face} is degenerate (duplicate vertices or zero area)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// A topological operation was attempted on elements that do not satisfy
    /// its preconditions. The mesh is left unchanged.
    #[error("topology error: {0}")]
    Topology(String),

    /// A handle refers to a destroyed or out-of-range element.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    /// A point was inserted outside the triangulation's bound.
    #[error("point ({x}, {y}) lies outside the triangulation domain")]
    PointOutsideDomain {
        /// X coordinate of the rejected point.
        x: f64,
        /// Y coordinate of the rejected point.
        y: f64,
    },

    /// A geometric predicate was too close to zero to decide the
    /// configuration. Insertion retries with a perturbed point when it
    /// sees this, so callers only observe it after every retry failed.
    #[error("ambiguous geometric predicate at ({x}, {y})")]
    DegeneratePredicate {
        /// X coordinate of the point being processed.
        x: f64,
        /// Y coordinate of the point being processed.
        y: f64,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error loading mesh from file.
    #[error("failed to load mesh from {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Error saving mesh to file.
    #[error("failed to save mesh to {path}: {message}")]
    SaveError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// A line of a text input could not be parsed.
    #[error("parse error on line {line}: {message}")]
    Parse {
        /// One-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// Unsupported file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },

    /// The operation is not allowed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create a topology error.
    pub fn topology(message: impl Into<String>) -> Self {
        MeshError::Topology(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = MeshError::PointOutsideDomain { x: 1.5, y: -2.0 };
        assert_eq!(
            err.to_string(),
            "point (1.5, -2) lies outside the triangulation domain"
        );

        let err = MeshError::invalid_param("time_step", -1.0, "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid parameter: time_step = -1 (must be positive)"
        );

        let err = MeshError::topology("edge is on the border");
        assert_eq!(err.to_string(), "topology error: edge is on the border");
    }
}
