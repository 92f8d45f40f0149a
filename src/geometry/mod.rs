//! Planar geometry: predicates, tolerances and primitives.
//!
//! Coordinates are `f64` [`nalgebra::Point2`] values throughout the crate.

mod predicates;
mod primitives;

pub use predicates::{
    in_circle, orient2d, signed_distance, CircleSide, Orientation, Tolerance,
};
pub use primitives::{BoundingBox, Polygon, Segment, Triangle};

/// A point in the plane.
pub type Point = nalgebra::Point2<f64>;

/// A vector in the plane.
pub type Vector = nalgebra::Vector2<f64>;
