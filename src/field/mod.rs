//! Scalar fields driving mesh generation.
//!
//! A [`DistanceFunction`] describes the domain to mesh as the negative region
//! of a signed distance field, and an [`EdgeLengthFunction`] gives the desired
//! local edge length. Plain closures implement both traits, and the shapes and
//! combinators here cover the common cases:
//!
//! ```
//! use eikmesh::field::{difference, Circle, DistanceFunction, Rectangle};
//! use nalgebra::Point2;
//!
//! let plate = difference(Rectangle::new(0.0, 0.0, 4.0, 2.0), Circle::new(Point2::new(2.0, 1.0), 0.5));
//! assert!(plate.distance(&Point2::new(0.5, 0.5)) < 0.0);
//! assert!(plate.distance(&Point2::new(2.0, 1.0)) > 0.0);
//! ```

mod distance;
mod edge_length;

pub use distance::{
    annulus, difference, intersect, union, Circle, Complement, Difference, DistanceFunction,
    Intersection, PolygonDistance, Rectangle, SegmentSetDistance, Union,
};
pub use edge_length::{DistanceAdaptive, EdgeLengthFunction, Uniform};
