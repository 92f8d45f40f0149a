//! Planar straight-line graphs in the `.poly` format of Triangle.
//!
//! ```text
//! # vertices: count, dimension (2), attributes, boundary markers
//! 4 2 0 0
//! 1 0 0
//! 2 1 0
//! 3 1 1
//! 4 0 1
//! # segments: count, boundary markers
//! 4 0
//! 1 1 2
//! 2 2 3
//! 3 3 4
//! 4 4 1
//! # holes
//! 0
//! ```
//!
//! Vertex numbering may start at 0 or 1; the first vertex decides. Files
//! that keep their vertices in a separate `.node` file are not supported.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Point2;

use crate::error::{MeshError, Result};
use crate::field::SegmentSetDistance;
use crate::geometry::{BoundingBox, Segment};

/// A planar straight-line graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pslg {
    /// Vertex positions.
    pub points: Vec<Point2<f64>>,
    /// Segments as pairs of indices into `points`.
    pub segments: Vec<[usize; 2]>,
    /// One point inside each hole.
    pub holes: Vec<Point2<f64>>,
}

impl Pslg {
    /// The segments as geometry.
    pub fn boundary_segments(&self) -> Vec<Segment> {
        self.segments
            .iter()
            .map(|&[a, b]| Segment::new(self.points[a], self.points[b]))
            .collect()
    }

    /// Signed distance to the region enclosed by the segments.
    ///
    /// Loops nested inside other loops are holes, so the hole points are
    /// not needed to decide inside and outside.
    pub fn distance_function(&self) -> SegmentSetDistance {
        SegmentSetDistance::new(self.boundary_segments())
    }

    /// Bounding box of the points.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.points.iter())
    }
}

/// Load a PSLG from a `.poly` file.
///
/// # Example
///
/// ```no_run
/// use eikmesh::io::poly;
///
/// let pslg = poly::load("domain.poly").unwrap();
/// let domain = pslg.distance_function();
/// ```
pub fn load<P: AsRef<Path>>(path: P) -> Result<Pslg> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read(BufReader::new(file)).map_err(|e| match e {
        MeshError::Io(_) | MeshError::Parse { .. } => MeshError::LoadError {
            path: path.to_path_buf(),
            message: e.to_string(),
        },
        other => other,
    })
}

/// Non-empty lines with comments stripped, split into tokens.
struct Records<R> {
    lines: std::iter::Enumerate<std::io::Lines<R>>,
    line: usize,
}

impl<R: BufRead> Records<R> {
    fn new(reader: R) -> Self {
        Self {
            lines: reader.lines().enumerate(),
            line: 0,
        }
    }

    fn next_record(&mut self, what: &str) -> Result<Vec<String>> {
        for (i, line) in self.lines.by_ref() {
            let line = line?;
            self.line = i + 1;
            let content = line.split('#').next().unwrap_or("");
            let tokens: Vec<String> = content.split_whitespace().map(str::to_string).collect();
            if !tokens.is_empty() {
                return Ok(tokens);
            }
        }
        Err(self.error(format!("unexpected end of file, expected {}", what)))
    }

    fn error(&self, message: String) -> MeshError {
        MeshError::Parse {
            line: self.line,
            message,
        }
    }

    fn field<T: std::str::FromStr>(&self, tokens: &[String], i: usize, what: &str) -> Result<T> {
        let token = tokens
            .get(i)
            .ok_or_else(|| self.error(format!("missing {}", what)))?;
        token
            .parse()
            .map_err(|_| self.error(format!("invalid {} '{}'", what, token)))
    }
}

/// Read a PSLG in `.poly` format.
pub fn read<R: BufRead>(reader: R) -> Result<Pslg> {
    let mut records = Records::new(reader);

    let header = records.next_record("vertex header")?;
    let num_points: usize = records.field(&header, 0, "vertex count")?;
    if num_points == 0 {
        return Err(records.error("vertices in a separate .node file are not supported".into()));
    }
    if header.len() > 1 {
        let dimension: usize = records.field(&header, 1, "dimension")?;
        if dimension != 2 {
            return Err(records.error(format!("dimension {} is not supported", dimension)));
        }
    }

    let mut points = Vec::with_capacity(num_points);
    let mut first_index = 0;
    for i in 0..num_points {
        let record = records.next_record("vertex")?;
        let index: usize = records.field(&record, 0, "vertex number")?;
        if i == 0 {
            first_index = index.min(1);
        }
        if index != i + first_index {
            return Err(records.error(format!("vertex number {} out of sequence", index)));
        }
        let x: f64 = records.field(&record, 1, "x coordinate")?;
        let y: f64 = records.field(&record, 2, "y coordinate")?;
        points.push(Point2::new(x, y));
    }

    let header = records.next_record("segment header")?;
    let num_segments: usize = records.field(&header, 0, "segment count")?;
    let mut segments = Vec::with_capacity(num_segments);
    for _ in 0..num_segments {
        let record = records.next_record("segment")?;
        let endpoint = |i: usize| -> Result<usize> {
            let raw: usize = records.field(&record, i, "segment endpoint")?;
            raw.checked_sub(first_index)
                .filter(|&v| v < points.len())
                .ok_or_else(|| records.error(format!("segment endpoint {} out of range", raw)))
        };
        let a = endpoint(1)?;
        let b = endpoint(2)?;
        if a == b {
            return Err(records.error("segment endpoints coincide".into()));
        }
        segments.push([a, b]);
    }

    let mut holes = Vec::new();
    // The hole section is optional.
    if let Ok(header) = records.next_record("hole header") {
        let num_holes: usize = records.field(&header, 0, "hole count")?;
        for _ in 0..num_holes {
            let record = records.next_record("hole")?;
            let x: f64 = records.field(&record, 1, "x coordinate")?;
            let y: f64 = records.field(&record, 2, "y coordinate")?;
            holes.push(Point2::new(x, y));
        }
    }

    log::debug!(
        "read PSLG with {} points, {} segments and {} holes",
        points.len(),
        segments.len(),
        holes.len()
    );
    Ok(Pslg {
        points,
        segments,
        holes,
    })
}

/// Save a PSLG to a `.poly` file.
pub fn save<P: AsRef<Path>>(pslg: &Pslg, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write(pslg, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a PSLG in `.poly` format with one-based numbering.
pub fn write<W: Write>(pslg: &Pslg, writer: &mut W) -> Result<()> {
    writeln!(writer, "{} 2 0 0", pslg.points.len())?;
    for (i, p) in pslg.points.iter().enumerate() {
        writeln!(writer, "{} {} {}", i + 1, p.x, p.y)?;
    }
    writeln!(writer, "{} 0", pslg.segments.len())?;
    for (i, [a, b]) in pslg.segments.iter().enumerate() {
        writeln!(writer, "{} {} {}", i + 1, a + 1, b + 1)?;
    }
    writeln!(writer, "{}", pslg.holes.len())?;
    for (i, h) in pslg.holes.iter().enumerate() {
        writeln!(writer, "{} {} {}", i + 1, h.x, h.y)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::DistanceFunction;

    const SQUARE_WITH_HOLE: &str = "\
# outer square and an inner square hole
8 2 0 1
1 0 0 1
2 10 0 1
3 10 10 1
4 0 10 1
5 4 4 0
6 6 4 0
7 6 6 0
8 4 6 0
8 1
1 1 2 1
2 2 3 1
3 3 4 1
4 4 1 1
5 5 6 0
6 6 7 0
7 7 8 0
8 8 5 0
1
1 5 5
";

    #[test]
    fn test_read_square_with_hole() {
        let pslg = read(SQUARE_WITH_HOLE.as_bytes()).unwrap();
        assert_eq!(pslg.points.len(), 8);
        assert_eq!(pslg.segments[0], [0, 1]);
        assert_eq!(pslg.holes, vec![Point2::new(5.0, 5.0)]);

        let d = pslg.distance_function();
        assert!((d.distance(&Point2::new(2.0, 5.0)) + 2.0).abs() < 1e-12);
        assert!(d.distance(&Point2::new(5.0, 5.0)) > 0.0);
        assert!((pslg.bounding_box().unwrap().width() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_based_without_holes() {
        let text = "3 2\n0 0 0\n1 1 0\n2 0 1\n3\n0 0 1\n1 1 2\n2 2 0\n";
        let pslg = read(text.as_bytes()).unwrap();
        assert_eq!(pslg.segments, vec![[0, 1], [1, 2], [2, 0]]);
        assert!(pslg.holes.is_empty());
    }

    #[test]
    fn test_write_then_read() {
        let pslg = read(SQUARE_WITH_HOLE.as_bytes()).unwrap();
        let mut buffer = Vec::new();
        write(&pslg, &mut buffer).unwrap();
        assert_eq!(read(buffer.as_slice()).unwrap(), pslg);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(read("0 2 0 0\n".as_bytes()), Err(MeshError::Parse { line: 1, .. })));
        let bad_segment = "3 2\n1 0 0\n2 1 0\n3 0 1\n1\n1 1 9\n";
        assert!(matches!(read(bad_segment.as_bytes()), Err(MeshError::Parse { line: 6, .. })));
        let truncated = "3 2\n1 0 0\n2 1 0\n";
        assert!(read(truncated.as_bytes()).is_err());
    }
}
