//! Wavefront OBJ format support.
//!
//! Planar meshes are written with `z = 0`. On load the `z` coordinate is
//! ignored, texture and normal indices in face statements are skipped and
//! negative (relative) indices are resolved.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Point2;

use crate::error::{MeshError, Result};
use crate::mesh::{build_from_polygons, to_face_vertex, Mesh, VertexData};

/// Load a mesh from an OBJ file.
///
/// # Example
///
/// ```no_run
/// use eikmesh::io::obj;
/// use eikmesh::mesh::Mesh;
///
/// let mesh: Mesh = obj::load("mesh.obj").unwrap();
/// ```
pub fn load<P: AsRef<Path>, V: VertexData>(path: P) -> Result<Mesh<V>> {
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

/// Read a mesh in OBJ format.
pub fn read<R: BufRead, V: VertexData>(reader: R) -> Result<Mesh<V>> {
    let mut vertices: Vec<Point2<f64>> = Vec::new();
    let mut faces: Vec<Vec<usize>> = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let number = i + 1;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let mut coord = |axis: &str| -> Result<f64> {
                    let token = tokens.next().ok_or_else(|| parse_error(number, format!("vertex missing {}", axis)))?;
                    token
                        .parse::<f64>()
                        .map_err(|_| parse_error(number, format!("invalid {} coordinate '{}'", axis, token)))
                };
                let x = coord("x")?;
                let y = coord("y")?;
                vertices.push(Point2::new(x, y));
            }
            Some("f") => {
                let face = tokens
                    .map(|token| resolve_index(token, vertices.len(), number))
                    .collect::<Result<Vec<usize>>>()?;
                faces.push(face);
            }
            _ => {}
        }
    }

    build_from_polygons(&vertices, &faces)
}

/// Resolve a face vertex reference like `3`, `3/1/2` or `-1`.
fn resolve_index(token: &str, num_vertices: usize, line: usize) -> Result<usize> {
    let head = token.split('/').next().unwrap_or(token);
    let index: i64 = head
        .parse()
        .map_err(|_| parse_error(line, format!("invalid vertex reference '{}'", token)))?;
    let resolved = match index {
        0 => None,
        i if i > 0 => Some(i as usize - 1),
        i => num_vertices.checked_sub(i.unsigned_abs() as usize),
    };
    resolved.ok_or_else(|| parse_error(line, format!("vertex reference '{}' out of range", token)))
}

fn parse_error(line: usize, message: String) -> MeshError {
    MeshError::Parse { line, message }
}

/// Save the inner triangles of a mesh to an OBJ file.
///
/// # Example
///
/// ```no_run
/// use eikmesh::io::obj;
/// use eikmesh::mesh::Mesh;
///
/// let mesh: Mesh = Mesh::new();
/// obj::save(&mesh, "output.obj").unwrap();
/// ```
pub fn save<P: AsRef<Path>, V: VertexData>(mesh: &Mesh<V>, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write(mesh, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write the inner triangles of a mesh in OBJ format.
pub fn write<W: Write, V: VertexData>(mesh: &Mesh<V>, writer: &mut W) -> Result<()> {
    let (vertices, faces) = to_face_vertex(mesh);
    writeln!(writer, "# {} vertices, {} triangles", vertices.len(), faces.len())?;
    for p in &vertices {
        writeln!(writer, "v {} {} 0", p.x, p.y)?;
    }
    for f in &faces {
        writeln!(writer, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1)?;
    }
    Ok(())
}
