//! Mesh and domain file I/O.
//!
//! # Supported Formats
//!
//! | Format | Extension | Load | Save | Contents |
//! |--------|-----------|------|------|----------|
//! | Wavefront OBJ | `.obj` | ✓ | ✓ | Triangle mesh, `z = 0` |
//! | Triangle PSLG | `.poly` | ✓ | ✓ | Points, segments and holes of a domain |
//!
//! # Usage
//!
//! ```no_run
//! use eikmesh::io::{load, save};
//! use eikmesh::mesh::Mesh;
//!
//! let mesh: Mesh = load("mesh.obj").unwrap();
//! save(&mesh, "copy.obj").unwrap();
//! ```
//!
//! Domains are read with [`poly::load`] and turned into a distance function:
//!
//! ```no_run
//! use eikmesh::io::poly;
//!
//! let domain = poly::load("domain.poly").unwrap().distance_function();
//! ```

pub mod obj;
pub mod poly;

use std::path::Path;

use crate::error::{MeshError, Result};
use crate::mesh::{Mesh, VertexData};

pub use poly::Pslg;

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Wavefront OBJ format.
    Obj,
    /// Triangle's planar straight-line graph format.
    Poly,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "obj" => Some(Format::Obj),
            "poly" => Some(Format::Poly),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }
}

fn detect(path: &Path) -> Result<Format> {
    Format::from_path(path).ok_or_else(|| MeshError::UnsupportedFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

/// Load a mesh from a file with automatic format detection.
///
/// The format is determined by the file extension.
pub fn load<P: AsRef<Path>, V: VertexData>(path: P) -> Result<Mesh<V>> {
    let path = path.as_ref();
    match detect(path)? {
        Format::Obj => obj::load(path),
        Format::Poly => Err(MeshError::LoadError {
            path: path.to_path_buf(),
            message: "a .poly file holds a domain, not a mesh; use io::poly::load".to_string(),
        }),
    }
}

/// Save a mesh to a file with automatic format detection.
///
/// The format is determined by the file extension.
pub fn save<P: AsRef<Path>, V: VertexData>(mesh: &Mesh<V>, path: P) -> Result<()> {
    let path = path.as_ref();
    match detect(path)? {
        Format::Obj => obj::save(mesh, path),
        Format::Poly => Err(MeshError::SaveError {
            path: path.to_path_buf(),
            message: "meshes cannot be saved as .poly".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_path("a/b/mesh.OBJ"), Some(Format::Obj));
        assert_eq!(Format::from_path("domain.poly"), Some(Format::Poly));
        assert_eq!(Format::from_path("model.stl"), None);
        assert_eq!(Format::from_path("noext"), None);
    }

    #[test]
    fn test_unsupported_extension() {
        let mesh: Mesh = Mesh::new();
        assert!(matches!(
            save(&mesh, "out.stl"),
            Err(MeshError::UnsupportedFormat { extension }) if extension == "stl"
        ));
        assert!(matches!(load::<_, ()>("in"), Err(MeshError::UnsupportedFormat { .. })));
    }
}
