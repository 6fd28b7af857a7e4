//! Wavefront OBJ parsing.
//!
//! Reads `v` and `f` statements; everything else (normals, texture
//! coordinates, groups, materials) is ignored. Face indices may be
//! 1-based or negative (relative to the end of the vertex list) and may
//! carry `/vt/vn` suffixes. Faces with more than three vertices are fan
//! triangulated.

use std::path::Path;

use nalgebra::Point3;

use super::mesh::TriangleMesh;
use super::{AnalysisError, MeshParser, ModelFormat};

pub struct ObjParser;

impl ObjParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ObjParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshParser for ObjParser {
    fn parse(&self, path: &Path) -> Result<TriangleMesh, AnalysisError> {
        let bytes = std::fs::read(path).map_err(|e| AnalysisError::UnreadableFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let text = String::from_utf8(bytes).map_err(|_| {
            AnalysisError::UnsupportedFormat(format!(
                "OBJ file '{}' contains invalid UTF-8",
                path.display()
            ))
        })?;
        parse_text(&text)
    }

    fn supports(&self, format: ModelFormat) -> bool {
        format == ModelFormat::Obj
    }
}

fn parse_text(text: &str) -> Result<TriangleMesh, AnalysisError> {
    let mut vertices: Vec<Point3<f64>> = Vec::new();
    let mut triangles: Vec<[Point3<f64>; 3]> = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let mut coords = [0.0f64; 3];
                for coord in &mut coords {
                    let token = tokens.next().ok_or_else(|| {
                        AnalysisError::UnsupportedFormat(format!(
                            "OBJ vertex with missing coordinate at line {}",
                            line_no + 1
                        ))
                    })?;
                    *coord = token.parse().map_err(|_| {
                        AnalysisError::UnsupportedFormat(format!(
                            "OBJ vertex with non-numeric coordinate '{}' at line {}",
                            token,
                            line_no + 1
                        ))
                    })?;
                }
                if coords.iter().any(|c| !c.is_finite()) {
                    return Err(AnalysisError::DegenerateMesh(
                        "non-finite vertex coordinate".to_string(),
                    ));
                }
                // Optional w component is ignored.
                vertices.push(Point3::new(coords[0], coords[1], coords[2]));
            }
            Some("f") => {
                let mut face: Vec<Point3<f64>> = Vec::new();
                for token in tokens {
                    let index = resolve_index(token, vertices.len(), line_no)?;
                    face.push(vertices[index]);
                }
                if face.len() < 3 {
                    return Err(AnalysisError::UnsupportedFormat(format!(
                        "OBJ face with {} vertices at line {} (expected at least 3)",
                        face.len(),
                        line_no + 1
                    )));
                }
                for i in 1..face.len() - 1 {
                    triangles.push([face[0], face[i], face[i + 1]]);
                }
            }
            // vn / vt / g / o / usemtl / mtllib / s: ignored.
            _ => {}
        }
    }

    Ok(TriangleMesh::new(triangles))
}

/// Resolves a face vertex reference (`i`, `i/j`, `i//k`, `i/j/k`,
/// possibly negative) to a 0-based index into the vertex list.
fn resolve_index(token: &str, vertex_count: usize, line_no: usize) -> Result<usize, AnalysisError> {
    let raw = token.split('/').next().unwrap_or(token);
    let index: i64 = raw.parse().map_err(|_| {
        AnalysisError::UnsupportedFormat(format!(
            "OBJ face with invalid vertex reference '{}' at line {}",
            token,
            line_no + 1
        ))
    })?;

    let resolved = if index > 0 {
        (index - 1) as usize
    } else if index < 0 {
        let from_end = (-index) as usize;
        if from_end > vertex_count {
            return Err(out_of_range(token, line_no));
        }
        vertex_count - from_end
    } else {
        return Err(out_of_range(token, line_no));
    };

    if resolved >= vertex_count {
        return Err(out_of_range(token, line_no));
    }
    Ok(resolved)
}

fn out_of_range(token: &str, line_no: usize) -> AnalysisError {
    AnalysisError::UnsupportedFormat(format!(
        "OBJ face references vertex '{}' out of range at line {}",
        token,
        line_no + 1
    ))
}
