//! STL parsing (binary and ASCII, auto-detected).
//!
//! Binary layout: 80-byte header, u32 LE triangle count, then 50 bytes per
//! triangle (normal 3×f32, vertices 9×f32, u16 attribute). ASCII files
//! start with `solid` and list `facet`/`outer loop`/`vertex` blocks.
//! Some exporters write binary files whose header begins with "solid",
//! so detection also requires a `facet` token in the body.

use std::path::Path;

use nalgebra::Point3;

use super::mesh::TriangleMesh;
use super::{AnalysisError, MeshParser, ModelFormat};

const BINARY_HEADER_LEN: usize = 80;
const BINARY_TRIANGLE_LEN: usize = 50;

pub struct StlParser;

impl StlParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_bytes(&self, path: &Path, bytes: &[u8]) -> Result<TriangleMesh, AnalysisError> {
        if looks_like_ascii(bytes) {
            parse_ascii(bytes)
        } else {
            parse_binary(bytes)
        }
        .map_err(|e| match e {
            // Attach the path to bare parse failures for readable diagnostics.
            AnalysisError::UnsupportedFormat(msg) => AnalysisError::UnsupportedFormat(format!(
                "{} (in '{}')",
                msg,
                path.display()
            )),
            other => other,
        })
    }
}

impl Default for StlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshParser for StlParser {
    fn parse(&self, path: &Path) -> Result<TriangleMesh, AnalysisError> {
        let bytes = std::fs::read(path).map_err(|e| AnalysisError::UnreadableFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.parse_bytes(path, &bytes)
    }

    fn supports(&self, format: ModelFormat) -> bool {
        format == ModelFormat::Stl
    }
}

/// ASCII detection: leading `solid` keyword plus a `facet` token somewhere
/// in the body. A binary file with a "solid ..." header lacks the latter
/// in all but pathological cases.
fn looks_like_ascii(bytes: &[u8]) -> bool {
    let head: Vec<u8> = bytes
        .iter()
        .copied()
        .skip_while(|b| b.is_ascii_whitespace())
        .take(5)
        .collect();
    head == b"solid" && contains_token(bytes, b"facet")
}

fn contains_token(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}

fn parse_binary(bytes: &[u8]) -> Result<TriangleMesh, AnalysisError> {
    if bytes.len() < BINARY_HEADER_LEN + 4 {
        return Err(AnalysisError::UnsupportedFormat(format!(
            "binary STL too short: {} bytes",
            bytes.len()
        )));
    }

    let count_bytes: [u8; 4] = bytes[BINARY_HEADER_LEN..BINARY_HEADER_LEN + 4]
        .try_into()
        .map_err(|_| AnalysisError::Internal("STL triangle count read failed".to_string()))?;
    let count = u32::from_le_bytes(count_bytes) as usize;

    let expected = BINARY_HEADER_LEN + 4 + count * BINARY_TRIANGLE_LEN;
    if bytes.len() < expected {
        return Err(AnalysisError::UnsupportedFormat(format!(
            "binary STL truncated: header declares {} triangles ({} bytes) but file has {}",
            count,
            expected,
            bytes.len()
        )));
    }

    let mut triangles = Vec::with_capacity(count);
    let mut offset = BINARY_HEADER_LEN + 4;
    for _ in 0..count {
        // Skip the 12-byte facet normal; it is recomputed where needed.
        let mut coords = [0.0f64; 9];
        for (i, coord) in coords.iter_mut().enumerate() {
            let start = offset + 12 + i * 4;
            let raw: [u8; 4] = bytes[start..start + 4]
                .try_into()
                .map_err(|_| AnalysisError::Internal("STL vertex read failed".to_string()))?;
            *coord = f32::from_le_bytes(raw) as f64;
        }
        push_triangle(&mut triangles, &coords)?;
        offset += BINARY_TRIANGLE_LEN;
    }

    Ok(TriangleMesh::new(triangles))
}

fn parse_ascii(bytes: &[u8]) -> Result<TriangleMesh, AnalysisError> {
    let text = std::str::from_utf8(bytes).map_err(|_| {
        AnalysisError::UnsupportedFormat("ASCII STL contains invalid UTF-8".to_string())
    })?;

    let mut triangles = Vec::new();
    let mut facet_vertices: Vec<f64> = Vec::with_capacity(9);
    let mut in_facet = false;

    for (line_no, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("facet") => {
                in_facet = true;
                facet_vertices.clear();
            }
            Some("vertex") => {
                if !in_facet {
                    return Err(AnalysisError::UnsupportedFormat(format!(
                        "STL vertex outside facet at line {}",
                        line_no + 1
                    )));
                }
                for _ in 0..3 {
                    let token = tokens.next().ok_or_else(|| {
                        AnalysisError::UnsupportedFormat(format!(
                            "STL vertex with missing coordinate at line {}",
                            line_no + 1
                        ))
                    })?;
                    let value: f64 = token.parse().map_err(|_| {
                        AnalysisError::UnsupportedFormat(format!(
                            "STL vertex with non-numeric coordinate '{}' at line {}",
                            token,
                            line_no + 1
                        ))
                    })?;
                    facet_vertices.push(value);
                }
            }
            Some("endfacet") => {
                if facet_vertices.len() != 9 {
                    return Err(AnalysisError::UnsupportedFormat(format!(
                        "STL facet with {} vertices at line {} (expected 3)",
                        facet_vertices.len() / 3,
                        line_no + 1
                    )));
                }
                let mut coords = [0.0f64; 9];
                coords.copy_from_slice(&facet_vertices);
                push_triangle(&mut triangles, &coords)?;
                in_facet = false;
            }
            // solid / endsolid / outer loop / endloop / normals: ignored.
            _ => {}
        }
    }

    if in_facet {
        return Err(AnalysisError::UnsupportedFormat(
            "STL ends inside an unterminated facet".to_string(),
        ));
    }

    Ok(TriangleMesh::new(triangles))
}

fn push_triangle(
    triangles: &mut Vec<[Point3<f64>; 3]>,
    coords: &[f64; 9],
) -> Result<(), AnalysisError> {
    if coords.iter().any(|c| !c.is_finite()) {
        return Err(AnalysisError::DegenerateMesh(
            "non-finite vertex coordinate".to_string(),
        ));
    }
    triangles.push([
        Point3::new(coords[0], coords[1], coords[2]),
        Point3::new(coords[3], coords[4], coords[5]),
        Point3::new(coords[6], coords[7], coords[8]),
    ]);
    Ok(())
}
