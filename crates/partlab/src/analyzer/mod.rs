//! Geometry analyzer: model file → geometric metrics.
//!
//! Pure with respect to all state except reading the input file, so it is
//! testable without the queue or persistence layer. Format parsers are
//! registered behind the `MeshParser` trait and routed by file extension.

pub mod mesh;
pub mod obj;
pub mod stl;

use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use mesh::TriangleMesh;
pub use obj::ObjParser;
pub use stl::StlParser;

/// Errors from geometry analysis. These are terminal for the affected job
/// and are captured into its record, never propagated to submitters.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("cannot read model file '{path}': {source}")]
    UnreadableFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported model format: {0}")]
    UnsupportedFormat(String),

    #[error("degenerate mesh: {0}")]
    DegenerateMesh(String),

    #[error("internal analysis error: {0}")]
    Internal(String),
}

/// Derived geometric metrics for one model file.
///
/// All values are in the input file's millimeter units. `watertight`
/// records whether the volume figure is physically meaningful: an open
/// mesh always reports `volume_mm3 = 0.0` with `watertight = false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshMetrics {
    pub poly_count: u64,
    pub volume_mm3: f64,
    pub dim_x: f64,
    pub dim_y: f64,
    pub dim_z: f64,
    pub watertight: bool,
}

/// Supported model container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Stl,
    Obj,
}

impl ModelFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "stl" => Some(ModelFormat::Stl),
            "obj" => Some(ModelFormat::Obj),
            _ => None,
        }
    }
}

pub trait MeshParser: Send + Sync {
    fn parse(&self, path: &Path) -> Result<TriangleMesh, AnalysisError>;
    fn supports(&self, format: ModelFormat) -> bool;
}

pub struct AnalyzerRegistry {
    parsers: Vec<Box<dyn MeshParser>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self {
            parsers: vec![Box::new(StlParser::new()), Box::new(ObjParser::new())],
        }
    }

    /// Registry with caller-provided parsers (dependency injection for
    /// formats and for tests).
    pub fn with_parsers(parsers: Vec<Box<dyn MeshParser>>) -> Self {
        Self { parsers }
    }

    /// Analyzes the model file at `path` and returns its metrics.
    pub fn analyze(&self, path: &Path) -> Result<MeshMetrics, AnalysisError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let format = ModelFormat::from_extension(extension).ok_or_else(|| {
            AnalysisError::UnsupportedFormat(format!(
                "unrecognized file extension '{}'",
                extension
            ))
        })?;

        for parser in &self.parsers {
            if parser.supports(format) {
                let mesh = parser.parse(path)?;
                return Ok(Self::metrics_of(path, &mesh));
            }
        }

        Err(AnalysisError::UnsupportedFormat(format!(
            "no parser registered for '{}'",
            extension
        )))
    }

    fn metrics_of(path: &Path, mesh: &TriangleMesh) -> MeshMetrics {
        let [dim_x, dim_y, dim_z] = mesh.bounding_extents();
        let watertight = mesh.is_closed();

        // Open meshes do not enclose a well-defined volume; report zero
        // with the caveat recorded rather than a best-effort estimate.
        let volume_mm3 = if watertight {
            mesh.signed_volume().abs()
        } else {
            warn!(
                "Mesh '{}' is not watertight; reporting zero volume",
                path.display()
            );
            0.0
        };

        MeshMetrics {
            poly_count: mesh.poly_count(),
            volume_mm3,
            dim_x,
            dim_y,
            dim_z,
            watertight,
        }
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
