//! Triangle soup representation and metric computation.
//!
//! Parsers produce a flat list of triangles; all derived metrics
//! (polygon count, bounding box, watertightness, enclosed volume) are
//! computed here without mutating the parsed geometry.

use std::collections::HashMap;

use nalgebra::Point3;

/// A parsed polygonal surface as a triangle soup.
///
/// Coordinates are in the input file's units (millimeters by convention,
/// no conversion is applied).
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
    triangles: Vec<[Point3<f64>; 3]>,
}

impl TriangleMesh {
    pub fn new(triangles: Vec<[Point3<f64>; 3]>) -> Self {
        Self { triangles }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Number of faces. Zero is valid for a degenerate but parseable mesh.
    pub fn poly_count(&self) -> u64 {
        self.triangles.len() as u64
    }

    pub fn triangles(&self) -> &[[Point3<f64>; 3]] {
        &self.triangles
    }

    /// Axis-aligned bounding box extents `[x, y, z]`.
    ///
    /// Collapsed axes (single point, coplanar mesh) yield 0 extents —
    /// valid output, not an error. An empty mesh has all-zero extents.
    pub fn bounding_extents(&self) -> [f64; 3] {
        let mut mins = [f64::INFINITY; 3];
        let mut maxs = [f64::NEG_INFINITY; 3];

        for tri in &self.triangles {
            for v in tri {
                for axis in 0..3 {
                    mins[axis] = mins[axis].min(v[axis]);
                    maxs[axis] = maxs[axis].max(v[axis]);
                }
            }
        }

        if self.triangles.is_empty() {
            return [0.0; 3];
        }

        [maxs[0] - mins[0], maxs[1] - mins[1], maxs[2] - mins[2]]
    }

    /// Tests whether the mesh encloses a volume (no boundary edges).
    ///
    /// Vertices are identified by exact bit pattern, then every undirected
    /// edge must be shared by exactly two faces. Triangle soups written by
    /// exporters repeat shared vertices byte-identically, so exact matching
    /// is deterministic here; approximate welding is out of scope.
    pub fn is_closed(&self) -> bool {
        if self.triangles.is_empty() {
            return false;
        }

        let mut vertex_ids: HashMap<[u64; 3], u32> = HashMap::new();
        let mut edge_count: HashMap<(u32, u32), u32> = HashMap::new();

        let mut id_of = |v: &Point3<f64>| -> u32 {
            let key = [v.x.to_bits(), v.y.to_bits(), v.z.to_bits()];
            let next = vertex_ids.len() as u32;
            *vertex_ids.entry(key).or_insert(next)
        };

        for tri in &self.triangles {
            let ids = [id_of(&tri[0]), id_of(&tri[1]), id_of(&tri[2])];
            for i in 0..3 {
                let (a, b) = (ids[i], ids[(i + 1) % 3]);
                let edge = if a < b { (a, b) } else { (b, a) };
                *edge_count.entry(edge).or_insert(0) += 1;
            }
        }

        edge_count.values().all(|&count| count == 2)
    }

    /// Signed enclosed volume via the divergence theorem
    /// (sum of signed tetrahedron volumes against the origin).
    ///
    /// Only physically meaningful for a closed mesh with consistent
    /// winding; callers decide the open-mesh policy. Zero-area faces
    /// contribute nothing.
    pub fn signed_volume(&self) -> f64 {
        let mut total = 0.0;
        for tri in &self.triangles {
            let v0 = tri[0].coords;
            let v1 = tri[1].coords;
            let v2 = tri[2].coords;
            total += v0.dot(&v1.cross(&v2)) / 6.0;
        }
        total
    }
}
