// engine.rs — CPU triangulation engine.
//
// Pipeline for one run:
//
//   vertices, rows, cols
//        │ validate         (InvalidInput on empty set / zero raster / out of bounds)
//        ▼
//   ownership::build        (brute force, grid or jump flood)
//        ▼
//   Extractor::extract      (2×2 windows → deduplicated triangles)
//        ▼
//   (TriangleSet, OwnershipMap)   or DegenerateGeometry if no triangle survived
//
// Each call is a pure function of its arguments. Nothing is cached between
// runs, so two calls with the same input produce the same triangle set.
//
// The ownership map is returned alongside the triangles because the
// renderer uses it for the Voronoi debug image. The GPU engine lives in
// gpu/engine.rs and only returns triangles.

use crate::error::{Result, TriangulationError};
use crate::extract::Extractor;
use crate::geometry::{Point, TriangleSet, DEGENERACY_TOLERANCE};
use crate::ownership::{self, OwnershipMap, OwnershipMethod};

/// Engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// How the CPU path fills the ownership map.
    pub ownership: OwnershipMethod,
    /// Collinearity threshold on the doubled triangle area.
    pub degeneracy_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            ownership: OwnershipMethod::Grid,
            degeneracy_tolerance: DEGENERACY_TOLERANCE,
        }
    }
}

/// Triangulate `vertices` on a `rows × cols` raster with the default
/// configuration.
pub fn triangulate_cpu(
    vertices: &[Point],
    rows: usize,
    cols: usize,
) -> Result<(TriangleSet, OwnershipMap)> {
    triangulate_cpu_with(&EngineConfig::default(), vertices, rows, cols)
}

/// Triangulate with an explicit configuration.
pub fn triangulate_cpu_with(
    config: &EngineConfig,
    vertices: &[Point],
    rows: usize,
    cols: usize,
) -> Result<(TriangleSet, OwnershipMap)> {
    let map = ownership::build(vertices, rows, cols, config.ownership)?;
    debug_assert!(map.is_complete(), "ownership builder left unset cells");

    let triangles = Extractor::new(config.degeneracy_tolerance).extract(&map, vertices);
    log::debug!(
        "cpu engine ({}): {} vertices, {}×{} raster → {} triangles",
        config.ownership,
        vertices.len(),
        rows,
        cols,
        triangles.len()
    );
    if triangles.is_empty() {
        return Err(TriangulationError::DegenerateGeometry { vertices: vertices.len() });
    }
    Ok((triangles, map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::geometry::Triangle;

    #[test]
    fn test_square_corners_give_two_triangles() {
        let verts = [Point::new(0, 0), Point::new(9, 0), Point::new(0, 9), Point::new(9, 9)];
        let (tris, map) = triangulate_cpu(&verts, 10, 10).unwrap();
        assert_eq!(map.region_sizes(4), vec![25, 25, 25, 25]);
        assert_eq!(tris.len(), 2);
        assert!(tris.contains(&Triangle::new(0, 1, 3).unwrap()));
        assert!(tris.contains(&Triangle::new(0, 2, 3).unwrap()));
    }

    #[test]
    fn test_every_method_agrees_on_square() {
        let verts = [Point::new(0, 0), Point::new(9, 0), Point::new(0, 9), Point::new(9, 9)];
        let reference = triangulate_cpu(&verts, 10, 10).unwrap().0;
        for method in [OwnershipMethod::BruteForce, OwnershipMethod::JumpFlood] {
            let config = EngineConfig { ownership: method, ..Default::default() };
            let (tris, _) = triangulate_cpu_with(&config, &verts, 10, 10).unwrap();
            assert_eq!(tris, reference, "{method} disagrees");
        }
    }

    #[test]
    fn test_single_vertex_is_degenerate() {
        let err = triangulate_cpu(&[Point::new(3, 3)], 8, 8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DegenerateGeometry);
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(triangulate_cpu(&[], 8, 8).unwrap_err().kind(), ErrorKind::InvalidInput);
        assert_eq!(
            triangulate_cpu(&[Point::new(0, 0)], 0, 8).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            triangulate_cpu(&[Point::new(8, 0)], 8, 8).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
    }
}
