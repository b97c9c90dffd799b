// error.rs — Failure outcomes of a triangulation run.
//
// Every variant is a hard failure for the call that produced it: the engine
// never hands back a partially filled triangle set. Tie-breaks and the
// unset-cell fallback scan are ordinary parts of the algorithm and never
// surface here.
//
// The variants group into the three kinds callers care about (see
// `ErrorKind`), plus the collaborator failures (file I/O, GPU device).

use thiserror::Error;

use crate::gpu::device::GpuError;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TriangulationError>;

/// Coarse classification of a [`TriangulationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Empty vertex set, zero-area raster, out-of-bounds vertex, bad input file.
    InvalidInput,
    /// A device buffer could not be allocated.
    ResourceExhaustion,
    /// The ownership map was valid but produced no usable triangle.
    DegenerateGeometry,
    /// GPU adapter/device/readback failure.
    Device,
    /// Reading a vertex source failed.
    Io,
}

#[derive(Debug, Error)]
pub enum TriangulationError {
    #[error("vertex set is empty")]
    EmptyVertexSet,

    #[error("raster extent {rows}×{cols} has zero area")]
    EmptyRaster { rows: usize, cols: usize },

    #[error("vertex {index} at ({x}, {y}) lies outside the {rows}×{cols} raster")]
    VertexOutOfBounds {
        index: usize,
        x: i32,
        y: i32,
        rows: usize,
        cols: usize,
    },

    #[error("raster extent {rows}×{cols} exceeds the supported limit ({max})")]
    RasterTooLarge { rows: usize, cols: usize, max: usize },

    #[error("{count} vertices exceed the vertex ID space")]
    TooManyVertices { count: usize },

    #[error("buffer holds {actual} elements, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("vertex file line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("device allocation of {bytes} bytes failed: {reason}")]
    ResourceExhaustion { bytes: u64, reason: String },

    #[error("no non-degenerate triangle could be extracted from {vertices} vertices")]
    DegenerateGeometry { vertices: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Gpu(#[from] GpuError),
}

impl TriangulationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TriangulationError::EmptyVertexSet
            | TriangulationError::EmptyRaster { .. }
            | TriangulationError::VertexOutOfBounds { .. }
            | TriangulationError::RasterTooLarge { .. }
            | TriangulationError::TooManyVertices { .. }
            | TriangulationError::BufferSizeMismatch { .. }
            | TriangulationError::Parse { .. } => ErrorKind::InvalidInput,
            TriangulationError::ResourceExhaustion { .. } => ErrorKind::ResourceExhaustion,
            TriangulationError::DegenerateGeometry { .. } => ErrorKind::DegenerateGeometry,
            TriangulationError::Io(_) => ErrorKind::Io,
            TriangulationError::Gpu(_) => ErrorKind::Device,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(TriangulationError::EmptyVertexSet.kind(), ErrorKind::InvalidInput);
        assert_eq!(
            TriangulationError::EmptyRaster { rows: 0, cols: 4 }.kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            TriangulationError::ResourceExhaustion { bytes: 16, reason: "oom".into() }.kind(),
            ErrorKind::ResourceExhaustion
        );
        assert_eq!(
            TriangulationError::DegenerateGeometry { vertices: 1 }.kind(),
            ErrorKind::DegenerateGeometry
        );
    }

    #[test]
    fn test_display_mentions_coordinates() {
        let e = TriangulationError::VertexOutOfBounds { index: 3, x: 12, y: -1, rows: 10, cols: 10 };
        let msg = e.to_string();
        assert!(msg.contains("vertex 3"), "{msg}");
        assert!(msg.contains("(12, -1)"), "{msg}");
    }
}
