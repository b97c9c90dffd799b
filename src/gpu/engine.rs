// gpu/engine.rs — GPU triangulation engine.
//
// One call:
//
//   GpuSeedMap (device-resident, prepared by the sampler side)
//        │ BufferScope: allocate working buffers A, B
//        ▼
//   GpuFloodPipeline::run        seed copy → flood passes → fill_unset
//        ▼
//   GpuExtractPipeline::run      atomic candidate list → host TriangleSet
//        ▼
//   scope dropped: A and B destroyed, on success and on every `?` exit
//
// Nothing allocated here outlives the call. The seed map belongs to the
// caller and is only read, so triangulating the same seeds twice gives the
// same set.

use crate::error::{Result, TriangulationError};
use crate::geometry::{TriangleSet, DEGENERACY_TOLERANCE};
use crate::gpu::device::{BufferScope, GpuDevice};
use crate::gpu::extract::GpuExtractPipeline;
use crate::gpu::flood::GpuFloodPipeline;
use crate::gpu::seeds::GpuSeedMap;
use crate::ownership::OwnershipMap;

/// Compiled GPU pipelines plus extraction settings.
///
/// Create once per device; shader compilation dominates a small run.
pub struct GpuTriangulator {
    flood: GpuFloodPipeline,
    extract: GpuExtractPipeline,
    pub degeneracy_tolerance: f64,
}

impl GpuTriangulator {
    pub fn new(gpu: &GpuDevice) -> Self {
        GpuTriangulator {
            flood: GpuFloodPipeline::new(gpu),
            extract: GpuExtractPipeline::new(gpu),
            degeneracy_tolerance: DEGENERACY_TOLERANCE,
        }
    }

    /// Flood `seeds` and extract the triangle set.
    ///
    /// Fails with `ResourceExhaustion` if a working buffer cannot be
    /// allocated and with `DegenerateGeometry` if no triangle survives.
    pub fn triangulate(&self, gpu: &GpuDevice, seeds: &GpuSeedMap) -> Result<TriangleSet> {
        let mut scope = BufferScope::new(gpu);
        let owners = self.flood_into(gpu, seeds, &mut scope)?;
        let triangles = self.extract.run(gpu, seeds, scope.get(owners), self.degeneracy_tolerance)?;
        log::debug!(
            "gpu engine: {} vertices, {}×{} raster → {} triangles ({} working bytes)",
            seeds.num_vertices(),
            seeds.rows,
            seeds.cols,
            triangles.len(),
            scope.bytes()
        );
        if triangles.is_empty() {
            return Err(TriangulationError::DegenerateGeometry { vertices: seeds.num_vertices() });
        }
        Ok(triangles)
    }

    /// Flood `seeds` and read the ownership map back to the host.
    pub fn build_ownership(&self, gpu: &GpuDevice, seeds: &GpuSeedMap) -> Result<OwnershipMap> {
        let mut scope = BufferScope::new(gpu);
        let owners = self.flood_into(gpu, seeds, &mut scope)?;
        let cells = gpu.read_buffer::<u32>(scope.get(owners), seeds.rows * seeds.cols)?;
        OwnershipMap::from_vec(seeds.rows, seeds.cols, cells)
    }

    /// Allocate the ping-pong pair in `scope`, run the flood and return the
    /// scope index of the buffer holding the result.
    fn flood_into(&self, gpu: &GpuDevice, seeds: &GpuSeedMap, scope: &mut BufferScope) -> Result<usize> {
        let usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST;
        let a = scope.alloc("ownership A", seeds.map_bytes(), usage)?;
        let b = scope.alloc("ownership B", seeds.map_bytes(), usage)?;
        let res = self.flood.run(gpu, seeds, [scope.get(a), scope.get(b)]);
        Ok([a, b][res])
    }
}

/// One-shot GPU triangulation: compiles the pipelines and runs once.
/// Prefer a long-lived [`GpuTriangulator`] when triangulating repeatedly.
pub fn triangulate_gpu(gpu: &GpuDevice, seeds: &GpuSeedMap) -> Result<TriangleSet> {
    GpuTriangulator::new(gpu).triangulate(gpu, seeds)
}
