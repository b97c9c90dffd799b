// gpu/seeds.rs — Device-resident seed map.
//
// On the GPU path vertex selection and seeding are fused: the sampler's
// vertices go straight into a `rows × cols` u32 buffer on the device, with
// each vertex's home pixel set to its ID and every other cell unset
// (0xffffffff). The triangulator consumes that buffer without ever seeing a
// host ownership map.
//
// Alongside the seed buffer we upload the vertex table, `array<vec2<i32>>`
// in WGSL, which the flood and extract kernels index by owner ID. A host
// copy of the vertices is kept for the renderer and for host-side checks.
//
// The seed buffer is never written by the engine: each run copies it into
// its own working buffer, so one `GpuSeedMap` can be triangulated any number
// of times.

use crate::error::{Result, TriangulationError};
use crate::geometry::Point;
use crate::gpu::device::GpuDevice;
use crate::jfa;

/// Largest raster side the GPU kernels accept. Squared distances are
/// computed in i32, and (16384² · 2) still fits.
pub const MAX_GPU_EXTENT: usize = 16384;

/// One vertex as laid out in the WGSL `array<vec2<i32>>`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub x: i32,
    pub y: i32,
}

impl From<Point> for GpuVertex {
    fn from(p: Point) -> Self {
        GpuVertex { x: p.x, y: p.y }
    }
}

/// A seeded ownership buffer and vertex table resident on the device.
pub struct GpuSeedMap {
    /// `rows × cols` u32 cells, STORAGE | COPY_SRC | COPY_DST.
    pub seeds: wgpu::Buffer,
    /// `|V|` × `GpuVertex`, STORAGE | COPY_DST.
    pub vertex_table: wgpu::Buffer,
    pub rows: usize,
    pub cols: usize,
    vertices: Vec<Point>,
}

impl GpuSeedMap {
    /// Validate `vertices` against the raster and upload the seed map.
    ///
    /// Fails with `InvalidInput` for an empty set, a zero or oversized
    /// raster, or an out-of-bounds vertex, and with `ResourceExhaustion` if
    /// the device cannot hold the buffers.
    pub fn prepare(gpu: &GpuDevice, vertices: &[Point], rows: usize, cols: usize) -> Result<Self> {
        if rows > MAX_GPU_EXTENT || cols > MAX_GPU_EXTENT {
            return Err(TriangulationError::RasterTooLarge { rows, cols, max: MAX_GPU_EXTENT });
        }
        let host = jfa::seed_map(vertices, rows, cols)?;

        let seed_bytes = (host.as_slice().len() * std::mem::size_of::<u32>()) as u64;
        let seeds = gpu.try_create_buffer(
            "seed map",
            seed_bytes,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        )?;
        gpu.queue.write_buffer(&seeds, 0, bytemuck::cast_slice(host.as_slice()));

        let table: Vec<GpuVertex> = vertices.iter().copied().map(GpuVertex::from).collect();
        let table_bytes = (table.len() * std::mem::size_of::<GpuVertex>()) as u64;
        let vertex_table = match gpu.try_create_buffer(
            "vertex table",
            table_bytes,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        ) {
            Ok(b) => b,
            Err(e) => {
                seeds.destroy();
                return Err(e);
            }
        };
        gpu.queue.write_buffer(&vertex_table, 0, bytemuck::cast_slice(&table));

        log::debug!(
            "seed map: {} vertices on {rows}×{cols}, {} bytes on device",
            vertices.len(),
            seed_bytes + table_bytes
        );
        Ok(GpuSeedMap { seeds, vertex_table, rows, cols, vertices: vertices.to_vec() })
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Size of one ownership buffer for this raster, in bytes.
    pub fn map_bytes(&self) -> u64 {
        (self.rows * self.cols * std::mem::size_of::<u32>()) as u64
    }
}
