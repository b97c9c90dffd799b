// lowpoly.rs — Image in, low-poly image out.
//
//   Image<Rgb> ──gray──▶ gradient::edge_map ──▶ sampler ──▶ vertices
//                                                              │
//                         CPU: engine::triangulate_cpu_with ◀──┤
//                         GPU: GpuSeedMap + GpuTriangulator ◀──┘
//                                        │
//                                        ▼
//                         render::paint_triangles ──▶ output image
//
// The CPU backend also returns its ownership map, which the demo turns into
// the Voronoi debug image. The GPU backend never brings the map back.

use std::time::{Duration, Instant};

use crate::engine::{triangulate_cpu_with, EngineConfig};
use crate::error::Result;
use crate::geometry::{Point, TriangleSet};
use crate::gpu::{GpuDevice, GpuSeedMap, GpuTriangulator};
use crate::gradient::edge_map;
use crate::image::{Image, Rgb};
use crate::ownership::OwnershipMap;
use crate::render::paint_triangles;
use crate::sampler::{sample_vertices, SamplerConfig};

/// Which engine triangulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    Cpu,
    #[default]
    Gpu,
}

/// Full pipeline settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowPolyConfig {
    pub sampler: SamplerConfig,
    pub engine: EngineConfig,
    pub backend: Backend,
}

/// Everything one run produces.
pub struct LowPolyOutput {
    /// Normalised gradient magnitude the vertices were drawn from.
    pub edges: Image<f32>,
    pub vertices: Vec<Point>,
    pub triangles: TriangleSet,
    /// Present for the CPU backend only.
    pub ownership: Option<OwnershipMap>,
    /// The painted low-poly image.
    pub image: Image<Rgb>,
    /// Wall time of the triangulation step alone.
    pub triangulation_time: Duration,
}

/// Run the pipeline on `image`. With `Backend::Gpu` a device is created
/// for this call; use [`generate_on`] to reuse one.
pub fn generate(image: &Image<Rgb>, config: &LowPolyConfig) -> Result<LowPolyOutput> {
    match config.backend {
        Backend::Cpu => run(image, config, None),
        Backend::Gpu => {
            let gpu = GpuDevice::new()?;
            run(image, config, Some(&gpu))
        }
    }
}

/// Run the pipeline on an existing device, whatever `config.backend` says.
pub fn generate_on(gpu: &GpuDevice, image: &Image<Rgb>, config: &LowPolyConfig) -> Result<LowPolyOutput> {
    run(image, config, Some(gpu))
}

fn run(image: &Image<Rgb>, config: &LowPolyConfig, gpu: Option<&GpuDevice>) -> Result<LowPolyOutput> {
    let (rows, cols) = (image.height(), image.width());
    let edges = edge_map(&image.to_gray());
    let vertices = sample_vertices(&edges, &config.sampler);

    let start = Instant::now();
    let (triangles, ownership) = match gpu {
        None => {
            let (t, map) = triangulate_cpu_with(&config.engine, &vertices, rows, cols)?;
            (t, Some(map))
        }
        Some(gpu) => {
            let seeds = GpuSeedMap::prepare(gpu, &vertices, rows, cols)?;
            let mut engine = GpuTriangulator::new(gpu);
            engine.degeneracy_tolerance = config.engine.degeneracy_tolerance;
            (engine.triangulate(gpu, &seeds)?, None)
        }
    };
    let triangulation_time = start.elapsed();
    log::info!(
        "lowpoly: {} vertices → {} triangles in {:.2} ms ({})",
        vertices.len(),
        triangles.len(),
        triangulation_time.as_secs_f64() * 1e3,
        if gpu.is_some() { "gpu" } else { "cpu" }
    );

    let painted = paint_triangles(image, &vertices, &triangles);
    Ok(LowPolyOutput { edges, vertices, triangles, ownership, image: painted, triangulation_time })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn quadrant_image() -> Image<Rgb> {
        let mut img = Image::filled(40, 30, Rgb::new(20, 40, 60));
        for y in 0..15 {
            for x in 0..20 {
                img.set(x, y, Rgb::new(220, 200, 30));
            }
        }
        img
    }

    #[test]
    fn test_cpu_pipeline() {
        let config = LowPolyConfig {
            sampler: SamplerConfig { num_vertices: 60, ..Default::default() },
            backend: Backend::Cpu,
            ..Default::default()
        };
        let out = generate(&quadrant_image(), &config).unwrap();
        assert!(out.vertices.len() <= 60);
        assert!(!out.triangles.is_empty());
        let map = out.ownership.as_ref().unwrap();
        assert!(map.is_complete());
        assert_eq!((out.image.width(), out.image.height()), (40, 30));
        for t in &out.triangles {
            assert!(t.is_valid_for(out.vertices.len()));
        }
    }

    #[test]
    fn test_too_few_vertices_is_degenerate() {
        let config = LowPolyConfig {
            sampler: SamplerConfig { num_vertices: 2, include_corners: true, ..Default::default() },
            backend: Backend::Cpu,
            ..Default::default()
        };
        let err = generate(&quadrant_image(), &config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::DegenerateGeometry);
    }
}
