// gpu/flood.rs — GPU jump flooding.
//
// PASS STRUCTURE
// ──────────────
// Two working buffers A and B of rows·cols u32. The seed map is copied into
// A, then for each step of `jfa::flood_steps`:
//
//     pass i:  read A → write B,  swap
//
// Every pass is its own compute pass in the same command encoder. wgpu
// tracks the read-only → read-write usage change of each buffer between
// dispatches and inserts the barrier, so pass i+1 never starts before pass i
// has finished writing. No pixel writes any cell but its own.
//
// After the last pass the result buffer gets one `fill_unset` dispatch,
// with the other buffer bound as the (unused) source.
//
// Each pass needs a different step, so each gets its own small uniform
// buffer and bind group; `queue.write_buffer` between dispatches of one
// submission would only leave the last value visible.

use wgpu::util::DeviceExt;

use crate::gpu::device::{storage_entry, uniform_entry, GpuDevice};
use crate::gpu::seeds::GpuSeedMap;
use crate::jfa::flood_steps;

// ---------------------------------------------------------------------------
// Uniform params (must match WGSL struct FloodParams exactly)
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct FloodParams {
    cols:         u32,
    rows:         u32,
    step:         u32,
    num_vertices: u32,
}

/// Compiled flood and fill kernels.
pub struct GpuFloodPipeline {
    flood: wgpu::ComputePipeline,
    fill:  wgpu::ComputePipeline,
    bgl:   wgpu::BindGroupLayout,
}

impl GpuFloodPipeline {
    pub fn new(gpu: &GpuDevice) -> Self {
        let shader_src = gpu.workgroup_size.specialise(include_str!("../shaders/jump_flood.wgsl"));
        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label:  Some("jump_flood.wgsl"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let bgl = gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("GpuFlood BGL"),
            entries: &[
                // 0 — previous pass (read)
                storage_entry(0, true),
                // 1 — next pass (read_write)
                storage_entry(1, false),
                // 2 — vertex table
                storage_entry(2, true),
                // 3 — params
                uniform_entry(3),
            ],
        });

        let layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("GpuFlood pipeline layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let make = |entry_point: &str| {
            gpu.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label:               Some(entry_point),
                layout:              Some(&layout),
                module:              &shader,
                entry_point,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache:               None,
            })
        };

        GpuFloodPipeline { flood: make("flood_pass"), fill: make("fill_unset"), bgl }
    }

    /// Flood `seeds` using the two working buffers `work`, each at least
    /// `seeds.map_bytes()` long with STORAGE | COPY_DST usage.
    ///
    /// Submits the whole schedule and returns the index into `work` of the
    /// buffer holding the complete ownership map. Does not wait for the GPU;
    /// the next readback or submission on the queue is ordered after it.
    pub fn run(&self, gpu: &GpuDevice, seeds: &GpuSeedMap, work: [&wgpu::Buffer; 2]) -> usize {
        let cols = seeds.cols as u32;
        let rows = seeds.rows as u32;
        let steps = flood_steps(seeds.rows, seeds.cols);
        log::debug!("gpu flood: {rows}×{cols}, steps {steps:?}");

        let (wg_x, wg_y) = gpu.dispatch_size(cols, rows);
        let mut encoder = gpu.device.create_command_encoder(
            &wgpu::CommandEncoderDescriptor { label: Some("GpuFlood") },
        );
        encoder.copy_buffer_to_buffer(&seeds.seeds, 0, work[0], 0, seeds.map_bytes());

        let mut cur = 0usize;
        for &step in &steps {
            let params = FloodParams { cols, rows, step, num_vertices: seeds.num_vertices() as u32 };
            let bind_group = self.bind_group(gpu, seeds, &params, work[cur], work[1 - cur]);
            {
                let mut pass = encoder.begin_compute_pass(
                    &wgpu::ComputePassDescriptor { label: Some("flood_pass"), timestamp_writes: None },
                );
                pass.set_pipeline(&self.flood);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(wg_x, wg_y, 1);
            }
            cur = 1 - cur;
        }

        let params = FloodParams { cols, rows, step: 0, num_vertices: seeds.num_vertices() as u32 };
        let bind_group = self.bind_group(gpu, seeds, &params, work[1 - cur], work[cur]);
        {
            let mut pass = encoder.begin_compute_pass(
                &wgpu::ComputePassDescriptor { label: Some("fill_unset"), timestamp_writes: None },
            );
            pass.set_pipeline(&self.fill);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(wg_x, wg_y, 1);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        cur
    }

    fn bind_group(
        &self,
        gpu: &GpuDevice,
        seeds: &GpuSeedMap,
        params: &FloodParams,
        src: &wgpu::Buffer,
        dst: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        let params_buf = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label:    Some("GpuFlood params"),
            contents: bytemuck::bytes_of(params),
            usage:    wgpu::BufferUsages::UNIFORM,
        });
        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label:  Some("GpuFlood BG"),
            layout: &self.bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: src.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: dst.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: seeds.vertex_table.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: params_buf.as_entire_binding() },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::gpu::device::BufferScope;
    use crate::jfa;
    use crate::ownership::OwnershipMap;

    #[test]
    fn test_params_layout() {
        assert_eq!(std::mem::size_of::<FloodParams>(), 16);
    }

    fn run_gpu_test_in_subprocess(test_name: &str) -> String {
        let output = std::process::Command::new("cargo")
            .args(["test", "--lib", "--", test_name, "--exact", "--ignored", "--nocapture"])
            .output()
            .unwrap_or_else(|e| panic!("subprocess failed for {test_name}: {e}"));
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        print!("{stdout}"); eprint!("{stderr}");
        stdout + &stderr
    }

    fn gpu_flood(gpu: &GpuDevice, verts: &[Point], rows: usize, cols: usize) -> OwnershipMap {
        let seeds = GpuSeedMap::prepare(gpu, verts, rows, cols).expect("seed upload");
        let pipeline = GpuFloodPipeline::new(gpu);
        let usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST;
        let mut scope = BufferScope::new(gpu);
        let a = scope.alloc("A", seeds.map_bytes(), usage).unwrap();
        let b = scope.alloc("B", seeds.map_bytes(), usage).unwrap();
        let res = pipeline.run(gpu, &seeds, [scope.get(a), scope.get(b)]);
        let owners = gpu.read_buffer::<u32>(scope.get([a, b][res]), rows * cols).unwrap();
        OwnershipMap::from_vec(rows, cols, owners).unwrap()
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_flood_matches_cpu_reference() {
        let gpu = GpuDevice::new().expect("need a GPU");
        let mut rng = 99u32;
        let mut next = |m: usize| {
            rng = rng.wrapping_mul(1664525).wrapping_add(1013904223);
            (rng >> 8) as usize % m
        };
        let (rows, cols) = (71, 113);
        let verts: Vec<Point> =
            (0..80).map(|_| Point::new(next(cols) as i32, next(rows) as i32)).collect();

        let got = gpu_flood(&gpu, &verts, rows, cols);
        let want = jfa::build_jump_flood(&verts, rows, cols).unwrap();
        assert!(got.is_complete());
        assert_eq!(got.as_slice(), want.as_slice(), "GPU flood differs from CPU reference");
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_flood_single_vertex() {
        let gpu = GpuDevice::new().expect("need a GPU");
        let got = gpu_flood(&gpu, &[Point::new(0, 0)], 17, 9);
        assert!(got.as_slice().iter().all(|&o| o == 0));
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "requires a GPU"]
    fn test_flood_matches_cpu_reference() {
        let out = run_gpu_test_in_subprocess("gpu::flood::tests::inner_flood_matches_cpu_reference");
        assert!(out.contains("GPU_TEST_OK"), "inner test did not print GPU_TEST_OK:\n{out}");
    }

    #[test]
    #[ignore = "requires a GPU"]
    fn test_flood_single_vertex() {
        let out = run_gpu_test_in_subprocess("gpu::flood::tests::inner_flood_single_vertex");
        assert!(out.contains("GPU_TEST_OK"), "inner test did not print GPU_TEST_OK:\n{out}");
    }
}
