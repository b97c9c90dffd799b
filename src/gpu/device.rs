// gpu/device.rs — wgpu device abstraction.
//
// Responsibilities:
//   - Enumerate adapters on the primary backends (Vulkan, Metal, DX12) and
//     prefer real hardware over software rasterizers.
//   - Expose a `DeviceProfile` for simulating the limits of a small target
//     (cap invocations and storage buffer size to Raspberry Pi values).
//   - Provide `WorkgroupSize`, validated against the active profile and
//     baked into every compute shader.
//   - Buffer plumbing shared by the kernels: allocation inside an
//     out-of-memory error scope, and blocking readback.
//
// ADAPTER SELECTION:
// `request_adapter` with power-preference heuristics can pick llvmpipe on
// machines where the software renderer is listed as a normal device. We
// enumerate explicitly and take hardware first, then anything.
//
// DEVICE LIMITS:
// Under a non-Native profile we request *lower* limits than the hardware
// offers. wgpu validates every binding against the requested limits, so an
// ownership buffer that would not fit on the small device fails on the
// development machine too, as a `ResourceExhaustion` instead of a crash.

use std::fmt;

use thiserror::Error;

use crate::error::TriangulationError;

/// Hardware profile controlling device limits and default workgroup sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceProfile {
    /// Use the adapter's actual limits.
    Native,
    /// Simulate Raspberry Pi 4/5 (VideoCore VI/VII under V3DV): 256
    /// invocations per workgroup, 128 MiB storage bindings.
    RaspberryPi,
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceProfile::Native => write!(f, "Native"),
            DeviceProfile::RaspberryPi => write!(f, "RaspberryPi (simulated limits)"),
        }
    }
}

/// A workgroup size for 2D per-pixel dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    pub fn total(&self) -> u32 {
        self.x * self.y
    }

    /// Substitute `{{WG_X}}` / `{{WG_Y}}` in a WGSL template. naga does not
    /// accept override expressions inside `@workgroup_size`, so the size is
    /// baked into the source text.
    pub fn specialise(&self, template: &str) -> String {
        template
            .replace("{{WG_X}}", &self.x.to_string())
            .replace("{{WG_Y}}", &self.y.to_string())
    }

    /// Native: 16×8 = 128 (four 32-wide warps, two 64-wide wavefronts).
    /// RaspberryPi: 8×8 = 64, well inside the 256 invocation limit.
    fn for_profile(profile: DeviceProfile) -> Self {
        match profile {
            DeviceProfile::Native => WorkgroupSize { x: 16, y: 8 },
            DeviceProfile::RaspberryPi => WorkgroupSize { x: 8, y: 8 },
        }
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{} ({} invocations)", self.x, self.y, self.total())
    }
}

/// Adapter information kept for logging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

/// Adapter, device, queue and active profile.
///
/// Create once and reuse: device creation is far more expensive than a
/// triangulation run.
///
/// # Field drop order
/// Fields drop top to bottom. `_instance` is last so the instance outlives
/// the device and queue; some Vulkan layers crash if the instance goes
/// first.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub profile: DeviceProfile,
    pub adapter_info: AdapterInfo,
    pub workgroup_size: WorkgroupSize,
    pub limits: wgpu::Limits,
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Create a device on the best available adapter with native limits.
    pub fn new() -> Result<Self, GpuError> {
        Self::new_with_profile(DeviceProfile::Native)
    }

    pub fn new_with_profile(profile: DeviceProfile) -> Result<Self, GpuError> {
        pollster::block_on(Self::init_async(profile))
    }

    async fn init_async(profile: DeviceProfile) -> Result<Self, GpuError> {
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::VALIDATION
        } else {
            wgpu::InstanceFlags::empty()
        };
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags,
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(wgpu::Backends::PRIMARY);
        for a in &adapters {
            let info = a.get_info();
            log::info!("adapter: {} ({:?}, {:?})", info.name, info.backend, info.device_type);
        }

        // Hardware first; a software adapter only as a last resort.
        let mut adapters = adapters;
        let pick = adapters
            .iter()
            .position(|a| a.get_info().device_type != wgpu::DeviceType::Cpu)
            .or(if adapters.is_empty() { None } else { Some(0) })
            .ok_or(GpuError::NoSuitableAdapter)?;
        let adapter = adapters.swap_remove(pick);

        let raw_info = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw_info.name.clone(),
            device_type: raw_info.device_type,
            backend: raw_info.backend,
        };

        let profile = match profile {
            DeviceProfile::Native if raw_info.name.to_ascii_lowercase().contains("v3d") => {
                log::info!("V3D adapter detected, using RaspberryPi profile");
                DeviceProfile::RaspberryPi
            }
            other => other,
        };

        let limits = limits_for_profile(profile);
        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("lowpoly"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(GpuError::DeviceRequest)?;

        let workgroup_size = WorkgroupSize::for_profile(profile);
        log::info!("using {adapter_info}, profile {profile}, workgroup {workgroup_size}");

        Ok(GpuDevice {
            device,
            queue,
            profile,
            adapter_info,
            workgroup_size,
            limits,
            _instance: instance,
        })
    }

    /// Override the default workgroup size, validating against the profile.
    pub fn set_workgroup_size(&mut self, x: u32, y: u32) -> Result<(), GpuError> {
        let total = x * y;
        let max = max_invocations_for_profile(self.profile);
        if total > max {
            return Err(GpuError::WorkgroupTooLarge { total, max });
        }
        self.workgroup_size = WorkgroupSize { x, y };
        Ok(())
    }

    /// Workgroup counts covering a `width × height` grid. Shaders guard
    /// against the overhang with `if gid.x >= width || gid.y >= height`.
    pub fn dispatch_size(&self, width: u32, height: u32) -> (u32, u32) {
        dispatch_size(self.workgroup_size, width, height)
    }

    /// Allocate a storage buffer inside an out-of-memory error scope.
    ///
    /// Sizes beyond the requested binding limits are rejected up front;
    /// anything the driver refuses comes back through the error scope.
    /// Both cases map to `ResourceExhaustion`.
    pub fn try_create_buffer(
        &self,
        label: &str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> Result<wgpu::Buffer, TriangulationError> {
        let max = if usage.contains(wgpu::BufferUsages::STORAGE) {
            (self.limits.max_storage_buffer_binding_size as u64).min(self.limits.max_buffer_size)
        } else {
            self.limits.max_buffer_size
        };
        if size > max {
            return Err(TriangulationError::ResourceExhaustion {
                bytes: size,
                reason: format!("{label}: exceeds device limit of {max} bytes"),
            });
        }
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            buffer.destroy();
            return Err(TriangulationError::ResourceExhaustion {
                bytes: size,
                reason: format!("{label}: {err}"),
            });
        }
        Ok(buffer)
    }

    /// Copy `src` into a fresh MAP_READ buffer and read it back as `T`s.
    ///
    /// **Synchronous**: submits, then blocks until the GPU is idle.
    pub fn read_buffer<T: bytemuck::Pod>(
        &self,
        src: &wgpu::Buffer,
        len: usize,
    ) -> Result<Vec<T>, TriangulationError> {
        let size = (len * std::mem::size_of::<T>()) as u64;
        if size == 0 {
            return Ok(Vec::new());
        }
        let staging = self.try_create_buffer(
            "readback",
            size,
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        )?;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("readback") });
        encoder.copy_buffer_to_buffer(src, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            // The receiver outlives the poll below, so a send error cannot happen.
            let _ = tx.send(r);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| GpuError::MapFailed("readback callback never fired".into()))?
            .map_err(|e| GpuError::MapFailed(e.to_string()))?;

        let out = {
            let mapped = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, T>(&mapped).to_vec()
        };
        staging.unmap();
        staging.destroy();
        Ok(out)
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GpuDevice {{ adapter: {}, profile: {}, workgroup: {} }}",
            self.adapter_info, self.profile, self.workgroup_size
        )
    }
}

// ============================================================
// Scoped device buffers
// ============================================================

/// Owns every working buffer of one GPU run and destroys them when dropped,
/// whether the run finished or bailed out with `?` halfway.
///
/// Buffers are addressed by the index `alloc` returns.
pub struct BufferScope<'a> {
    gpu: &'a GpuDevice,
    buffers: Vec<wgpu::Buffer>,
    bytes: u64,
}

impl<'a> BufferScope<'a> {
    pub fn new(gpu: &'a GpuDevice) -> Self {
        BufferScope { gpu, buffers: Vec::new(), bytes: 0 }
    }

    /// Allocate through [`GpuDevice::try_create_buffer`] and keep the buffer.
    pub fn alloc(
        &mut self,
        label: &str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> Result<usize, TriangulationError> {
        let buffer = self.gpu.try_create_buffer(label, size, usage)?;
        self.buffers.push(buffer);
        self.bytes += size;
        Ok(self.buffers.len() - 1)
    }

    pub fn get(&self, index: usize) -> &wgpu::Buffer {
        &self.buffers[index]
    }

    /// Total bytes allocated through this scope.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Drop for BufferScope<'_> {
    fn drop(&mut self) {
        for b in &self.buffers {
            b.destroy();
        }
        log::trace!("released {} buffers ({} bytes)", self.buffers.len(), self.bytes);
    }
}

// Bind group layout entries shared by the compute kernels.

pub(crate) fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn dispatch_size(ws: WorkgroupSize, width: u32, height: u32) -> (u32, u32) {
    (width.div_ceil(ws.x), height.div_ceil(ws.y))
}

// ============================================================
// Limits helpers
// ============================================================

fn limits_for_profile(profile: DeviceProfile) -> wgpu::Limits {
    match profile {
        DeviceProfile::Native => wgpu::Limits::default(),
        DeviceProfile::RaspberryPi => wgpu::Limits {
            max_compute_invocations_per_workgroup: 256,
            max_compute_workgroup_size_x: 256,
            max_compute_workgroup_size_y: 256,
            max_compute_workgroup_size_z: 64,
            max_storage_buffer_binding_size: 128 << 20,
            ..wgpu::Limits::default()
        },
    }
}

fn max_invocations_for_profile(profile: DeviceProfile) -> u32 {
    match profile {
        DeviceProfile::Native => wgpu::Limits::default().max_compute_invocations_per_workgroup,
        DeviceProfile::RaspberryPi => 256,
    }
}

// ============================================================
// Error type
// ============================================================

/// Errors from GPU device initialisation, configuration and readback.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no GPU adapter found on Vulkan/Metal/DX12")]
    NoSuitableAdapter,
    #[error("device request failed: {0}")]
    DeviceRequest(#[source] wgpu::RequestDeviceError),
    #[error("workgroup size {total} exceeds profile limit of {max} invocations")]
    WorkgroupTooLarge { total: u32, max: u32 },
    #[error("buffer readback failed: {0}")]
    MapFailed(String),
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    // GPU tests are #[ignore]d so `cargo test` passes without a GPU.
    // Run them with `cargo test -- --include-ignored`.

    #[test]
    fn test_workgroup_size_total() {
        let ws = WorkgroupSize { x: 16, y: 8 };
        assert_eq!(ws.total(), 128);
        assert_eq!(ws.to_string(), "16×8 (128 invocations)");
    }

    #[test]
    fn test_specialise_template() {
        let ws = WorkgroupSize { x: 8, y: 4 };
        let src = ws.specialise("@workgroup_size({{WG_X}}, {{WG_Y}}, 1)");
        assert_eq!(src, "@workgroup_size(8, 4, 1)");
    }

    #[test]
    fn test_workgroup_size_for_profiles() {
        assert_eq!(WorkgroupSize::for_profile(DeviceProfile::Native), WorkgroupSize { x: 16, y: 8 });
        let rpi = WorkgroupSize::for_profile(DeviceProfile::RaspberryPi);
        assert!(rpi.total() <= 256);
    }

    #[test]
    fn test_dispatch_size_ceiling() {
        let ws = WorkgroupSize { x: 8, y: 8 };
        assert_eq!(dispatch_size(ws, 752, 480), (94, 60));
        assert_eq!(dispatch_size(ws, 100, 100), (13, 13));
        assert_eq!(dispatch_size(ws, 1, 1), (1, 1));
    }

    #[test]
    fn test_rpi_limits_cap_storage() {
        let limits = limits_for_profile(DeviceProfile::RaspberryPi);
        assert_eq!(limits.max_compute_invocations_per_workgroup, 256);
        assert_eq!(limits.max_storage_buffer_binding_size, 128 << 20);
    }

    #[test]
    fn test_native_limits_are_default() {
        assert_eq!(limits_for_profile(DeviceProfile::Native), wgpu::Limits::default());
    }

    // ---- GPU integration tests (subprocess isolation) -------------------
    //
    // Some Vulkan layers crash during process exit once a device has been
    // created. Each real GPU test runs in a child `cargo test` process and
    // prints GPU_TEST_OK as its last action; the parent only checks for that
    // token, not the exit code.

    fn run_gpu_test_in_subprocess(test_name: &str) -> String {
        let output = std::process::Command::new("cargo")
            .args(["test", "--lib", "--", test_name, "--exact", "--ignored", "--nocapture"])
            .output()
            .unwrap_or_else(|e| panic!("failed to spawn subprocess for {test_name}: {e}"));
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        print!("{stdout}");
        eprint!("{stderr}");
        stdout + &stderr
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_gpu_device_init_rpi_profile() {
        let gpu = GpuDevice::new_with_profile(DeviceProfile::RaspberryPi)
            .expect("RPi profile should work on any adapter");
        println!("{gpu}");
        assert_eq!(gpu.workgroup_size, WorkgroupSize { x: 8, y: 8 });
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_oversized_buffer_is_resource_exhaustion() {
        let gpu = GpuDevice::new_with_profile(DeviceProfile::RaspberryPi).expect("need a GPU");
        let err = gpu
            .try_create_buffer("too big", 1 << 30, wgpu::BufferUsages::STORAGE)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ResourceExhaustion);
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_set_workgroup_size_too_large() {
        let mut gpu = GpuDevice::new_with_profile(DeviceProfile::RaspberryPi).expect("need a GPU");
        let err = gpu.set_workgroup_size(16, 17).unwrap_err();
        assert!(matches!(err, GpuError::WorkgroupTooLarge { total: 272, max: 256 }));
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "requires a GPU"]
    fn test_gpu_device_init_rpi_profile() {
        let out = run_gpu_test_in_subprocess("gpu::device::tests::inner_gpu_device_init_rpi_profile");
        assert!(out.contains("GPU_TEST_OK"), "inner test did not print GPU_TEST_OK:\n{out}");
    }

    #[test]
    #[ignore = "requires a GPU"]
    fn test_oversized_buffer_is_resource_exhaustion() {
        let out = run_gpu_test_in_subprocess(
            "gpu::device::tests::inner_oversized_buffer_is_resource_exhaustion",
        );
        assert!(out.contains("GPU_TEST_OK"), "inner test did not print GPU_TEST_OK:\n{out}");
    }

    #[test]
    #[ignore = "requires a GPU"]
    fn test_set_workgroup_size_too_large() {
        let out = run_gpu_test_in_subprocess("gpu::device::tests::inner_set_workgroup_size_too_large");
        assert!(out.contains("GPU_TEST_OK"), "inner test did not print GPU_TEST_OK:\n{out}");
    }
}
