// gpu/mod.rs — GPU triangulation layer.
//
// wgpu compute kernels that mirror the CPU engine. The CPU modules remain
// the reference: the flood kernel is checked against jfa.rs pixel for pixel
// and the extraction kernel against extract.rs triangle for triangle.
//
//   seeds     host vertices → device seed map + vertex table
//   flood     jump-flood passes and the fallback fill
//   extract   2×2 window scan with atomic candidate append
//   engine    GpuTriangulator: owns the working buffers of one run
//
// The only host/device transfers per run are the seed upload (done once
// by the caller) and the readback of the candidate list.

pub mod device;
pub mod engine;
pub mod extract;
pub mod flood;
pub mod seeds;

pub use device::{DeviceProfile, GpuDevice, GpuError};
pub use engine::{triangulate_gpu, GpuTriangulator};
pub use seeds::GpuSeedMap;
