// lowpoly: discrete-Voronoi triangulation for low-poly image rendering.
// CPU reference engine plus a wgpu jump-flooding engine validated against it.
//
// Reference: Rong, Tan — "Jump Flooding in GPU with Applications to Voronoi
// Diagram and Distance Transform" (I3D 2006)

pub mod error;
pub mod geometry;
pub mod ownership;
pub mod jfa;
pub mod extract;
pub mod engine;
pub mod gpu;

pub mod image;
pub mod gradient;
pub mod sampler;
pub mod points_file;
pub mod render;
pub mod lowpoly;

pub use engine::{triangulate_cpu, triangulate_cpu_with, EngineConfig};
pub use error::{ErrorKind, Result, TriangulationError};
pub use geometry::{Point, Triangle, TriangleSet};
pub use gpu::{triangulate_gpu, GpuSeedMap, GpuTriangulator};
pub use ownership::{OwnershipMap, OwnershipMethod};
