//! `ComputeBackend` implementations for `enginecl-core`.
//!
//! - [`cpu::CpuBackend`] — an in-process reference backend that runs
//!   registered Rust closures as "kernels". Exercised by every test in the
//!   workspace and by the demo CLI's `--check` mode; not a performance
//!   vehicle.
//! - `ocl::OclBackend` (feature `opencl`) — a real binding to OpenCL devices
//!   through the `ocl` crate, matching the spec's "vendor-neutral compute
//!   API such as OpenCL" language.

pub mod cpu;

#[cfg(feature = "opencl")]
pub mod ocl_backend;

pub use cpu::{CpuBackend, CpuKernelCtx, CpuKernelFn, CpuSession};

#[cfg(feature = "opencl")]
pub use ocl_backend::{OclBackend, OclSession};
