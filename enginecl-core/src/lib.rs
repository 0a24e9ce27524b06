//! Scheduling core for multi-device, data-parallel compute kernels.
//!
//! A [`Runtime`] drives a fixed set of devices through one [`Scheduler`]
//! discipline — [`StaticScheduler`] for an up-front proportional split, or
//! [`DynamicScheduler`] for chunk-at-a-time load balancing — against
//! whatever [`ComputeBackend`] the caller supplies. The core itself never
//! touches a vendor compute API; `enginecl-backend` supplies the
//! implementations.

pub mod backend;
pub mod buffer;
pub mod device;
pub mod error;
pub mod gate;
pub mod inspector;
pub mod ndrange;
pub mod runtime;
pub mod scheduler;
pub mod work;

pub use backend::{
    ChunkDispatch, CompletionCallback, ComputeBackend, DeviceInfo, DeviceSession, KernelArg, ProgramSource,
    ReadBackMode,
};
pub use buffer::{BufferDescriptor, BufferHandle, Direction, HostSlice};
pub use device::DeviceExecutor;
pub use error::{EngineError, Result};
pub use gate::CountingGate;
pub use inspector::{ActionType, DeviceStats, RunStats};
pub use ndrange::NDRange;
pub use runtime::Runtime;
pub use scheduler::{DynamicScheduler, Scheduler, SplitMode, StaticScheduler};
pub use work::{ChunkRecord, Work};
