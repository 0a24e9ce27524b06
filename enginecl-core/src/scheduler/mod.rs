//! Scheduling disciplines.
//!
//! A `Scheduler` owns the global-to-per-device work split and the
//! bookkeeping that lets device worker threads pull (or get pushed) their
//! next chunk. `StaticScheduler` computes the whole split once, up front;
//! `DynamicScheduler` hands out fixed-size chunks on demand through a
//! request ring so faster devices naturally finish more chunks.

mod dynamic_sched;
mod static_sched;

pub use dynamic_sched::DynamicScheduler;
pub use static_sched::{SplitMode, StaticScheduler};

use crate::error::Result;
use crate::ndrange::NDRange;
use crate::work::Work;

/// Capability set every scheduling discipline implements. Object-safe so
/// `Runtime` and `DeviceExecutor` can hold it as `Arc<dyn Scheduler>`
/// without committing to a discipline at compile time.
pub trait Scheduler: Send + Sync {
    fn set_devices(&self, count: usize);
    fn set_total_size(&self, total: usize);
    fn set_gws(&self, gws: NDRange) -> Result<()>;
    fn set_lws(&self, lws: usize);
    fn set_out_pattern(&self, out_workitems: usize, out_positions: usize);

    /// Computes each device's static share (no-op for disciplines that
    /// don't partition up front).
    fn calc_proportions(&self) -> Result<()>;

    /// A device's first bid for work. Only ever called once per device,
    /// right after it clears the run gate; every subsequent assignment
    /// flows from `callback`.
    fn request_work(&self, device_id: usize) -> Result<()>;

    /// Blocks the calling device thread until a chunk (or the shutdown
    /// sentinel, `None`) is ready for it.
    fn wait_work(&self, device_id: usize) -> Option<Work>;

    /// Reports a completed chunk and arms the device's next assignment (or
    /// its shutdown sentinel).
    fn callback(&self, device_id: usize, work: Work);

    /// Runs this scheduler's driver to completion, spawning whatever
    /// background bookkeeping the discipline needs (the dynamic
    /// scheduler's request-ring drainer). Returns once every device has
    /// been handed its shutdown sentinel.
    fn drive(&self) -> Result<()>;

    fn print_stats(&self);
}
