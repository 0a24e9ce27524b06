//! The vendor-neutral compute API boundary.
//!
//! `ComputeBackend` is the seam the rest of the core is generic over: it
//! abstracts over whatever compute API actually enqueues work on a device
//! (OpenCL through the `ocl` crate, or an in-process CPU reference used by
//! tests). A backend owns platform/device discovery and per-device queues;
//! the core never touches a vendor handle directly.

use crate::buffer::{BufferHandle, HostSlice};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub platform_index: u32,
    pub device_index: u32,
    pub name: String,
}

/// Where a kernel's source comes from. Mirrors the three ways the original
/// could build a program.
#[derive(Debug, Clone)]
pub enum ProgramSource {
    Source(String),
    CustomSource { source: String, build_opts: String },
    CustomBinary { binary: Vec<u8>, build_opts: String },
}

/// One kernel argument, resolved to either a device buffer or raw bytes.
/// Argument binding walks the input-buffer list first, then the
/// output-buffer list, then falls back to `Scalar`/`LocalAlloc` — the same
/// resolution order the original followed when it matched argument
/// pointers against its buffer tables.
#[derive(Debug, Clone)]
pub enum KernelArg {
    Scalar(Vec<u8>),
    VectorRef(BufferHandle),
    LocalAlloc(usize),
}

/// One device-bound chunk of work, ready to enqueue.
#[derive(Debug, Clone, Copy)]
pub struct ChunkDispatch {
    pub offset: usize,
    pub size: usize,
    pub local_work_size: usize,
}

pub enum ReadBackMode {
    Blocking,
    Async,
}

/// Invoked from the backend's own completion thread once a chunk's output
/// has been read back to the host. Must be cheap: the device executor runs
/// its whole bookkeeping step (counters, next dispatch) from inside it.
pub type CompletionCallback = Box<dyn FnOnce() + Send>;

/// A handle to one opened device session: a platform+device pair with its
/// context, command queue and compiled program bound.
pub trait DeviceSession: Send {
    /// Enqueue `dispatch`, binding `args` by position, and invoke
    /// `on_complete` once the chunk's declared output buffers have been
    /// copied back to the host. `global_offset` selects between native
    /// device-side offset support and the trailing `uint offset` kernel
    /// argument convention the backend falls back to when the device
    /// lacks it.
    fn enqueue(
        &self,
        kernel: &str,
        dispatch: ChunkDispatch,
        args: &[KernelArg],
        read_back: ReadBackMode,
        on_complete: CompletionCallback,
    ) -> Result<()>;

    /// Blocks until every previously enqueued operation on this session's
    /// queue has completed. Used once at device shutdown.
    fn finish(&self) -> Result<()>;

    fn supports_global_offset(&self) -> bool;
}

/// A compute API boundary, generic over the lifetime of the host arrays it
/// borrows (`'a`). A real device backend (e.g. OpenCL) copies those arrays
/// device-side during `open` and never touches `'a` again; an in-process
/// reference backend holds onto the host pointers directly and `'a`
/// becomes load-bearing, so the trait carries it rather than hiding it
/// behind `'static`.
pub trait ComputeBackend<'a>: Send + Sync {
    type Session: DeviceSession;

    fn enumerate(&self) -> Result<Vec<DeviceInfo>>;

    /// Opens a session against one device and compiles `program` for it,
    /// allocating one device-side buffer per `buffers` entry (in the same
    /// order) and binding it to the given host-side view.
    fn open(
        &self,
        device: &DeviceInfo,
        program: &ProgramSource,
        buffers: &[(BufferHandle, HostSlice<'a>)],
    ) -> Result<Self::Session>;

    /// Copies host input data for `handle` to its device-side buffer on
    /// `session`. Called once per input buffer before the first dispatch.
    fn write_input(&self, session: &Self::Session, handle: BufferHandle) -> Result<()>;
}
