//! In-process reference backend.
//!
//! Runs registered Rust closures as "kernels" directly on the calling
//! thread instead of dispatching to a real device. Every test in this
//! workspace, and the demo CLI's `--check` mode, runs against this
//! backend: it makes the scheduling logic verifiable without an actual
//! GPU or OpenCL runtime present.

use std::collections::HashMap;
use std::sync::Arc;

use enginecl_core::{
    BufferHandle, ChunkDispatch, CompletionCallback, ComputeBackend, DeviceInfo, DeviceSession, EngineError,
    HostSlice, KernelArg, ProgramSource, ReadBackMode, Result,
};

/// What a registered kernel closure sees for one dispatched chunk.
pub struct CpuKernelCtx<'c> {
    pub offset: usize,
    pub size: usize,
    buffers: &'c [(BufferHandle, HostSlice<'c>)],
    scalars: Vec<&'c [u8]>,
}

impl<'c> CpuKernelCtx<'c> {
    pub fn buffer(&self, handle: BufferHandle) -> HostSlice<'c> {
        self.buffers
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, slice)| *slice)
            .expect("kernel referenced an unregistered buffer handle")
    }

    pub fn scalar(&self, index: usize) -> &'c [u8] {
        self.scalars[index]
    }
}

pub type CpuKernelFn = dyn Fn(&CpuKernelCtx) + Send + Sync;

#[derive(Default)]
pub struct CpuBackend {
    kernels: HashMap<String, Arc<CpuKernelFn>>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_kernel(
        &mut self,
        name: impl Into<String>,
        kernel: impl Fn(&CpuKernelCtx) + Send + Sync + 'static,
    ) {
        self.kernels.insert(name.into(), Arc::new(kernel));
    }
}

pub struct CpuSession<'a> {
    buffers: Vec<(BufferHandle, HostSlice<'a>)>,
    kernels: HashMap<String, Arc<CpuKernelFn>>,
}

impl<'a> DeviceSession for CpuSession<'a> {
    fn enqueue(
        &self,
        kernel: &str,
        dispatch: ChunkDispatch,
        args: &[KernelArg],
        _read_back: ReadBackMode,
        on_complete: CompletionCallback,
    ) -> Result<()> {
        let kernel_fn = self.kernels.get(kernel).ok_or_else(|| EngineError::Backend {
            phase: "enqueue",
            detail: format!("no kernel registered under {kernel:?}"),
        })?;

        let mut scalars = Vec::new();
        for arg in args {
            match arg {
                KernelArg::Scalar(bytes) => scalars.push(bytes.as_slice()),
                KernelArg::LocalAlloc(_) => {}
                KernelArg::VectorRef(handle) => {
                    if !self.buffers.iter().any(|(h, _)| h == handle) {
                        return Err(EngineError::UnresolvedVectorArg { index: 0 });
                    }
                }
            }
        }

        let ctx = CpuKernelCtx {
            offset: dispatch.offset,
            size: dispatch.size,
            buffers: &self.buffers,
            scalars,
        };
        kernel_fn(&ctx);
        on_complete();
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        Ok(())
    }

    fn supports_global_offset(&self) -> bool {
        true
    }
}

impl<'a> ComputeBackend<'a> for CpuBackend {
    type Session = CpuSession<'a>;

    fn enumerate(&self) -> Result<Vec<DeviceInfo>> {
        Ok(vec![DeviceInfo {
            platform_index: 0,
            device_index: 0,
            name: "cpu-reference".to_string(),
        }])
    }

    fn open(
        &self,
        _device: &DeviceInfo,
        _program: &ProgramSource,
        buffers: &[(BufferHandle, HostSlice<'a>)],
    ) -> Result<Self::Session> {
        Ok(CpuSession {
            buffers: buffers.to_vec(),
            kernels: self.kernels.clone(),
        })
    }

    fn write_input(&self, _session: &Self::Session, _handle: BufferHandle) -> Result<()> {
        // Buffers are the caller's own host arrays; there is no separate
        // device-side copy to populate.
        Ok(())
    }
}
