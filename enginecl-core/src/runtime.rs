//! Top-level facade that drives one run to completion.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use crate::backend::{ComputeBackend, DeviceInfo, KernelArg, ProgramSource};
use crate::buffer::{BufferHandle, HostSlice};
use crate::device::DeviceExecutor;
use crate::error::{EngineError, Result};
use crate::gate::CountingGate;
use crate::inspector::{DeviceStats, RunStats};
use crate::ndrange::NDRange;
use crate::scheduler::Scheduler;

pub struct Runtime<S: crate::backend::DeviceSession> {
    executors: Vec<DeviceExecutor<S>>,
    scheduler: Arc<dyn Scheduler>,
    gws: NDRange,
    lws: usize,
    out_workitems: usize,
    out_positions: usize,
    wait_all_ready: bool,
    last_stats: Mutex<Option<RunStats>>,
}

impl<S: crate::backend::DeviceSession> Runtime<S> {
    /// Opens one session per requested device, writes every input buffer to
    /// it, and wires each into its own `DeviceExecutor`.
    #[allow(clippy::too_many_arguments)]
    pub fn new<'a, B: ComputeBackend<'a, Session = S>>(
        backend: &B,
        devices: &[DeviceInfo],
        program: &ProgramSource,
        buffers: &[(BufferHandle, HostSlice<'a>)],
        input_handles: &[BufferHandle],
        kernel: impl Into<String>,
        args: Vec<KernelArg>,
        gws: NDRange,
        lws: usize,
        out_pattern: (usize, usize),
        scheduler: Arc<dyn Scheduler>,
        wait_all_ready: bool,
    ) -> Result<Self> {
        if devices.is_empty() {
            return Err(EngineError::NoDevices);
        }
        gws.require_splittable()?;

        let kernel = kernel.into();
        let mut executors = Vec::with_capacity(devices.len());
        for (id, device) in devices.iter().enumerate() {
            let session = backend.open(device, program, buffers)?;
            for handle in input_handles {
                backend.write_input(&session, *handle)?;
            }
            executors.push(DeviceExecutor::new(
                id,
                session,
                Arc::clone(&scheduler),
                kernel.clone(),
                args.clone(),
                lws,
            ));
        }

        Ok(Self {
            executors,
            scheduler,
            gws,
            lws,
            out_workitems: out_pattern.0,
            out_positions: out_pattern.1,
            wait_all_ready,
            last_stats: Mutex::new(None),
        })
    }

    /// Runs every device to completion and returns aggregate stats.
    /// Mirrors the sequence the original drove from its own `Runtime::run`:
    /// scheduler wiring, device discovery, a ready barrier, then the
    /// go-ahead and a shutdown barrier.
    pub fn run(&self) -> Result<RunStats> {
        self.scheduler.set_devices(self.executors.len());
        self.scheduler.set_total_size(self.gws.space());
        self.scheduler.set_gws(self.gws.clone())?;
        self.scheduler.set_lws(self.lws);
        self.scheduler.set_out_pattern(self.out_workitems, self.out_positions);
        self.scheduler.calc_proportions()?;

        let device_count = self.executors.len() as i64;
        let ready = CountingGate::new(device_count);
        let go = CountingGate::new(0);
        let shutdown = CountingGate::new(device_count);

        let start = Instant::now();
        thread::scope(|scope| -> Result<()> {
            let mut handles = Vec::with_capacity(self.executors.len() + 1);
            for executor in &self.executors {
                let ready = &ready;
                let go = &go;
                let shutdown = &shutdown;
                handles.push(scope.spawn(move || {
                    executor.run(ready, go, shutdown).map_err(|err| {
                        tracing::error!(device = executor.id, error = %err, "device executor failed");
                        err
                    })
                }));
            }

            let scheduler = Arc::clone(&self.scheduler);
            handles.push(scope.spawn(move || {
                scheduler.drive().map_err(|err| {
                    tracing::error!(error = %err, "scheduler driver failed");
                    err
                })
            }));

            if self.wait_all_ready {
                ready.wait(device_count);
            }
            go.notify(device_count);
            shutdown.wait(device_count);

            let mut first_err = None;
            for handle in handles {
                if let Err(err) = handle.join().expect("worker thread panicked") {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
            match first_err {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })?;

        self.scheduler.print_stats();

        let devices = self
            .executors
            .iter()
            .map(|executor| DeviceStats {
                device_id: executor.id,
                chunks: executor.stats(),
            })
            .collect();

        let stats = RunStats {
            devices,
            total_duration_ms: start.elapsed().as_millis() as u64,
        };
        *self.last_stats.lock().unwrap() = Some(stats.clone());
        Ok(stats)
    }

    /// Prints the free-form textual report for the most recently completed
    /// run, matching the original's `Runtime::printStats`. No-op before the
    /// first `run()`.
    pub fn print_stats(&self) {
        if let Some(stats) = self.last_stats.lock().unwrap().as_ref() {
            print!("{}", stats.report());
        }
    }
}
