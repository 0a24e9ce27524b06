//! Per-device worker thread.
//!
//! Each `DeviceExecutor` runs its own thread: register as ready, wait for
//! the runtime's go-ahead, make an initial bid for work, then loop waiting
//! for the scheduler to hand it a chunk (or the shutdown sentinel). All
//! subsequent assignments after the first arrive through the scheduler's
//! completion callback, not through a second request — the device thread
//! only ever blocks on its own gate.

use std::env;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, instrument};

use crate::backend::{ChunkDispatch, DeviceSession, KernelArg, ReadBackMode};
use crate::error::Result;
use crate::gate::CountingGate;
use crate::scheduler::Scheduler;
use crate::work::{ChunkRecord, Work};

pub struct DeviceExecutor<S: DeviceSession> {
    pub id: usize,
    session: S,
    scheduler: Arc<dyn Scheduler>,
    kernel: String,
    args: Vec<KernelArg>,
    lws: usize,
    min_chunk_multiplier: usize,
    stats: Arc<Mutex<Vec<ChunkRecord>>>,
    run_started: Instant,
}

impl<S: DeviceSession> DeviceExecutor<S> {
    pub fn new(
        id: usize,
        session: S,
        scheduler: Arc<dyn Scheduler>,
        kernel: impl Into<String>,
        args: Vec<KernelArg>,
        lws: usize,
    ) -> Self {
        Self {
            id,
            session,
            scheduler,
            kernel: kernel.into(),
            args,
            lws,
            min_chunk_multiplier: min_chunk_multiplier_for(id),
            stats: Arc::new(Mutex::new(Vec::new())),
            run_started: Instant::now(),
        }
    }

    pub fn min_chunk_multiplier(&self) -> usize {
        self.min_chunk_multiplier
    }

    /// Drives this device to completion. Called from its own thread inside
    /// `Runtime::run`'s scope. The shutdown barrier is released exactly
    /// once no matter how this returns — a fault on one device must not
    /// leave the others (or the runtime's terminal `shutdown.wait`) stuck
    /// forever, since there is no per-chunk retry or external cancellation.
    pub fn run(&self, ready: &CountingGate, go: &CountingGate, shutdown: &CountingGate) -> Result<()> {
        ready.notify(1);
        go.wait(1);

        let result = self.drive();
        shutdown.notify(1);
        result
    }

    fn drive(&self) -> Result<()> {
        self.scheduler.request_work(self.id)?;
        loop {
            match self.scheduler.wait_work(self.id) {
                Some(work) => self.do_work(work)?,
                None => break,
            }
        }
        self.session.finish()
    }

    #[instrument(skip(self), fields(device = self.id, offset = work.offset, size = work.size))]
    fn do_work(&self, work: Work) -> Result<()> {
        if work.is_empty() {
            debug!("skipping zero-size chunk");
            self.scheduler.callback(self.id, work);
            return Ok(());
        }

        let dispatch = ChunkDispatch {
            offset: work.effective_offset(),
            size: work.effective_size(),
            local_work_size: self.lws,
        };

        let args = if self.session.supports_global_offset() {
            self.args.clone()
        } else {
            let mut args = self.args.clone();
            args.push(KernelArg::Scalar((dispatch.offset as u32).to_ne_bytes().to_vec()));
            args
        };

        let device_id = self.id;
        let scheduler = Arc::clone(&self.scheduler);
        let started_at = Instant::now();
        let since_start = self.run_started;
        let stats = Arc::clone(&self.stats);

        self.session.enqueue(
            &self.kernel,
            dispatch,
            &args,
            ReadBackMode::Blocking,
            Box::new(move || {
                let duration_ms = started_at.elapsed().as_millis() as u64;
                let start_ms = started_at.duration_since(since_start).as_millis() as u64;
                stats.lock().unwrap().push(ChunkRecord {
                    offset: work.offset,
                    size: work.size,
                    start_ms,
                    duration_ms,
                });
                scheduler.callback(device_id, work);
            }),
        )
    }

    pub fn stats(&self) -> Vec<ChunkRecord> {
        self.stats.lock().unwrap().clone()
    }
}

/// Parses `MIN_CHUNK_MULTIPLIER` as a comma-separated list indexed by
/// device id; missing or malformed entries fall back to `1`.
fn min_chunk_multiplier_for(device_id: usize) -> usize {
    let Ok(raw) = env::var("MIN_CHUNK_MULTIPLIER") else {
        return 1;
    };
    raw.split(',')
        .nth(device_id)
        .and_then(|entry| entry.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_defaults_to_one() {
        env::remove_var("MIN_CHUNK_MULTIPLIER");
        assert_eq!(min_chunk_multiplier_for(0), 1);
    }

    #[test]
    fn indexes_by_device_id() {
        env::set_var("MIN_CHUNK_MULTIPLIER", "2,4,8");
        assert_eq!(min_chunk_multiplier_for(1), 4);
        assert_eq!(min_chunk_multiplier_for(2), 8);
        env::remove_var("MIN_CHUNK_MULTIPLIER");
    }

    #[test]
    fn malformed_entry_falls_back_to_one() {
        env::set_var("MIN_CHUNK_MULTIPLIER", "2,notanumber,8");
        assert_eq!(min_chunk_multiplier_for(1), 1);
        env::remove_var("MIN_CHUNK_MULTIPLIER");
    }
}
