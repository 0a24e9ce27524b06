//! Fixed-size chunks served on demand through a single-consumer request
//! ring, so faster devices naturally complete more chunks.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::Scheduler;
use crate::error::{EngineError, Result};
use crate::gate::CountingGate;
use crate::ndrange::NDRange;
use crate::work::Work;

struct Config {
    devices: usize,
    total: usize,
    lws: usize,
    gws: NDRange,
    out_workitems: usize,
    out_positions: usize,
    worksize: usize,
    /// The first chunk served absorbs the alignment remainder, so it is
    /// sized `worksize + rest` instead of `worksize`.
    work_first: usize,
}

struct WorkLog {
    /// Every chunk ever handed out, in assignment order.
    queue: Vec<Work>,
    /// Per-device list of indices into `queue`.
    per_device: Vec<Vec<usize>>,
    chunk_todo: Vec<usize>,
    chunk_given: Vec<usize>,
    size_given: usize,
    size_remaining: i64,
}

/// Single-consumer request ring. Holds `device_id + 1` per slot, `0` means
/// empty; capacity is `2 * devices`, matched to the original's ring size.
struct Ring {
    slots: Vec<usize>,
    write: usize,
    read: usize,
}

impl Ring {
    fn new(devices: usize) -> Self {
        Self {
            slots: vec![0; devices.max(1) * 2],
            write: 0,
            read: 0,
        }
    }

    fn push(&mut self, device_id: usize) {
        let len = self.slots.len();
        let idx = self.write % len;
        self.slots[idx] = device_id + 1;
        self.write += 1;
    }

    fn pop(&mut self) -> Option<usize> {
        let len = self.slots.len();
        let idx = self.read % len;
        let id = self.slots[idx];
        if id == 0 {
            return None;
        }
        self.slots[idx] = 0;
        self.read += 1;
        Some(id - 1)
    }
}

pub struct DynamicScheduler {
    config: Mutex<Config>,
    log: Mutex<WorkLog>,
    ring: Mutex<Ring>,
    work_gates: Mutex<Arc<Vec<CountingGate>>>,
    callbacks_gate: CountingGate,
    size_remaining_given: AtomicI64,
    size_remaining_completed: AtomicI64,
    chunks_done: AtomicUsize,
}

impl DynamicScheduler {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(Config {
                devices: 0,
                total: 0,
                lws: 1,
                gws: NDRange::empty(),
                out_workitems: 0,
                out_positions: 0,
                worksize: 0,
                work_first: 0,
            }),
            log: Mutex::new(WorkLog {
                queue: Vec::new(),
                per_device: Vec::new(),
                chunk_todo: Vec::new(),
                chunk_given: Vec::new(),
                size_given: 0,
                size_remaining: 0,
            }),
            ring: Mutex::new(Ring::new(1)),
            work_gates: Mutex::new(Arc::new(Vec::new())),
            callbacks_gate: CountingGate::new(0),
            size_remaining_given: AtomicI64::new(0),
            size_remaining_completed: AtomicI64::new(0),
            chunks_done: AtomicUsize::new(0),
        }
    }

    /// Splits the total into `chunks` equal-size pieces; the first chunk
    /// served absorbs whatever remainder doesn't divide evenly.
    pub fn set_chunks(&self, chunks: usize) -> Result<()> {
        if chunks == 0 {
            return Err(EngineError::ZeroChunks);
        }
        let mut config = self.config.lock().unwrap();
        let total = config.total;
        let lws = config.lws;
        if total % lws != 0 {
            return Err(EngineError::SizeNotAligned { total, lws });
        }
        let steps = (total / lws) / chunks;
        let worksize = steps * lws;
        let rest = total - chunks * worksize;
        if rest % lws != 0 {
            return Err(EngineError::AlignmentRemainder { remainder: rest % lws, lws });
        }
        config.worksize = worksize;
        config.work_first = worksize + rest;
        drop(config);
        self.arm();
        Ok(())
    }

    /// Derives a chunk size from a requested size, rounding up to the
    /// nearest multiple of `lws`, then computes how many chunks that
    /// implies.
    pub fn set_worksize(&self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(EngineError::ZeroChunks);
        }
        let mut config = self.config.lock().unwrap();
        let lws = config.lws;
        let total = config.total;
        let given = if size % lws == 0 { size } else { (size / lws + 1) * lws };
        let (worksize, rest) = if total < given {
            (total, 0)
        } else {
            let times = total / given;
            (given, total - times * given)
        };
        if worksize % lws != 0 {
            return Err(EngineError::AlignmentRemainder { remainder: worksize % lws, lws });
        }
        config.worksize = worksize;
        config.work_first = worksize + rest;
        drop(config);
        self.arm();
        Ok(())
    }

    fn arm(&self) {
        let config = self.config.lock().unwrap();
        self.size_remaining_given.store(config.total as i64, Ordering::SeqCst);
        self.size_remaining_completed.store(config.total as i64, Ordering::SeqCst);
    }

    fn gates(&self) -> Arc<Vec<CountingGate>> {
        self.work_gates.lock().unwrap().clone()
    }

    fn notify_shutdown(&self) {
        for gate in self.gates().iter() {
            gate.notify(1);
        }
    }

    fn enqueue_for(&self, device_id: usize) {
        let mut log = self.log.lock().unwrap();
        if log.size_remaining <= 0 {
            return;
        }
        let config = self.config.lock().unwrap();
        let size = if log.size_given == 0 { config.work_first } else { config.worksize } as i64;
        let size = size.min(log.size_remaining) as usize;
        let offset = log.size_given;
        log.size_remaining -= size as i64;
        log.size_given += size;
        let index = log.queue.len();
        log.queue.push(
            Work::new(device_id, offset, size).with_out_pattern(config.out_workitems, config.out_positions),
        );
        log.per_device[device_id].push(index);
        log.chunk_todo[device_id] += 1;
    }
}

impl Default for DynamicScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for DynamicScheduler {
    fn set_devices(&self, count: usize) {
        let mut config = self.config.lock().unwrap();
        config.devices = count;
        drop(config);
        let mut log = self.log.lock().unwrap();
        log.per_device = (0..count).map(|_| Vec::new()).collect();
        log.chunk_todo = vec![0; count];
        log.chunk_given = vec![0; count];
        drop(log);
        *self.ring.lock().unwrap() = Ring::new(count);
        *self.work_gates.lock().unwrap() = Arc::new((0..count).map(|_| CountingGate::new(0)).collect());
    }

    fn set_total_size(&self, total: usize) {
        let mut config = self.config.lock().unwrap();
        config.total = total;
        drop(config);
        let mut log = self.log.lock().unwrap();
        log.size_given = 0;
        log.size_remaining = total as i64;
    }

    fn set_gws(&self, gws: NDRange) -> Result<()> {
        gws.require_splittable()?;
        self.config.lock().unwrap().gws = gws;
        Ok(())
    }

    fn set_lws(&self, lws: usize) {
        self.config.lock().unwrap().lws = lws.max(1);
    }

    fn set_out_pattern(&self, out_workitems: usize, out_positions: usize) {
        let mut config = self.config.lock().unwrap();
        config.out_workitems = out_workitems;
        config.out_positions = out_positions;
    }

    fn calc_proportions(&self) -> Result<()> {
        Ok(())
    }

    fn request_work(&self, device_id: usize) -> Result<()> {
        if self.size_remaining_completed.load(Ordering::SeqCst) > 0 {
            self.ring.lock().unwrap().push(device_id);
        }
        self.callbacks_gate.notify(1);
        Ok(())
    }

    fn wait_work(&self, device_id: usize) -> Option<Work> {
        let gates = self.gates();
        gates[device_id].wait(1);
        let mut log = self.log.lock().unwrap();
        if self.size_remaining_given.load(Ordering::SeqCst) > 0
            && log.chunk_todo[device_id] > log.chunk_given[device_id]
        {
            let next = log.chunk_given[device_id];
            log.chunk_given[device_id] += 1;
            let worksize = self.config.lock().unwrap().worksize;
            self.size_remaining_given.fetch_sub(worksize as i64, Ordering::SeqCst);
            let index = log.per_device[device_id][next];
            Some(log.queue[index])
        } else {
            None
        }
    }

    fn callback(&self, device_id: usize, work: Work) {
        self.chunks_done.fetch_add(1, Ordering::SeqCst);
        let remaining =
            self.size_remaining_completed.fetch_sub(work.size as i64, Ordering::SeqCst) - work.size as i64;
        if remaining > 0 {
            self.ring.lock().unwrap().push(device_id);
        }
        self.callbacks_gate.notify(1);
    }

    fn drive(&self) -> Result<()> {
        loop {
            let remaining = self.log.lock().unwrap().size_remaining;
            if remaining <= 0 && self.size_remaining_completed.load(Ordering::SeqCst) <= 0 {
                break;
            }
            loop {
                let popped = self.ring.lock().unwrap().pop();
                let device_id = match popped {
                    Some(id) => id,
                    None => break,
                };
                self.enqueue_for(device_id);
                self.gates()[device_id].notify(1);
            }
            self.callbacks_gate.wait(1);
        }
        self.notify_shutdown();
        Ok(())
    }

    fn print_stats(&self) {
        let chunks = self.chunks_done.load(Ordering::SeqCst);
        tracing::info!(chunks, "dynamic scheduler finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(devices: usize, total: usize, lws: usize, chunks: usize) -> DynamicScheduler {
        let sched = DynamicScheduler::new();
        sched.set_devices(devices);
        sched.set_total_size(total);
        sched.set_lws(lws);
        sched.set_chunks(chunks).unwrap();
        sched
    }

    #[test]
    fn even_split_produces_requested_chunk_count() {
        let sched = make(2, 1024, 128, 4);
        let config = sched.config.lock().unwrap();
        assert_eq!(config.worksize, 256);
        assert_eq!(config.work_first, 256);
    }

    #[test]
    fn remainder_is_absorbed_by_first_served_chunk() {
        let sched = make(2, 1280, 128, 4);
        let config = sched.config.lock().unwrap();
        assert_eq!(config.worksize, 256);
        assert_eq!(config.work_first, 512);
    }

    #[test]
    fn single_device_drains_every_chunk_then_sees_shutdown() {
        let sched = make(1, 512, 128, 4);
        sched.request_work(0).unwrap();

        let mut total_seen = 0;
        for _ in 0..4 {
            let device_id = sched.ring.lock().unwrap().pop().expect("expected a pending request");
            sched.enqueue_for(device_id);
            sched.gates()[device_id].notify(1);

            let work = sched.wait_work(0).expect("chunk should be ready");
            total_seen += work.size;
            sched.callback(0, work);
        }
        assert_eq!(total_seen, 512);

        sched.notify_shutdown();
        assert!(sched.wait_work(0).is_none());
    }

    #[test]
    fn ring_wraps_around_its_fixed_capacity() {
        let mut ring = Ring::new(1);
        ring.push(0);
        assert_eq!(ring.pop(), Some(0));
        assert_eq!(ring.pop(), None);
        ring.push(0);
        ring.push(0);
        ring.push(0);
        assert_eq!(ring.pop(), Some(0));
        assert_eq!(ring.pop(), Some(0));
        assert_eq!(ring.pop(), Some(0));
        assert_eq!(ring.pop(), None);
    }
}
