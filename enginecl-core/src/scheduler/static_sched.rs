//! Up-front proportional split: each device gets exactly one chunk, sized
//! before any device starts requesting work.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::Scheduler;
use crate::error::{EngineError, Result};
use crate::gate::CountingGate;
use crate::ndrange::NDRange;
use crate::work::Work;

#[derive(Debug, Clone)]
pub enum SplitMode {
    /// Explicit per-device shares for the first `D-1` devices; the last
    /// device absorbs whatever remains.
    Raw(Vec<f32>),
    /// Uniform `1/D` share per device.
    ByDevices,
}

enum Slot {
    Pending,
    Assigned(Work),
    Shutdown,
}

struct State {
    devices: usize,
    total: usize,
    lws: usize,
    gws: NDRange,
    out_workitems: usize,
    out_positions: usize,
    split: SplitMode,
    chunks: Vec<Option<Work>>,
    slots: Vec<Slot>,
}

pub struct StaticScheduler {
    state: Mutex<State>,
    gates: Mutex<Arc<Vec<CountingGate>>>,
    done_gate: CountingGate,
    devices_working: AtomicUsize,
}

impl StaticScheduler {
    pub fn new(split: SplitMode) -> Self {
        Self {
            state: Mutex::new(State {
                devices: 0,
                total: 0,
                lws: 1,
                gws: NDRange::empty(),
                out_workitems: 0,
                out_positions: 0,
                split,
                chunks: Vec::new(),
                slots: Vec::new(),
            }),
            gates: Mutex::new(Arc::new(Vec::new())),
            done_gate: CountingGate::new(0),
            devices_working: AtomicUsize::new(0),
        }
    }

    /// Validates and installs explicit per-device proportions. Requires at
    /// least `devices - 1` entries (the last device's share is always
    /// derived), each strictly between 0 and 1.
    pub fn set_raw_proportions(&self, proportions: Vec<f32>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let needed = state.devices.saturating_sub(1);
        if proportions.len() < needed {
            return Err(EngineError::TooFewProportions {
                needed,
                devices: state.devices,
                got: proportions.len(),
            });
        }
        for (index, value) in proportions.iter().enumerate() {
            if !(*value > 0.0 && *value < 1.0) {
                return Err(EngineError::ProportionOutOfRange {
                    index,
                    value: *value,
                });
            }
        }
        state.split = SplitMode::Raw(proportions);
        Ok(())
    }

    fn split_amount(total: usize, proportion: f32, bound: usize) -> usize {
        let raw = (proportion as f64 * total as f64).floor() as usize;
        (raw / bound) * bound
    }
}

impl Scheduler for StaticScheduler {
    fn set_devices(&self, count: usize) {
        let mut state = self.state.lock().unwrap();
        state.devices = count;
        state.chunks = (0..count).map(|_| None).collect();
        state.slots = (0..count).map(|_| Slot::Pending).collect();
        *self.gates.lock().unwrap() = Arc::new((0..count).map(|_| CountingGate::new(0)).collect());
    }

    fn set_total_size(&self, total: usize) {
        self.state.lock().unwrap().total = total;
    }

    fn set_gws(&self, gws: NDRange) -> Result<()> {
        gws.require_splittable()?;
        self.state.lock().unwrap().gws = gws;
        Ok(())
    }

    fn set_lws(&self, lws: usize) {
        self.state.lock().unwrap().lws = lws.max(1);
    }

    fn set_out_pattern(&self, out_workitems: usize, out_positions: usize) {
        let mut state = self.state.lock().unwrap();
        state.out_workitems = out_workitems;
        state.out_positions = out_positions;
    }

    fn calc_proportions(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let devices = state.devices;
        if devices == 0 {
            return Err(EngineError::NoDevices);
        }
        let total = state.total;
        let lws = state.lws;
        if total % lws != 0 {
            return Err(EngineError::SizeNotAligned { total, lws });
        }

        let mut offset = 0usize;
        let mut chunks = Vec::with_capacity(devices);
        match &state.split {
            // Raw proportions apply to the fixed total: every device's share
            // is `floor(prop * total)` aligned down to `lws`, independent of
            // what prior devices were given.
            SplitMode::Raw(values) => {
                for (index, proportion) in values.iter().take(devices.saturating_sub(1)).enumerate() {
                    let size = Self::split_amount(total, *proportion, lws);
                    if size % lws != 0 {
                        return Err(EngineError::AlignmentRemainder {
                            remainder: size % lws,
                            lws,
                        });
                    }
                    chunks.push(Some(
                        Work::new(index, offset, size).with_out_pattern(state.out_workitems, state.out_positions),
                    ));
                    offset += size;
                }
            }
            // Uniform `1/D` proportions apply to the *running remainder*, so
            // each device gets `1/D` of what's left rather than `1/D` of the
            // original total.
            SplitMode::ByDevices => {
                let mut remaining = total;
                for index in 0..devices.saturating_sub(1) {
                    let size = Self::split_amount(remaining, 1.0 / devices as f32, lws);
                    if size % lws != 0 {
                        return Err(EngineError::AlignmentRemainder {
                            remainder: size % lws,
                            lws,
                        });
                    }
                    chunks.push(Some(
                        Work::new(index, offset, size).with_out_pattern(state.out_workitems, state.out_positions),
                    ));
                    offset += size;
                    remaining -= size;
                }
            }
        }
        let last_size = total - offset;
        if last_size % lws != 0 {
            return Err(EngineError::AlignmentRemainder {
                remainder: last_size % lws,
                lws,
            });
        }
        chunks.push(Some(
            Work::new(devices - 1, offset, last_size)
                .with_out_pattern(state.out_workitems, state.out_positions),
        ));

        state.chunks = chunks;
        self.devices_working.store(devices, Ordering::SeqCst);
        Ok(())
    }

    fn request_work(&self, device_id: usize) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let chunk = state.chunks[device_id].take();
        match chunk {
            Some(work) => state.slots[device_id] = Slot::Assigned(work),
            None => state.slots[device_id] = Slot::Shutdown,
        }
        drop(state);
        let gates = self.gates.lock().unwrap().clone();
        gates[device_id].notify(1);
        Ok(())
    }

    fn wait_work(&self, device_id: usize) -> Option<Work> {
        let gates = self.gates.lock().unwrap().clone();
        gates[device_id].wait(1);
        let mut state = self.state.lock().unwrap();
        match std::mem::replace(&mut state.slots[device_id], Slot::Pending) {
            Slot::Assigned(work) => Some(work),
            Slot::Shutdown => None,
            Slot::Pending => None,
        }
    }

    fn callback(&self, device_id: usize, _work: Work) {
        {
            let mut state = self.state.lock().unwrap();
            state.slots[device_id] = Slot::Shutdown;
        }
        let gates = self.gates.lock().unwrap().clone();
        gates[device_id].notify(1);
        self.devices_working.fetch_sub(1, Ordering::SeqCst);
        self.done_gate.notify(1);
    }

    fn drive(&self) -> Result<()> {
        let devices = self.state.lock().unwrap().devices as i64;
        if devices == 0 {
            return Err(EngineError::NoDevices);
        }
        self.done_gate.wait(devices);
        Ok(())
    }

    fn print_stats(&self) {
        let state = self.state.lock().unwrap();
        tracing::info!(devices = state.devices, total = state.total, "static scheduler finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(devices: usize, total: usize, lws: usize, split: SplitMode) -> StaticScheduler {
        let sched = StaticScheduler::new(split);
        sched.set_devices(devices);
        sched.set_total_size(total);
        sched.set_lws(lws);
        sched
    }

    #[test]
    fn equal_split_divides_evenly_across_devices() {
        let sched = make(2, 1024, 128, SplitMode::ByDevices);
        sched.calc_proportions().unwrap();
        let state = sched.state.lock().unwrap();
        let sizes: Vec<usize> = state.chunks.iter().map(|w| w.unwrap().size).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 1024);
        assert_eq!(sizes, vec![512, 512]);
    }

    #[test]
    fn raw_proportions_give_last_device_the_remainder() {
        let sched = make(3, 1536, 128, SplitMode::Raw(vec![0.25, 0.25]));
        sched.calc_proportions().unwrap();
        let state = sched.state.lock().unwrap();
        let sizes: Vec<usize> = state.chunks.iter().map(|w| w.unwrap().size).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 1536);
        assert_eq!(sizes[0], 384);
        assert_eq!(sizes[1], 384);
        assert_eq!(sizes[2], 768);
    }

    #[test]
    fn too_few_proportions_is_rejected() {
        let sched = StaticScheduler::new(SplitMode::Raw(vec![]));
        sched.set_devices(3);
        assert!(sched.set_raw_proportions(vec![0.5]).is_err());
    }

    #[test]
    fn out_of_range_proportion_is_rejected() {
        let sched = StaticScheduler::new(SplitMode::Raw(vec![]));
        sched.set_devices(2);
        assert!(sched.set_raw_proportions(vec![1.5]).is_err());
        assert!(sched.set_raw_proportions(vec![0.0]).is_err());
    }

    #[test]
    fn misaligned_total_is_rejected() {
        let sched = make(2, 1000, 128, SplitMode::ByDevices);
        assert!(sched.calc_proportions().is_err());
    }

    #[test]
    fn full_single_device_assignment_cycle() {
        let sched = make(1, 256, 64, SplitMode::ByDevices);
        sched.calc_proportions().unwrap();
        sched.request_work(0).unwrap();
        let work = sched.wait_work(0).unwrap();
        assert_eq!(work.offset, 0);
        assert_eq!(work.size, 256);
        sched.callback(0, work);
        assert!(sched.wait_work(0).is_none());
        sched.drive().unwrap();
    }
}
