//! Run statistics and phase-duration bookkeeping.
//!
//! Unlike the rest of the core, the inspector doesn't participate in
//! scheduling decisions — it only records when each phase of a run
//! happened, for `print_stats`/`RunStats` to report afterwards. Real
//! timing detail is left to `tracing` spans; this module keeps just the
//! coarse per-phase offsets the original reported.

use std::time::Duration;

use crate::work::ChunkRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    Init,
    UseDiscovery,
    InitDiscovery,
    InitContext,
    InitQueue,
    InitBuffers,
    InitKernel,
    WriteBuffersDummy,
    WriteBuffers,
    DeviceStart,
    SchedulerStart,
    DeviceReady,
    DeviceRun,
    CompleteWork,
    DeviceEnd,
    SchedulerEnd,
}

impl ActionType {
    pub fn label(&self) -> &'static str {
        match self {
            ActionType::Init => "init",
            ActionType::UseDiscovery => "use discovery",
            ActionType::InitDiscovery => "init discovery",
            ActionType::InitContext => "init context",
            ActionType::InitQueue => "init queue",
            ActionType::InitBuffers => "init buffers",
            ActionType::InitKernel => "init kernel",
            ActionType::WriteBuffersDummy => "write buffers (dummy)",
            ActionType::WriteBuffers => "write buffers",
            ActionType::DeviceStart => "device start",
            ActionType::SchedulerStart => "scheduler start",
            ActionType::DeviceReady => "device ready",
            ActionType::DeviceRun => "device run",
            ActionType::CompleteWork => "complete work",
            ActionType::DeviceEnd => "device end",
            ActionType::SchedulerEnd => "scheduler end",
        }
    }
}

pub fn format_action_duration(action: ActionType, duration: Duration) -> String {
    format!("{}: {} ms", action.label(), duration.as_millis())
}

#[derive(Debug, Clone)]
pub struct DeviceStats {
    pub device_id: usize,
    pub chunks: Vec<ChunkRecord>,
}

impl DeviceStats {
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn total_size(&self) -> usize {
        self.chunks.iter().map(|c| c.size).sum()
    }
}

#[derive(Debug, Clone)]
pub struct RunStats {
    pub devices: Vec<DeviceStats>,
    pub total_duration_ms: u64,
}

impl RunStats {
    pub fn total_chunks(&self) -> usize {
        self.devices.iter().map(|d| d.chunk_count()).sum()
    }

    pub fn total_size(&self) -> usize {
        self.devices.iter().map(|d| d.total_size()).sum()
    }

    /// Free-form textual dump, one line per device plus a totals line —
    /// the `printStats` equivalent. `tracing` carries live per-phase
    /// events as a run progresses; this is the final report printed once
    /// the run has finished.
    pub fn report(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("run: {} ms\n", self.total_duration_ms));
        for device in &self.devices {
            out.push_str(&format!(
                "  device {}: {} chunks, {} elements\n",
                device.device_id,
                device.chunk_count(),
                device.total_size(),
            ));
            for chunk in &device.chunks {
                out.push_str(&format!(
                    "    [offset={}, size={}] {}\n",
                    chunk.offset,
                    chunk.size,
                    format_action_duration(ActionType::CompleteWork, Duration::from_millis(chunk.duration_ms)),
                ));
            }
        }
        out.push_str(&format!(
            "total: {} chunks, {} elements\n",
            self.total_chunks(),
            self.total_size()
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_labels_are_human_readable() {
        assert_eq!(ActionType::CompleteWork.label(), "complete work");
    }

    #[test]
    fn run_stats_aggregate_across_devices() {
        let stats = RunStats {
            devices: vec![
                DeviceStats {
                    device_id: 0,
                    chunks: vec![
                        ChunkRecord { offset: 0, size: 128, start_ms: 0, duration_ms: 5 },
                        ChunkRecord { offset: 128, size: 128, start_ms: 5, duration_ms: 4 },
                    ],
                },
                DeviceStats {
                    device_id: 1,
                    chunks: vec![ChunkRecord { offset: 256, size: 256, start_ms: 0, duration_ms: 9 }],
                },
            ],
            total_duration_ms: 9,
        };
        assert_eq!(stats.total_chunks(), 3);
        assert_eq!(stats.total_size(), 512);
    }
}
