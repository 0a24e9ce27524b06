//! End-to-end scenarios against the in-process `CpuBackend`, covering the
//! static/dynamic scheduling disciplines, the SAXPY round-trip, and the
//! shutdown barrier. No real accelerator hardware is needed: these are the
//! same properties a real OpenCL run would have to satisfy, just exercised
//! against the reference backend that makes the scheduler/executor state
//! machine observable from a single process.

use std::sync::Arc;

use enginecl_backend::CpuBackend;
use enginecl_core::{
    BufferHandle, Direction, DynamicScheduler, HostSlice, NDRange, ProgramSource, Runtime, Scheduler, SplitMode,
    StaticScheduler,
};

fn saxpy_kernel(backend: &mut CpuBackend) {
    backend.register_kernel("saxpy", |ctx| {
        let a = ctx.buffer(BufferHandle(0)).as_slice::<i32>();
        let b = ctx.buffer(BufferHandle(1)).as_slice::<i32>();
        let out = ctx.buffer(BufferHandle(2)).as_mut_slice::<i32>();
        let constant = f32::from_ne_bytes(ctx.scalar(0).try_into().unwrap());
        for i in ctx.offset..ctx.offset + ctx.size {
            out[i] = (constant * a[i] as f32 + b[i] as f32).round() as i32;
        }
    });
}

struct SaxpyFixture {
    a: Vec<i32>,
    b: Vec<i32>,
    out: Vec<i32>,
}

fn run_saxpy(
    fixture: &mut SaxpyFixture,
    constant: f32,
    lws: usize,
    device_count: usize,
    scheduler: Arc<dyn Scheduler>,
) -> enginecl_core::RunStats {
    let mut backend = CpuBackend::new();
    saxpy_kernel(&mut backend);

    let buffers = vec![
        (BufferHandle(0), HostSlice::from_slice(Direction::In, &fixture.a)),
        (BufferHandle(1), HostSlice::from_slice(Direction::In, &fixture.b)),
        (BufferHandle(2), HostSlice::from_mut_slice(Direction::Out, &mut fixture.out)),
    ];
    let devices: Vec<_> = (0..device_count)
        .map(|i| enginecl_core::DeviceInfo {
            platform_index: 0,
            device_index: i as u32,
            name: format!("cpu-{i}"),
        })
        .collect();

    let args = vec![
        enginecl_core::KernelArg::VectorRef(BufferHandle(0)),
        enginecl_core::KernelArg::VectorRef(BufferHandle(1)),
        enginecl_core::KernelArg::VectorRef(BufferHandle(2)),
        enginecl_core::KernelArg::Scalar(constant.to_ne_bytes().to_vec()),
    ];

    let program = ProgramSource::Source(String::new());
    let runtime = Runtime::new(
        &backend,
        &devices,
        &program,
        &buffers,
        &[BufferHandle(0), BufferHandle(1)],
        "saxpy",
        args,
        NDRange::new1(fixture.a.len()),
        lws,
        (1, 1),
        scheduler,
        true,
    )
    .expect("runtime construction should succeed");

    runtime.run().expect("run should complete without error")
}

fn expected_saxpy(a: &[i32], b: &[i32], constant: f32) -> Vec<i32> {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (constant * x as f32 + y as f32).round() as i32)
        .collect()
}

#[test]
fn saxpy_round_trip_every_index_written_once_static() {
    let n = 1024;
    let mut fixture = SaxpyFixture { a: vec![1; n], b: vec![2; n], out: vec![0; n] };
    let scheduler: Arc<dyn Scheduler> = Arc::new(StaticScheduler::new(SplitMode::ByDevices));
    let stats = run_saxpy(&mut fixture, 3.14, 128, 2, scheduler);

    assert_eq!(fixture.out, expected_saxpy(&vec![1; n], &vec![2; n], 3.14));
    assert_eq!(stats.total_size(), n);
}

#[test]
fn saxpy_round_trip_every_index_written_once_dynamic() {
    let n = 1024;
    let mut fixture = SaxpyFixture { a: vec![1; n], b: vec![2; n], out: vec![0; n] };
    let dynamic = DynamicScheduler::new();
    dynamic.set_devices(2);
    dynamic.set_total_size(n);
    dynamic.set_lws(128);
    dynamic.set_chunks(4).unwrap();
    let scheduler: Arc<dyn Scheduler> = Arc::new(dynamic);
    let stats = run_saxpy(&mut fixture, 3.14, 128, 2, scheduler);

    assert_eq!(fixture.out, expected_saxpy(&vec![1; n], &vec![2; n], 3.14));
    assert_eq!(stats.total_size(), n);
}

/// Scenario 1: static, two devices, equal split.
#[test]
fn scenario_static_two_devices_equal_split() {
    let n = 1024;
    let mut fixture = SaxpyFixture { a: vec![1; n], b: vec![2; n], out: vec![0; n] };
    let scheduler: Arc<dyn Scheduler> = Arc::new(StaticScheduler::new(SplitMode::Raw(vec![0.5])));
    let stats = run_saxpy(&mut fixture, 1.0, 128, 2, scheduler);

    assert_eq!(stats.total_chunks(), 2);
    assert_eq!(stats.total_size(), n);
    let sizes: Vec<usize> = stats.devices.iter().flat_map(|d| d.chunks.iter().map(|c| c.size)).collect();
    assert_eq!(sizes, vec![512, 512]);
}

/// Scenario 2: static, three devices, raw proportions [0.25, 0.25].
#[test]
fn scenario_static_three_devices_raw_proportions() {
    let n = 2048;
    let mut fixture = SaxpyFixture { a: vec![1; n], b: vec![2; n], out: vec![0; n] };
    let scheduler: Arc<dyn Scheduler> = Arc::new(StaticScheduler::new(SplitMode::Raw(vec![0.25, 0.25])));
    let stats = run_saxpy(&mut fixture, 1.0, 128, 3, scheduler);

    assert_eq!(stats.total_chunks(), 3);
    let mut chunks: Vec<(usize, usize)> = stats
        .devices
        .iter()
        .flat_map(|d| d.chunks.iter().map(|c| (c.offset, c.size)))
        .collect();
    chunks.sort();
    assert_eq!(chunks, vec![(0, 512), (512, 512), (1024, 1024)]);
}

/// Scenario 3: dynamic, K=4 equal chunks.
#[test]
fn scenario_dynamic_k4_even_split() {
    let n = 1024;
    let mut fixture = SaxpyFixture { a: vec![1; n], b: vec![2; n], out: vec![0; n] };
    let dynamic = DynamicScheduler::new();
    dynamic.set_devices(2);
    dynamic.set_total_size(n);
    dynamic.set_lws(128);
    dynamic.set_chunks(4).unwrap();
    let scheduler: Arc<dyn Scheduler> = Arc::new(dynamic);
    let stats = run_saxpy(&mut fixture, 1.0, 128, 2, scheduler);

    assert_eq!(stats.total_chunks(), 4);
    let mut offsets: Vec<usize> = stats.devices.iter().flat_map(|d| d.chunks.iter().map(|c| c.offset)).collect();
    offsets.sort();
    assert_eq!(offsets, vec![0, 256, 512, 768]);
}

/// Scenario 4: dynamic with a remainder absorbed by the first-served chunk.
#[test]
fn scenario_dynamic_with_remainder() {
    let n = 1280;
    let mut fixture = SaxpyFixture { a: vec![1; n], b: vec![2; n], out: vec![0; n] };
    let dynamic = DynamicScheduler::new();
    dynamic.set_devices(2);
    dynamic.set_total_size(n);
    dynamic.set_lws(128);
    dynamic.set_chunks(4).unwrap();
    let scheduler: Arc<dyn Scheduler> = Arc::new(dynamic);
    let stats = run_saxpy(&mut fixture, 1.0, 128, 2, scheduler);

    let mut sizes: Vec<usize> = stats.devices.iter().flat_map(|d| d.chunks.iter().map(|c| c.size)).collect();
    assert_eq!(sizes.iter().sum::<usize>(), n);
    sizes.sort();
    assert_eq!(sizes, vec![256, 256, 256, 512]);
}

/// Scenario 5: single device, any scheduler — one chunk covering the whole
/// range.
#[test]
fn scenario_single_device_gets_one_chunk() {
    let n = 256;
    let mut fixture = SaxpyFixture { a: vec![1; n], b: vec![2; n], out: vec![0; n] };
    let scheduler: Arc<dyn Scheduler> = Arc::new(StaticScheduler::new(SplitMode::ByDevices));
    let stats = run_saxpy(&mut fixture, 1.0, 64, 1, scheduler);

    assert_eq!(stats.total_chunks(), 1);
    assert_eq!(stats.devices[0].chunks[0].offset, 0);
    assert_eq!(stats.devices[0].chunks[0].size, n);
}

/// Scenario 6: barrier shutdown — `run()` returning at all, deterministically
/// and exactly once, is the barrier property; every device's shutdown
/// notification must have arrived for `Runtime::run` to unblock.
#[test]
fn scenario_barrier_shutdown_completes_deterministically() {
    let n = 512;
    let mut fixture = SaxpyFixture { a: vec![1; n], b: vec![2; n], out: vec![0; n] };
    let dynamic = DynamicScheduler::new();
    dynamic.set_devices(3);
    dynamic.set_total_size(n);
    dynamic.set_lws(128);
    dynamic.set_chunks(4).unwrap();
    let scheduler: Arc<dyn Scheduler> = Arc::new(dynamic);
    let stats = run_saxpy(&mut fixture, 1.0, 128, 3, scheduler);

    assert_eq!(stats.total_chunks(), 4);
    assert_eq!(stats.total_size(), n);
}

#[test]
fn misconfigured_multi_dimensional_gws_is_rejected_before_any_thread_starts() {
    let mut backend = CpuBackend::new();
    saxpy_kernel(&mut backend);
    let mut data = vec![1i32; 16];
    let mut out = vec![0i32; 16];
    let buffers = vec![
        (BufferHandle(0), HostSlice::from_mut_slice(Direction::In, &mut data)),
        (BufferHandle(2), HostSlice::from_mut_slice(Direction::Out, &mut out)),
    ];
    let devices = vec![enginecl_core::DeviceInfo { platform_index: 0, device_index: 0, name: "cpu".into() }];
    let scheduler: Arc<dyn Scheduler> = Arc::new(StaticScheduler::new(SplitMode::ByDevices));
    let program = ProgramSource::Source(String::new());

    let result = Runtime::new(
        &backend,
        &devices,
        &program,
        &buffers,
        &[BufferHandle(0)],
        "saxpy",
        vec![],
        NDRange::new2(4, 4),
        4,
        (1, 1),
        scheduler,
        false,
    );
    assert!(result.is_err());
}
