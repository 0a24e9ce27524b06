//! SAXPY demo: `out[i] = round(constant * in1[i] + in2[i])`, partitioned
//! across one or more devices through either scheduling discipline.
//!
//! Mirrors the original `examples/tier-2/saxpy.cpp` program: same argument
//! surface, same `Config:` echo, same `time:`/`Success`/`Failure`/`Done`
//! output shape, now backed by the Rust scheduler core instead of EngineCL.

mod cli;
mod config;
mod error;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[cfg(not(feature = "opencl"))]
use enginecl_backend::CpuBackend;
use enginecl_core::{
    BufferHandle, Direction, DynamicScheduler, HostSlice, KernelArg, NDRange, ProgramSource, Runtime, Scheduler,
    SplitMode, StaticScheduler,
};

use cli::Cli;
use config::Config;
use error::DemoError;

#[cfg(feature = "opencl")]
use enginecl_backend::OclBackend;

const DEFAULT_KERNEL_PATH: &str = "demos/enginecl-saxpy/kernels/saxpy.cl";

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("enginecl-saxpy: {err}");
            ExitCode::FAILURE
        }
    }
}

struct ResolvedArgs {
    devices: Vec<(u32, u32)>,
    scheduler_name: &'static str,
    static_props: Vec<f32>,
    dynamic_chunks: usize,
    kernel_path: String,
}

fn resolve_args(cli: &Cli, config: &Config) -> Result<ResolvedArgs, DemoError> {
    let devices_str = cli
        .devices
        .clone()
        .or_else(|| config.devices.clone())
        .unwrap_or_else(|| "0.0".to_string());
    let devices = parse_devices(&devices_str)?;

    let kernel_path = cli
        .kernel
        .clone()
        .or_else(|| config.kernel_path.clone())
        .unwrap_or_else(|| DEFAULT_KERNEL_PATH.to_string());

    if let Some(chunks) = cli.dynamic {
        return Ok(ResolvedArgs {
            devices,
            scheduler_name: "dynamic",
            static_props: Vec::new(),
            dynamic_chunks: chunks,
            kernel_path,
        });
    }
    if let Some(chunks) = config.dynamic_chunks {
        if config.scheduler.as_deref() == Some("dynamic") {
            return Ok(ResolvedArgs {
                devices,
                scheduler_name: "dynamic",
                static_props: Vec::new(),
                dynamic_chunks: chunks,
                kernel_path,
            });
        }
    }

    let props_str = cli
        .r#static
        .clone()
        .or_else(|| config.static_props.clone())
        .unwrap_or_else(|| "0.5".to_string());
    let static_props = parse_proportions(&props_str)?;

    Ok(ResolvedArgs {
        devices,
        scheduler_name: "static",
        static_props,
        dynamic_chunks: 1,
        kernel_path,
    })
}

fn parse_devices(spec: &str) -> Result<Vec<(u32, u32)>, DemoError> {
    spec.split(',')
        .map(|entry| {
            let (plat, dev) = entry.split_once('.').ok_or_else(|| DemoError::MalformedDeviceSpec {
                entry: entry.to_string(),
            })?;
            let plat: u32 = plat.parse().map_err(|_| DemoError::MalformedDeviceSpec { entry: entry.to_string() })?;
            let dev: u32 = dev.parse().map_err(|_| DemoError::MalformedDeviceSpec { entry: entry.to_string() })?;
            Ok((plat, dev))
        })
        .collect()
}

fn parse_proportions(spec: &str) -> Result<Vec<f32>, DemoError> {
    spec.split(':')
        .map(|entry| entry.parse::<f32>().map_err(|_| DemoError::MalformedProportions { value: spec.to_string() }))
        .collect()
}

fn run(cli: &Cli) -> Result<ExitCode, DemoError> {
    let config = Config::load_optional(Path::new(&cli.config))?;
    let resolved = resolve_args(cli, &config)?;

    println!("Config:");
    println!("  scheduler: {}", resolved.scheduler_name);
    println!("  size: {}", cli.size);
    println!("  chunksize: {}", cli.chunksize);
    println!("  constant: {}", cli.constant);
    println!("  check: {}", if cli.check { "yes" } else { "no" });
    println!("  kernel path: {}", resolved.kernel_path);
    print!("  platform.device list: ");
    for (plat, dev) in &resolved.devices {
        print!("{plat}.{dev} ");
    }
    println!();
    print!("  static props: ");
    for prop in &resolved.static_props {
        print!("{prop} ");
    }
    println!();
    println!("  dynamic chunks: {}", resolved.dynamic_chunks);

    let program = load_program(&resolved.kernel_path)?;

    let in1 = vec![1i32; cli.size];
    let in2 = vec![2i32; cli.size];
    let mut out = vec![0i32; cli.size];

    let device_count = resolved.devices.len();
    let scheduler: std::sync::Arc<dyn Scheduler> = if resolved.scheduler_name == "dynamic" {
        let dynamic = DynamicScheduler::new();
        dynamic.set_devices(device_count);
        dynamic.set_total_size(cli.size);
        dynamic.set_lws(cli.chunksize);
        dynamic.set_chunks(resolved.dynamic_chunks)?;
        std::sync::Arc::new(dynamic)
    } else if resolved.static_props.is_empty() {
        std::sync::Arc::new(StaticScheduler::new(SplitMode::ByDevices))
    } else {
        std::sync::Arc::new(StaticScheduler::new(SplitMode::Raw(resolved.static_props.clone())))
    };

    let devices: Vec<_> = resolved
        .devices
        .iter()
        .map(|(plat, dev)| enginecl_core::DeviceInfo {
            platform_index: *plat,
            device_index: *dev,
            name: format!("{plat}.{dev}"),
        })
        .collect();

    let args = vec![
        KernelArg::VectorRef(BufferHandle(0)),
        KernelArg::VectorRef(BufferHandle(1)),
        KernelArg::VectorRef(BufferHandle(2)),
        KernelArg::Scalar(cli.constant.to_ne_bytes().to_vec()),
    ];

    let stats = {
        let buffers = vec![
            (BufferHandle(0), HostSlice::from_slice(Direction::In, &in1)),
            (BufferHandle(1), HostSlice::from_slice(Direction::In, &in2)),
            (BufferHandle(2), HostSlice::from_mut_slice(Direction::Out, &mut out)),
        ];

        #[cfg(not(feature = "opencl"))]
        let backend = build_cpu_backend();
        #[cfg(feature = "opencl")]
        let backend = OclBackend;

        let runtime = Runtime::new(
            &backend,
            &devices,
            &program,
            &buffers,
            &[BufferHandle(0), BufferHandle(1)],
            "saxpy",
            args,
            NDRange::new1(cli.size),
            cli.chunksize,
            (1, 1),
            scheduler,
            true,
        )?;
        let stats = runtime.run()?;
        runtime.print_stats();
        stats
    };

    println!("time: {}", stats.total_duration_ms);

    if cli.check {
        match check_saxpy(&in1, &in2, &out, cli.constant) {
            None => {
                println!("Success");
                Ok(ExitCode::SUCCESS)
            }
            Some(pos) => {
                println!("[{pos}] mismatch");
                println!("Failure");
                Ok(ExitCode::FAILURE)
            }
        }
    } else {
        println!("Done");
        Ok(ExitCode::SUCCESS)
    }
}

/// Returns the first index whose computed value disagrees with the
/// reference formula, or `None` if every index matches.
fn check_saxpy(in1: &[i32], in2: &[i32], out: &[i32], constant: f32) -> Option<usize> {
    for i in 0..out.len() {
        let expected = (constant * in1[i] as f32 + in2[i] as f32).round() as i32;
        if expected != out[i] {
            return Some(i);
        }
    }
    None
}

#[cfg(not(feature = "opencl"))]
fn build_cpu_backend() -> CpuBackend {
    let mut backend = CpuBackend::new();
    backend.register_kernel("saxpy", |ctx| {
        let in1 = ctx.buffer(BufferHandle(0)).as_slice::<i32>();
        let in2 = ctx.buffer(BufferHandle(1)).as_slice::<i32>();
        let out = ctx.buffer(BufferHandle(2)).as_mut_slice::<i32>();
        let constant = f32::from_ne_bytes(ctx.scalar(0).try_into().unwrap());
        for i in ctx.offset..ctx.offset + ctx.size {
            out[i] = (constant * in1[i] as f32 + in2[i] as f32).round() as i32;
        }
    });
    backend
}

#[cfg(not(feature = "opencl"))]
fn load_program(_kernel_path: &str) -> Result<ProgramSource, DemoError> {
    // The CPU reference backend runs a registered closure, not compiled
    // source; the kernel path is only meaningful under `--features opencl`.
    Ok(ProgramSource::Source(String::new()))
}

#[cfg(feature = "opencl")]
fn load_program(kernel_path: &str) -> Result<ProgramSource, DemoError> {
    let source = std::fs::read_to_string(kernel_path)
        .map_err(|source| DemoError::ReadKernel { path: kernel_path.to_string(), source })?;
    Ok(ProgramSource::Source(source))
}
