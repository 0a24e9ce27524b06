//! Argument surface, mirroring the original `examples/tier-2/saxpy.cpp`:
//!
//! ```text
//! <size> <chunksize> <constant> [--devices plat.dev,...] [--static prop:prop...]
//!                                [--dynamic chunks] [--check] [--kernel path]
//! ```
//!
//! eg. static:  1024 128 3.14 --devices 0.0,0.1,1.0 --static 0.3:0.2 --check
//! eg. dynamic: 10240 128 3.14 --devices 1.0,1.1 --dynamic 4

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "enginecl-saxpy")]
#[command(author, version, about = "SAXPY demo for the enginecl work scheduler", long_about = None)]
pub struct Cli {
    /// Total element count (must be a multiple of `chunksize`)
    pub size: usize,

    /// Local work size / alignment granularity
    pub chunksize: usize,

    /// SAXPY constant `c` in `out[i] = c * in1[i] + in2[i]`
    pub constant: f32,

    /// Comma-separated `platform.device` pairs, e.g. "0.0,0.1,1.0". Falls
    /// back to the config file, then to a single "0.0".
    #[arg(long)]
    pub devices: Option<String>,

    /// Colon-separated proportions for the first D-1 devices, e.g. "0.3:0.2".
    /// Selects the static scheduler when given.
    #[arg(long)]
    pub r#static: Option<String>,

    /// Number of equal-size chunks for the dynamic scheduler. Selects the
    /// dynamic scheduler when given.
    #[arg(long)]
    pub dynamic: Option<usize>,

    /// Verify the computed output against the reference formula
    #[arg(long)]
    pub check: bool,

    /// Path to the OpenCL kernel source (only consulted with `--features opencl`)
    #[arg(long)]
    pub kernel: Option<String>,

    /// Optional `enginecl.toml` to source defaults from before CLI overrides
    #[arg(long, default_value = "enginecl.toml")]
    pub config: String,
}
