//! Demo-level error type. Wraps `EngineError` plus the CLI/config failure
//! modes that never reach the core (bad device spec, unreadable kernel
//! file, malformed config).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("failed to read config file {path}: {source}")]
    ReadConfig { path: String, source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    ParseConfig { path: String, source: toml::de::Error },

    #[error("failed to read kernel source {path}: {source}")]
    ReadKernel { path: String, source: std::io::Error },

    #[error("malformed platform.device entry {entry:?}: expected \"plat.dev\"")]
    MalformedDeviceSpec { entry: String },

    #[error("malformed static proportion list {value:?}")]
    MalformedProportions { value: String },

    #[error(transparent)]
    Engine(#[from] enginecl_core::EngineError),
}
