//! Optional `enginecl.toml` defaults, overridable by CLI flags.
//!
//! Mirrors the package manager's `naml.toml` parsing: a thin `serde` struct
//! over the file, every field optional so a config can set only the knobs it
//! cares about and leave the rest to CLI flags or built-in defaults.

use std::path::Path;

use serde::Deserialize;

use crate::error::DemoError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: Option<String>,
    #[serde(default)]
    pub devices: Option<String>,
    #[serde(default)]
    pub static_props: Option<String>,
    #[serde(default)]
    pub dynamic_chunks: Option<usize>,
    #[serde(default)]
    pub kernel_path: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, DemoError> {
        let text = std::fs::read_to_string(path).map_err(|source| DemoError::ReadConfig {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| DemoError::ParseConfig {
            path: path.display().to_string(),
            source,
        })
    }

    /// Loads `enginecl.toml` from the current directory if present, else
    /// falls back to an empty (all-`None`) config — the file is optional.
    pub fn load_optional(path: &Path) -> Result<Self, DemoError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
