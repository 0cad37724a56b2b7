//! Bridge configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use okra_core::{BridgeError, Result};

/// Default runtime library name searched by the platform loader.
pub const DEFAULT_LIBRARY: &str = "libokra_x86_64.so";

/// Settings for a `Bridge`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Path or soname of the okra runtime.
    pub library_path: PathBuf,
    /// Core count reported when the runtime has no capability query.
    pub fallback_cores: u32,
    /// Reject object arguments that point outside the registered heap.
    pub verify_object_refs: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            library_path: PathBuf::from(DEFAULT_LIBRARY),
            fallback_cores: 1,
            verify_object_refs: true,
        }
    }
}

impl BridgeConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| BridgeError::Config(e.to_string()))
    }

    /// Pretty JSON in the same shape `from_json_str` reads.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| BridgeError::Config(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Build from the process environment:
    /// `OKRA_CONFIG` (JSON file), then `OKRA_LIBRARY` and `OKRA_FALLBACK_CORES` overrides.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup("OKRA_CONFIG") {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        if let Some(lib) = lookup("OKRA_LIBRARY") {
            config.library_path = PathBuf::from(lib);
        }
        if let Some(cores) = lookup("OKRA_FALLBACK_CORES") {
            config.fallback_cores = cores
                .trim()
                .parse()
                .map_err(|_| BridgeError::Config(format!("OKRA_FALLBACK_CORES={cores:?} is not a number")))?;
        }
        if config.fallback_cores == 0 {
            return Err(BridgeError::Config("fallback_cores must be at least 1".into()));
        }
        Ok(config)
    }
}
