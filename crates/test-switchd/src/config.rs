//! Runtime configuration for the test switch.
//!
//! Loaded from a YAML runtime-configuration file using the driver's
//! upper-case keys:
//!
//! ```yaml
//! DELAY_MIN: 0
//! DELAY_MAX: 2
//! OVERRIDE_MAPPING: false
//! STATE_DIR: /var/lib/test-switch
//! ```

use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{SwitchError, SwitchResult};

/// Default runtime configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "runtime_config.yml";

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Lower bound of the simulated latency, in seconds.
    #[serde(rename = "DELAY_MIN", default)]
    pub delay_min: u64,

    /// Upper bound of the simulated latency, in seconds.
    #[serde(rename = "DELAY_MAX", default)]
    pub delay_max: u64,

    /// Allow a destination to be re-mapped to a different source.
    #[serde(rename = "OVERRIDE_MAPPING", default = "default_override_mapping")]
    pub override_mapping: bool,

    /// Directory holding the per-device mapping files.
    #[serde(rename = "STATE_DIR", default = "default_state_dir")]
    pub state_dir: PathBuf,
}

/// Settings consumed by [`crate::MappingEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Lower bound of the simulated latency, in seconds.
    pub delay_min: u64,
    /// Upper bound of the simulated latency, in seconds.
    pub delay_max: u64,
    /// Allow a destination to be re-mapped to a different source.
    pub override_mapping: bool,
}

fn default_override_mapping() -> bool {
    true
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            delay_min: 0,
            delay_max: 0,
            override_mapping: default_override_mapping(),
            state_dir: default_state_dir(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        RuntimeConfig::default().engine()
    }
}

impl RuntimeConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> SwitchResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::from_yaml(&content).map_err(|e| {
                    SwitchError::Config(format!(
                        "Failed to parse config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Runtime config {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(SwitchError::Io(e)),
        }
    }

    /// Parse configuration from YAML text. An empty document yields defaults.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> SwitchResult<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| SwitchError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SwitchResult<()> {
        if self.delay_max < self.delay_min {
            return Err(SwitchError::invalid_config(
                "DELAY_MAX",
                format!(
                    "must be >= DELAY_MIN ({} < {})",
                    self.delay_max, self.delay_min
                ),
            ));
        }
        Ok(())
    }

    /// Inclusive range of simulated latency in seconds.
    pub fn delay_range(&self) -> RangeInclusive<u64> {
        self.delay_min..=self.delay_max
    }

    /// Engine settings derived from this configuration.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            delay_min: self.delay_min,
            delay_max: self.delay_max,
            override_mapping: self.override_mapping,
        }
    }
}
