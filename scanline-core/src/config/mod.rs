//! Configuration types for Scanline
//!
//! Settings for device discovery and GPU binding. [`ConfigFile`] groups
//! them and handles loading from disk.

mod file;

pub use file::{ConfigFile, sample_config};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Device discovery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Directory holding the DRM device nodes
    #[serde(default = "default_dri_dir")]
    pub dri_dir: PathBuf,

    /// Explicit candidate nodes, tried in order (empty = discover)
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            dri_dir: default_dri_dir(),
            paths: Vec::new(),
        }
    }
}

/// GPU binding settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuSettings {
    /// Bind a Vulkan device to the KMS device
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Enable validation layers when installed
    #[serde(default = "default_validation")]
    pub validation: bool,

    /// Application name reported to the Vulkan driver
    #[serde(default = "default_application_name")]
    pub application_name: String,
}

impl Default for GpuSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            validation: default_validation(),
            application_name: default_application_name(),
        }
    }
}

impl GpuSettings {
    /// Settings with GPU binding switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

fn default_dri_dir() -> PathBuf {
    PathBuf::from("/dev/dri")
}

fn default_true() -> bool {
    true
}

// on in debug builds only
fn default_validation() -> bool {
    cfg!(debug_assertions)
}

fn default_application_name() -> String {
    "scanline".to_string()
}
