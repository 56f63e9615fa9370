//! Configuration file loading
//!
//! Loads user configuration from `~/.config/scanline/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{DeviceSettings, GpuSettings};
use crate::error::{Result, ScanlineError};

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Device discovery settings
    #[serde(default)]
    pub device: DeviceSettings,

    /// GPU binding settings
    #[serde(default)]
    pub gpu: GpuSettings,
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("scanline").join("config.toml")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("scanline")
                .join("config.toml")
        } else {
            PathBuf::from("/etc/scanline/config.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ScanlineError::config(format!("Failed to read config file: {}", e)))?;

        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| ScanlineError::config(format!("Failed to parse config file: {}", e)))?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, logging warnings but returning defaults on error
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::default_path())
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| ScanlineError::config(format!("Failed to serialize config: {}", e)))?;

        write_config(path, &content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Write the commented sample configuration to `path`
    pub fn write_sample(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        write_config(path, &sample_config())?;
        info!("Wrote sample configuration to {:?}", path);
        Ok(())
    }

    /// Create a default config file if it doesn't exist
    ///
    /// Returns whether a file was written.
    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_path();
        if path.exists() {
            return Ok(false);
        }

        Self::default().save_to(path)?;
        Ok(true)
    }
}

fn write_config(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ScanlineError::config(format!("Failed to create config directory: {}", e))
            })?;
        }
    }

    std::fs::write(path, content)
        .map_err(|e| ScanlineError::config(format!("Failed to write config file: {}", e)))
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# Scanline Configuration

[device]
# Directory holding the DRM device nodes
dri_dir = "/dev/dri"

# Explicit device nodes to try, in order. When empty, every card* node
# under dri_dir is tried in card number order.
# paths = ["/dev/dri/card1"]
paths = []

[gpu]
# Bind a Vulkan device to the chosen KMS device
enabled = true

# Enable Vulkan validation layers if they are installed
validation = false

# Application name reported to the Vulkan driver
application_name = "scanline"
"#
    .to_string()
}
