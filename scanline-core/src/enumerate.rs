//! Candidate discovery and first-successful device selection

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{ConfigFile, GpuSettings};
use crate::error::{CandidateFailure, Result, ScanlineError};
use crate::gpu::{GpuLoader, VulkanLoader};
use crate::kms::drm::DriRegistry;
use crate::kms::{DeviceRegistry, KmsDevice};

enum GpuSource<L> {
    Disabled,
    Failed(String),
    Loader(L),
}

/// Finds the first candidate device that opens with an active output
pub struct DeviceEnumerator<R: DeviceRegistry, L: GpuLoader> {
    registry: R,
    paths: Vec<PathBuf>,
    gpu: GpuSource<L>,
    gpu_settings: GpuSettings,
}

/// Enumerator over `/dev/dri` with the system Vulkan loader
pub type SystemEnumerator = DeviceEnumerator<DriRegistry, VulkanLoader>;

/// Device type produced by [`SystemEnumerator`]
pub type SystemDevice = KmsDevice<crate::kms::drm::DrmCard, crate::gpu::VulkanInstance>;

impl<R: DeviceRegistry, L: GpuLoader> DeviceEnumerator<R, L> {
    /// Enumerator with GPU binding disabled
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            paths: Vec::new(),
            gpu: GpuSource::Disabled,
            gpu_settings: GpuSettings::disabled(),
        }
    }

    /// Try these nodes instead of asking the registry
    pub fn with_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.paths = paths;
        self
    }

    /// Bind a GPU context on opened devices using `loader`
    ///
    /// A loader that failed to load makes every device GPU-less with the
    /// failure as reason.
    pub fn with_gpu(mut self, loader: Result<L>, settings: GpuSettings) -> Self {
        self.gpu = if !settings.enabled {
            GpuSource::Disabled
        } else {
            match loader {
                Ok(loader) => GpuSource::Loader(loader),
                Err(e) => {
                    warn!("GPU binding unavailable: {}", e);
                    let reason = match e {
                        ScanlineError::Vulkan(msg) => msg,
                        other => other.to_string(),
                    };
                    GpuSource::Failed(reason)
                }
            }
        };
        self.gpu_settings = settings;
        self
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Candidate device nodes in the order they will be tried
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let candidates = if self.paths.is_empty() {
            self.registry
                .candidates()
                .map_err(|e| ScanlineError::from(e).with_context("Couldn't list devices"))?
        } else {
            self.paths.clone()
        };

        if candidates.is_empty() {
            return Err(ScanlineError::NoDeviceFound);
        }

        info!("Found {} candidate devices", candidates.len());
        Ok(candidates)
    }

    /// Open the first candidate with at least one active output
    ///
    /// Candidates that fail are closed before the next one is tried.
    pub fn try_open_first_successful(
        &self,
        paths: &[PathBuf],
    ) -> Result<KmsDevice<R::Backend, L::Instance>> {
        let mut failures = Vec::new();

        for path in paths {
            match self.open_candidate(path) {
                Ok(device) => return Ok(device),
                Err(error) => {
                    warn!("Skipping {}: {}", path.display(), error);
                    failures.push(CandidateFailure {
                        path: path.clone(),
                        error,
                    });
                }
            }
        }

        Err(ScanlineError::NoSuitableDevice(failures))
    }

    /// Discover candidates and open the first suitable one
    pub fn open(&self) -> Result<KmsDevice<R::Backend, L::Instance>> {
        let candidates = self.discover()?;
        self.try_open_first_successful(&candidates)
    }

    /// Open, negotiate and resolve one node, then bind the GPU if enabled
    pub fn open_candidate(&self, path: &Path) -> Result<KmsDevice<R::Backend, L::Instance>> {
        debug!("Trying {}", path.display());

        let backend = self
            .registry
            .open(path)
            .map_err(|e| ScanlineError::open_failed(path, e.to_string()))?;

        let mut device = KmsDevice::open(backend, path)?;

        match &self.gpu {
            GpuSource::Loader(loader) => {
                device.bind_gpu(loader, &self.gpu_settings);
            }
            _ if !device.capabilities().fb_modifiers => {
                device.set_gpu_unavailable(ScanlineError::ModifiersUnsupported)
            }
            GpuSource::Disabled => device.set_gpu_unavailable(ScanlineError::Unsupported(
                "GPU binding disabled".to_string(),
            )),
            GpuSource::Failed(reason) => {
                device.set_gpu_unavailable(ScanlineError::vulkan(reason.clone()))
            }
        }

        Ok(device)
    }
}

impl SystemEnumerator {
    /// Enumerator configured from a config file
    ///
    /// The Vulkan loader is only loaded when GPU binding is enabled.
    pub fn from_config(config: &ConfigFile) -> Self {
        let enumerator = Self::new(DriRegistry::new(&config.device.dri_dir))
            .with_paths(config.device.paths.clone());

        if config.gpu.enabled {
            enumerator.with_gpu(VulkanLoader::load(), config.gpu.clone())
        } else {
            enumerator
        }
    }
}
