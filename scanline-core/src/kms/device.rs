//! An opened, negotiated KMS device with its resolved outputs

use std::fmt;
use std::os::fd::BorrowedFd;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::caps::Capabilities;
use super::output::{self, Output};
use super::resources::ResourceGraph;
use super::KmsBackend;
use crate::config::GpuSettings;
use crate::error::{Feature, Result, ScanlineError};
use crate::gpu::{self, GpuContext, GpuInstance, GpuLoader};

/// A KMS card that passed negotiation and has at least one active output
///
/// Resources are acquired in the order file -> id sets -> planes -> outputs
/// -> GPU context and released in reverse when the device is dropped.
pub struct KmsDevice<B: KmsBackend, I: GpuInstance> {
    gpu: Feature<GpuContext<I>>,
    outputs: Vec<Output>,
    graph: ResourceGraph,
    caps: Capabilities,
    path: PathBuf,
    backend: B,
}

impl<B: KmsBackend, I: GpuInstance> KmsDevice<B, I> {
    /// Negotiate capabilities, load resources and resolve outputs
    ///
    /// On any error everything acquired so far, including `backend`, is
    /// released before returning.
    pub fn open(backend: B, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let caps = Capabilities::negotiate(&backend, &path)?;
        let graph = ResourceGraph::load(&backend, &path)?;

        let mut device = Self {
            gpu: Feature::Unavailable(ScanlineError::Unsupported(
                "GPU binding not attempted".to_string(),
            )),
            outputs: Vec::with_capacity(graph.connectors().len()),
            graph,
            caps,
            path,
            backend,
        };

        for &connector_id in device.graph.connectors() {
            match output::resolve_connector(&device.backend, &device.graph, connector_id) {
                Ok(output) => device.outputs.push(output),
                Err(skip) => debug!("Skipping connector {}: {}", connector_id, skip),
            }
        }

        if device.outputs.is_empty() {
            return Err(ScanlineError::NoActiveOutputs { path: device.path.clone() });
        }

        info!(
            "Using device {} with {} outputs and {} planes",
            device.path.display(),
            device.outputs.len(),
            device.graph.planes().len()
        );

        Ok(device)
    }

    /// Bind a GPU context to this device
    ///
    /// Skipped when the device lacks modifier support. Any failure leaves
    /// the device without a GPU context; the reason is kept in
    /// [`KmsDevice::gpu`].
    pub fn bind_gpu<L>(&mut self, loader: &L, settings: &GpuSettings) -> &Feature<GpuContext<I>>
    where
        L: GpuLoader<Instance = I>,
    {
        self.gpu.take();

        self.gpu = if !self.caps.fb_modifiers {
            info!("Can't use Vulkan since the device doesn't support modifiers");
            Feature::Unavailable(ScanlineError::ModifiersUnsupported)
        } else {
            let result = gpu::binder::bind(loader, &self.backend, settings);
            if let Err(e) = &result {
                warn!("GPU binding failed for {}: {}", self.path.display(), e);
            }
            Feature::from_result(result)
        };

        &self.gpu
    }

    /// Record why no GPU context was bound
    pub fn set_gpu_unavailable(&mut self, reason: ScanlineError) {
        self.gpu.take();
        self.gpu = Feature::Unavailable(reason);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    pub fn resources(&self) -> &ResourceGraph {
        &self.graph
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn gpu(&self) -> &Feature<GpuContext<I>> {
        &self.gpu
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Device file descriptor for a buffer allocator
    ///
    /// The descriptor stays owned by this device.
    pub fn allocator_fd(&self) -> BorrowedFd<'_> {
        self.backend.as_fd()
    }
}

impl<B: KmsBackend, I: GpuInstance> fmt::Debug for KmsDevice<B, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmsDevice")
            .field("path", &self.path)
            .field("caps", &self.caps)
            .field("outputs", &self.outputs)
            .field("gpu", &self.gpu)
            .finish()
    }
}

impl<B: KmsBackend, I: GpuInstance> Drop for KmsDevice<B, I> {
    fn drop(&mut self) {
        self.gpu.take();

        for output in self.outputs.drain(..).rev() {
            if let Err(e) = self.backend.destroy_blob(output.mode_blob_id) {
                warn!(
                    "Couldn't destroy mode blob {} of connector {}: {}",
                    output.mode_blob_id, output.connector_id, e
                );
            }
        }
        // planes, id sets and finally the backend (file) drop in field order
    }
}
