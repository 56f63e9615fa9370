//! GPU binding for a KMS device
//!
//! Provides:
//! - Matching a Vulkan physical device to the KMS device by PCI address
//! - Negotiating the dma-buf/modifier extension set and a graphics queue
//! - Best-effort validation layer selection
//!
//! The Vulkan loader is reached through [`GpuLoader`] and [`GpuInstance`];
//! [`vulkan`] implements them with `ash`.

pub mod binder;
pub mod vulkan;

pub use binder::{
    bind, find_physical_device, negotiate_extensions, pci_identity, pick_physical_device,
    select_queue_family, select_validation_layer,
};
pub use vulkan::{VulkanDevice, VulkanInstance, VulkanLoader};

use serde::Serialize;
use std::fmt;

use crate::error::Result;
use crate::types::PciAddress;

/// Extension needed to read a physical device's PCI address
pub const PCI_BUS_INFO_EXTENSION: &str = "VK_EXT_pci_bus_info";

/// Device extensions required to import KMS buffers and fences
pub const REQUIRED_DEVICE_EXTENSIONS: [&str; 5] = [
    "VK_KHR_external_memory_fd",
    "VK_EXT_external_memory_dma_buf",
    "VK_EXT_image_drm_format_modifier",
    // required by VK_EXT_image_drm_format_modifier
    "VK_KHR_image_format_list",
    // explicit fencing
    "VK_KHR_external_semaphore_fd",
];

/// Validation layers tried in order
pub const VALIDATION_LAYERS: [&str; 2] = [
    "VK_LAYER_KHRONOS_validation",
    "VK_LAYER_LUNARG_standard_validation",
];

/// Physical device type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Integrated,
    Discrete,
    Virtual,
    Cpu,
    Other,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integrated => "integrated",
            Self::Discrete => "discrete",
            Self::Virtual => "virtual",
            Self::Cpu => "cpu",
            Self::Other => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Identification of a physical device, for logs and reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub name: String,
    pub kind: DeviceKind,
    /// Supported API version (major, minor, patch)
    pub api_version: (u32, u32, u32),
    /// Driver version, decoded the same way as the API version
    pub driver_version: (u32, u32, u32),
}

/// Properties of a physical device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProperties {
    pub summary: DeviceSummary,
    /// Present only when queried on a device with VK_EXT_pci_bus_info
    pub pci: Option<PciAddress>,
}

/// One queue family of a physical device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamily {
    pub graphics: bool,
    pub queue_count: u32,
}

/// Decode a packed Vulkan version into (major, minor, patch)
pub fn version_triplet(version: u32) -> (u32, u32, u32) {
    (version >> 22, (version >> 12) & 0x3ff, version & 0xfff)
}

/// Entry point into a GPU API
pub trait GpuLoader {
    type Instance: GpuInstance;

    /// Names of the available instance layers
    fn instance_layers(&self) -> Result<Vec<String>>;

    fn create_instance(&self, application: &str, layers: &[&str]) -> Result<Self::Instance>;
}

/// An instance of a GPU API
///
/// Dropping the instance destroys it; logical devices created from it
/// must be dropped first.
pub trait GpuInstance {
    type PhysicalDevice: Copy + fmt::Debug;
    type Device;

    fn physical_devices(&self) -> Result<Vec<Self::PhysicalDevice>>;

    fn device_extensions(&self, physical: Self::PhysicalDevice) -> Result<Vec<String>>;

    /// Query properties; the PCI address is only requested when `with_pci`
    fn properties(&self, physical: Self::PhysicalDevice, with_pci: bool) -> DeviceProperties;

    fn queue_families(&self, physical: Self::PhysicalDevice) -> Vec<QueueFamily>;

    /// Create a logical device with one queue of `queue_family`
    fn create_device(
        &self,
        physical: Self::PhysicalDevice,
        queue_family: u32,
        extensions: &[&str],
    ) -> Result<Self::Device>;
}

/// A GPU context bound to the physical device behind a KMS device
pub struct GpuContext<I: GpuInstance> {
    // declared before `instance` so it is destroyed first
    device: I::Device,
    instance: I,
    physical_device: I::PhysicalDevice,
    pci: PciAddress,
    summary: DeviceSummary,
    queue_family: u32,
    extensions: Vec<String>,
    validation_layer: Option<String>,
}

impl<I: GpuInstance> GpuContext<I> {
    pub fn instance(&self) -> &I {
        &self.instance
    }

    pub fn device(&self) -> &I::Device {
        &self.device
    }

    pub fn physical_device(&self) -> I::PhysicalDevice {
        self.physical_device
    }

    /// PCI address shared by the physical device and the KMS device
    pub fn pci_address(&self) -> PciAddress {
        self.pci
    }

    pub fn summary(&self) -> &DeviceSummary {
        &self.summary
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Device extensions enabled on the logical device
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn validation_layer(&self) -> Option<&str> {
        self.validation_layer.as_deref()
    }
}

impl<I: GpuInstance> fmt::Debug for GpuContext<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuContext")
            .field("pci", &self.pci)
            .field("physical_device", &self.physical_device)
            .field("name", &self.summary.name)
            .field("queue_family", &self.queue_family)
            .field("extensions", &self.extensions)
            .field("validation_layer", &self.validation_layer)
            .finish()
    }
}
