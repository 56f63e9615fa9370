//! Vulkan implementation of the GPU traits, using `ash`

use std::ffi::{CString, c_char};

use ash::{Device, Entry, Instance, vk};
use tracing::debug;

use super::{DeviceKind, DeviceProperties, DeviceSummary, GpuInstance, GpuLoader, QueueFamily};
use super::version_triplet;
use crate::error::{Result, ScanlineError};
use crate::types::PciAddress;

/// API version requested at instance creation; properties2 is core in 1.1
const API_VERSION: u32 = vk::make_api_version(0, 1, 1, 0);

fn c_strings(names: &[&str]) -> Result<Vec<CString>> {
    names
        .iter()
        .map(|name| {
            CString::new(*name).map_err(|_| ScanlineError::vulkan(format!("Invalid name: {}", name)))
        })
        .collect()
}

/// The system Vulkan loader
pub struct VulkanLoader {
    entry: Entry,
}

impl VulkanLoader {
    /// Load libvulkan at runtime
    pub fn load() -> Result<Self> {
        // SAFETY: the loaded library is the system Vulkan loader; `Entry`
        // keeps it mapped for as long as any clone is alive.
        let entry = unsafe { Entry::load() }
            .map_err(|e| ScanlineError::vulkan(format!("Failed to load Vulkan library: {}", e)))?;
        Ok(Self { entry })
    }
}

impl GpuLoader for VulkanLoader {
    type Instance = VulkanInstance;

    fn instance_layers(&self) -> Result<Vec<String>> {
        let layers = unsafe { self.entry.enumerate_instance_layer_properties() }
            .map_err(|e| ScanlineError::vulkan(format!("Failed to get layer properties: {}", e)))?;

        Ok(layers
            .iter()
            .filter_map(|layer| layer.layer_name_as_c_str().ok())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    fn create_instance(&self, application: &str, layers: &[&str]) -> Result<VulkanInstance> {
        let app_name = CString::new(application)
            .map_err(|_| ScanlineError::config("application name contains a NUL byte"))?;
        let layer_names = c_strings(layers)?;
        let layer_ptrs: Vec<*const c_char> = layer_names.iter().map(|n| n.as_ptr()).collect();

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(0)
            .engine_name(c"scanline")
            .engine_version(0)
            .api_version(API_VERSION);

        let create = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_ptrs);

        // SAFETY: every pointer in `create` outlives this call.
        let instance = unsafe { self.entry.create_instance(&create, None) }
            .map_err(|e| ScanlineError::vulkan(format!("Failed to create instance: {}", e)))?;
        debug!("Created Vulkan instance with layers {:?}", layers);

        Ok(VulkanInstance {
            instance,
            _entry: self.entry.clone(),
        })
    }
}

/// A Vulkan instance; destroyed on drop
pub struct VulkanInstance {
    instance: Instance,
    // keeps libvulkan loaded for as long as the instance exists
    _entry: Entry,
}

impl VulkanInstance {
    pub fn raw(&self) -> &Instance {
        &self.instance
    }
}

impl GpuInstance for VulkanInstance {
    type PhysicalDevice = vk::PhysicalDevice;
    type Device = VulkanDevice;

    fn physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance.enumerate_physical_devices() }
            .map_err(|e| ScanlineError::vulkan(format!("Failed to get physical devices: {}", e)))
    }

    fn device_extensions(&self, physical: vk::PhysicalDevice) -> Result<Vec<String>> {
        let exts = unsafe { self.instance.enumerate_device_extension_properties(physical) }
            .map_err(|e| {
                ScanlineError::vulkan(format!("Failed to enumerate device extensions: {}", e))
            })?;

        Ok(exts
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    fn properties(&self, physical: vk::PhysicalDevice, with_pci: bool) -> DeviceProperties {
        let mut pci_info = vk::PhysicalDevicePCIBusInfoPropertiesEXT::default();
        let mut props2 = vk::PhysicalDeviceProperties2::default();
        if with_pci {
            props2 = props2.push_next(&mut pci_info);
        }
        unsafe { self.instance.get_physical_device_properties2(physical, &mut props2) };
        let props = props2.properties;

        let name = props
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let kind = match props.device_type {
            vk::PhysicalDeviceType::INTEGRATED_GPU => DeviceKind::Integrated,
            vk::PhysicalDeviceType::DISCRETE_GPU => DeviceKind::Discrete,
            vk::PhysicalDeviceType::VIRTUAL_GPU => DeviceKind::Virtual,
            vk::PhysicalDeviceType::CPU => DeviceKind::Cpu,
            _ => DeviceKind::Other,
        };

        let pci = with_pci.then(|| {
            PciAddress::new(
                pci_info.pci_domain,
                pci_info.pci_bus,
                pci_info.pci_device,
                pci_info.pci_function,
            )
        });

        DeviceProperties {
            summary: DeviceSummary {
                name,
                kind,
                api_version: version_triplet(props.api_version),
                driver_version: version_triplet(props.driver_version),
            },
            pci,
        }
    }

    fn queue_families(&self, physical: vk::PhysicalDevice) -> Vec<QueueFamily> {
        unsafe { self.instance.get_physical_device_queue_family_properties(physical) }
            .iter()
            .map(|family| QueueFamily {
                graphics: family.queue_flags.contains(vk::QueueFlags::GRAPHICS),
                queue_count: family.queue_count,
            })
            .collect()
    }

    fn create_device(
        &self,
        physical: vk::PhysicalDevice,
        queue_family: u32,
        extensions: &[&str],
    ) -> Result<VulkanDevice> {
        let ext_names = c_strings(extensions)?;
        let ext_ptrs: Vec<*const c_char> = ext_names.iter().map(|n| n.as_ptr()).collect();

        let priorities = [1.0f32];
        let queues = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family)
            .queue_priorities(&priorities)];

        let info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queues)
            .enabled_extension_names(&ext_ptrs);

        // SAFETY: `physical` came from this instance and `info` borrows
        // locals that outlive the call.
        let device = unsafe { self.instance.create_device(physical, &info, None) }
            .map_err(|e| ScanlineError::vulkan(format!("Failed to create logical device: {}", e)))?;
        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        Ok(VulkanDevice {
            device,
            queue,
            queue_family,
        })
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        // SAFETY: GpuContext drops every device created from this instance first.
        unsafe { self.instance.destroy_instance(None) };
    }
}

/// A logical device with one queue; destroyed on drop
pub struct VulkanDevice {
    device: Device,
    queue: vk::Queue,
    queue_family: u32,
}

impl VulkanDevice {
    pub fn raw(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        // SAFETY: nothing was created from the device, so no child objects remain.
        unsafe { self.device.destroy_device(None) };
    }
}
