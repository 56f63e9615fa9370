//! Binding a GPU context to a KMS device by PCI address

use tracing::{debug, info, warn};

use super::{
    GpuContext, GpuInstance, GpuLoader, PCI_BUS_INFO_EXTENSION, QueueFamily,
    REQUIRED_DEVICE_EXTENSIONS, VALIDATION_LAYERS,
};
use crate::config::GpuSettings;
use crate::error::{Result, ScanlineError};
use crate::kms::KmsBackend;
use crate::types::{BusInfo, PciAddress};

/// PCI address of the device behind a KMS node
pub fn pci_identity<B: KmsBackend>(backend: &B) -> Result<PciAddress> {
    match backend.bus_info() {
        Ok(BusInfo::Pci(addr)) => Ok(addr),
        Ok(BusInfo::Other(bus)) => Err(ScanlineError::NoPciDevice(bus)),
        Err(e) => Err(ScanlineError::from(e).with_context("Couldn't read device bus info")),
    }
}

/// Pick the validation layer to enable, if any
///
/// Prefers the Khronos layer and falls back to the older LunarG one.
pub fn select_validation_layer(available: &[String], enabled: bool) -> Option<&'static str> {
    if !enabled {
        return None;
    }

    VALIDATION_LAYERS
        .iter()
        .copied()
        .find(|wanted| available.iter().any(|layer| layer == wanted))
}

/// First physical device among `candidates` whose PCI address is `pci`
///
/// Devices without VK_EXT_pci_bus_info cannot be identified and are
/// skipped, wherever they appear in the list.
pub fn pick_physical_device<I: GpuInstance>(
    instance: &I,
    candidates: &[I::PhysicalDevice],
    pci: PciAddress,
) -> Option<I::PhysicalDevice> {
    for &physical in candidates {
        let extensions = match instance.device_extensions(physical) {
            Ok(exts) => exts,
            Err(e) => {
                debug!("Couldn't list extensions of {:?}: {}", physical, e);
                continue;
            }
        };

        if !extensions.iter().any(|ext| ext == PCI_BUS_INFO_EXTENSION) {
            debug!("{:?} doesn't support {}", physical, PCI_BUS_INFO_EXTENSION);
            continue;
        }

        let props = instance.properties(physical, true);
        let summary = &props.summary;
        let matched = props.pci == Some(pci);

        info!(
            "Vulkan device {} ({}), API {}.{}.{}, driver {}.{}.{}{}",
            summary.name,
            summary.kind,
            summary.api_version.0,
            summary.api_version.1,
            summary.api_version.2,
            summary.driver_version.0,
            summary.driver_version.1,
            summary.driver_version.2,
            if matched { " [match]" } else { "" }
        );

        if matched {
            return Some(physical);
        }
    }

    None
}

/// Enumerate physical devices and find the one at `pci`
pub fn find_physical_device<I: GpuInstance>(
    instance: &I,
    pci: PciAddress,
) -> Result<I::PhysicalDevice> {
    let candidates = instance.physical_devices()?;
    debug!("{} Vulkan physical devices", candidates.len());

    pick_physical_device(instance, &candidates, pci)
        .ok_or(ScanlineError::NoMatchingPhysicalDevice(pci))
}

/// Check that every required device extension is supported
pub fn negotiate_extensions<I: GpuInstance>(
    instance: &I,
    physical: I::PhysicalDevice,
) -> Result<Vec<String>> {
    let available = instance.device_extensions(physical)?;

    for required in REQUIRED_DEVICE_EXTENSIONS {
        if !available.iter().any(|ext| ext == required) {
            return Err(ScanlineError::ExtensionMissing(required.to_string()));
        }
    }

    Ok(REQUIRED_DEVICE_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect())
}

/// Index of the first queue family with graphics support
pub fn select_queue_family(families: &[QueueFamily]) -> Result<u32> {
    families
        .iter()
        .position(|family| family.graphics && family.queue_count > 0)
        .map(|index| index as u32)
        .ok_or(ScanlineError::NoGraphicsQueue)
}

/// Create a GPU context on the physical device behind `backend`
///
/// The PCI address is resolved before the loader is touched. Whatever was
/// created before a failure is destroyed before the error is returned.
pub fn bind<L, B>(loader: &L, backend: &B, settings: &GpuSettings) -> Result<GpuContext<L::Instance>>
where
    L: GpuLoader,
    B: KmsBackend,
{
    let pci = pci_identity(backend)?;
    debug!("KMS device is at PCI {}", pci);

    let validation_layer = if settings.validation {
        match loader.instance_layers() {
            Ok(available) => {
                let layer = select_validation_layer(&available, true);
                if layer.is_none() {
                    warn!("Validation requested but no validation layer is installed");
                }
                layer
            }
            Err(e) => {
                warn!("Couldn't enumerate instance layers: {}", e);
                None
            }
        }
    } else {
        None
    };
    if let Some(layer) = validation_layer {
        info!("Using validation layer {}", layer);
    }

    let layers: Vec<&str> = validation_layer.into_iter().collect();
    let instance = loader.create_instance(&settings.application_name, &layers)?;

    let physical = find_physical_device(&instance, pci)?;
    let extensions = negotiate_extensions(&instance, physical)?;
    let queue_family = select_queue_family(&instance.queue_families(physical))?;

    let ext_names: Vec<&str> = extensions.iter().map(String::as_str).collect();
    let device = instance.create_device(physical, queue_family, &ext_names)?;

    let summary = instance.properties(physical, true).summary;
    info!(
        "Bound Vulkan device {} at {} (queue family {})",
        summary.name, pci, queue_family
    );

    Ok(GpuContext {
        device,
        instance,
        physical_device: physical,
        pci,
        summary,
        queue_family,
        extensions,
        validation_layer: validation_layer.map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_validation_layer_preference() {
        let both = layers(&[
            "VK_LAYER_LUNARG_standard_validation",
            "VK_LAYER_KHRONOS_validation",
        ]);
        assert_eq!(
            select_validation_layer(&both, true),
            Some("VK_LAYER_KHRONOS_validation")
        );

        let legacy = layers(&["VK_LAYER_MESA_overlay", "VK_LAYER_LUNARG_standard_validation"]);
        assert_eq!(
            select_validation_layer(&legacy, true),
            Some("VK_LAYER_LUNARG_standard_validation")
        );

        assert_eq!(select_validation_layer(&layers(&["VK_LAYER_MESA_overlay"]), true), None);
        assert_eq!(select_validation_layer(&both, false), None);
    }

    #[test]
    fn test_select_queue_family() {
        let families = [
            QueueFamily {
                graphics: false,
                queue_count: 2,
            },
            QueueFamily {
                graphics: true,
                queue_count: 1,
            },
            QueueFamily {
                graphics: true,
                queue_count: 4,
            },
        ];
        assert_eq!(select_queue_family(&families).unwrap(), 1);

        let compute_only = [QueueFamily {
            graphics: false,
            queue_count: 1,
        }];
        assert!(matches!(
            select_queue_family(&compute_only),
            Err(ScanlineError::NoGraphicsQueue)
        ));
    }
}
