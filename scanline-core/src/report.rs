//! Serializable snapshot of an opened device

use serde::Serialize;
use std::fmt;

use crate::error::{Feature, Result, ScanlineError};
use crate::gpu::{DeviceSummary, GpuInstance};
use crate::kms::{Capabilities, KmsBackend, KmsDevice, Output};
use crate::types::ModeInfo;

/// One active output
#[derive(Debug, Clone, Serialize)]
pub struct OutputReport {
    pub connector: String,
    pub connector_id: u32,
    pub crtc_id: u32,
    pub primary_plane_id: u32,
    pub mode: ModeInfo,
    pub refresh_nsec: i64,
    pub refresh_hz: f64,
}

impl From<&Output> for OutputReport {
    fn from(output: &Output) -> Self {
        Self {
            connector: output.name.clone(),
            connector_id: output.connector_id,
            crtc_id: output.crtc_id,
            primary_plane_id: output.primary_plane_id,
            mode: output.mode.clone(),
            refresh_nsec: output.refresh_nsec,
            refresh_hz: output.refresh_hz(),
        }
    }
}

/// GPU binding outcome
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GpuReport {
    Bound {
        pci_address: String,
        device: DeviceSummary,
        queue_family: u32,
        extensions: Vec<String>,
        validation_layer: Option<String>,
    },
    Unavailable {
        reason: String,
    },
}

/// Everything known about an opened device
#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    pub path: String,
    pub capabilities: Capabilities,
    pub planes: usize,
    pub outputs: Vec<OutputReport>,
    pub gpu: GpuReport,
}

impl DeviceReport {
    pub fn from_device<B: KmsBackend, I: GpuInstance>(device: &KmsDevice<B, I>) -> Self {
        let gpu = match device.gpu() {
            Feature::Enabled(ctx) => GpuReport::Bound {
                pci_address: ctx.pci_address().to_string(),
                device: ctx.summary().clone(),
                queue_family: ctx.queue_family(),
                extensions: ctx.extensions().to_vec(),
                validation_layer: ctx.validation_layer().map(str::to_string),
            },
            Feature::Unavailable(reason) => GpuReport::Unavailable {
                reason: reason.to_string(),
            },
        };

        Self {
            path: device.path().display().to_string(),
            capabilities: device.capabilities(),
            planes: device.resources().planes().len(),
            outputs: device.outputs().iter().map(OutputReport::from).collect(),
            gpu,
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ScanlineError::Unsupported(format!("Couldn't serialize report: {}", e)))
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

impl fmt::Display for DeviceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Device: {}", self.path)?;
        writeln!(f)?;
        writeln!(f, "Capabilities:")?;
        writeln!(f, "  Universal planes: {}", yes_no(self.capabilities.universal_planes))?;
        writeln!(f, "  Atomic:           {}", yes_no(self.capabilities.atomic))?;
        writeln!(f, "  FB modifiers:     {}", yes_no(self.capabilities.fb_modifiers))?;
        writeln!(f, "  Planes:           {}", self.planes)?;
        writeln!(f)?;

        writeln!(f, "Outputs:")?;
        for output in &self.outputs {
            writeln!(
                f,
                "  {} (connector {}): CRTC {}, primary plane {}, {}x{} @ {:.3} Hz",
                output.connector,
                output.connector_id,
                output.crtc_id,
                output.primary_plane_id,
                output.mode.hdisplay,
                output.mode.vdisplay,
                output.refresh_hz
            )?;
        }
        writeln!(f)?;

        writeln!(f, "GPU:")?;
        match &self.gpu {
            GpuReport::Bound {
                pci_address,
                device,
                queue_family,
                extensions,
                validation_layer,
            } => {
                writeln!(f, "  Device:       {} ({})", device.name, device.kind)?;
                writeln!(f, "  PCI address:  {}", pci_address)?;
                writeln!(
                    f,
                    "  API version:  {}.{}.{}",
                    device.api_version.0, device.api_version.1, device.api_version.2
                )?;
                writeln!(f, "  Queue family: {}", queue_family)?;
                writeln!(f, "  Validation:   {}", validation_layer.as_deref().unwrap_or("off"))?;
                writeln!(f, "  Extensions:")?;
                for ext in extensions {
                    writeln!(f, "    - {}", ext)?;
                }
            }
            GpuReport::Unavailable { reason } => {
                writeln!(f, "  Not bound: {}", reason)?;
            }
        }

        Ok(())
    }
}
