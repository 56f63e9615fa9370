//! Core types for Scanline
//!
//! Plain data shared between the KMS side and the GPU side.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// PCI bus address (domain, bus, device, function)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PciAddress {
    pub domain: u32,
    pub bus: u32,
    pub device: u32,
    pub function: u32,
}

impl PciAddress {
    pub fn new(domain: u32, bus: u32, device: u32, function: u32) -> Self {
        Self {
            domain,
            bus,
            device,
            function,
        }
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

impl FromStr for PciAddress {
    type Err = String;

    /// Parse a slot name such as `0000:01:00.0`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || format!("Invalid PCI slot name: {}", s);

        let (domain, rest) = s.trim().split_once(':').ok_or_else(bad)?;
        let (bus, rest) = rest.split_once(':').ok_or_else(bad)?;
        let (device, function) = rest.split_once('.').ok_or_else(bad)?;

        let hex = |part: &str| u32::from_str_radix(part, 16).map_err(|_| bad());

        Ok(Self {
            domain: hex(domain)?,
            bus: hex(bus)?,
            device: hex(device)?,
            function: hex(function)?,
        })
    }
}

/// Bus a KMS device hangs off
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusInfo {
    /// PCI device with its address
    Pci(PciAddress),
    /// Anything else (platform, usb...), by the kernel's bus id
    Other(String),
}

/// Display mode geometry and timing, as reported by the kernel
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModeInfo {
    /// Mode name (e.g. "1920x1080")
    pub name: String,
    /// Pixel clock in kHz
    pub clock: u32,
    pub hdisplay: u16,
    pub hsync_start: u16,
    pub hsync_end: u16,
    pub htotal: u16,
    pub hskew: u16,
    pub vdisplay: u16,
    pub vsync_start: u16,
    pub vsync_end: u16,
    pub vtotal: u16,
    pub vscan: u16,
    /// Nominal refresh in Hz
    pub vrefresh: u32,
    pub flags: u32,
    pub mode_type: u32,
}

impl ModeInfo {
    /// Visible size in pixels
    pub fn size(&self) -> (u16, u16) {
        (self.hdisplay, self.vdisplay)
    }
}

impl fmt::Display for ModeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@{}", self.hdisplay, self.vdisplay, self.vrefresh)
    }
}
