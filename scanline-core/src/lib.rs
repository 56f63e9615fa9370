//! Scanline Core Library
//!
//! KMS device discovery, output topology and GPU binding.
//!
//! This library provides:
//! - Discovery of DRM primary nodes and selection of the first usable one
//! - Atomic/universal-plane negotiation and modifier probing
//! - Resolution of connector -> encoder -> CRTC -> primary plane chains
//! - Binding the matching Vulkan physical device by PCI address
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐    ┌──────────────────┐    ┌──────────────────┐
//! │ DeviceEnumerator │───▶│ KmsDevice        │───▶│ GpuContext       │
//! │ (/dev/dri/card*) │    │ (caps, outputs)  │    │ (Vulkan, by PCI) │
//! └──────────────────┘    └──────────────────┘    └──────────────────┘
//! ```

pub mod config;
pub mod enumerate;
pub mod error;
pub mod gpu;
pub mod kms;
pub mod report;
pub mod types;

pub use config::{ConfigFile, DeviceSettings, GpuSettings};
pub use enumerate::{DeviceEnumerator, SystemDevice, SystemEnumerator};
pub use error::{Feature, Result, ScanlineError};
pub use gpu::GpuContext;
pub use kms::{KmsDevice, Output};
pub use report::DeviceReport;
pub use types::{BusInfo, ModeInfo, PciAddress};
