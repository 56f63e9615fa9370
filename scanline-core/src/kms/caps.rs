//! Client capability negotiation

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use super::{ClientCap, DriverCap, KmsBackend};
use crate::error::{Result, ScanlineError};

/// Capabilities negotiated on an opened card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub universal_planes: bool,
    pub atomic: bool,
    /// ADDFB2 with modifiers; gates GPU binding
    pub fb_modifiers: bool,
}

impl Capabilities {
    /// Switch on universal planes and atomic, then probe modifier support
    ///
    /// Universal planes and atomic are both required; there is no degraded
    /// mode without them.
    pub fn negotiate<B: KmsBackend>(backend: &B, path: &Path) -> Result<Self> {
        backend
            .set_client_cap(ClientCap::UniversalPlanes, true)
            .map_err(|e| {
                debug!("UNIVERSAL_PLANES rejected on {}: {}", path.display(), e);
                ScanlineError::open_failed(path, "No support for universal planes")
            })?;

        backend.set_client_cap(ClientCap::Atomic, true).map_err(|e| {
            debug!("ATOMIC rejected on {}: {}", path.display(), e);
            ScanlineError::open_failed(path, "No support for atomic")
        })?;

        let fb_modifiers = matches!(backend.driver_cap(DriverCap::AddFb2Modifiers), Ok(v) if v != 0);

        info!(
            "Device {} {} framebuffer modifiers",
            path.display(),
            if fb_modifiers {
                "supports"
            } else {
                "does not support"
            }
        );

        Ok(Self {
            universal_planes: true,
            atomic: true,
            fb_modifiers,
        })
    }
}
