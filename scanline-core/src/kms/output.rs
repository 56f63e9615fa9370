//! Output resolution: connector -> encoder -> CRTC -> primary plane
//!
//! Every connector is resolved on its own. A connector that cannot be
//! resolved yields a [`ConnectorSkip`] and never affects the others.

use std::io;

use thiserror::Error;
use tracing::debug;

use super::property::PlaneType;
use super::resources::ResourceGraph;
use super::KmsBackend;
use crate::types::ModeInfo;

/// An active display output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub connector_id: u32,
    /// Connector name such as `HDMI-A-1`
    pub name: String,
    pub crtc_id: u32,
    /// Plane whose type property is PRIMARY
    pub primary_plane_id: u32,
    /// Mode currently programmed on the CRTC
    pub mode: ModeInfo,
    /// Frame interval in nanoseconds
    pub refresh_nsec: i64,
    /// Property blob holding `mode`; destroyed with the owning device
    pub mode_blob_id: u32,
}

impl Output {
    /// Refresh rate in Hz
    pub fn refresh_hz(&self) -> f64 {
        1e9 / self.refresh_nsec as f64
    }
}

/// Why a connector produced no output
#[derive(Debug, Error)]
pub enum ConnectorSkip {
    #[error("connector {0} has no encoder")]
    NoEncoder(u32),

    #[error("encoder {0} is not a resource of this device")]
    EncoderNotFound(u32),

    #[error("encoder {0} has no CRTC")]
    NoCrtc(u32),

    #[error("CRTC {0} is not a resource of this device")]
    CrtcNotFound(u32),

    #[error("CRTC {0} is not active")]
    Inactive(u32),

    #[error("CRTC {0} has no valid mode")]
    NoMode(u32),

    #[error("mode {0} has unusable timings")]
    InvalidTiming(String),

    #[error("no primary plane for CRTC {0}")]
    NoPrimaryPlane(u32),

    #[error("couldn't create mode blob: {0}")]
    ModeBlob(io::Error),

    #[error("query failed: {0}")]
    Query(#[from] io::Error),
}

/// Vertical refresh in milli-Hz, rounded to nearest
///
/// Returns `None` if `htotal` or `vtotal` is zero.
pub fn refresh_millihz(mode: &ModeInfo) -> Option<u64> {
    if mode.htotal == 0 || mode.vtotal == 0 {
        return None;
    }

    let htotal = u64::from(mode.htotal);
    let vtotal = u64::from(mode.vtotal);

    Some((u64::from(mode.clock) * 1_000_000 / htotal + vtotal / 2) / vtotal)
}

/// Frame interval for a refresh rate in milli-Hz
///
/// # Panics
///
/// Panics if `millihz` is zero.
pub fn millihz_to_nsec(millihz: u64) -> i64 {
    assert!(millihz > 0, "refresh rate must be positive");
    (1_000_000_000_000u64 / millihz) as i64
}

/// Resolve one connector into an [`Output`]
pub fn resolve_connector<B: KmsBackend>(
    backend: &B,
    graph: &ResourceGraph,
    connector_id: u32,
) -> Result<Output, ConnectorSkip> {
    let connector = backend.connector(connector_id)?;

    let encoder_id = connector
        .encoder_id
        .ok_or(ConnectorSkip::NoEncoder(connector_id))?;

    if !graph.encoders().contains(encoder_id) {
        return Err(ConnectorSkip::EncoderNotFound(encoder_id));
    }
    let encoder = backend.encoder(encoder_id)?;

    let crtc_id = encoder.crtc_id.ok_or(ConnectorSkip::NoCrtc(encoder_id))?;

    if !graph.crtcs().contains(crtc_id) {
        return Err(ConnectorSkip::CrtcNotFound(crtc_id));
    }
    let crtc = backend.crtc(crtc_id)?;

    if crtc.fb_id.is_none() {
        return Err(ConnectorSkip::Inactive(crtc_id));
    }
    let mode = crtc.mode.ok_or(ConnectorSkip::NoMode(crtc_id))?;

    let primary_plane_id = find_primary_plane(backend, graph, crtc_id)
        .ok_or(ConnectorSkip::NoPrimaryPlane(crtc_id))?;

    let millihz = refresh_millihz(&mode)
        .filter(|mhz| *mhz > 0)
        .ok_or_else(|| ConnectorSkip::InvalidTiming(mode.to_string()))?;
    let refresh_nsec = millihz_to_nsec(millihz);

    let mode_blob_id = backend
        .create_mode_blob(&mode)
        .map_err(ConnectorSkip::ModeBlob)?;

    debug!(
        "Connector {} ({}) -> encoder {} -> CRTC {} -> plane {}, {} ({} mHz)",
        connector_id, connector.name, encoder_id, crtc_id, primary_plane_id, mode, millihz
    );

    Ok(Output {
        connector_id,
        name: connector.name,
        crtc_id,
        primary_plane_id,
        mode,
        refresh_nsec,
        mode_blob_id,
    })
}

/// Primary plane for `crtc_id`
///
/// Only planes whose "type" property is PRIMARY are considered. The one
/// currently bound to the CRTC wins; otherwise the first one that can drive
/// it. Framebuffer ids play no part.
pub fn find_primary_plane<B: KmsBackend>(
    backend: &B,
    graph: &ResourceGraph,
    crtc_id: u32,
) -> Option<u32> {
    let mut fallback = None;

    for plane in graph.planes().iter().filter(|plane| plane.can_drive(crtc_id)) {
        if plane.plane_type(backend) != PlaneType::Primary {
            continue;
        }
        if plane.crtc_id == Some(crtc_id) {
            return Some(plane.id);
        }
        fallback.get_or_insert(plane.id);
    }

    fallback
}
