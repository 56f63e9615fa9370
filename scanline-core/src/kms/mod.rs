//! Kernel mode setting: capability negotiation and output topology
//!
//! This module handles:
//! - Client capability negotiation on an opened card
//! - Loading the CRTC/encoder/connector id sets and the plane list
//! - Resolving connector -> encoder -> CRTC -> primary plane chains
//!
//! All kernel access goes through [`KmsBackend`]; [`drm::DrmCard`] is the
//! implementation backed by the `drm` crate.

pub mod caps;
pub mod device;
pub mod drm;
pub mod output;
pub mod property;
pub mod resources;

pub use caps::Capabilities;
pub use device::KmsDevice;
pub use output::{ConnectorSkip, Output};
pub use property::{PlaneType, read_enum_property};
pub use resources::{Plane, ResourceGraph};

use std::io;
use std::os::fd::BorrowedFd;
use std::path::{Path, PathBuf};

use crate::types::{BusInfo, ModeInfo};

/// Client capabilities a process can switch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCap {
    UniversalPlanes,
    Atomic,
}

/// Driver capabilities that can be queried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCap {
    AddFb2Modifiers,
}

/// Kind of mode object a property belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Connector,
    Encoder,
    Crtc,
    Plane,
}

/// Id sets returned by the resources query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceIds {
    pub crtcs: Vec<u32>,
    pub connectors: Vec<u32>,
    pub encoders: Vec<u32>,
}

/// Connector detail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorInfo {
    pub id: u32,
    /// Interface name and index such as `DP-1`
    pub name: String,
    /// Encoder currently driving this connector
    pub encoder_id: Option<u32>,
}

/// Encoder detail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderInfo {
    pub id: u32,
    /// CRTC currently feeding this encoder
    pub crtc_id: Option<u32>,
}

/// CRTC detail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrtcInfo {
    pub id: u32,
    /// Framebuffer currently scanned out
    pub fb_id: Option<u32>,
    /// Current mode, if one is set
    pub mode: Option<ModeInfo>,
}

/// Plane detail as reported by the plane getter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneInfo {
    pub id: u32,
    pub crtc_id: Option<u32>,
    pub fb_id: Option<u32>,
    /// CRTCs this plane can be attached to
    pub possible_crtcs: Vec<u32>,
}

/// One entry of an enum property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumEntry {
    pub value: u64,
    pub name: String,
}

/// Property metadata fetched by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub id: u32,
    pub name: String,
    /// Enum entries; empty for non-enum properties
    pub enum_entries: Vec<EnumEntry>,
}

/// The KMS ioctl surface used by this crate
pub trait KmsBackend {
    /// Enable a client capability
    fn set_client_cap(&self, cap: ClientCap, enable: bool) -> io::Result<()>;

    /// Query a driver capability value
    fn driver_cap(&self, cap: DriverCap) -> io::Result<u64>;

    fn resources(&self) -> io::Result<ResourceIds>;

    fn plane_ids(&self) -> io::Result<Vec<u32>>;

    fn plane(&self, id: u32) -> io::Result<PlaneInfo>;

    fn connector(&self, id: u32) -> io::Result<ConnectorInfo>;

    fn encoder(&self, id: u32) -> io::Result<EncoderInfo>;

    fn crtc(&self, id: u32) -> io::Result<CrtcInfo>;

    /// Property ids attached to an object, with their current raw values
    fn object_properties(&self, kind: ObjectKind, id: u32) -> io::Result<Vec<(u32, u64)>>;

    fn property(&self, id: u32) -> io::Result<PropertyInfo>;

    /// Upload a mode as a property blob, returning the blob id
    fn create_mode_blob(&self, mode: &ModeInfo) -> io::Result<u32>;

    fn destroy_blob(&self, id: u32) -> io::Result<()>;

    /// Bus identity of the device node
    fn bus_info(&self) -> io::Result<BusInfo>;

    /// File descriptor for handing to a buffer allocator
    fn as_fd(&self) -> BorrowedFd<'_>;
}

/// Source of candidate device nodes
pub trait DeviceRegistry {
    type Backend: KmsBackend;

    /// Candidate primary nodes in enumeration order
    fn candidates(&self) -> io::Result<Vec<PathBuf>>;

    /// Open a candidate read-write with close-on-exec
    fn open(&self, path: &Path) -> io::Result<Self::Backend>;
}
