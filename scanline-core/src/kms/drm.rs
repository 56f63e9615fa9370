//! KMS backend on a real `/dev/dri/card*` node, using the `drm` crate

use std::ffi::c_char;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use ::drm::control::{self, Device as ControlDevice, ResourceHandle, property};
use ::drm::{ClientCapability, Device, DriverCapability};
use tracing::debug;

use super::{
    ClientCap, ConnectorInfo, CrtcInfo, DeviceRegistry, DriverCap, EncoderInfo, EnumEntry,
    KmsBackend, ObjectKind, PlaneInfo, PropertyInfo, ResourceIds,
};
use crate::types::{BusInfo, ModeInfo};

/// An opened DRM primary node
#[derive(Debug)]
pub struct DrmCard(File);

impl AsFd for DrmCard {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

impl Device for DrmCard {}
impl ControlDevice for DrmCard {}

impl DrmCard {
    /// Open a card read-write with close-on-exec
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(path)?;
        Ok(Self(file))
    }
}

fn handle<T: ResourceHandle>(id: u32) -> io::Result<T> {
    control::from_u32(id).ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "null object id"))
}

fn mode_info(mode: &control::Mode) -> ModeInfo {
    let (hdisplay, vdisplay) = mode.size();
    let (hsync_start, hsync_end, htotal) = mode.hsync();
    let (vsync_start, vsync_end, vtotal) = mode.vsync();

    ModeInfo {
        name: mode.name().to_string_lossy().into_owned(),
        clock: mode.clock(),
        hdisplay,
        hsync_start,
        hsync_end,
        htotal,
        hskew: mode.hskew(),
        vdisplay,
        vsync_start,
        vsync_end,
        vtotal,
        vscan: mode.vscan(),
        vrefresh: mode.vrefresh(),
        flags: mode.flags().bits(),
        mode_type: mode.mode_type().bits(),
    }
}

fn raw_mode(mode: &ModeInfo) -> drm_ffi::drm_mode_modeinfo {
    let mut name = [0 as c_char; 32];
    // keep the terminating NUL
    for (dst, src) in name.iter_mut().zip(mode.name.bytes().take(31)) {
        *dst = src as c_char;
    }

    drm_ffi::drm_mode_modeinfo {
        clock: mode.clock,
        hdisplay: mode.hdisplay,
        hsync_start: mode.hsync_start,
        hsync_end: mode.hsync_end,
        htotal: mode.htotal,
        hskew: mode.hskew,
        vdisplay: mode.vdisplay,
        vsync_start: mode.vsync_start,
        vsync_end: mode.vsync_end,
        vtotal: mode.vtotal,
        vscan: mode.vscan,
        vrefresh: mode.vrefresh,
        flags: mode.flags,
        type_: mode.mode_type,
        name,
    }
}

impl KmsBackend for DrmCard {
    fn set_client_cap(&self, cap: ClientCap, enable: bool) -> io::Result<()> {
        let cap = match cap {
            ClientCap::UniversalPlanes => ClientCapability::UniversalPlanes,
            ClientCap::Atomic => ClientCapability::Atomic,
        };
        self.set_client_capability(cap, enable)
    }

    fn driver_cap(&self, cap: DriverCap) -> io::Result<u64> {
        let cap = match cap {
            DriverCap::AddFb2Modifiers => DriverCapability::AddFB2Modifiers,
        };
        self.get_driver_capability(cap)
    }

    fn resources(&self) -> io::Result<ResourceIds> {
        let res = self.resource_handles()?;
        Ok(ResourceIds {
            crtcs: res.crtcs().iter().map(|h| u32::from(*h)).collect(),
            connectors: res.connectors().iter().map(|h| u32::from(*h)).collect(),
            encoders: res.encoders().iter().map(|h| u32::from(*h)).collect(),
        })
    }

    fn plane_ids(&self) -> io::Result<Vec<u32>> {
        Ok(self.plane_handles()?.into_iter().map(u32::from).collect())
    }

    fn plane(&self, id: u32) -> io::Result<PlaneInfo> {
        let info = self.get_plane(handle(id)?)?;
        // possible_crtcs is a bitmask over the resource CRTC list
        let res = self.resource_handles()?;

        Ok(PlaneInfo {
            id,
            crtc_id: info.crtc().map(u32::from),
            fb_id: info.framebuffer().map(u32::from),
            possible_crtcs: res
                .filter_crtcs(info.possible_crtcs())
                .into_iter()
                .map(u32::from)
                .collect(),
        })
    }

    fn connector(&self, id: u32) -> io::Result<ConnectorInfo> {
        let info = self.get_connector(handle(id)?, false)?;
        Ok(ConnectorInfo {
            id,
            name: format!("{}-{}", info.interface().as_str(), info.interface_id()),
            encoder_id: info.current_encoder().map(u32::from),
        })
    }

    fn encoder(&self, id: u32) -> io::Result<EncoderInfo> {
        let info = self.get_encoder(handle(id)?)?;
        Ok(EncoderInfo {
            id,
            crtc_id: info.crtc().map(u32::from),
        })
    }

    fn crtc(&self, id: u32) -> io::Result<CrtcInfo> {
        let info = self.get_crtc(handle(id)?)?;
        Ok(CrtcInfo {
            id,
            fb_id: info.framebuffer().map(u32::from),
            mode: info.mode().as_ref().map(mode_info),
        })
    }

    fn object_properties(&self, kind: ObjectKind, id: u32) -> io::Result<Vec<(u32, u64)>> {
        let set = match kind {
            ObjectKind::Connector => self.get_properties(handle::<control::connector::Handle>(id)?)?,
            ObjectKind::Encoder => self.get_properties(handle::<control::encoder::Handle>(id)?)?,
            ObjectKind::Crtc => self.get_properties(handle::<control::crtc::Handle>(id)?)?,
            ObjectKind::Plane => self.get_properties(handle::<control::plane::Handle>(id)?)?,
        };

        let (props, values) = set.as_props_and_values();
        Ok(props
            .iter()
            .zip(values)
            .map(|(prop, value)| (u32::from(*prop), *value))
            .collect())
    }

    fn property(&self, id: u32) -> io::Result<PropertyInfo> {
        let info = self.get_property(handle(id)?)?;

        let enum_entries = match info.value_type() {
            property::ValueType::Enum(values) => values
                .values()
                .1
                .iter()
                .map(|entry| EnumEntry {
                    value: entry.value(),
                    name: entry.name().to_string_lossy().into_owned(),
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(PropertyInfo {
            id,
            name: info.name().to_string_lossy().into_owned(),
            enum_entries,
        })
    }

    fn create_mode_blob(&self, mode: &ModeInfo) -> io::Result<u32> {
        let raw = raw_mode(mode);
        match self.create_property_blob(&raw)? {
            property::Value::Blob(id) => Ok(id as u32),
            other => Err(io::Error::other(format!("unexpected blob value {:?}", other))),
        }
    }

    fn destroy_blob(&self, id: u32) -> io::Result<()> {
        self.destroy_property_blob(u64::from(id))
    }

    fn bus_info(&self) -> io::Result<BusInfo> {
        let unique = self.get_bus_id()?;
        Ok(parse_bus_id(&unique.to_string_lossy()))
    }

    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

/// Bus identity from a DRM unique name
///
/// Current kernels report the parent device name (`0000:01:00.0` for PCI,
/// `fd4ab000.gpu` for platform devices); legacy drivers prefix PCI names
/// with `pci:`.
fn parse_bus_id(unique: &str) -> BusInfo {
    let unique = unique.trim_end_matches('\0').trim();
    if unique.is_empty() {
        return BusInfo::Other("none".to_string());
    }

    match unique.strip_prefix("pci:").unwrap_or(unique).parse() {
        Ok(addr) => BusInfo::Pci(addr),
        Err(_) => BusInfo::Other(unique.to_string()),
    }
}

/// Card number of a primary node name such as `card1`
fn card_number(name: &str) -> Option<u32> {
    name.strip_prefix("card")?.parse().ok()
}

/// Primary nodes under a DRI directory
#[derive(Debug, Clone)]
pub struct DriRegistry {
    dir: PathBuf,
}

impl DriRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for DriRegistry {
    fn default() -> Self {
        Self::new("/dev/dri")
    }
}

impl DeviceRegistry for DriRegistry {
    type Backend = DrmCard;

    /// `card*` nodes ordered by card number
    fn candidates(&self) -> io::Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} does not exist", self.dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut cards: Vec<(u32, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                card_number(&name.to_string_lossy()).map(|n| (n, entry.path()))
            })
            .collect();
        cards.sort_by_key(|(n, _)| *n);

        Ok(cards.into_iter().map(|(_, path)| path).collect())
    }

    fn open(&self, path: &Path) -> io::Result<DrmCard> {
        DrmCard::open(path)
    }
}
