//! Mock infrastructure for testing
//!
//! Provides an in-memory KMS card, a candidate registry and a fake Vulkan
//! loader. All of them record acquisitions and releases in a shared
//! [`Ledger`] so tests can check release order and symmetry.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io;
use std::os::fd::{AsFd, BorrowedFd};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use scanline_core::error::{Result, ScanlineError};
use scanline_core::gpu::{
    DeviceKind, DeviceProperties, DeviceSummary, GpuInstance, GpuLoader, PCI_BUS_INFO_EXTENSION,
    QueueFamily, REQUIRED_DEVICE_EXTENSIONS,
};
use scanline_core::kms::{
    ClientCap, ConnectorInfo, CrtcInfo, DeviceRegistry, DriverCap, EncoderInfo, EnumEntry,
    KmsBackend, ObjectKind, PlaneInfo, PropertyInfo, ResourceIds,
};
use scanline_core::types::{BusInfo, ModeInfo, PciAddress};

/// Property id of the plane "type" enum
pub const TYPE_PROP: u32 = 1;
/// Property id of a non-enum plane property
pub const FB_ID_PROP: u32 = 2;

/// First id handed out for mode blobs
pub const FIRST_BLOB_ID: u32 = 1000;

/// Acquisition and release events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Opened(PathBuf),
    Closed(PathBuf),
    BlobCreated(u32),
    BlobDestroyed(u32),
    InstanceCreated(Vec<String>),
    InstanceDestroyed,
    DeviceCreated(usize),
    DeviceDestroyed(usize),
}

/// Shared event log
#[derive(Debug, Clone, Default)]
pub struct Ledger(Rc<RefCell<Vec<Event>>>);

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.0.borrow().iter().filter(|e| pred(e)).count()
    }

    pub fn opened(&self) -> usize {
        self.count(|e| matches!(e, Event::Opened(_)))
    }

    pub fn closed(&self) -> usize {
        self.count(|e| matches!(e, Event::Closed(_)))
    }

    /// Every acquisition has a matching release
    pub fn is_balanced(&self) -> bool {
        let blobs_created = self.count(|e| matches!(e, Event::BlobCreated(_)));
        let blobs_destroyed = self.count(|e| matches!(e, Event::BlobDestroyed(_)));
        let instances_created = self.count(|e| matches!(e, Event::InstanceCreated(_)));
        let instances_destroyed = self.count(|e| matches!(e, Event::InstanceDestroyed));
        let devices_created = self.count(|e| matches!(e, Event::DeviceCreated(_)));
        let devices_destroyed = self.count(|e| matches!(e, Event::DeviceDestroyed(_)));

        self.opened() == self.closed()
            && blobs_created == blobs_destroyed
            && instances_created == instances_destroyed
            && devices_created == devices_destroyed
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// 1920x1080@60 (CEA 16)
pub fn mode_1080p60() -> ModeInfo {
    ModeInfo {
        name: "1920x1080".to_string(),
        clock: 148_500,
        hdisplay: 1920,
        hsync_start: 2008,
        hsync_end: 2052,
        htotal: 2200,
        hskew: 0,
        vdisplay: 1080,
        vsync_start: 1084,
        vsync_end: 1089,
        vtotal: 1125,
        vscan: 0,
        vrefresh: 60,
        flags: 0x5,
        mode_type: 0x48,
    }
}

/// 2560x1440@144
pub fn mode_1440p144() -> ModeInfo {
    ModeInfo {
        name: "2560x1440".to_string(),
        clock: 586_586,
        hdisplay: 2560,
        hsync_start: 2568,
        hsync_end: 2600,
        htotal: 2640,
        vdisplay: 1440,
        vsync_start: 1523,
        vsync_end: 1531,
        vtotal: 1543,
        vrefresh: 144,
        ..Default::default()
    }
}

#[derive(Debug, Clone)]
pub struct PlaneSpec {
    pub id: u32,
    /// Raw value of the "type" property; `None` for no type property
    pub type_value: Option<u64>,
    pub crtc_id: Option<u32>,
    pub fb_id: Option<u32>,
    pub possible_crtcs: Vec<u32>,
}

/// Raw "type" values as exposed by the kernel
pub const OVERLAY: u64 = 0;
pub const PRIMARY: u64 = 1;
pub const CURSOR: u64 = 2;

/// Topology and behavior of a mock card
#[derive(Debug, Clone)]
pub struct CardSpec {
    pub universal_planes: bool,
    pub atomic: bool,
    /// `None` makes the capability query fail
    pub modifiers: Option<u64>,
    pub crtcs: Vec<CrtcInfo>,
    pub encoders: Vec<EncoderInfo>,
    pub connectors: Vec<ConnectorInfo>,
    pub planes: Vec<PlaneSpec>,
    pub bus: BusInfo,
    pub fail_blobs: bool,
    /// Property ids whose fetch fails
    pub failing_properties: Vec<u32>,
}

impl Default for CardSpec {
    fn default() -> Self {
        Self::new()
    }
}

impl CardSpec {
    /// Card with every capability and no objects
    pub fn new() -> Self {
        Self {
            universal_planes: true,
            atomic: true,
            modifiers: Some(1),
            crtcs: Vec::new(),
            encoders: Vec::new(),
            connectors: Vec::new(),
            planes: Vec::new(),
            bus: BusInfo::Pci(PciAddress::new(0, 1, 0, 0)),
            fail_blobs: false,
            failing_properties: Vec::new(),
        }
    }

    /// One lit HDMI output: connector 20 -> encoder 30 -> CRTC 40 with
    /// primary plane 50 and cursor plane 51
    pub fn single_output() -> Self {
        Self::new()
            .crtc(40, Some(100), Some(mode_1080p60()))
            .encoder(30, Some(40))
            .connector(20, "HDMI-A-1", Some(30))
            .plane(50, Some(PRIMARY), Some(40), Some(100), &[40])
            .plane(51, Some(CURSOR), Some(40), None, &[40])
    }

    pub fn without_universal_planes(mut self) -> Self {
        self.universal_planes = false;
        self
    }

    pub fn without_atomic(mut self) -> Self {
        self.atomic = false;
        self
    }

    pub fn with_modifiers(mut self, value: Option<u64>) -> Self {
        self.modifiers = value;
        self
    }

    pub fn with_bus(mut self, bus: BusInfo) -> Self {
        self.bus = bus;
        self
    }

    pub fn failing_blobs(mut self) -> Self {
        self.fail_blobs = true;
        self
    }

    pub fn failing_property(mut self, id: u32) -> Self {
        self.failing_properties.push(id);
        self
    }

    pub fn crtc(mut self, id: u32, fb_id: Option<u32>, mode: Option<ModeInfo>) -> Self {
        self.crtcs.push(CrtcInfo { id, fb_id, mode });
        self
    }

    pub fn encoder(mut self, id: u32, crtc_id: Option<u32>) -> Self {
        self.encoders.push(EncoderInfo { id, crtc_id });
        self
    }

    pub fn connector(mut self, id: u32, name: &str, encoder_id: Option<u32>) -> Self {
        self.connectors.push(ConnectorInfo {
            id,
            name: name.to_string(),
            encoder_id,
        });
        self
    }

    pub fn plane(
        mut self,
        id: u32,
        type_value: Option<u64>,
        crtc_id: Option<u32>,
        fb_id: Option<u32>,
        possible_crtcs: &[u32],
    ) -> Self {
        self.planes.push(PlaneSpec {
            id,
            type_value,
            crtc_id,
            fb_id,
            possible_crtcs: possible_crtcs.to_vec(),
        });
        self
    }
}

fn not_found(what: &str, id: u32) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no {} {}", what, id))
}

/// In-memory KMS card
pub struct MockCard {
    spec: CardSpec,
    path: PathBuf,
    ledger: Ledger,
    next_blob: Cell<u32>,
    live_blobs: RefCell<Vec<u32>>,
    file: File,
}

impl MockCard {
    pub fn open(spec: CardSpec, path: impl Into<PathBuf>, ledger: &Ledger) -> io::Result<Self> {
        let path = path.into();
        let file = File::open("/dev/null")?;
        ledger.record(Event::Opened(path.clone()));
        Ok(Self {
            spec,
            path,
            ledger: ledger.clone(),
            next_blob: Cell::new(FIRST_BLOB_ID),
            live_blobs: RefCell::new(Vec::new()),
            file,
        })
    }

    /// Blobs created and not yet destroyed
    pub fn live_blobs(&self) -> Vec<u32> {
        self.live_blobs.borrow().clone()
    }
}

impl Drop for MockCard {
    fn drop(&mut self) {
        self.ledger.record(Event::Closed(self.path.clone()));
    }
}

impl KmsBackend for MockCard {
    fn set_client_cap(&self, cap: ClientCap, _enable: bool) -> io::Result<()> {
        let supported = match cap {
            ClientCap::UniversalPlanes => self.spec.universal_planes,
            ClientCap::Atomic => self.spec.atomic,
        };
        if supported {
            Ok(())
        } else {
            Err(io::Error::from_raw_os_error(libc::EINVAL))
        }
    }

    fn driver_cap(&self, cap: DriverCap) -> io::Result<u64> {
        match cap {
            DriverCap::AddFb2Modifiers => self
                .spec
                .modifiers
                .ok_or_else(|| io::Error::from_raw_os_error(libc::EINVAL)),
        }
    }

    fn resources(&self) -> io::Result<ResourceIds> {
        Ok(ResourceIds {
            crtcs: self.spec.crtcs.iter().map(|c| c.id).collect(),
            connectors: self.spec.connectors.iter().map(|c| c.id).collect(),
            encoders: self.spec.encoders.iter().map(|e| e.id).collect(),
        })
    }

    fn plane_ids(&self) -> io::Result<Vec<u32>> {
        Ok(self.spec.planes.iter().map(|p| p.id).collect())
    }

    fn plane(&self, id: u32) -> io::Result<PlaneInfo> {
        let plane = self
            .spec
            .planes
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found("plane", id))?;
        Ok(PlaneInfo {
            id,
            crtc_id: plane.crtc_id,
            fb_id: plane.fb_id,
            possible_crtcs: plane.possible_crtcs.clone(),
        })
    }

    fn connector(&self, id: u32) -> io::Result<ConnectorInfo> {
        self.spec
            .connectors
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| not_found("connector", id))
    }

    fn encoder(&self, id: u32) -> io::Result<EncoderInfo> {
        self.spec
            .encoders
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| not_found("encoder", id))
    }

    fn crtc(&self, id: u32) -> io::Result<CrtcInfo> {
        self.spec
            .crtcs
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| not_found("crtc", id))
    }

    fn object_properties(&self, kind: ObjectKind, id: u32) -> io::Result<Vec<(u32, u64)>> {
        if kind != ObjectKind::Plane {
            return Ok(Vec::new());
        }
        let plane = self
            .spec
            .planes
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found("plane", id))?;

        let mut props = vec![(FB_ID_PROP, u64::from(plane.fb_id.unwrap_or(0)))];
        if let Some(value) = plane.type_value {
            props.push((TYPE_PROP, value));
        }
        Ok(props)
    }

    fn property(&self, id: u32) -> io::Result<PropertyInfo> {
        if self.spec.failing_properties.contains(&id) {
            return Err(io::Error::from_raw_os_error(libc::EACCES));
        }
        match id {
            TYPE_PROP => Ok(PropertyInfo {
                id,
                name: "type".to_string(),
                enum_entries: vec![
                    EnumEntry {
                        value: OVERLAY,
                        name: "Overlay".to_string(),
                    },
                    EnumEntry {
                        value: PRIMARY,
                        name: "Primary".to_string(),
                    },
                    EnumEntry {
                        value: CURSOR,
                        name: "Cursor".to_string(),
                    },
                ],
            }),
            FB_ID_PROP => Ok(PropertyInfo {
                id,
                name: "FB_ID".to_string(),
                enum_entries: Vec::new(),
            }),
            _ => Err(not_found("property", id)),
        }
    }

    fn create_mode_blob(&self, _mode: &ModeInfo) -> io::Result<u32> {
        if self.spec.fail_blobs {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        let id = self.next_blob.get();
        self.next_blob.set(id + 1);
        self.live_blobs.borrow_mut().push(id);
        self.ledger.record(Event::BlobCreated(id));
        Ok(id)
    }

    fn destroy_blob(&self, id: u32) -> io::Result<()> {
        let mut live = self.live_blobs.borrow_mut();
        let pos = live
            .iter()
            .position(|b| *b == id)
            .ok_or_else(|| not_found("blob", id))?;
        live.remove(pos);
        self.ledger.record(Event::BlobDestroyed(id));
        Ok(())
    }

    fn bus_info(&self) -> io::Result<BusInfo> {
        Ok(self.spec.bus.clone())
    }

    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

/// Registry over a fixed list of mock cards
pub struct MockRegistry {
    cards: Vec<(PathBuf, Option<CardSpec>)>,
    ledger: Ledger,
}

impl MockRegistry {
    pub fn new(ledger: &Ledger) -> Self {
        Self {
            cards: Vec::new(),
            ledger: ledger.clone(),
        }
    }

    pub fn card(mut self, path: &str, spec: CardSpec) -> Self {
        self.cards.push((PathBuf::from(path), Some(spec)));
        self
    }

    /// A node that is listed but cannot be opened
    pub fn unopenable(mut self, path: &str) -> Self {
        self.cards.push((PathBuf::from(path), None));
        self
    }
}

impl DeviceRegistry for MockRegistry {
    type Backend = MockCard;

    fn candidates(&self) -> io::Result<Vec<PathBuf>> {
        Ok(self.cards.iter().map(|(path, _)| path.clone()).collect())
    }

    fn open(&self, path: &Path) -> io::Result<MockCard> {
        match self.cards.iter().find(|(p, _)| p == path) {
            Some((_, Some(spec))) => MockCard::open(spec.clone(), path, &self.ledger),
            Some((_, None)) => Err(io::Error::from(io::ErrorKind::PermissionDenied)),
            None => Err(io::Error::from(io::ErrorKind::NotFound)),
        }
    }
}

/// A fake physical device
#[derive(Debug, Clone)]
pub struct PhysSpec {
    pub name: String,
    pub pci: PciAddress,
    pub extensions: Vec<String>,
    pub families: Vec<QueueFamily>,
}

impl PhysSpec {
    /// Device with every required extension, PCI bus info and a graphics queue
    pub fn gpu(name: &str, pci: PciAddress) -> Self {
        let mut extensions: Vec<String> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|e| e.to_string())
            .collect();
        extensions.push(PCI_BUS_INFO_EXTENSION.to_string());
        extensions.push("VK_KHR_swapchain".to_string());

        Self {
            name: name.to_string(),
            pci,
            extensions,
            families: vec![
                QueueFamily {
                    graphics: false,
                    queue_count: 2,
                },
                QueueFamily {
                    graphics: true,
                    queue_count: 1,
                },
            ],
        }
    }

    pub fn without_extension(mut self, name: &str) -> Self {
        self.extensions.retain(|e| e != name);
        self
    }

    pub fn compute_only(mut self) -> Self {
        for family in &mut self.families {
            family.graphics = false;
        }
        self
    }
}

/// Fake Vulkan loader
pub struct MockLoader {
    devices: Vec<PhysSpec>,
    /// `None` makes layer enumeration fail
    layers: Option<Vec<String>>,
    fail_instance: bool,
    fail_device: bool,
    ledger: Ledger,
}

impl MockLoader {
    pub fn new(ledger: &Ledger, devices: Vec<PhysSpec>) -> Self {
        Self {
            devices,
            layers: Some(Vec::new()),
            fail_instance: false,
            fail_device: false,
            ledger: ledger.clone(),
        }
    }

    pub fn with_layers(mut self, layers: &[&str]) -> Self {
        self.layers = Some(layers.iter().map(|l| l.to_string()).collect());
        self
    }

    pub fn failing_layers(mut self) -> Self {
        self.layers = None;
        self
    }

    pub fn failing_instance(mut self) -> Self {
        self.fail_instance = true;
        self
    }

    pub fn failing_device(mut self) -> Self {
        self.fail_device = true;
        self
    }
}

impl GpuLoader for MockLoader {
    type Instance = MockInstance;

    fn instance_layers(&self) -> Result<Vec<String>> {
        self.layers
            .clone()
            .ok_or_else(|| ScanlineError::vulkan("layer enumeration failed"))
    }

    fn create_instance(&self, _application: &str, layers: &[&str]) -> Result<MockInstance> {
        if self.fail_instance {
            return Err(ScanlineError::vulkan("VK_ERROR_INITIALIZATION_FAILED"));
        }
        self.ledger.record(Event::InstanceCreated(
            layers.iter().map(|l| l.to_string()).collect(),
        ));
        Ok(MockInstance {
            devices: self.devices.clone(),
            fail_device: self.fail_device,
            ledger: self.ledger.clone(),
        })
    }
}

/// Fake Vulkan instance; physical devices are indices into its list
pub struct MockInstance {
    devices: Vec<PhysSpec>,
    fail_device: bool,
    ledger: Ledger,
}

impl Drop for MockInstance {
    fn drop(&mut self) {
        self.ledger.record(Event::InstanceDestroyed);
    }
}

impl MockInstance {
    fn spec(&self, physical: usize) -> &PhysSpec {
        &self.devices[physical]
    }
}

impl GpuInstance for MockInstance {
    type PhysicalDevice = usize;
    type Device = MockLogicalDevice;

    fn physical_devices(&self) -> Result<Vec<usize>> {
        Ok((0..self.devices.len()).collect())
    }

    fn device_extensions(&self, physical: usize) -> Result<Vec<String>> {
        Ok(self.spec(physical).extensions.clone())
    }

    fn properties(&self, physical: usize, with_pci: bool) -> DeviceProperties {
        let spec = self.spec(physical);
        DeviceProperties {
            summary: DeviceSummary {
                name: spec.name.clone(),
                kind: DeviceKind::Discrete,
                api_version: (1, 3, 275),
                driver_version: (24, 1, 0),
            },
            pci: with_pci.then_some(spec.pci),
        }
    }

    fn queue_families(&self, physical: usize) -> Vec<QueueFamily> {
        self.spec(physical).families.clone()
    }

    fn create_device(
        &self,
        physical: usize,
        queue_family: u32,
        extensions: &[&str],
    ) -> Result<MockLogicalDevice> {
        if self.fail_device {
            return Err(ScanlineError::vulkan("VK_ERROR_DEVICE_LOST"));
        }
        self.ledger.record(Event::DeviceCreated(physical));
        Ok(MockLogicalDevice {
            physical,
            queue_family,
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            ledger: self.ledger.clone(),
        })
    }
}

/// Fake logical device
pub struct MockLogicalDevice {
    pub physical: usize,
    pub queue_family: u32,
    pub extensions: Vec<String>,
    ledger: Ledger,
}

impl Drop for MockLogicalDevice {
    fn drop(&mut self) {
        self.ledger.record(Event::DeviceDestroyed(self.physical));
    }
}
