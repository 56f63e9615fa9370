//! Resource id sets and the plane list of a card

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use super::property::{self, PlaneType};
use super::{KmsBackend, ObjectKind};
use crate::error::{Result, ScanlineError};

/// Id -> position lookup keeping the first occurrence of each id
#[derive(Debug, Clone, Default)]
pub struct IdIndex {
    ids: Vec<u32>,
    positions: HashMap<u32, usize>,
}

impl IdIndex {
    pub fn new(ids: Vec<u32>) -> Self {
        let mut positions = HashMap::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            positions.entry(*id).or_insert(i);
        }
        Self { ids, positions }
    }

    /// Position of `id` in enumeration order
    pub fn position(&self, id: u32) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A scan-out plane
///
/// The plane type is not cached here; it is read from the plane's "type"
/// property whenever it is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    pub id: u32,
    /// CRTC the plane is bound to
    pub crtc_id: Option<u32>,
    /// Framebuffer the plane is showing
    pub fb_id: Option<u32>,
    /// CRTCs the plane can be attached to
    pub possible_crtcs: Vec<u32>,
}

impl Plane {
    /// Read the plane type from its "type" enum property
    ///
    /// Anything that cannot be decoded is reported as [`PlaneType::Unknown`].
    pub fn plane_type<B: KmsBackend>(&self, backend: &B) -> PlaneType {
        match property::read_enum_property(backend, ObjectKind::Plane, self.id, "type") {
            Ok(Some(entry)) => PlaneType::from_enum_name(&entry.name),
            Ok(None) => PlaneType::Unknown,
            Err(e) => {
                debug!("Couldn't read type of plane {}: {}", self.id, e);
                PlaneType::Unknown
            }
        }
    }

    pub fn can_drive(&self, crtc_id: u32) -> bool {
        self.possible_crtcs.contains(&crtc_id)
    }
}

/// CRTC, connector and encoder ids plus the plane list of one card
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    crtcs: IdIndex,
    encoders: IdIndex,
    connectors: Vec<u32>,
    planes: Vec<Plane>,
    plane_index: HashMap<u32, usize>,
}

impl ResourceGraph {
    /// Load the id sets and every plane
    ///
    /// A card with no CRTCs, connectors, encoders or planes is not a KMS
    /// device.
    pub fn load<B: KmsBackend>(backend: &B, path: &Path) -> Result<Self> {
        let res = backend.resources().map_err(|e| {
            ScanlineError::open_failed(path, format!("Couldn't get card resources: {}", e))
        })?;

        let plane_ids = backend
            .plane_ids()
            .map_err(|e| ScanlineError::open_failed(path, format!("Device has no planes: {}", e)))?;

        if res.crtcs.is_empty()
            || res.connectors.is_empty()
            || res.encoders.is_empty()
            || plane_ids.is_empty()
        {
            return Err(ScanlineError::open_failed(path, "Not a KMS device"));
        }

        let mut planes = Vec::with_capacity(plane_ids.len());
        for id in plane_ids {
            let info = backend.plane(id).map_err(|e| {
                ScanlineError::open_failed(path, format!("Couldn't get plane {}: {}", id, e))
            })?;
            planes.push(Plane {
                id: info.id,
                crtc_id: info.crtc_id,
                fb_id: info.fb_id,
                possible_crtcs: info.possible_crtcs,
            });
        }

        debug!(
            "{}: {} crtcs, {} encoders, {} connectors, {} planes",
            path.display(),
            res.crtcs.len(),
            res.encoders.len(),
            res.connectors.len(),
            planes.len()
        );

        Ok(Self::new(res.crtcs, res.encoders, res.connectors, planes))
    }

    pub fn new(crtcs: Vec<u32>, encoders: Vec<u32>, connectors: Vec<u32>, planes: Vec<Plane>) -> Self {
        let mut plane_index = HashMap::with_capacity(planes.len());
        for (i, plane) in planes.iter().enumerate() {
            plane_index.entry(plane.id).or_insert(i);
        }
        Self {
            crtcs: IdIndex::new(crtcs),
            encoders: IdIndex::new(encoders),
            connectors,
            planes,
            plane_index,
        }
    }

    pub fn crtcs(&self) -> &IdIndex {
        &self.crtcs
    }

    pub fn encoders(&self) -> &IdIndex {
        &self.encoders
    }

    pub fn connectors(&self) -> &[u32] {
        &self.connectors
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn plane(&self, id: u32) -> Option<&Plane> {
        self.plane_index.get(&id).map(|i| &self.planes[*i])
    }
}
