//! KMS object property introspection

use std::io;

use serde::Serialize;
use tracing::debug;

use super::{EnumEntry, KmsBackend, ObjectKind};

/// Plane type as exposed by the "type" enum property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaneType {
    Primary,
    Overlay,
    Cursor,
    /// Missing or undecodable type property
    Unknown,
}

impl PlaneType {
    /// Map an enum entry name from the kernel ("Primary", "Overlay", "Cursor")
    pub fn from_enum_name(name: &str) -> Self {
        match name {
            "Primary" => Self::Primary,
            "Overlay" => Self::Overlay,
            "Cursor" => Self::Cursor,
            _ => Self::Unknown,
        }
    }
}

/// Read an enum property of a mode object by name
///
/// Enumerates the object's property ids, fetches each property, and for
/// the first one called `name` decodes the current value against the
/// property's enum entries. Properties that cannot be fetched are skipped.
/// Returns `Ok(None)` when no enum entry matches.
pub fn read_enum_property<B: KmsBackend>(
    backend: &B,
    kind: ObjectKind,
    object_id: u32,
    name: &str,
) -> io::Result<Option<EnumEntry>> {
    for (prop_id, value) in backend.object_properties(kind, object_id)? {
        let info = match backend.property(prop_id) {
            Ok(info) => info,
            Err(e) => {
                debug!("Skipping property {} of object {}: {}", prop_id, object_id, e);
                continue;
            }
        };
        if info.name != name {
            continue;
        }

        return Ok(info.enum_entries.into_iter().find(|entry| entry.value == value));
    }

    Ok(None)
}
