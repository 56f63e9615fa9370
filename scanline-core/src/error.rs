//! Error types for Scanline
//!
//! Two severities are modelled as two different types:
//! - [`ScanlineError`] returned through [`Result`] aborts the device being opened
//! - [`Feature::Unavailable`] records why an optional subsystem was skipped
//!   while the device itself stays usable

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::PciAddress;

/// Result type alias using ScanlineError
pub type Result<T> = std::result::Result<T, ScanlineError>;

/// Main error type for Scanline operations
#[derive(Debug, Error)]
pub enum ScanlineError {
    /// The device registry listed no candidate device nodes
    #[error("No KMS devices present")]
    NoDeviceFound,

    /// Every candidate failed to open
    #[error("Couldn't find any suitable KMS device ({})", CandidateList(.0))]
    NoSuitableDevice(Vec<CandidateFailure>),

    /// A candidate could not be opened or lacks a required kernel feature
    #[error("Couldn't open {}: {reason}", .path.display())]
    OpenFailed { path: PathBuf, reason: String },

    /// No connector resolved to an active output
    #[error("Device {} has no active outputs", .path.display())]
    NoActiveOutputs { path: PathBuf },

    /// The device cannot import framebuffers with modifiers
    #[error("Device does not support framebuffer modifiers")]
    ModifiersUnsupported,

    /// The KMS device does not sit on a PCI bus
    #[error("Device is not a PCI device (bus: {0})")]
    NoPciDevice(String),

    /// No Vulkan physical device has the KMS device's PCI address
    #[error("No Vulkan physical device found at PCI address {0}")]
    NoMatchingPhysicalDevice(PciAddress),

    /// A required device extension is missing
    #[error("Physical device doesn't support required extension: {0}")]
    ExtensionMissing(String),

    /// No queue family advertises graphics support
    #[error("Physical device has no graphics queue family")]
    NoGraphicsQueue,

    /// Vulkan loader or API failure
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unsupported operation
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The owning device released this resource
    #[error("Resource already released")]
    Released,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ScanlineError>,
    },
}

/// Why a single candidate device was rejected
#[derive(Debug)]
pub struct CandidateFailure {
    /// Device node that was tried
    pub path: PathBuf,
    /// Reason it was rejected
    pub error: ScanlineError,
}

impl fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

struct CandidateList<'a>(&'a [CandidateFailure]);

impl fmt::Display for CandidateList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no candidates tried");
        }
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

impl ScanlineError {
    /// Create an open failure for a device path
    pub fn open_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::OpenFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a Vulkan error
    pub fn vulkan(msg: impl Into<String>) -> Self {
        Self::Vulkan(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error rejects a whole device rather than one feature of it
    pub fn is_device_fatal(&self) -> bool {
        match self {
            Self::NoDeviceFound
            | Self::NoSuitableDevice(_)
            | Self::OpenFailed { .. }
            | Self::NoActiveOutputs { .. }
            | Self::Io(_) => true,
            Self::WithContext { source, .. } => source.is_device_fatal(),
            _ => false,
        }
    }

    /// Remediation hint shown by the CLI
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NoDeviceFound => Some("No /dev/dri/card* nodes exist; is a KMS driver loaded?"),
            Self::NoSuitableDevice(_) | Self::OpenFailed { .. } => Some(
                "Make sure your user is in the 'video' group and no other compositor holds the device",
            ),
            Self::NoActiveOutputs { .. } => {
                Some("Connect a display and make sure it is lit up (e.g. from a VT)")
            }
            Self::ModifiersUnsupported => {
                Some("The KMS driver cannot scan out modifier buffers; GPU rendering is disabled")
            }
            Self::ExtensionMissing(_) | Self::NoMatchingPhysicalDevice(_) => {
                Some("Update your Mesa/Vulkan driver; the device needs dma-buf and modifier support")
            }
            Self::Vulkan(_) => Some("Check that a Vulkan ICD is installed (try `vulkaninfo`)"),
            Self::Config(_) => Some("Check ~/.config/scanline/config.toml for syntax errors"),
            Self::WithContext { source, .. } => source.user_hint(),
            _ => None,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

/// Outcome of an optional subsystem
///
/// Failure here never fails the owning device; the reason is kept for
/// diagnostics.
#[derive(Debug)]
pub enum Feature<T> {
    /// The subsystem came up
    Enabled(T),
    /// The subsystem was skipped, with the reason
    Unavailable(ScanlineError),
}

impl<T> Feature<T> {
    /// Build from a result, keeping the error as the unavailable reason
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Enabled(value),
            Err(e) => Self::Unavailable(e),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Self::Enabled(value) => Some(value),
            Self::Unavailable(_) => None,
        }
    }

    /// Reason the subsystem is unavailable
    pub fn reason(&self) -> Option<&ScanlineError> {
        match self {
            Self::Enabled(_) => None,
            Self::Unavailable(e) => Some(e),
        }
    }

    /// Take the value out, leaving `Unavailable(Released)` behind
    pub fn take(&mut self) -> Option<T> {
        match std::mem::replace(self, Self::Unavailable(ScanlineError::Released)) {
            Self::Enabled(value) => Some(value),
            Self::Unavailable(e) => {
                *self = Self::Unavailable(e);
                None
            }
        }
    }
}
