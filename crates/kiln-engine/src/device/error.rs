use core::fmt;

/// Device failure that the renderer cannot absorb.
///
/// Transient surface conditions (out-of-date, suboptimal, timeouts) are not
/// errors; they come back as outcomes from acquire/present/wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    OutOfMemory,
    DeviceLost,
    /// The adapter lacks something the renderer needs.
    MissingCapability(String),
    SurfaceLost,
    /// An id that the device never issued or already destroyed.
    UnknownResource(String),
    /// Anything else reported by the underlying API.
    Backend(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "out of device memory"),
            Self::DeviceLost => write!(f, "device lost"),
            Self::MissingCapability(what) => write!(f, "missing capability: {what}"),
            Self::SurfaceLost => write!(f, "surface lost"),
            Self::UnknownResource(what) => write!(f, "unknown resource: {what}"),
            Self::Backend(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for DeviceError {}

pub type DeviceResult<T> = Result<T, DeviceError>;
