//! Renderer-level errors.

use core::fmt;

use crate::backend::Api;
use crate::device::DeviceError;
use crate::geometry::{BlendHandle, TextureHandle};

/// A caller broke the frame protocol or handed over invalid data.
///
/// These are defects in the calling code, not runtime conditions; retrying the
/// same call will fail the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    AlreadyInitialized,
    BeginWhileInFrame,
    EndWithoutBegin,
    PushOutsideFrame,
    ShutdownDuringFrame,
    ReinitDuringFrame,
    OverlayNotInitialized,
    EmptyBatch,
    TooManyVertices { count: usize },
    IndexOutOfRange { index: u16, vertex_count: usize },
    UnknownBlendState(BlendHandle),
    UnknownTexture(TextureHandle),
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInitialized => write!(f, "backend is already initialized"),
            Self::BeginWhileInFrame => write!(f, "begin_frame called without end_frame"),
            Self::EndWithoutBegin => write!(f, "end_frame called without begin_frame"),
            Self::PushOutsideFrame => write!(f, "push called outside a frame"),
            Self::ShutdownDuringFrame => write!(f, "shutdown called while a frame is in progress"),
            Self::ReinitDuringFrame => write!(f, "reinit called while a frame is in progress"),
            Self::OverlayNotInitialized => write!(f, "overlay hook called before overlay_init"),
            Self::EmptyBatch => write!(f, "batch has no vertices or no indices"),
            Self::TooManyVertices { count } => {
                write!(f, "batch has {count} vertices, more than 16-bit indices can address")
            }
            Self::IndexOutOfRange { index, vertex_count } => {
                write!(f, "index {index} out of range for {vertex_count} vertices")
            }
            Self::UnknownBlendState(h) => write!(f, "unknown blend state {h}"),
            Self::UnknownTexture(h) => write!(f, "unknown or destroyed texture {h}"),
        }
    }
}

impl std::error::Error for ContractViolation {}

/// Failure to turn caller-provided image data into a texture.
#[derive(Debug)]
pub enum TextureError {
    ZeroSize { width: u32, height: u32 },
    SizeMismatch { expected: usize, actual: usize },
    Decode(image::ImageError),
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroSize { width, height } => write!(f, "texture has zero size ({width}x{height})"),
            Self::SizeMismatch { expected, actual } => {
                write!(f, "expected {expected} bytes of RGBA pixels, got {actual}")
            }
            Self::Decode(e) => write!(f, "image decode failed: {e}"),
        }
    }
}

impl std::error::Error for TextureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<image::ImageError> for TextureError {
    fn from(e: image::ImageError) -> Self {
        Self::Decode(e)
    }
}

/// Error returned by the renderer facade and backends.
#[derive(Debug)]
pub enum RenderError {
    /// Fatal device failure (init, submit, present, allocation).
    Device(DeviceError),
    /// The selected API has no working implementation.
    Unsupported(Api),
    Contract(ContractViolation),
    /// Called before `init` or after `shutdown`.
    NotInitialized,
    Texture(TextureError),
}

impl RenderError {
    #[inline]
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::Contract(_))
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(e) => write!(f, "device error: {e}"),
            Self::Unsupported(api) => write!(f, "{api} backend is not supported"),
            Self::Contract(v) => write!(f, "contract violation: {v}"),
            Self::NotInitialized => write!(f, "renderer is not initialized"),
            Self::Texture(e) => write!(f, "texture error: {e}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Device(e) => Some(e),
            Self::Contract(v) => Some(v),
            Self::Texture(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for RenderError {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}

impl From<ContractViolation> for RenderError {
    fn from(v: ContractViolation) -> Self {
        Self::Contract(v)
    }
}

impl From<TextureError> for RenderError {
    fn from(e: TextureError) -> Self {
        Self::Texture(e)
    }
}
