//! Backend capability interface and its three variants.
//!
//! - [`FramedBackend`]: explicit frames in flight, swapchain state machine and
//!   tiered deferred deletion (Vulkan-style).
//! - [`ImmediateBackend`]: one frame at a time, resize handled inline
//!   (OpenGL-style).
//! - [`D3dBackend`]: placeholder that refuses to initialize.

use core::fmt;

use crate::batch::FlushStats;
use crate::coords::Extent;
use crate::error::RenderError;
use crate::geometry::{Batch, BlendDescriptor, BlendHandle, TextureHandle};
use crate::paint::{Color, ImageData, TextureInfo};
use crate::sync::SwapchainState;

mod d3d;
mod framed;
mod immediate;
mod shared;

pub use d3d::D3dBackend;
pub use framed::FramedBackend;
pub use immediate::ImmediateBackend;

/// Graphics API family, chosen once at startup.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum Api {
    OpenGl,
    #[default]
    Vulkan,
    D3d,
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenGl => "OpenGL",
            Self::Vulkan => "Vulkan",
            Self::D3d => "Direct3D",
        })
    }
}

/// Contract every backend variant implements.
///
/// A frame is `begin_frame` (returning `true`), any number of `push`es, then
/// `end_frame`. A `false` from `begin_frame` means the frame is skipped and
/// must not be ended.
pub trait Backend {
    fn api(&self) -> Api;

    /// Creates every device object the backend needs. A zero-sized drawable
    /// is not an error; the backend starts stale instead.
    fn init(&mut self) -> Result<(), RenderError>;

    /// Releases every device object. Safe to call when not initialized.
    fn shutdown(&mut self) -> Result<(), RenderError>;

    /// `Stale` while the drawable is zero-sized or the swapchain awaits a
    /// rebuild.
    fn state(&self) -> SwapchainState;

    /// Whether the next `begin_frame` will rebuild the swapchain.
    fn need_reinit(&self) -> bool;

    /// Rebuilds the swapchain against the current drawable.
    fn reinit(&mut self) -> Result<(), RenderError>;

    fn begin_frame(&mut self) -> Result<bool, RenderError>;

    fn end_frame(&mut self) -> Result<(), RenderError>;

    fn push(&mut self, batch: Batch) -> Result<(), RenderError>;

    fn create_blend_state(&mut self, descriptor: BlendDescriptor) -> Result<BlendHandle, RenderError>;

    fn create_texture(&mut self, image: &ImageData) -> Result<TextureHandle, RenderError>;

    /// Releases a texture once no in-flight frame can sample it.
    fn destroy_texture(&mut self, handle: TextureHandle) -> Result<(), RenderError>;

    fn texture_info(&self, handle: TextureHandle) -> Option<TextureInfo>;

    fn set_clear_color(&mut self, color: Color);

    /// Completed frames since init.
    fn frame_counter(&self) -> u64;

    /// Counters from the most recent `end_frame`.
    fn last_flush(&self) -> Option<FlushStats>;

    // ── overlay hooks ─────────────────────────────────────────────────────

    fn overlay_init(&mut self) -> Result<(), RenderError>;

    /// Called after a successful `begin_frame`; returns the target extent.
    fn overlay_new_frame(&mut self) -> Result<Extent, RenderError>;

    /// Queues overlay batches, drawn after every regular batch.
    fn overlay_end_frame(&mut self, batches: Vec<Batch>) -> Result<(), RenderError>;

    fn overlay_shutdown(&mut self);
}
