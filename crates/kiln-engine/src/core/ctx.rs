use std::time::Duration;

use crate::coords::{Extent, Rect};
use crate::error::RenderError;
use crate::geometry::Batch;
use crate::renderer::Renderer;

/// Per-frame context passed to `core::App::on_frame`.
///
/// The frame is already begun; the runtime ends it after the callback
/// returns.
pub struct FrameCtx<'a> {
    pub renderer: &'a mut Renderer,
    /// Drawable size in physical pixels.
    pub extent: Extent,
    /// Time since the runtime started.
    pub elapsed: Duration,
    /// Drawn frames so far, this one excluded.
    pub frame_index: u64,
}

impl FrameCtx<'_> {
    /// Clip rect covering the whole window.
    #[inline]
    pub fn full_rect(&self) -> Rect {
        Rect::full(self.extent)
    }

    #[inline]
    pub fn push(&mut self, batch: Batch) -> Result<(), RenderError> {
        self.renderer.push(batch)
    }
}
