use winit::event::WindowEvent;

use crate::renderer::Renderer;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract driven by [`crate::window::Runtime`].
pub trait App {
    /// Called once the renderer exists, before the first frame. Load textures
    /// and register blend states here.
    fn on_start(&mut self, renderer: &mut Renderer) -> anyhow::Result<()> {
        let _ = renderer;
        Ok(())
    }

    /// Called for window events.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Called between `begin_frame` and `end_frame` of every frame that can be
    /// drawn. Skipped frames (minimized, resizing) do not reach the app.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl;

    /// Called before the renderer shuts down.
    fn on_exit(&mut self, renderer: &mut Renderer) {
        let _ = renderer;
    }
}
