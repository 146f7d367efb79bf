use crate::batch::FlushStats;
use crate::coords::Extent;
use crate::error::RenderError;
use crate::geometry::{Batch, BlendDescriptor, BlendHandle, TextureHandle};
use crate::paint::{Color, ImageData, TextureInfo};
use crate::sync::SwapchainState;

use super::{Api, Backend};

/// Direct3D placeholder. `init` reports the API as unsupported and every
/// other call behaves as if the backend was never initialized.
#[derive(Debug, Default)]
pub struct D3dBackend;

impl Backend for D3dBackend {
    fn api(&self) -> Api {
        Api::D3d
    }

    fn init(&mut self) -> Result<(), RenderError> {
        Err(RenderError::Unsupported(Api::D3d))
    }

    fn shutdown(&mut self) -> Result<(), RenderError> {
        Ok(())
    }

    fn state(&self) -> SwapchainState {
        SwapchainState::Uninitialized
    }

    fn need_reinit(&self) -> bool {
        false
    }

    fn reinit(&mut self) -> Result<(), RenderError> {
        Err(RenderError::NotInitialized)
    }

    fn begin_frame(&mut self) -> Result<bool, RenderError> {
        Err(RenderError::NotInitialized)
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        Err(RenderError::NotInitialized)
    }

    fn push(&mut self, _batch: Batch) -> Result<(), RenderError> {
        Err(RenderError::NotInitialized)
    }

    fn create_blend_state(&mut self, _descriptor: BlendDescriptor) -> Result<BlendHandle, RenderError> {
        Err(RenderError::NotInitialized)
    }

    fn create_texture(&mut self, _image: &ImageData) -> Result<TextureHandle, RenderError> {
        Err(RenderError::NotInitialized)
    }

    fn destroy_texture(&mut self, _handle: TextureHandle) -> Result<(), RenderError> {
        Err(RenderError::NotInitialized)
    }

    fn texture_info(&self, _handle: TextureHandle) -> Option<TextureInfo> {
        None
    }

    fn set_clear_color(&mut self, _color: Color) {}

    fn frame_counter(&self) -> u64 {
        0
    }

    fn last_flush(&self) -> Option<FlushStats> {
        None
    }

    fn overlay_init(&mut self) -> Result<(), RenderError> {
        Err(RenderError::NotInitialized)
    }

    fn overlay_new_frame(&mut self) -> Result<Extent, RenderError> {
        Err(RenderError::NotInitialized)
    }

    fn overlay_end_frame(&mut self, _batches: Vec<Batch>) -> Result<(), RenderError> {
        Err(RenderError::NotInitialized)
    }

    fn overlay_shutdown(&mut self) {}
}
