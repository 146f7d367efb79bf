use crate::batch::{FlushStats, FlushTarget};
use crate::config::{DrawOrder, RendererConfig};
use crate::coords::Extent;
use crate::device::{AcquireOutcome, Device, FenceStatus, PipelineLayoutId, PresentOutcome, Resource};
use crate::error::{ContractViolation, RenderError};
use crate::geometry::{Batch, BlendDescriptor, BlendHandle, TextureHandle, Vertex};
use crate::paint::{Color, ImageData, TextureInfo};
use crate::sync::{DeletionTiers, FrameSlot, Swapchain, SwapchainState};

use super::shared::Shared;
use super::{Api, Backend};

/// OpenGL-style backend.
///
/// One frame at a time: `end_frame` waits for the GPU before returning, so
/// there is a single slot and resize is handled inside `begin_frame` instead
/// of through `need_reinit`. Batches always draw in submission order.
pub struct ImmediateBackend<D: Device> {
    device: D,
    shared: Shared,
    state: SwapchainState,
    layout: Option<PipelineLayoutId>,
    slot: Option<FrameSlot>,
    swapchain: Option<Swapchain>,
    tiers: DeletionTiers,
    frames: u64,
}

impl<D: Device> ImmediateBackend<D> {
    pub fn new(device: D, config: RendererConfig) -> Self {
        if config.draw_order != DrawOrder::Submission {
            log::debug!("immediate backend ignores {:?}, drawing in submission order", config.draw_order);
        }
        Self {
            device,
            shared: Shared::new(config, DrawOrder::Submission),
            state: SwapchainState::Uninitialized,
            layout: None,
            slot: None,
            swapchain: None,
            tiers: DeletionTiers::new(1),
            frames: 0,
        }
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Deletions waiting for the next `begin_frame`.
    pub fn pending_deletions(&self) -> usize {
        self.tiers.slot_ref(0).len()
    }

    pub fn swapchain_extent(&self) -> Option<Extent> {
        self.swapchain.as_ref().map(|s| s.extent)
    }

    fn initialize(&mut self) -> Result<(), RenderError> {
        let config = &self.shared.config;
        let vertex_bytes = config.initial_vertex_capacity as u64 * Vertex::SIZE;
        let index_bytes = config.initial_index_capacity as u64 * std::mem::size_of::<u16>() as u64;

        let layout = self.device.create_pipeline_layout()?;
        self.tiers.program.push(Resource::PipelineLayout(layout));
        self.layout = Some(layout);

        self.slot = Some(FrameSlot::create(&mut self.device, vertex_bytes, index_bytes, &mut self.tiers.program)?);
        self.shared.create_fallback(&mut self.device, &mut self.tiers.program)?;

        self.state = SwapchainState::Stale;
        self.rebuild()
    }

    /// Replaces the swapchain with one matching the drawable. Leaves the state
    /// Stale when the drawable is zero-sized or the build fails.
    fn rebuild(&mut self) -> Result<(), RenderError> {
        let layout = self.layout.ok_or(RenderError::NotInitialized)?;

        if self.swapchain.take().is_some() {
            self.device.wait_idle()?;
            self.tiers.swapchain.flush(&mut self.device);
        }
        self.state = SwapchainState::Stale;

        let drawable = self.device.drawable_extent();
        if drawable.is_degenerate() {
            return Ok(());
        }
        match Swapchain::build(&mut self.device, drawable, layout, &self.shared.blends, &mut self.tiers.swapchain) {
            Ok(swapchain) => {
                log::debug!("surface resized to {}x{}", drawable.width, drawable.height);
                self.swapchain = Some(swapchain);
                self.state = SwapchainState::Ready;
            }
            Err(e) => log::warn!("surface rebuild failed: {e}"),
        }
        Ok(())
    }

    fn require_init(&self) -> Result<(), RenderError> {
        match self.state {
            SwapchainState::Uninitialized => Err(RenderError::NotInitialized),
            _ => Ok(()),
        }
    }
}

impl<D: Device> Backend for ImmediateBackend<D> {
    fn api(&self) -> Api {
        Api::OpenGl
    }

    fn init(&mut self) -> Result<(), RenderError> {
        if self.state != SwapchainState::Uninitialized {
            return Err(ContractViolation::AlreadyInitialized.into());
        }
        if let Err(e) = self.initialize() {
            self.tiers.flush_all(&mut self.device);
            self.layout = None;
            self.slot = None;
            self.swapchain = None;
            self.shared.reset();
            self.state = SwapchainState::Uninitialized;
            return Err(e);
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), RenderError> {
        if self.shared.recording {
            return Err(ContractViolation::ShutdownDuringFrame.into());
        }
        if self.state == SwapchainState::Uninitialized {
            return Ok(());
        }

        self.device.wait_idle()?;
        for parts in self.shared.drain_textures() {
            self.tiers.program.extend(parts.resources());
        }
        self.tiers.flush_all(&mut self.device);

        self.layout = None;
        self.slot = None;
        self.swapchain = None;
        self.shared.reset();
        self.state = SwapchainState::Uninitialized;
        log::debug!("immediate backend shut down");
        Ok(())
    }

    fn state(&self) -> SwapchainState {
        self.state
    }

    fn need_reinit(&self) -> bool {
        false
    }

    fn reinit(&mut self) -> Result<(), RenderError> {
        if self.shared.recording {
            return Err(ContractViolation::ReinitDuringFrame.into());
        }
        self.require_init()?;
        self.rebuild()
    }

    fn begin_frame(&mut self) -> Result<bool, RenderError> {
        if self.shared.recording {
            return Err(ContractViolation::BeginWhileInFrame.into());
        }
        self.require_init()?;

        let drawable = self.device.drawable_extent();
        if drawable.is_degenerate() {
            log::trace!("frame skipped: drawable is {}x{}", drawable.width, drawable.height);
            self.state = SwapchainState::Stale;
            return Ok(false);
        }
        if self.state != SwapchainState::Ready || self.swapchain_extent() != Some(drawable) {
            self.rebuild()?;
            if self.state != SwapchainState::Ready {
                return Ok(false);
            }
        }

        let acquire_timeout = self.shared.config.acquire_timeout;
        let slot = self.slot.as_mut().ok_or(RenderError::NotInitialized)?;
        let Some(swapchain) = self.swapchain.as_mut() else {
            return Ok(false);
        };

        match self.device.acquire_image(swapchain.id, slot.image_acquired, acquire_timeout)? {
            AcquireOutcome::Acquired { index, .. } => swapchain.image_index = Some(index),
            AcquireOutcome::OutOfDate => {
                self.state = SwapchainState::Stale;
                return Ok(false);
            }
            AcquireOutcome::Timeout => return Ok(false),
        }

        // The previous end_frame waited for the GPU.
        self.device.reset_fence(slot.fence)?;
        self.device.reset_command_pool(slot.pool)?;
        self.tiers.slot(0).flush(&mut self.device);
        slot.commands.begin();

        self.shared.batcher.clear();
        self.shared.recording = true;
        Ok(true)
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        if !self.shared.recording {
            return Err(ContractViolation::EndWithoutBegin.into());
        }
        self.shared.recording = false;

        let slot = self.slot.as_mut().ok_or(RenderError::NotInitialized)?;
        let swapchain = self.swapchain.as_ref().ok_or(RenderError::NotInitialized)?;
        let (image, framebuffer) = swapchain
            .image_index
            .zip(swapchain.target())
            .ok_or(RenderError::NotInitialized)?;

        let (retire, owner) = self.tiers.slot_and_program(0);
        let target = FlushTarget {
            swapchain,
            framebuffer,
            extent: swapchain.extent,
            clear: self.shared.clear,
        };
        let stats = self.shared.batcher.flush(&mut self.device, &target, slot, retire, owner)?;
        slot.commands.end();

        self.device.submit(
            slot.pool,
            &slot.commands,
            Some(slot.image_acquired),
            Some(slot.render_complete),
            Some(slot.fence),
        )?;
        slot.valid = true;
        self.shared.last_flush = Some(stats);

        let outcome = self.device.present(swapchain.id, image, Some(slot.render_complete))?;
        if self.device.wait_fence(slot.fence, self.shared.config.fence_timeout)? == FenceStatus::Timeout {
            log::debug!("frame fence timed out, waiting for idle");
            self.device.wait_idle()?;
        }
        self.frames += 1;

        if outcome != PresentOutcome::Presented {
            log::debug!("present reported {outcome:?}, rebuilding next frame");
            self.state = SwapchainState::Stale;
        }
        if let Some(swapchain) = self.swapchain.as_mut() {
            swapchain.image_index = None;
        }
        Ok(())
    }

    fn push(&mut self, batch: Batch) -> Result<(), RenderError> {
        self.shared.push(batch)
    }

    fn create_blend_state(&mut self, descriptor: BlendDescriptor) -> Result<BlendHandle, RenderError> {
        let handle = self.shared.blends.next_handle();
        if let (Some(swapchain), Some(layout)) = (self.swapchain.as_mut(), self.layout) {
            swapchain.add_blend(&mut self.device, layout, handle, &descriptor, &mut self.tiers.swapchain)?;
        }
        self.shared.blends.register(descriptor);
        Ok(handle)
    }

    fn create_texture(&mut self, image: &ImageData) -> Result<TextureHandle, RenderError> {
        self.require_init()?;
        self.shared.create_texture(&mut self.device, image)
    }

    fn destroy_texture(&mut self, handle: TextureHandle) -> Result<(), RenderError> {
        self.require_init()?;
        let parts = self.shared.take_texture(handle)?;
        self.tiers.slot(0).extend(parts.resources());
        Ok(())
    }

    fn texture_info(&self, handle: TextureHandle) -> Option<TextureInfo> {
        self.shared.texture_info(handle)
    }

    fn set_clear_color(&mut self, color: Color) {
        self.shared.clear = color;
    }

    fn frame_counter(&self) -> u64 {
        self.frames
    }

    fn last_flush(&self) -> Option<FlushStats> {
        self.shared.last_flush
    }

    fn overlay_init(&mut self) -> Result<(), RenderError> {
        self.require_init()?;
        self.shared.overlay = true;
        Ok(())
    }

    fn overlay_new_frame(&mut self) -> Result<Extent, RenderError> {
        self.shared.require_overlay_frame()?;
        self.swapchain_extent().ok_or(RenderError::NotInitialized)
    }

    fn overlay_end_frame(&mut self, batches: Vec<Batch>) -> Result<(), RenderError> {
        self.shared.push_overlay(batches)
    }

    fn overlay_shutdown(&mut self) {
        self.shared.overlay = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Rect;
    use crate::device::{HeadlessDevice, HeadlessProbe};

    const FULL: Extent = Extent::new(640, 480);

    fn backend() -> (ImmediateBackend<HeadlessDevice>, HeadlessProbe) {
        let device = HeadlessDevice::new(FULL);
        let probe = device.probe();
        let mut b = ImmediateBackend::new(device, RendererConfig::default().with_api(Api::OpenGl));
        b.init().unwrap();
        (b, probe)
    }

    fn quad(x: f32) -> Batch {
        Batch::quad(Rect::new(x, 0.0, 4.0, 4.0), Color::WHITE, Rect::full(FULL))
    }

    #[test]
    fn draws_in_submission_order() {
        let (mut b, probe) = backend();
        assert!(b.begin_frame().unwrap());
        b.push(quad(0.0).with_z(10)).unwrap();
        b.push(quad(20.0).with_z(-10)).unwrap();
        b.end_frame().unwrap();

        let draws = probe.last_draws();
        let bytes = probe.buffer_contents(draws[0].vertex_buffer.unwrap()).unwrap();
        assert_eq!(&bytes[0..4], &0.0f32.to_le_bytes());
        assert_eq!(draws[1].vertices, 4..8);
    }

    #[test]
    fn end_frame_waits_for_the_gpu() {
        let (mut b, probe) = backend();
        probe.hold_completion(true);
        assert!(b.begin_frame().unwrap());
        b.end_frame().unwrap();
        assert_eq!(probe.wait_idle_count(), 1);

        // the fence was completed by the idle wait
        assert!(b.begin_frame().unwrap());
        b.end_frame().unwrap();
        assert_eq!(b.frame_counter(), 2);
    }

    #[test]
    fn resize_is_handled_inside_begin() {
        let (mut b, probe) = backend();
        let bigger = Extent::new(1280, 720);
        probe.set_drawable(bigger);
        assert!(!b.need_reinit());

        assert!(b.begin_frame().unwrap());
        b.end_frame().unwrap();
        assert_eq!(b.swapchain_extent(), Some(bigger));
        assert_eq!(probe.swapchains_created(), 2);
    }

    #[test]
    fn minimize_skips_frames_until_restored() {
        let (mut b, probe) = backend();
        probe.set_drawable(Extent::default());
        assert!(!b.begin_frame().unwrap());
        assert!(!b.begin_frame().unwrap());
        assert_eq!(b.state(), SwapchainState::Stale);

        probe.set_drawable(FULL);
        assert!(b.begin_frame().unwrap());
        assert_eq!(b.state(), SwapchainState::Ready);
        b.end_frame().unwrap();
    }

    #[test]
    fn destroyed_texture_is_released_at_next_begin() {
        let (mut b, probe) = backend();
        let t = b.create_texture(&ImageData::solid(2, 2, Color::WHITE).unwrap()).unwrap();

        assert!(b.begin_frame().unwrap());
        b.push(quad(0.0).with_texture(t)).unwrap();
        b.destroy_texture(t).unwrap();
        b.end_frame().unwrap();

        let descriptor = probe.last_draws()[0].texture.unwrap();
        assert!(probe.is_live(Resource::Descriptor(descriptor)));
        assert_eq!(b.pending_deletions(), 4);

        assert!(b.begin_frame().unwrap());
        assert!(!probe.is_live(Resource::Descriptor(descriptor)));
        b.end_frame().unwrap();
    }

    #[test]
    fn out_of_date_present_rebuilds_next_frame() {
        let (mut b, probe) = backend();
        probe.present_out_of_date(1);
        assert!(b.begin_frame().unwrap());
        b.end_frame().unwrap();
        assert_eq!(b.state(), SwapchainState::Stale);

        assert!(b.begin_frame().unwrap());
        b.end_frame().unwrap();
        assert_eq!(probe.swapchains_created(), 2);
    }

    #[test]
    fn contract_is_enforced() {
        let (mut b, _) = backend();
        assert!(b.end_frame().unwrap_err().is_contract_violation());
        assert!(b.begin_frame().unwrap());
        assert!(b.begin_frame().unwrap_err().is_contract_violation());
        assert!(b.reinit().unwrap_err().is_contract_violation());
    }

    #[test]
    fn shutdown_releases_everything() {
        let (mut b, probe) = backend();
        b.create_blend_state(BlendDescriptor::ADDITIVE).unwrap();
        b.create_texture(&ImageData::solid(1, 1, Color::BLACK).unwrap()).unwrap();
        assert!(b.begin_frame().unwrap());
        b.end_frame().unwrap();
        b.shutdown().unwrap();
        assert_eq!(probe.live_count(), 0);
        assert_eq!(b.api(), Api::OpenGl);
    }
}
