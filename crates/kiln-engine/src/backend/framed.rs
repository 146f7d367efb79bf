use crate::batch::{FlushStats, FlushTarget};
use crate::config::RendererConfig;
use crate::coords::Extent;
use crate::device::{AcquireOutcome, Device, FenceStatus, PipelineLayoutId, PresentOutcome, Resource};
use crate::error::{ContractViolation, RenderError};
use crate::geometry::{Batch, BlendDescriptor, BlendHandle, TextureHandle, Vertex};
use crate::paint::{Color, ImageData, TextureInfo};
use crate::sync::{needs_rebuild, DeletionTiers, FrameRing, FrameSlot, Swapchain, SwapchainState};

use super::shared::Shared;
use super::{Api, Backend};

/// Objects that exist from `init` to `shutdown`.
struct Live {
    layout: PipelineLayoutId,
    ring: FrameRing,
}

/// Vulkan-style backend: `frames_in_flight` slots, explicit swapchain
/// lifecycle and three deletion tiers.
pub struct FramedBackend<D: Device> {
    device: D,
    shared: Shared,
    state: SwapchainState,
    /// Set when acquire or present reported the swapchain out of date or
    /// suboptimal. Cleared by a rebuild.
    reported_stale: bool,
    live: Option<Live>,
    swapchain: Option<Swapchain>,
    tiers: DeletionTiers,
}

impl<D: Device> FramedBackend<D> {
    pub fn new(device: D, config: RendererConfig) -> Self {
        let slots = config.slot_count();
        let order = config.draw_order;
        Self {
            device,
            shared: Shared::new(config, order),
            state: SwapchainState::Uninitialized,
            reported_stale: false,
            live: None,
            swapchain: None,
            tiers: DeletionTiers::new(slots),
        }
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Slot the next (or current) frame records into.
    pub fn current_slot(&self) -> Option<usize> {
        self.live.as_ref().map(|l| l.ring.index())
    }

    /// Deletions waiting in the per-frame tier of `slot`.
    pub fn pending_deletions(&self, slot: usize) -> usize {
        self.tiers.slot_ref(slot).len()
    }

    pub fn swapchain_extent(&self) -> Option<Extent> {
        self.swapchain.as_ref().map(|s| s.extent)
    }

    fn initialize(&mut self) -> Result<(), RenderError> {
        let config = &self.shared.config;
        let vertex_bytes = config.initial_vertex_capacity as u64 * Vertex::SIZE;
        let index_bytes = config.initial_index_capacity as u64 * std::mem::size_of::<u16>() as u64;
        let slot_count = config.slot_count();

        let layout = self.device.create_pipeline_layout()?;
        self.tiers.program.push(Resource::PipelineLayout(layout));

        let mut slots = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            slots.push(FrameSlot::create(&mut self.device, vertex_bytes, index_bytes, &mut self.tiers.program)?);
        }
        self.shared.create_fallback(&mut self.device, &mut self.tiers.program)?;
        self.live = Some(Live { layout, ring: FrameRing::new(slots) });

        let drawable = self.device.drawable_extent();
        if drawable.is_degenerate() {
            log::debug!("init with a {}x{} drawable, starting stale", drawable.width, drawable.height);
            self.state = SwapchainState::Stale;
            return Ok(());
        }

        let swapchain = Swapchain::build(&mut self.device, drawable, layout, &self.shared.blends, &mut self.tiers.swapchain)?;
        self.swapchain = Some(swapchain);
        self.state = SwapchainState::Ready;
        log::debug!("framed backend initialized with {slot_count} frame slots");
        Ok(())
    }

    fn require_init(&self) -> Result<(), RenderError> {
        match self.state {
            SwapchainState::Uninitialized => Err(RenderError::NotInitialized),
            _ => Ok(()),
        }
    }

    fn mark_stale(&mut self, reason: &str) {
        if self.state != SwapchainState::Stale {
            log::debug!("swapchain stale: {reason}");
        }
        self.reported_stale = true;
        self.state = SwapchainState::Stale;
    }
}

impl<D: Device> Backend for FramedBackend<D> {
    fn api(&self) -> Api {
        Api::Vulkan
    }

    fn init(&mut self) -> Result<(), RenderError> {
        if self.state != SwapchainState::Uninitialized {
            return Err(ContractViolation::AlreadyInitialized.into());
        }
        if let Err(e) = self.initialize() {
            // Whatever was created is already registered.
            self.tiers.flush_all(&mut self.device);
            self.live = None;
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
        let destroyed = self.tiers.flush_all(&mut self.device);

        self.live = None;
        self.swapchain = None;
        self.reported_stale = false;
        self.shared.reset();
        self.state = SwapchainState::Uninitialized;
        log::debug!("framed backend shut down, {destroyed} objects destroyed");
        Ok(())
    }

    fn state(&self) -> SwapchainState {
        self.state
    }

    fn need_reinit(&self) -> bool {
        needs_rebuild(
            self.state,
            self.reported_stale,
            self.device.drawable_extent(),
            self.swapchain.as_ref().map(|s| s.extent),
        )
    }

    fn reinit(&mut self) -> Result<(), RenderError> {
        if self.shared.recording {
            return Err(ContractViolation::ReinitDuringFrame.into());
        }
        let layout = self.live.as_ref().map(|l| l.layout).ok_or(RenderError::NotInitialized)?;

        self.device.wait_idle()?;
        self.tiers.flush_slots(&mut self.device);
        self.tiers.swapchain.flush(&mut self.device);
        self.swapchain = None;
        self.reported_stale = false;
        self.state = SwapchainState::Stale;

        let drawable = self.device.drawable_extent();
        if drawable.is_degenerate() {
            log::trace!("reinit deferred: drawable is {}x{}", drawable.width, drawable.height);
            return Ok(());
        }

        match Swapchain::build(&mut self.device, drawable, layout, &self.shared.blends, &mut self.tiers.swapchain) {
            Ok(swapchain) => {
                log::debug!("swapchain rebuilt at {}x{}", drawable.width, drawable.height);
                self.swapchain = Some(swapchain);
                self.state = SwapchainState::Ready;
            }
            Err(e) => log::warn!("swapchain rebuild failed, staying stale: {e}"),
        }
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<bool, RenderError> {
        if self.shared.recording {
            return Err(ContractViolation::BeginWhileInFrame.into());
        }
        self.require_init()?;
        if self.need_reinit() {
            self.reinit()?;
        }
        if self.state != SwapchainState::Ready {
            log::trace!("frame skipped: swapchain stale");
            return Ok(false);
        }

        let fence_timeout = self.shared.config.fence_timeout;
        let acquire_timeout = self.shared.config.acquire_timeout;
        let live = self.live.as_mut().ok_or(RenderError::NotInitialized)?;
        let Some(swapchain) = self.swapchain.as_mut() else {
            return Ok(false);
        };

        let index = live.ring.index();
        let slot = live.ring.current_mut();
        if slot.valid && self.device.wait_fence(slot.fence, fence_timeout)? == FenceStatus::Timeout {
            log::trace!("frame skipped: slot {index} still in flight");
            return Ok(false);
        }

        match self.device.acquire_image(swapchain.id, slot.image_acquired, acquire_timeout)? {
            AcquireOutcome::Acquired { index: image, suboptimal } => {
                swapchain.image_index = Some(image);
                if suboptimal {
                    self.reported_stale = true;
                }
            }
            AcquireOutcome::OutOfDate => {
                self.mark_stale("acquire reported out of date");
                return Ok(false);
            }
            AcquireOutcome::Timeout => {
                log::trace!("frame skipped: image acquisition timed out");
                return Ok(false);
            }
        }

        self.device.reset_fence(slot.fence)?;
        slot.valid = false;
        self.device.reset_command_pool(slot.pool)?;
        self.tiers.slot(index).flush(&mut self.device);
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

        let live = self.live.as_mut().ok_or(RenderError::NotInitialized)?;
        let swapchain = self.swapchain.as_ref().ok_or(RenderError::NotInitialized)?;
        let (image, framebuffer) = swapchain
            .image_index
            .zip(swapchain.target())
            .ok_or(RenderError::NotInitialized)?;

        let index = live.ring.index();
        let slot = live.ring.current_mut();
        let (retire, owner) = self.tiers.slot_and_program(index);
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
        live.ring.advance();

        match outcome {
            PresentOutcome::Presented => {}
            PresentOutcome::Suboptimal => self.mark_stale("present reported suboptimal"),
            PresentOutcome::OutOfDate => self.mark_stale("present reported out of date"),
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
        if let (Some(swapchain), Some(live)) = (self.swapchain.as_mut(), self.live.as_ref()) {
            swapchain.add_blend(&mut self.device, live.layout, handle, &descriptor, &mut self.tiers.swapchain)?;
        }
        self.shared.blends.register(descriptor);
        Ok(handle)
    }

    fn create_texture(&mut self, image: &ImageData) -> Result<TextureHandle, RenderError> {
        self.require_init()?;
        self.shared.create_texture(&mut self.device, image)
    }

    fn destroy_texture(&mut self, handle: TextureHandle) -> Result<(), RenderError> {
        let live = self.live.as_ref().ok_or(RenderError::NotInitialized)?;
        let parts = self.shared.take_texture(handle)?;
        // The frame being recorded, or between frames the last submitted one.
        let slot = if self.shared.recording { live.ring.index() } else { live.ring.previous_index() };
        self.tiers.slot(slot).extend(parts.resources());
        log::debug!("{handle} scheduled for deletion with slot {slot}");
        Ok(())
    }

    fn texture_info(&self, handle: TextureHandle) -> Option<TextureInfo> {
        self.shared.texture_info(handle)
    }

    fn set_clear_color(&mut self, color: Color) {
        self.shared.clear = color;
    }

    fn frame_counter(&self) -> u64 {
        self.live.as_ref().map_or(0, |l| l.ring.counter())
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
        self.swapchain.as_ref().map(|s| s.extent).ok_or(RenderError::NotInitialized)
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
    use crate::coords::{Rect, Scissor};
    use crate::device::{BufferUsage, HeadlessDevice, HeadlessProbe};
    use crate::geometry::FragmentVariant;

    const FULL: Extent = Extent::new(800, 600);

    fn backend() -> (FramedBackend<HeadlessDevice>, HeadlessProbe) {
        let device = HeadlessDevice::new(FULL);
        let probe = device.probe();
        let mut b = FramedBackend::new(device, RendererConfig::default());
        b.init().unwrap();
        (b, probe)
    }

    fn full_quad() -> Batch {
        Batch::quad(Rect::full(FULL), Color::WHITE, Rect::full(FULL))
    }

    fn frame(b: &mut FramedBackend<HeadlessDevice>, batches: Vec<Batch>) {
        assert!(b.begin_frame().unwrap());
        for batch in batches {
            b.push(batch).unwrap();
        }
        b.end_frame().unwrap();
    }

    // ── init ──────────────────────────────────────────────────────────────

    #[test]
    fn init_builds_ready_swapchain() {
        let (b, probe) = backend();
        assert_eq!(b.state(), SwapchainState::Ready);
        assert_eq!(b.swapchain_extent(), Some(FULL));
        assert_eq!(probe.swapchains_created(), 1);
        assert!(!b.need_reinit());
    }

    #[test]
    fn double_init_is_rejected() {
        let (mut b, _) = backend();
        assert!(matches!(
            b.init(),
            Err(RenderError::Contract(ContractViolation::AlreadyInitialized))
        ));
    }

    #[test]
    fn init_while_minimized_starts_stale() {
        let device = HeadlessDevice::new(Extent::default());
        let mut b = FramedBackend::new(device, RendererConfig::default());
        b.init().unwrap();
        assert_eq!(b.state(), SwapchainState::Stale);
        assert!(!b.begin_frame().unwrap());
    }

    #[test]
    fn begin_before_init_fails() {
        let mut b = FramedBackend::new(HeadlessDevice::new(FULL), RendererConfig::default());
        assert!(matches!(b.begin_frame(), Err(RenderError::NotInitialized)));
    }

    // ── frame slots ───────────────────────────────────────────────────────

    #[test]
    fn frames_visit_slots_round_robin() {
        let (mut b, _) = backend();
        let mut seen = Vec::new();
        for _ in 0..4 {
            assert!(b.begin_frame().unwrap());
            seen.push(b.current_slot().unwrap());
            b.end_frame().unwrap();
        }
        assert_eq!(seen, vec![0, 1, 0, 1]);
        assert_eq!(b.frame_counter(), 4);
    }

    #[test]
    fn one_batch_is_one_full_window_draw() {
        let (mut b, probe) = backend();
        frame(&mut b, vec![full_quad()]);

        let draws = probe.last_draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].indices, 0..6);
        assert_eq!(draws[0].vertices, 0..4);
        assert_eq!(draws[0].scissor, Some(Scissor::full(FULL)));
        let (variant, blend) = probe.pipeline(draws[0].pipeline.unwrap()).unwrap();
        assert_eq!(variant, FragmentVariant::Solid);
        assert_eq!(blend, BlendDescriptor::ALPHA);
        assert_eq!(probe.presents(), vec![0]);
        assert_eq!(b.last_flush().map(|s| s.draws), Some(1));
    }

    #[test]
    fn fence_timeout_skips_frame() {
        let (mut b, probe) = backend();
        probe.hold_completion(true);
        frame(&mut b, vec![]);
        frame(&mut b, vec![]);

        // slot 0 is still in flight
        let acquired = probe.acquire_count();
        assert!(!b.begin_frame().unwrap());
        assert_eq!(b.state(), SwapchainState::Ready);
        assert_eq!(probe.acquire_count(), acquired);

        probe.complete_submitted();
        assert!(b.begin_frame().unwrap());
        b.end_frame().unwrap();
    }

    #[test]
    fn failed_submit_does_not_wedge_the_slot() {
        let (mut b, probe) = backend();
        frame(&mut b, vec![]);
        frame(&mut b, vec![]);

        probe.fail_submits(1);
        assert!(b.begin_frame().unwrap());
        b.push(full_quad()).unwrap();
        assert!(matches!(b.end_frame(), Err(RenderError::Device(_))));
        assert_eq!(b.frame_counter(), 2);

        // same slot again; its fence was reset but never submitted
        assert!(b.begin_frame().unwrap());
        assert_eq!(b.current_slot(), Some(0));
        b.push(full_quad()).unwrap();
        b.end_frame().unwrap();
        assert_eq!(probe.last_draws().len(), 1);
        assert_eq!(b.frame_counter(), 3);
    }

    // ── contract ──────────────────────────────────────────────────────────

    #[test]
    fn end_without_begin_is_a_violation() {
        let (mut b, _) = backend();
        assert!(matches!(
            b.end_frame(),
            Err(RenderError::Contract(ContractViolation::EndWithoutBegin))
        ));
    }

    #[test]
    fn double_begin_is_a_violation() {
        let (mut b, _) = backend();
        assert!(b.begin_frame().unwrap());
        assert!(matches!(
            b.begin_frame(),
            Err(RenderError::Contract(ContractViolation::BeginWhileInFrame))
        ));
    }

    #[test]
    fn push_outside_frame_is_a_violation() {
        let (mut b, _) = backend();
        let err = b.push(full_quad()).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn shutdown_mid_frame_is_a_violation() {
        let (mut b, _) = backend();
        assert!(b.begin_frame().unwrap());
        assert!(matches!(
            b.shutdown(),
            Err(RenderError::Contract(ContractViolation::ShutdownDuringFrame))
        ));
    }

    // ── resize and minimize ───────────────────────────────────────────────

    #[test]
    fn minimize_skips_frames_until_restored() {
        let (mut b, probe) = backend();
        frame(&mut b, vec![]);

        probe.set_drawable(Extent::default());
        for _ in 0..3 {
            assert!(!b.begin_frame().unwrap());
        }
        assert_eq!(b.state(), SwapchainState::Stale);
        assert!(!b.need_reinit());

        probe.set_drawable(FULL);
        assert!(b.need_reinit());
        assert!(b.begin_frame().unwrap());
        b.end_frame().unwrap();
        assert_eq!(b.state(), SwapchainState::Ready);
        assert_eq!(probe.swapchains_created(), 2);
    }

    #[test]
    fn resize_rebuilds_at_new_extent() {
        let (mut b, probe) = backend();
        let bigger = Extent::new(1024, 768);
        probe.set_drawable(bigger);
        assert!(b.need_reinit());

        frame(&mut b, vec![Batch::quad(Rect::full(bigger), Color::WHITE, Rect::full(bigger))]);
        assert_eq!(b.swapchain_extent(), Some(bigger));
        assert_eq!(probe.live_swapchain_extent(), Some(bigger));
        assert_eq!(probe.last_draws()[0].scissor, Some(Scissor::full(bigger)));
    }

    #[test]
    fn out_of_date_acquire_goes_stale_then_recovers() {
        let (mut b, probe) = backend();
        probe.acquire_out_of_date(1);
        assert!(!b.begin_frame().unwrap());
        assert_eq!(b.state(), SwapchainState::Stale);
        assert!(b.need_reinit());

        assert!(b.begin_frame().unwrap());
        b.end_frame().unwrap();
        assert_eq!(probe.swapchains_created(), 2);
    }

    #[test]
    fn suboptimal_acquire_rebuilds_after_present() {
        let (mut b, probe) = backend();
        probe.acquire_suboptimal(1);
        frame(&mut b, vec![]);
        assert_eq!(probe.presents().len(), 1);
        assert!(b.need_reinit());

        frame(&mut b, vec![]);
        assert_eq!(probe.swapchains_created(), 2);
    }

    #[test]
    fn suboptimal_present_marks_stale() {
        let (mut b, probe) = backend();
        probe.present_suboptimal(1);
        frame(&mut b, vec![]);
        assert_eq!(b.state(), SwapchainState::Stale);
        assert_eq!(b.frame_counter(), 1);
        assert!(b.begin_frame().unwrap());
    }

    #[test]
    fn failed_rebuild_stays_stale() {
        let (mut b, probe) = backend();
        probe.set_drawable(Extent::new(640, 480));
        probe.fail_swapchain_builds(1);

        assert!(!b.begin_frame().unwrap());
        assert_eq!(b.state(), SwapchainState::Stale);

        assert!(b.begin_frame().unwrap());
        b.end_frame().unwrap();
        assert_eq!(b.state(), SwapchainState::Ready);
    }

    #[test]
    fn rebuild_releases_previous_swapchain() {
        let (mut b, probe) = backend();
        let before = probe.live_count();
        probe.set_drawable(Extent::new(640, 480));
        frame(&mut b, vec![]);
        assert_eq!(probe.live_count(), before);
        assert_eq!(probe.unknown_destroys(), 0);
    }

    // ── deferred deletion ─────────────────────────────────────────────────

    #[test]
    fn texture_destroyed_mid_frame_waits_for_slot_reuse() {
        let (mut b, probe) = backend();
        let t = b.create_texture(&ImageData::solid(4, 4, Color::WHITE).unwrap()).unwrap();

        assert!(b.begin_frame().unwrap());
        let slot = b.current_slot().unwrap();
        b.push(full_quad().with_texture(t)).unwrap();
        b.destroy_texture(t).unwrap();
        b.end_frame().unwrap();

        let descriptor = probe.last_draws()[0].texture.unwrap();
        assert_eq!(b.pending_deletions(slot), 4);
        assert!(probe.is_live(Resource::Descriptor(descriptor)));

        frame(&mut b, vec![]);
        assert!(probe.is_live(Resource::Descriptor(descriptor)));

        assert!(b.begin_frame().unwrap());
        assert_eq!(b.current_slot(), Some(slot));
        assert!(!probe.is_live(Resource::Descriptor(descriptor)));
        assert_eq!(b.pending_deletions(slot), 0);
        b.end_frame().unwrap();
    }

    #[test]
    fn texture_destroyed_between_frames_goes_to_last_submitted_slot() {
        let (mut b, _) = backend();
        let t = b.create_texture(&ImageData::solid(1, 1, Color::WHITE).unwrap()).unwrap();
        frame(&mut b, vec![]);
        b.destroy_texture(t).unwrap();
        assert_eq!(b.pending_deletions(0), 4);
        assert!(b.texture_info(t).is_none());
    }

    #[test]
    fn texture_parts_destroyed_newest_first() {
        let (mut b, probe) = backend();
        let t = b.create_texture(&ImageData::solid(1, 1, Color::WHITE).unwrap()).unwrap();
        b.destroy_texture(t).unwrap();
        frame(&mut b, vec![]);
        frame(&mut b, vec![]);
        assert!(b.begin_frame().unwrap());

        let destroyed = probe.destroyed();
        let descriptor = destroyed.iter().position(|r| matches!(r, Resource::Descriptor(_)));
        let image = destroyed.iter().position(|r| matches!(r, Resource::Image(_)));
        assert!(descriptor.unwrap() < image.unwrap());
    }

    #[test]
    fn unknown_texture_destroy_is_a_violation() {
        let (mut b, _) = backend();
        let t = b.create_texture(&ImageData::solid(1, 1, Color::WHITE).unwrap()).unwrap();
        b.destroy_texture(t).unwrap();
        assert!(b.destroy_texture(t).unwrap_err().is_contract_violation());
    }

    // ── geometry growth ───────────────────────────────────────────────────

    #[test]
    fn growth_retires_buffer_through_slot_tier() {
        let config = RendererConfig { initial_vertex_capacity: 4, initial_index_capacity: 6, ..RendererConfig::default() };
        let device = HeadlessDevice::new(FULL);
        let probe = device.probe();
        let mut b = FramedBackend::new(device, config);
        b.init().unwrap();

        let quads: Vec<Batch> = (0..10)
            .map(|i| Batch::quad(Rect::new(i as f32, 0.0, 4.0, 4.0), Color::WHITE, Rect::full(FULL)))
            .collect();
        let expected: Vec<u8> = quads
            .iter()
            .flat_map(|q| bytemuck::cast_slice::<Vertex, u8>(&q.vertices).to_vec())
            .collect();
        let before = probe.live_buffers(BufferUsage::Vertex);

        frame(&mut b, quads);
        assert!(b.last_flush().unwrap().vertex_growth);
        assert_eq!(b.pending_deletions(0), 2);

        let draws = probe.last_draws();
        let grown = draws[0].vertex_buffer.unwrap();
        assert!(!before.contains(&grown));
        assert_eq!(&probe.buffer_contents(grown).unwrap()[..expected.len()], &expected[..]);
    }

    // ── blend states ──────────────────────────────────────────────────────

    #[test]
    fn blend_created_after_init_gets_pipelines() {
        let (mut b, probe) = backend();
        let additive = b.create_blend_state(BlendDescriptor::ADDITIVE).unwrap();
        frame(&mut b, vec![full_quad().with_blend(additive)]);

        let p = probe.last_draws()[0].pipeline.unwrap();
        assert_eq!(probe.pipeline(p), Some((FragmentVariant::Solid, BlendDescriptor::ADDITIVE)));
    }

    #[test]
    fn blend_survives_rebuild() {
        let (mut b, probe) = backend();
        let additive = b.create_blend_state(BlendDescriptor::ADDITIVE).unwrap();
        probe.set_drawable(Extent::new(300, 200));
        frame(&mut b, vec![full_quad().with_blend(additive)]);
        assert_eq!(probe.last_draws().len(), 1);
    }

    #[test]
    fn failed_blend_is_not_registered() {
        let (mut b, probe) = backend();
        let live = probe.live_count();
        probe.fail_pipeline_after(1);
        assert!(matches!(
            b.create_blend_state(BlendDescriptor::ADDITIVE),
            Err(RenderError::Device(_))
        ));
        assert_eq!(probe.live_count(), live);

        assert!(b.begin_frame().unwrap());
        let err = b.push(full_quad().with_blend(BlendHandle(1))).unwrap_err();
        assert!(matches!(err, RenderError::Contract(ContractViolation::UnknownBlendState(_))));
        b.end_frame().unwrap();

        let additive = b.create_blend_state(BlendDescriptor::ADDITIVE).unwrap();
        assert_eq!(additive, BlendHandle(1));
        frame(&mut b, vec![full_quad().with_blend(additive)]);
        assert_eq!(probe.last_draws().len(), 1);
    }

    // ── shutdown ──────────────────────────────────────────────────────────

    #[test]
    fn shutdown_releases_everything() {
        let (mut b, probe) = backend();
        b.create_texture(&ImageData::solid(2, 2, Color::WHITE).unwrap()).unwrap();
        frame(&mut b, vec![full_quad()]);
        b.shutdown().unwrap();

        assert_eq!(probe.live_count(), 0);
        assert_eq!(probe.unknown_destroys(), 0);
        assert_eq!(b.state(), SwapchainState::Uninitialized);
        assert!(b.shutdown().is_ok());
    }

    #[test]
    fn reinit_after_shutdown_is_allowed() {
        let (mut b, _) = backend();
        b.shutdown().unwrap();
        b.init().unwrap();
        frame(&mut b, vec![full_quad()]);
    }

    #[test]
    fn device_loss_is_fatal() {
        let (mut b, probe) = backend();
        probe.lose_device_on_submit();
        assert!(b.begin_frame().unwrap());
        assert!(matches!(b.end_frame(), Err(RenderError::Device(_))));
    }

    // ── overlay ───────────────────────────────────────────────────────────

    #[test]
    fn overlay_batches_draw_last() {
        let (mut b, probe) = backend();
        b.overlay_init().unwrap();
        assert!(b.begin_frame().unwrap());
        assert_eq!(b.overlay_new_frame().unwrap(), FULL);
        b.push(full_quad().with_z(1000)).unwrap();
        let small = Batch::quad(Rect::new(0.0, 0.0, 8.0, 8.0), Color::BLACK, Rect::new(0.0, 0.0, 8.0, 8.0));
        b.overlay_end_frame(vec![small]).unwrap();
        b.end_frame().unwrap();

        let draws = probe.last_draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[1].scissor, Some(Scissor::new(0, 0, 8, 8)));
    }
}
