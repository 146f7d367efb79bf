use std::collections::HashMap;

use crate::coords::Extent;
use crate::device::{
    DepthBufferId, Device, DeviceResult, FramebufferId, ImageViewId, PipelineId, PipelineLayoutId,
    Resource, SwapchainId,
};
use crate::geometry::{BlendDescriptor, BlendHandle, BlendRegistry, FragmentVariant};

use super::DeletionQueue;

/// Lifecycle of the presentable surface.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum SwapchainState {
    #[default]
    Uninitialized,
    /// Built and matching the drawable.
    Ready,
    /// Must be rebuilt before the next frame can render.
    Stale,
}

/// Whether the surface must be rebuilt before rendering.
///
/// `reported_stale` is set when acquire or present said the swapchain no
/// longer matches the surface.
pub fn needs_rebuild(
    state: SwapchainState,
    reported_stale: bool,
    drawable: Extent,
    built: Option<Extent>,
) -> bool {
    match state {
        SwapchainState::Uninitialized => false,
        SwapchainState::Ready => reported_stale || built != Some(drawable),
        SwapchainState::Stale => reported_stale || !drawable.is_degenerate(),
    }
}

/// Presentable images and everything built against them.
#[derive(Debug)]
pub struct Swapchain {
    pub id: SwapchainId,
    pub extent: Extent,
    pub views: Vec<ImageViewId>,
    pub framebuffers: Vec<FramebufferId>,
    pub depth: DepthBufferId,
    pipelines: HashMap<(BlendHandle, FragmentVariant), PipelineId>,
    /// Image acquired for the frame being recorded.
    pub image_index: Option<u32>,
}

impl Swapchain {
    /// Builds the swapchain, its framebuffers and one pipeline per
    /// (blend state, variant).
    ///
    /// Every object is registered in `tier` as soon as it exists, so a failure
    /// halfway leaves nothing untracked.
    pub fn build<D: Device + ?Sized>(
        device: &mut D,
        extent: Extent,
        layout: PipelineLayoutId,
        blends: &BlendRegistry,
        tier: &mut DeletionQueue,
    ) -> DeviceResult<Self> {
        let info = device.create_swapchain(extent)?;
        tier.push(Resource::Swapchain(info.id));

        let depth = device.create_depth_buffer(info.extent)?;
        tier.push(Resource::DepthBuffer(depth));

        let mut views = Vec::with_capacity(info.image_count as usize);
        let mut framebuffers = Vec::with_capacity(info.image_count as usize);
        for image in 0..info.image_count {
            let view = device.create_image_view(info.id, image)?;
            tier.push(Resource::ImageView(view));
            let fb = device.create_framebuffer(view, depth, info.extent)?;
            tier.push(Resource::Framebuffer(fb));
            views.push(view);
            framebuffers.push(fb);
        }

        let mut swapchain = Self {
            id: info.id,
            extent: info.extent,
            views,
            framebuffers,
            depth,
            pipelines: HashMap::new(),
            image_index: None,
        };
        for (handle, desc) in blends.iter() {
            swapchain.add_blend(device, layout, handle, desc, tier)?;
        }

        log::debug!(
            "swapchain built: {}x{}, {} images, {} pipelines",
            info.extent.width,
            info.extent.height,
            info.image_count,
            swapchain.pipelines.len()
        );
        Ok(swapchain)
    }

    /// Creates the pipelines for a new blend state. Either every variant is
    /// added or none is.
    pub fn add_blend<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        layout: PipelineLayoutId,
        handle: BlendHandle,
        desc: &BlendDescriptor,
        tier: &mut DeletionQueue,
    ) -> DeviceResult<()> {
        let mut created = Vec::with_capacity(FragmentVariant::ALL.len());
        for variant in FragmentVariant::ALL {
            match device.create_pipeline(layout, variant, desc) {
                Ok(pipeline) => created.push((variant, pipeline)),
                Err(e) => {
                    // never bound, safe to release right away
                    for (_, pipeline) in created.into_iter().rev() {
                        device.destroy(Resource::Pipeline(pipeline));
                    }
                    return Err(e);
                }
            }
        }
        for (variant, pipeline) in created {
            tier.push(Resource::Pipeline(pipeline));
            self.pipelines.insert((handle, variant), pipeline);
        }
        Ok(())
    }

    #[inline]
    pub fn pipeline(&self, blend: BlendHandle, variant: FragmentVariant) -> Option<PipelineId> {
        self.pipelines.get(&(blend, variant)).copied()
    }

    /// Framebuffer of the acquired image.
    #[inline]
    pub fn target(&self) -> Option<FramebufferId> {
        let index = self.image_index?;
        self.framebuffers.get(index as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessDevice;

    const FULL: Extent = Extent::new(800, 600);

    // ── needs_rebuild ─────────────────────────────────────────────────────

    #[test]
    fn ready_rebuilds_on_resize_or_report() {
        let s = SwapchainState::Ready;
        assert!(!needs_rebuild(s, false, FULL, Some(FULL)));
        assert!(needs_rebuild(s, true, FULL, Some(FULL)));
        assert!(needs_rebuild(s, false, Extent::new(1024, 600), Some(FULL)));
        assert!(needs_rebuild(s, false, Extent::default(), Some(FULL)));
    }

    #[test]
    fn stale_waits_for_drawable() {
        let s = SwapchainState::Stale;
        assert!(!needs_rebuild(s, false, Extent::new(0, 0), None));
        assert!(needs_rebuild(s, false, FULL, None));
    }

    #[test]
    fn uninitialized_never_rebuilds() {
        assert!(!needs_rebuild(SwapchainState::Uninitialized, true, FULL, None));
    }

    // ── build ─────────────────────────────────────────────────────────────

    #[test]
    fn build_creates_pipeline_per_blend_and_variant() {
        let mut d = HeadlessDevice::new(FULL);
        let probe = d.probe();
        let layout = d.create_pipeline_layout().unwrap();
        let mut blends = BlendRegistry::new();
        blends.register(BlendDescriptor::ALPHA);
        let additive = blends.register(BlendDescriptor::ADDITIVE);

        let mut tier = DeletionQueue::new();
        let sc = Swapchain::build(&mut d, FULL, layout, &blends, &mut tier).unwrap();

        let p = sc.pipeline(additive, FragmentVariant::Image).unwrap();
        assert_eq!(probe.pipeline(p), Some((FragmentVariant::Image, BlendDescriptor::ADDITIVE)));
        assert_eq!(sc.framebuffers.len(), 3);

        tier.flush(&mut d);
        assert_eq!(probe.live_count(), 1); // only the layout remains
    }

    #[test]
    fn failed_build_leaves_no_untracked_objects() {
        let mut d = HeadlessDevice::new(FULL);
        let probe = d.probe();
        let layout = d.create_pipeline_layout().unwrap();
        let blends = BlendRegistry::new();
        let mut tier = DeletionQueue::new();

        probe.fail_swapchain_builds(1);
        assert!(Swapchain::build(&mut d, FULL, layout, &blends, &mut tier).is_err());
        assert!(tier.is_empty());
    }
}
