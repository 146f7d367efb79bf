use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::rc::Rc;
use std::time::Duration;

use crate::config::SamplerConfig;
use crate::coords::{Extent, Scissor};
use crate::geometry::{BlendDescriptor, FragmentVariant};

use super::{
    AcquireOutcome, BufferId, BufferUsage, Command, CommandList, CommandPoolId, DepthBufferId,
    DescriptorId, Device, DeviceError, DeviceResult, FenceId, FenceStatus, FramebufferId, ImageId,
    ImageViewId, PipelineId, PipelineLayoutId, PresentOutcome, Resource, SamplerId, SemaphoreId,
    SwapchainId, SwapchainInfo, TextureDesc, TextureParts,
};

/// In-memory device.
///
/// Executes nothing; it tracks object lifetimes, buffer contents and submitted
/// command lists so the frame machinery can run without a GPU. Inspection and
/// fault injection go through a [`HeadlessProbe`] that shares its state.
pub struct HeadlessDevice {
    state: Rc<RefCell<State>>,
}

/// Shared view into a [`HeadlessDevice`] that survives moving the device into
/// a renderer.
#[derive(Clone)]
pub struct HeadlessProbe {
    state: Rc<RefCell<State>>,
}

/// One indexed draw with the state bound when it was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub framebuffer: Option<FramebufferId>,
    pub pipeline: Option<PipelineId>,
    pub texture: Option<DescriptorId>,
    pub vertex_buffer: Option<BufferId>,
    pub index_buffer: Option<BufferId>,
    pub scissor: Option<Scissor>,
    pub indices: Range<u32>,
    pub base_vertex: i32,
    pub vertices: Range<u32>,
}

impl DrawRecord {
    /// Walks `list` tracking bound state and returns every draw in order.
    pub fn collect(list: &CommandList) -> Vec<DrawRecord> {
        let mut draws = Vec::new();
        let mut framebuffer = None;
        let mut pipeline = None;
        let mut texture = None;
        let mut vertex_buffer = None;
        let mut index_buffer = None;
        let mut scissor = None;

        for cmd in list.commands() {
            match cmd {
                Command::BeginPass { framebuffer: fb, .. } => framebuffer = Some(*fb),
                Command::BindPipeline(p) => pipeline = Some(*p),
                Command::BindTexture(d) => texture = Some(*d),
                Command::BindVertexBuffer(b) => vertex_buffer = Some(*b),
                Command::BindIndexBuffer(b) => index_buffer = Some(*b),
                Command::SetScissor(s) => scissor = Some(*s),
                Command::DrawIndexed { indices, base_vertex, vertices } => draws.push(DrawRecord {
                    framebuffer,
                    pipeline,
                    texture,
                    vertex_buffer,
                    index_buffer,
                    scissor,
                    indices: indices.clone(),
                    base_vertex: *base_vertex,
                    vertices: vertices.clone(),
                }),
                Command::EndPass => framebuffer = None,
            }
        }
        draws
    }
}

#[derive(Default)]
struct Faults {
    acquire_out_of_date: u32,
    acquire_suboptimal: u32,
    acquire_timeout: u32,
    present_out_of_date: u32,
    present_suboptimal: u32,
    swapchain_failures: u32,
    submit_failures: u32,
    pipeline_failure: Option<u32>,
    device_lost_on_submit: bool,
}

struct State {
    drawable: Extent,
    image_count: u32,
    next_id: u32,

    live: HashSet<Resource>,
    destroyed: Vec<Resource>,
    unknown_destroys: usize,

    swapchains: HashMap<SwapchainId, SwapchainInfo>,
    swapchains_created: usize,
    next_image: u32,

    fences: HashMap<FenceId, bool>,
    in_flight: HashSet<FenceId>,
    hold_completion: bool,

    buffers: HashMap<BufferId, (BufferUsage, Vec<u8>)>,
    pipelines: HashMap<PipelineId, (FragmentVariant, BlendDescriptor)>,
    textures: HashMap<DescriptorId, (TextureDesc, SamplerConfig)>,

    submissions: Vec<CommandList>,
    presents: Vec<u32>,
    acquires: usize,
    pool_resets: usize,
    wait_idles: usize,

    faults: Faults,
}

impl State {
    fn issue(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn track(&mut self, resource: Resource) {
        self.live.insert(resource);
    }

    fn complete_in_flight(&mut self) {
        for fence in std::mem::take(&mut self.in_flight) {
            if let Some(signaled) = self.fences.get_mut(&fence) {
                *signaled = true;
            }
        }
    }

    fn require(&self, resource: Resource) -> DeviceResult<()> {
        if self.live.contains(&resource) {
            Ok(())
        } else {
            Err(DeviceError::UnknownResource(resource.to_string()))
        }
    }
}

impl HeadlessDevice {
    /// Creates a device whose surface reports `drawable` and offers three
    /// presentable images.
    pub fn new(drawable: Extent) -> Self {
        let state = State {
            drawable,
            image_count: 3,
            next_id: 0,
            live: HashSet::new(),
            destroyed: Vec::new(),
            unknown_destroys: 0,
            swapchains: HashMap::new(),
            swapchains_created: 0,
            next_image: 0,
            fences: HashMap::new(),
            in_flight: HashSet::new(),
            hold_completion: false,
            buffers: HashMap::new(),
            pipelines: HashMap::new(),
            textures: HashMap::new(),
            submissions: Vec::new(),
            presents: Vec::new(),
            acquires: 0,
            pool_resets: 0,
            wait_idles: 0,
            faults: Faults::default(),
        };
        Self { state: Rc::new(RefCell::new(state)) }
    }

    pub fn probe(&self) -> HeadlessProbe {
        HeadlessProbe { state: Rc::clone(&self.state) }
    }
}

impl Device for HeadlessDevice {
    fn drawable_extent(&self) -> Extent {
        self.state.borrow().drawable
    }

    fn create_swapchain(&mut self, extent: Extent) -> DeviceResult<SwapchainInfo> {
        let mut s = self.state.borrow_mut();
        if extent.is_degenerate() {
            return Err(DeviceError::Backend(format!(
                "cannot create a {}x{} swapchain",
                extent.width, extent.height
            )));
        }
        if s.faults.swapchain_failures > 0 {
            s.faults.swapchain_failures -= 1;
            return Err(DeviceError::Backend("injected swapchain failure".to_string()));
        }
        let id = SwapchainId(s.issue());
        let info = SwapchainInfo { id, extent, image_count: s.image_count };
        s.swapchains.insert(id, info);
        s.swapchains_created += 1;
        s.next_image = 0;
        s.track(Resource::Swapchain(id));
        Ok(info)
    }

    fn create_image_view(&mut self, swapchain: SwapchainId, image: u32) -> DeviceResult<ImageViewId> {
        let mut s = self.state.borrow_mut();
        let info = s
            .swapchains
            .get(&swapchain)
            .copied()
            .ok_or_else(|| DeviceError::UnknownResource(swapchain.to_string()))?;
        if image >= info.image_count {
            return Err(DeviceError::Backend(format!("{swapchain} has no image {image}")));
        }
        let id = ImageViewId(s.issue());
        s.track(Resource::ImageView(id));
        Ok(id)
    }

    fn create_depth_buffer(&mut self, _extent: Extent) -> DeviceResult<DepthBufferId> {
        let mut s = self.state.borrow_mut();
        let id = DepthBufferId(s.issue());
        s.track(Resource::DepthBuffer(id));
        Ok(id)
    }

    fn create_framebuffer(
        &mut self,
        color: ImageViewId,
        depth: DepthBufferId,
        _extent: Extent,
    ) -> DeviceResult<FramebufferId> {
        let mut s = self.state.borrow_mut();
        s.require(Resource::ImageView(color))?;
        s.require(Resource::DepthBuffer(depth))?;
        let id = FramebufferId(s.issue());
        s.track(Resource::Framebuffer(id));
        Ok(id)
    }

    fn create_pipeline_layout(&mut self) -> DeviceResult<PipelineLayoutId> {
        let mut s = self.state.borrow_mut();
        let id = PipelineLayoutId(s.issue());
        s.track(Resource::PipelineLayout(id));
        Ok(id)
    }

    fn create_pipeline(
        &mut self,
        layout: PipelineLayoutId,
        variant: FragmentVariant,
        blend: &BlendDescriptor,
    ) -> DeviceResult<PipelineId> {
        let mut s = self.state.borrow_mut();
        s.require(Resource::PipelineLayout(layout))?;
        match s.faults.pipeline_failure {
            Some(0) => {
                s.faults.pipeline_failure = None;
                return Err(DeviceError::Backend("pipeline compilation failed".to_string()));
            }
            Some(n) => s.faults.pipeline_failure = Some(n - 1),
            None => {}
        }
        let id = PipelineId(s.issue());
        s.pipelines.insert(id, (variant, *blend));
        s.track(Resource::Pipeline(id));
        Ok(id)
    }

    fn create_command_pool(&mut self) -> DeviceResult<CommandPoolId> {
        let mut s = self.state.borrow_mut();
        let id = CommandPoolId(s.issue());
        s.track(Resource::CommandPool(id));
        Ok(id)
    }

    fn create_fence(&mut self, signaled: bool) -> DeviceResult<FenceId> {
        let mut s = self.state.borrow_mut();
        let id = FenceId(s.issue());
        s.fences.insert(id, signaled);
        s.track(Resource::Fence(id));
        Ok(id)
    }

    fn create_semaphore(&mut self) -> DeviceResult<SemaphoreId> {
        let mut s = self.state.borrow_mut();
        let id = SemaphoreId(s.issue());
        s.track(Resource::Semaphore(id));
        Ok(id)
    }

    fn create_buffer(&mut self, usage: BufferUsage, size: u64) -> DeviceResult<BufferId> {
        let mut s = self.state.borrow_mut();
        let id = BufferId(s.issue());
        s.buffers.insert(id, (usage, vec![0; size as usize]));
        s.track(Resource::Buffer(id));
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> DeviceResult<()> {
        let mut s = self.state.borrow_mut();
        let (_, contents) = s
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| DeviceError::UnknownResource(buffer.to_string()))?;
        let start = offset as usize;
        let end = start + data.len();
        if end > contents.len() {
            return Err(DeviceError::Backend(format!(
                "write of {} bytes at {offset} overruns {buffer} ({} bytes)",
                data.len(),
                contents.len()
            )));
        }
        contents[start..end].copy_from_slice(data);
        Ok(())
    }

    fn create_texture(
        &mut self,
        desc: TextureDesc,
        pixels: &[u8],
        sampler: &SamplerConfig,
    ) -> DeviceResult<TextureParts> {
        let mut s = self.state.borrow_mut();
        if pixels.len() != desc.byte_len() {
            return Err(DeviceError::Backend(format!(
                "texture upload expects {} bytes, got {}",
                desc.byte_len(),
                pixels.len()
            )));
        }
        let parts = TextureParts {
            image: ImageId(s.issue()),
            view: ImageViewId(s.issue()),
            sampler: SamplerId(s.issue()),
            descriptor: DescriptorId(s.issue()),
        };
        for r in parts.resources() {
            s.track(r);
        }
        s.textures.insert(parts.descriptor, (desc, *sampler));
        Ok(parts)
    }

    fn wait_fence(&mut self, fence: FenceId, _timeout: Duration) -> DeviceResult<FenceStatus> {
        let s = self.state.borrow();
        match s.fences.get(&fence) {
            Some(true) => Ok(FenceStatus::Signaled),
            Some(false) => Ok(FenceStatus::Timeout),
            None => Err(DeviceError::UnknownResource(fence.to_string())),
        }
    }

    fn reset_fence(&mut self, fence: FenceId) -> DeviceResult<()> {
        let mut s = self.state.borrow_mut();
        let signaled = s
            .fences
            .get_mut(&fence)
            .ok_or_else(|| DeviceError::UnknownResource(fence.to_string()))?;
        *signaled = false;
        Ok(())
    }

    fn acquire_image(
        &mut self,
        swapchain: SwapchainId,
        signal: SemaphoreId,
        _timeout: Duration,
    ) -> DeviceResult<AcquireOutcome> {
        let mut s = self.state.borrow_mut();
        s.require(Resource::Semaphore(signal))?;
        let info = s
            .swapchains
            .get(&swapchain)
            .copied()
            .ok_or_else(|| DeviceError::UnknownResource(swapchain.to_string()))?;

        if s.faults.acquire_timeout > 0 {
            s.faults.acquire_timeout -= 1;
            return Ok(AcquireOutcome::Timeout);
        }
        if s.faults.acquire_out_of_date > 0 {
            s.faults.acquire_out_of_date -= 1;
            return Ok(AcquireOutcome::OutOfDate);
        }
        if s.drawable != info.extent {
            return Ok(AcquireOutcome::OutOfDate);
        }

        let suboptimal = s.faults.acquire_suboptimal > 0;
        if suboptimal {
            s.faults.acquire_suboptimal -= 1;
        }
        let index = s.next_image;
        s.next_image = (index + 1) % info.image_count;
        s.acquires += 1;
        Ok(AcquireOutcome::Acquired { index, suboptimal })
    }

    fn reset_command_pool(&mut self, pool: CommandPoolId) -> DeviceResult<()> {
        let mut s = self.state.borrow_mut();
        s.require(Resource::CommandPool(pool))?;
        s.pool_resets += 1;
        Ok(())
    }

    fn submit(
        &mut self,
        pool: CommandPoolId,
        commands: &CommandList,
        _wait: Option<SemaphoreId>,
        _signal: Option<SemaphoreId>,
        fence: Option<FenceId>,
    ) -> DeviceResult<()> {
        let mut s = self.state.borrow_mut();
        s.require(Resource::CommandPool(pool))?;
        if s.faults.device_lost_on_submit {
            return Err(DeviceError::DeviceLost);
        }
        if s.faults.submit_failures > 0 {
            s.faults.submit_failures -= 1;
            return Err(DeviceError::Backend("submission rejected".to_string()));
        }
        s.submissions.push(commands.clone());
        if let Some(fence) = fence {
            let complete = !s.hold_completion;
            let signaled = s
                .fences
                .get_mut(&fence)
                .ok_or_else(|| DeviceError::UnknownResource(fence.to_string()))?;
            *signaled = complete;
            if !complete {
                s.in_flight.insert(fence);
            }
        }
        Ok(())
    }

    fn present(
        &mut self,
        swapchain: SwapchainId,
        image: u32,
        _wait: Option<SemaphoreId>,
    ) -> DeviceResult<PresentOutcome> {
        let mut s = self.state.borrow_mut();
        s.require(Resource::Swapchain(swapchain))?;
        s.presents.push(image);
        if s.faults.present_out_of_date > 0 {
            s.faults.present_out_of_date -= 1;
            return Ok(PresentOutcome::OutOfDate);
        }
        if s.faults.present_suboptimal > 0 {
            s.faults.present_suboptimal -= 1;
            return Ok(PresentOutcome::Suboptimal);
        }
        Ok(PresentOutcome::Presented)
    }

    fn wait_idle(&mut self) -> DeviceResult<()> {
        let mut s = self.state.borrow_mut();
        s.wait_idles += 1;
        // Fences that were reset but never submitted stay unsignaled.
        s.complete_in_flight();
        Ok(())
    }

    fn destroy(&mut self, resource: Resource) {
        let mut s = self.state.borrow_mut();
        if !s.live.remove(&resource) {
            log::warn!("headless: destroy of unknown {resource}");
            s.unknown_destroys += 1;
            return;
        }
        match resource {
            Resource::Swapchain(id) => {
                s.swapchains.remove(&id);
            }
            Resource::Fence(id) => {
                s.fences.remove(&id);
                s.in_flight.remove(&id);
            }
            Resource::Buffer(id) => {
                s.buffers.remove(&id);
            }
            Resource::Pipeline(id) => {
                s.pipelines.remove(&id);
            }
            Resource::Descriptor(id) => {
                s.textures.remove(&id);
            }
            _ => {}
        }
        s.destroyed.push(resource);
    }
}

impl HeadlessProbe {
    // ── surface ───────────────────────────────────────────────────────────

    /// Resizes the simulated window. `Extent::default()` simulates minimize.
    pub fn set_drawable(&self, extent: Extent) {
        self.state.borrow_mut().drawable = extent;
    }

    pub fn swapchains_created(&self) -> usize {
        self.state.borrow().swapchains_created
    }

    pub fn live_swapchain_extent(&self) -> Option<Extent> {
        self.state.borrow().swapchains.values().next().map(|i| i.extent)
    }

    // ── fault injection ───────────────────────────────────────────────────

    pub fn acquire_out_of_date(&self, times: u32) {
        self.state.borrow_mut().faults.acquire_out_of_date = times;
    }

    pub fn acquire_suboptimal(&self, times: u32) {
        self.state.borrow_mut().faults.acquire_suboptimal = times;
    }

    pub fn acquire_timeout(&self, times: u32) {
        self.state.borrow_mut().faults.acquire_timeout = times;
    }

    pub fn present_out_of_date(&self, times: u32) {
        self.state.borrow_mut().faults.present_out_of_date = times;
    }

    pub fn present_suboptimal(&self, times: u32) {
        self.state.borrow_mut().faults.present_suboptimal = times;
    }

    pub fn fail_swapchain_builds(&self, times: u32) {
        self.state.borrow_mut().faults.swapchain_failures = times;
    }

    /// Lets `successes` more pipelines build, then fails the next one.
    pub fn fail_pipeline_after(&self, successes: u32) {
        self.state.borrow_mut().faults.pipeline_failure = Some(successes);
    }

    /// The next `times` submissions fail without touching their fence.
    pub fn fail_submits(&self, times: u32) {
        self.state.borrow_mut().faults.submit_failures = times;
    }

    pub fn lose_device_on_submit(&self) {
        self.state.borrow_mut().faults.device_lost_on_submit = true;
    }

    /// While held, submitted fences stay unsignaled and fence waits time out.
    pub fn hold_completion(&self, hold: bool) {
        self.state.borrow_mut().hold_completion = hold;
    }

    /// Signals every fence whose work is still held.
    pub fn complete_submitted(&self) {
        self.state.borrow_mut().complete_in_flight();
    }

    // ── object tracking ───────────────────────────────────────────────────

    pub fn is_live(&self, resource: Resource) -> bool {
        self.state.borrow().live.contains(&resource)
    }

    pub fn live_count(&self) -> usize {
        self.state.borrow().live.len()
    }

    /// Every destroyed object, in destruction order.
    pub fn destroyed(&self) -> Vec<Resource> {
        self.state.borrow().destroyed.clone()
    }

    pub fn unknown_destroys(&self) -> usize {
        self.state.borrow().unknown_destroys
    }

    pub fn pipeline(&self, id: PipelineId) -> Option<(FragmentVariant, BlendDescriptor)> {
        self.state.borrow().pipelines.get(&id).copied()
    }

    pub fn texture(&self, descriptor: DescriptorId) -> Option<(TextureDesc, SamplerConfig)> {
        self.state.borrow().textures.get(&descriptor).copied()
    }

    // ── buffers ───────────────────────────────────────────────────────────

    pub fn buffer_contents(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer).map(|(_, c)| c.clone())
    }

    /// Reads `count` 16-bit indices from the start of `buffer`.
    pub fn read_indices(&self, buffer: BufferId, count: usize) -> Option<Vec<u16>> {
        let s = self.state.borrow();
        let (_, contents) = s.buffers.get(&buffer)?;
        let bytes = contents.get(..count * 2)?;
        Some(
            bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect(),
        )
    }

    pub fn live_buffers(&self, usage: BufferUsage) -> Vec<BufferId> {
        let s = self.state.borrow();
        let mut ids: Vec<_> = s
            .buffers
            .iter()
            .filter(|(_, (u, _))| *u == usage)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    // ── submissions ───────────────────────────────────────────────────────

    pub fn submission_count(&self) -> usize {
        self.state.borrow().submissions.len()
    }

    pub fn last_submission(&self) -> Option<CommandList> {
        self.state.borrow().submissions.last().cloned()
    }

    /// Draws of the most recent submission.
    pub fn last_draws(&self) -> Vec<DrawRecord> {
        self.state
            .borrow()
            .submissions
            .last()
            .map(DrawRecord::collect)
            .unwrap_or_default()
    }

    /// Image indices in present order.
    pub fn presents(&self) -> Vec<u32> {
        self.state.borrow().presents.clone()
    }

    pub fn acquire_count(&self) -> usize {
        self.state.borrow().acquires
    }

    pub fn pool_resets(&self) -> usize {
        self.state.borrow().pool_resets
    }

    pub fn wait_idle_count(&self) -> usize {
        self.state.borrow().wait_idles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> (HeadlessDevice, HeadlessProbe) {
        let d = HeadlessDevice::new(Extent::new(800, 600));
        let p = d.probe();
        (d, p)
    }

    // ── lifetimes ─────────────────────────────────────────────────────────

    #[test]
    fn destroy_records_order_and_unknowns() {
        let (mut d, p) = device();
        let a = d.create_buffer(BufferUsage::Vertex, 16).unwrap();
        let b = d.create_buffer(BufferUsage::Index, 16).unwrap();
        d.destroy(Resource::Buffer(b));
        d.destroy(Resource::Buffer(a));
        d.destroy(Resource::Buffer(a));

        assert_eq!(p.destroyed(), vec![Resource::Buffer(b), Resource::Buffer(a)]);
        assert_eq!(p.unknown_destroys(), 1);
        assert_eq!(p.live_count(), 0);
    }

    // ── buffers ───────────────────────────────────────────────────────────

    #[test]
    fn write_past_end_is_rejected() {
        let (mut d, _) = device();
        let b = d.create_buffer(BufferUsage::Vertex, 8).unwrap();
        assert!(d.write_buffer(b, 4, &[0; 8]).is_err());
        assert!(d.write_buffer(b, 4, &[1; 4]).is_ok());
    }

    #[test]
    fn indices_read_back_little_endian() {
        let (mut d, p) = device();
        let b = d.create_buffer(BufferUsage::Index, 8).unwrap();
        d.write_buffer(b, 0, &[1, 0, 2, 1]).unwrap();
        assert_eq!(p.read_indices(b, 2), Some(vec![1, 258]));
    }

    // ── swapchain ─────────────────────────────────────────────────────────

    #[test]
    fn acquire_cycles_images_and_detects_resize() {
        let (mut d, p) = device();
        let sc = d.create_swapchain(Extent::new(800, 600)).unwrap();
        let sem = d.create_semaphore().unwrap();
        let t = Duration::from_secs(1);

        let first = d.acquire_image(sc.id, sem, t).unwrap();
        let second = d.acquire_image(sc.id, sem, t).unwrap();
        assert_eq!(first, AcquireOutcome::Acquired { index: 0, suboptimal: false });
        assert_eq!(second, AcquireOutcome::Acquired { index: 1, suboptimal: false });

        p.set_drawable(Extent::new(1024, 768));
        assert_eq!(d.acquire_image(sc.id, sem, t).unwrap(), AcquireOutcome::OutOfDate);
    }

    #[test]
    fn zero_sized_swapchain_is_an_error() {
        let (mut d, _) = device();
        assert!(d.create_swapchain(Extent::new(0, 600)).is_err());
    }

    // ── fences ────────────────────────────────────────────────────────────

    #[test]
    fn held_completion_times_out_fence() {
        let (mut d, p) = device();
        let pool = d.create_command_pool().unwrap();
        let fence = d.create_fence(true).unwrap();
        let t = Duration::from_millis(1);

        p.hold_completion(true);
        d.reset_fence(fence).unwrap();
        d.submit(pool, &CommandList::new(), None, None, Some(fence)).unwrap();
        assert_eq!(d.wait_fence(fence, t).unwrap(), FenceStatus::Timeout);

        p.complete_submitted();
        assert_eq!(d.wait_fence(fence, t).unwrap(), FenceStatus::Signaled);
    }
}
