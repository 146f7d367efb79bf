//! Device abstraction.
//!
//! [`Device`] is an explicit-synchronization GPU interface in the Vulkan
//! mold: objects are created and destroyed through handle ids, frame pacing
//! goes through fences and semaphores, and draw commands are recorded into a
//! [`CommandList`] that the device replays on submit. Backends own a device
//! and build their frame lifecycle on top of it.
//!
//! Two implementations ship with the crate:
//! - [`WgpuDevice`] drives a real surface through wgpu
//! - [`HeadlessDevice`] simulates one in memory for tests and tooling

use std::time::Duration;

use crate::config::SamplerConfig;
use crate::coords::Extent;
use crate::geometry::{BlendDescriptor, FragmentVariant};

mod command;
mod error;
mod gpu;
mod headless;
mod init;
mod resource;
mod surface;

pub use command::{Command, CommandList};
pub use error::{DeviceError, DeviceResult};
pub use gpu::WgpuDevice;
pub use headless::{DrawRecord, HeadlessDevice, HeadlessProbe};
pub use init::DeviceInit;
pub use resource::{
    AcquireOutcome, BufferId, BufferUsage, CommandPoolId, DepthBufferId, DescriptorId, FenceId,
    FenceStatus, FramebufferId, ImageId, ImageViewId, PipelineId, PipelineLayoutId,
    PresentOutcome, Resource, SamplerId, SemaphoreId, SwapchainId, SwapchainInfo, TextureDesc,
    TextureParts,
};
pub use surface::{NativeSurface, SurfaceErrorAction};

/// GPU device contract used by the backends.
///
/// All calls happen on the thread that owns the renderer. Blocking calls take
/// an explicit timeout and report expiry as an outcome instead of an error.
pub trait Device {
    /// Current drawable size of the bound surface. Zero while minimized.
    fn drawable_extent(&self) -> Extent;

    // ── swapchain objects ─────────────────────────────────────────────────

    fn create_swapchain(&mut self, extent: Extent) -> DeviceResult<SwapchainInfo>;

    fn create_image_view(&mut self, swapchain: SwapchainId, image: u32) -> DeviceResult<ImageViewId>;

    fn create_depth_buffer(&mut self, extent: Extent) -> DeviceResult<DepthBufferId>;

    fn create_framebuffer(
        &mut self,
        color: ImageViewId,
        depth: DepthBufferId,
        extent: Extent,
    ) -> DeviceResult<FramebufferId>;

    fn create_pipeline_layout(&mut self) -> DeviceResult<PipelineLayoutId>;

    fn create_pipeline(
        &mut self,
        layout: PipelineLayoutId,
        variant: FragmentVariant,
        blend: &BlendDescriptor,
    ) -> DeviceResult<PipelineId>;

    // ── per-slot objects ──────────────────────────────────────────────────

    fn create_command_pool(&mut self) -> DeviceResult<CommandPoolId>;

    fn create_fence(&mut self, signaled: bool) -> DeviceResult<FenceId>;

    fn create_semaphore(&mut self) -> DeviceResult<SemaphoreId>;

    // ── memory ────────────────────────────────────────────────────────────

    fn create_buffer(&mut self, usage: BufferUsage, size: u64) -> DeviceResult<BufferId>;

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> DeviceResult<()>;

    /// Uploads `pixels` (tightly packed RGBA8) and creates the sampler and
    /// descriptor that bind it.
    fn create_texture(
        &mut self,
        desc: TextureDesc,
        pixels: &[u8],
        sampler: &SamplerConfig,
    ) -> DeviceResult<TextureParts>;

    // ── frame pacing ──────────────────────────────────────────────────────

    fn wait_fence(&mut self, fence: FenceId, timeout: Duration) -> DeviceResult<FenceStatus>;

    fn reset_fence(&mut self, fence: FenceId) -> DeviceResult<()>;

    /// Acquires the next presentable image; `signal` is signaled once the
    /// image is ready to be rendered to.
    fn acquire_image(
        &mut self,
        swapchain: SwapchainId,
        signal: SemaphoreId,
        timeout: Duration,
    ) -> DeviceResult<AcquireOutcome>;

    fn reset_command_pool(&mut self, pool: CommandPoolId) -> DeviceResult<()>;

    /// Replays `commands` on the queue. `fence` is signaled when the work
    /// completes.
    fn submit(
        &mut self,
        pool: CommandPoolId,
        commands: &CommandList,
        wait: Option<SemaphoreId>,
        signal: Option<SemaphoreId>,
        fence: Option<FenceId>,
    ) -> DeviceResult<()>;

    fn present(
        &mut self,
        swapchain: SwapchainId,
        image: u32,
        wait: Option<SemaphoreId>,
    ) -> DeviceResult<PresentOutcome>;

    /// Blocks until all submitted work has completed.
    fn wait_idle(&mut self) -> DeviceResult<()>;

    /// Releases one object. Unknown ids are logged and ignored.
    fn destroy(&mut self, resource: Resource);
}
