use core::fmt;

use crate::coords::Extent;

macro_rules! device_ids {
    ($($(#[$meta:meta])* $name:ident => $tag:literal;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, concat!($tag, "#{}"), self.0)
                }
            }
        )*
    };
}

device_ids! {
    /// Presentable image chain bound to the surface.
    SwapchainId => "swapchain";
    /// View onto a swapchain image or a texture image.
    ImageViewId => "image-view";
    DepthBufferId => "depth";
    /// Color view + depth buffer pair a pass renders into.
    FramebufferId => "framebuffer";
    PipelineLayoutId => "pipeline-layout";
    PipelineId => "pipeline";
    /// Command recording context owned by one frame slot.
    CommandPoolId => "command-pool";
    FenceId => "fence";
    SemaphoreId => "semaphore";
    BufferId => "buffer";
    ImageId => "image";
    SamplerId => "sampler";
    /// Bindable texture + sampler set.
    DescriptorId => "descriptor";
}

/// A device object queued for teardown, tagged with its kind.
///
/// [`Device::destroy`](super::Device::destroy) dispatches on the kind.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Resource {
    Swapchain(SwapchainId),
    ImageView(ImageViewId),
    DepthBuffer(DepthBufferId),
    Framebuffer(FramebufferId),
    PipelineLayout(PipelineLayoutId),
    Pipeline(PipelineId),
    CommandPool(CommandPoolId),
    Fence(FenceId),
    Semaphore(SemaphoreId),
    Buffer(BufferId),
    Image(ImageId),
    Sampler(SamplerId),
    Descriptor(DescriptorId),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Swapchain(id) => id.fmt(f),
            Self::ImageView(id) => id.fmt(f),
            Self::DepthBuffer(id) => id.fmt(f),
            Self::Framebuffer(id) => id.fmt(f),
            Self::PipelineLayout(id) => id.fmt(f),
            Self::Pipeline(id) => id.fmt(f),
            Self::CommandPool(id) => id.fmt(f),
            Self::Fence(id) => id.fmt(f),
            Self::Semaphore(id) => id.fmt(f),
            Self::Buffer(id) => id.fmt(f),
            Self::Image(id) => id.fmt(f),
            Self::Sampler(id) => id.fmt(f),
            Self::Descriptor(id) => id.fmt(f),
        }
    }
}

/// What a device buffer is bound as.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
}

/// Result of creating a swapchain.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SwapchainInfo {
    pub id: SwapchainId,
    pub extent: Extent,
    pub image_count: u32,
}

/// Pixel layout of an uploaded texture. Always tightly packed RGBA8.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
}

impl TextureDesc {
    pub const CHANNELS: u32 = 4;

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * Self::CHANNELS as usize
    }
}

/// Device objects backing one texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureParts {
    pub image: ImageId,
    pub view: ImageViewId,
    pub sampler: SamplerId,
    pub descriptor: DescriptorId,
}

impl TextureParts {
    /// Teardown entries in creation order; a LIFO flush destroys the
    /// descriptor first and the image last.
    pub fn resources(&self) -> [Resource; 4] {
        [
            Resource::Image(self.image),
            Resource::ImageView(self.view),
            Resource::Sampler(self.sampler),
            Resource::Descriptor(self.descriptor),
        ]
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FenceStatus {
    Signaled,
    Timeout,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AcquireOutcome {
    Acquired { index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface and must be rebuilt.
    OutOfDate,
    Timeout,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_kind() {
        assert_eq!(Resource::Buffer(BufferId(7)).to_string(), "buffer#7");
        assert_eq!(FenceId(2).to_string(), "fence#2");
    }

    #[test]
    fn texture_parts_release_descriptor_first() {
        let parts = TextureParts {
            image: ImageId(1),
            view: ImageViewId(2),
            sampler: SamplerId(3),
            descriptor: DescriptorId(4),
        };
        let lifo: Vec<_> = parts.resources().into_iter().rev().collect();
        assert_eq!(lifo[0], Resource::Descriptor(DescriptorId(4)));
        assert_eq!(lifo[3], Resource::Image(ImageId(1)));
    }
}
