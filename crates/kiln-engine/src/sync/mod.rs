//! Frame synchronization primitives: deletion tiers, frame slots and the
//! swapchain lifecycle.

mod deletion;
mod slot;
mod swapchain;

pub use deletion::{DeletionQueue, DeletionTiers};
pub use slot::{FrameRing, FrameSlot, GeometryBuffers};
pub use swapchain::{needs_rebuild, Swapchain, SwapchainState};
