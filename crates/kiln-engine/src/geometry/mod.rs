//! Submission model: vertices, batches, blend descriptors and the opaque
//! handles callers use to reference GPU objects.

mod batch;
mod blend;
mod handle;
mod vertex;

pub use batch::{Batch, FragmentVariant, ZIndex};
pub use blend::{BlendDescriptor, BlendFactor, BlendOp, BlendRegistry};
pub use handle::{BlendHandle, TextureHandle};
pub use vertex::Vertex;
